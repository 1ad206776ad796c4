// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Construction and signing of registry authorization messages.
//!
//! Each operation builds a domain-bound EIP-712 message, fetches the
//! signer's current nonce, and requests a wallet signature. Input
//! validation runs BEFORE the nonce fetch and the wallet call, so a
//! malformed request never prompts the user for a signature that cannot
//! succeed. The wallet call may suspend indefinitely awaiting approval.

pub mod typed_data;

use std::sync::Arc;

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use thiserror::Error;
use url::Url;

use crate::models::FilePermissionEntry;
use crate::registry::NonceSource;
use crate::wallet::{WalletError, WalletSigner};

pub use typed_data::{
    signing_domain, AddAndTrustServer, FilePermissionClaim, PermissionGrant, PermissionRevoke,
    ServerFilesAndPermissions, TrustServer, UntrustServer,
};

/// Errors from authorization construction and signing.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Malformed input; surfaced before any wallet interaction.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The signer's current nonce could not be read.
    #[error("Failed to fetch nonce: {0}")]
    NonceFetch(String),

    /// The wallet declined to sign.
    #[error("signature request rejected: {0}")]
    UserRejected(String),

    /// Other wallet failures (missing account, signing error).
    #[error("wallet error: {0}")]
    Wallet(WalletError),
}

impl From<WalletError> for AuthorizationError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Rejected(reason) => AuthorizationError::UserRejected(reason),
            other => AuthorizationError::Wallet(other),
        }
    }
}

/// The operation an authorization message performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationKind {
    GrantPermission,
    RevokePermission,
    TrustServer,
    UntrustServer,
    AddAndTrustServer,
    ServerFilesAndPermissions,
}

/// A typed authorization message, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationPayload {
    Grant(PermissionGrant),
    Revoke(PermissionRevoke),
    Trust(TrustServer),
    Untrust(UntrustServer),
    AddAndTrust(AddAndTrustServer),
    ServerFiles(ServerFilesAndPermissions),
}

impl AuthorizationPayload {
    /// The operation kind of this payload.
    pub fn kind(&self) -> AuthorizationKind {
        match self {
            AuthorizationPayload::Grant(_) => AuthorizationKind::GrantPermission,
            AuthorizationPayload::Revoke(_) => AuthorizationKind::RevokePermission,
            AuthorizationPayload::Trust(_) => AuthorizationKind::TrustServer,
            AuthorizationPayload::Untrust(_) => AuthorizationKind::UntrustServer,
            AuthorizationPayload::AddAndTrust(_) => AuthorizationKind::AddAndTrustServer,
            AuthorizationPayload::ServerFiles(_) => AuthorizationKind::ServerFilesAndPermissions,
        }
    }

    /// The EIP-712 signing hash of this payload under `domain`.
    pub fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        match self {
            AuthorizationPayload::Grant(m) => m.eip712_signing_hash(domain),
            AuthorizationPayload::Revoke(m) => m.eip712_signing_hash(domain),
            AuthorizationPayload::Trust(m) => m.eip712_signing_hash(domain),
            AuthorizationPayload::Untrust(m) => m.eip712_signing_hash(domain),
            AuthorizationPayload::AddAndTrust(m) => m.eip712_signing_hash(domain),
            AuthorizationPayload::ServerFiles(m) => m.eip712_signing_hash(domain),
        }
    }
}

/// A signed authorization, ready for submission.
#[derive(Debug, Clone)]
pub struct SignedAuthorization {
    /// The typed message.
    pub payload: AuthorizationPayload,
    /// The domain the message was bound to.
    pub domain: Eip712Domain,
    /// The wallet's signature over the typed message.
    pub signature: Signature,
    /// The account that signed.
    pub signer: Address,
    /// The nonce embedded in the message.
    pub nonce: U256,
}

impl SignedAuthorization {
    /// The operation kind of the signed payload.
    pub fn kind(&self) -> AuthorizationKind {
        self.payload.kind()
    }
}

/// Inputs for a batched server file registration.
#[derive(Debug, Clone)]
pub struct ServerFileRegistration {
    /// Uploaded file URLs, one per file.
    pub file_urls: Vec<String>,
    /// Schema id per file (zero = no schema).
    pub schema_ids: Vec<U256>,
    /// Per-file recipient permission lists.
    pub file_permissions: Vec<Vec<FilePermissionEntry>>,
    /// The server the files are registered under.
    pub server_id: Address,
    /// The server's endpoint URL.
    pub server_url: String,
    /// The server's key-wrapping public key, hex-encoded.
    pub server_public_key: String,
}

/// Builds and signs registry authorization messages.
pub struct AuthorizationSigner {
    wallet: Arc<dyn WalletSigner>,
    nonces: Arc<dyn NonceSource>,
    domain: Eip712Domain,
}

impl AuthorizationSigner {
    /// Create a signer bound to `domain`.
    pub fn new(
        wallet: Arc<dyn WalletSigner>,
        nonces: Arc<dyn NonceSource>,
        domain: Eip712Domain,
    ) -> Self {
        Self {
            wallet,
            nonces,
            domain,
        }
    }

    /// The domain messages are bound to.
    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    /// Sign a permission grant for `grantee`, referencing the grant
    /// document at `grant_uri`.
    pub async fn grant_permission(
        &self,
        grantee: Address,
        grant_uri: &str,
    ) -> Result<SignedAuthorization, AuthorizationError> {
        if grantee == Address::ZERO {
            return Err(AuthorizationError::Validation(
                "grantee must not be the zero address".to_string(),
            ));
        }
        if grant_uri.is_empty() {
            return Err(AuthorizationError::Validation(
                "grant document URI must not be empty".to_string(),
            ));
        }

        let grant = grant_uri.to_string();
        self.finish(move |nonce| {
            AuthorizationPayload::Grant(PermissionGrant {
                grantee,
                grant,
                nonce,
            })
        })
        .await
    }

    /// Sign a revocation of the permission with on-chain id
    /// `permission_id`.
    pub async fn revoke_permission(
        &self,
        permission_id: U256,
    ) -> Result<SignedAuthorization, AuthorizationError> {
        self.finish(move |nonce| {
            AuthorizationPayload::Revoke(PermissionRevoke {
                permissionId: permission_id,
                nonce,
            })
        })
        .await
    }

    /// Sign a trust statement for `server_id` at `server_url`.
    pub async fn trust_server(
        &self,
        server_id: Address,
        server_url: &str,
    ) -> Result<SignedAuthorization, AuthorizationError> {
        validate_server_url(server_url)?;

        let url = server_url.to_string();
        self.finish(move |nonce| {
            AuthorizationPayload::Trust(TrustServer {
                serverId: server_id,
                serverUrl: url,
                nonce,
            })
        })
        .await
    }

    /// Sign an untrust statement for `server_id`.
    pub async fn untrust_server(
        &self,
        server_id: Address,
    ) -> Result<SignedAuthorization, AuthorizationError> {
        self.finish(move |nonce| {
            AuthorizationPayload::Untrust(UntrustServer {
                serverId: server_id,
                nonce,
            })
        })
        .await
    }

    /// Sign a combined server registration + trust statement.
    pub async fn add_and_trust_server(
        &self,
        server_id: Address,
        server_url: &str,
        server_public_key: &str,
    ) -> Result<SignedAuthorization, AuthorizationError> {
        validate_server_url(server_url)?;
        if server_public_key.is_empty() {
            return Err(AuthorizationError::Validation(
                "server public key must not be empty".to_string(),
            ));
        }

        let url = server_url.to_string();
        let public_key = server_public_key.to_string();
        self.finish(move |nonce| {
            AuthorizationPayload::AddAndTrust(AddAndTrustServer {
                serverId: server_id,
                serverUrl: url,
                serverPublicKey: public_key,
                nonce,
            })
        })
        .await
    }

    /// Sign a batched file registration with per-file permissions.
    ///
    /// The three per-file arrays must have equal lengths; the check runs
    /// before any wallet interaction.
    pub async fn register_server_files(
        &self,
        registration: ServerFileRegistration,
    ) -> Result<SignedAuthorization, AuthorizationError> {
        validate_registration(&registration)?;

        self.finish(move |nonce| {
            AuthorizationPayload::ServerFiles(ServerFilesAndPermissions {
                fileUrls: registration.file_urls,
                schemaIds: registration.schema_ids,
                filePermissions: registration
                    .file_permissions
                    .into_iter()
                    .map(|entries| {
                        entries
                            .into_iter()
                            .map(|entry| FilePermissionClaim {
                                account: entry.account,
                                key: entry.key,
                            })
                            .collect()
                    })
                    .collect(),
                serverId: registration.server_id,
                serverUrl: registration.server_url,
                serverPublicKey: registration.server_public_key,
                nonce,
            })
        })
        .await
    }

    /// Fetch the nonce, build the payload, and request the signature.
    async fn finish<F>(&self, build: F) -> Result<SignedAuthorization, AuthorizationError>
    where
        F: FnOnce(U256) -> AuthorizationPayload,
    {
        let signer = self.wallet.address()?;

        let nonce = self
            .nonces
            .nonce(signer)
            .await
            .map_err(|e| AuthorizationError::NonceFetch(e.to_string()))?;

        let payload = build(nonce);
        let hash = payload.signing_hash(&self.domain);
        let signature = self.wallet.sign_hash(hash).await?;

        Ok(SignedAuthorization {
            payload,
            domain: self.domain.clone(),
            signature,
            signer,
            nonce,
        })
    }
}

fn validate_server_url(server_url: &str) -> Result<(), AuthorizationError> {
    Url::parse(server_url).map_err(|e| {
        AuthorizationError::Validation(format!("invalid server URL `{}`: {}", server_url, e))
    })?;
    Ok(())
}

fn validate_registration(r: &ServerFileRegistration) -> Result<(), AuthorizationError> {
    if r.file_urls.is_empty() {
        return Err(AuthorizationError::Validation(
            "at least one file URL is required".to_string(),
        ));
    }

    if r.schema_ids.len() != r.file_urls.len() || r.file_permissions.len() != r.file_urls.len() {
        return Err(AuthorizationError::Validation(format!(
            "per-file array length mismatch: {} file URLs, {} schema ids, {} permission lists",
            r.file_urls.len(),
            r.schema_ids.len(),
            r.file_permissions.len()
        )));
    }

    for url in &r.file_urls {
        if url.is_empty() {
            return Err(AuthorizationError::Validation(
                "file URLs must not be empty".to_string(),
            ));
        }
    }

    validate_server_url(&r.server_url)?;

    if r.server_public_key.is_empty() {
        return Err(AuthorizationError::Validation(
            "server public key must not be empty".to_string(),
        ));
    }

    Ok(())
}
