// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Submission of signed authorizations to the registry chain.
//!
//! A signed authorization travels one of two routes:
//!
//! 1. **Relayed**: a caller-supplied callback forwards `(payload,
//!    signature)` to a gas-paying submitter and returns a transaction
//!    identifier. The relay performs the on-chain write; the router does
//!    not wait for confirmation on this path.
//! 2. **Direct**: the same fields are re-encoded as ordinary call
//!    arguments and submitted from the local account. The router awaits
//!    the receipt and decodes identifier-carrying events (permission ids,
//!    file ids).
//!
//! Transient network failures during relay submission and receipt polling
//! are retried; rejections and validation failures are not.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Signature, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Log, TransactionReceipt};
use async_trait::async_trait;
use thiserror::Error;

use crate::authorization::{AuthorizationKind, AuthorizationPayload, SignedAuthorization};
use crate::config::SdkConfig;
use crate::models::{FilePermissionEntry, RefinerRef, SchemaRef};
use crate::registry::{signer_provider, IDataRegistry, RegistryError, SignerProvider};
use crate::retry::{with_retry_if, RetryPolicy};

/// Errors from authorization submission.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The relay callback failed.
    #[error("relay error: {0}")]
    Relay(String),

    /// Transport-level RPC failure (retryable).
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The transaction could not be submitted or reverted.
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// The write succeeded but the expected event was absent from the
    /// receipt. Not retried: resubmission would duplicate the write.
    #[error("transaction {tx_hash} succeeded but did not emit {event}")]
    MissingExpectedEvent { event: &'static str, tx_hash: String },

    /// Provider construction failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors a relay callback may return.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Network-level failure; the submission is retried.
    #[error("relay transport error: {0}")]
    Transport(String),

    /// The relay refused the submission; never retried.
    #[error("relay rejected submission: {0}")]
    Rejected(String),
}

/// Future returned by relay callbacks.
pub type RelayFuture<T> = Pin<Box<dyn Future<Output = Result<T, RelayError>> + Send>>;

/// Relay callback for signed authorization messages.
pub type RelayFn = Arc<dyn Fn(AuthorizationPayload, Signature) -> RelayFuture<String> + Send + Sync>;

/// Relay callback registering a file without permissions.
pub type AddFileRelayFn = Arc<dyn Fn(String, Address) -> RelayFuture<FileRegistration> + Send + Sync>;

/// Relay callback registering a file with recipient permissions.
pub type AddFileWithPermissionsRelayFn = Arc<
    dyn Fn(String, Address, Vec<FilePermissionEntry>) -> RelayFuture<FileRegistration>
        + Send
        + Sync,
>;

/// Result of a file registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRegistration {
    /// The registered file's on-chain id.
    pub file_id: U256,
    /// Transaction identifier.
    pub transaction: String,
}

/// Caller-supplied relay callbacks, one per operation kind.
///
/// An absent callback routes that operation through the direct path.
#[derive(Clone, Default)]
pub struct RelayCallbacks {
    pub grant_permission: Option<RelayFn>,
    pub revoke_permission: Option<RelayFn>,
    pub trust_server: Option<RelayFn>,
    pub untrust_server: Option<RelayFn>,
    pub add_and_trust_server: Option<RelayFn>,
    pub server_files_and_permissions: Option<RelayFn>,
    pub add_file: Option<AddFileRelayFn>,
    pub add_file_with_permissions: Option<AddFileWithPermissionsRelayFn>,
}

impl RelayCallbacks {
    fn for_kind(&self, kind: AuthorizationKind) -> Option<&RelayFn> {
        match kind {
            AuthorizationKind::GrantPermission => self.grant_permission.as_ref(),
            AuthorizationKind::RevokePermission => self.revoke_permission.as_ref(),
            AuthorizationKind::TrustServer => self.trust_server.as_ref(),
            AuthorizationKind::UntrustServer => self.untrust_server.as_ref(),
            AuthorizationKind::AddAndTrustServer => self.add_and_trust_server.as_ref(),
            AuthorizationKind::ServerFilesAndPermissions => {
                self.server_files_and_permissions.as_ref()
            }
        }
    }
}

/// Which route actually carried a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// A relay callback forwarded the signed message.
    Relayed,
    /// The router submitted a direct transaction from the local account.
    Direct,
}

/// Outcome of a submission.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    /// Transaction identifier (relay-reported or local hash).
    pub transaction: String,
    /// The route that carried the submission.
    pub mode: SubmissionMode,
    /// Identifiers decoded from emitted events (direct path only).
    pub ids: Vec<U256>,
}

/// Direct on-chain write capability.
///
/// The production implementation is [`RegistryWriter`]; tests inject
/// recording mocks.
#[async_trait]
pub trait DirectWriter: Send + Sync {
    /// Submit an authorization payload as a direct transaction.
    async fn submit_authorization(
        &self,
        payload: &AuthorizationPayload,
    ) -> Result<SubmissionReceipt, SubmissionError>;

    /// Register a single file with recipient permissions.
    async fn add_file_with_permissions(
        &self,
        url: String,
        owner: Address,
        permissions: Vec<FilePermissionEntry>,
    ) -> Result<FileRegistration, SubmissionError>;
}

/// Routes signed authorizations to a relay or the direct path.
pub struct SubmissionRouter {
    relays: RelayCallbacks,
    direct: Arc<dyn DirectWriter>,
    relay_retry: RetryPolicy,
}

impl SubmissionRouter {
    /// Create a router. `relays` may be empty; every operation then uses
    /// the direct path.
    pub fn new(relays: RelayCallbacks, direct: Arc<dyn DirectWriter>) -> Self {
        Self {
            relays,
            direct,
            relay_retry: RetryPolicy::default(),
        }
    }

    /// Override the relay retry policy.
    pub fn with_relay_retry(mut self, policy: RetryPolicy) -> Self {
        self.relay_retry = policy;
        self
    }

    /// Deliver a signed authorization.
    pub async fn submit(
        &self,
        auth: &SignedAuthorization,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if let Some(relay) = self.relays.for_kind(auth.kind()) {
            let transaction = with_retry_if(
                &self.relay_retry,
                |e: &RelayError| matches!(e, RelayError::Transport(_)),
                || relay(auth.payload.clone(), auth.signature),
            )
            .await
            .map_err(|e| SubmissionError::Relay(e.to_string()))?;

            tracing::debug!(kind = ?auth.kind(), tx = %transaction, "Authorization relayed");
            return Ok(SubmissionReceipt {
                transaction,
                mode: SubmissionMode::Relayed,
                ids: Vec::new(),
            });
        }

        tracing::debug!(kind = ?auth.kind(), "No relay configured, submitting directly");
        self.direct.submit_authorization(&auth.payload).await
    }

    /// Register a file without permission entries, preferring the relay.
    pub async fn add_file(
        &self,
        url: String,
        owner: Address,
    ) -> Result<FileRegistration, SubmissionError> {
        if let Some(relay) = self.relays.add_file.as_ref() {
            return with_retry_if(
                &self.relay_retry,
                |e: &RelayError| matches!(e, RelayError::Transport(_)),
                || relay(url.clone(), owner),
            )
            .await
            .map_err(|e| SubmissionError::Relay(e.to_string()));
        }

        self.direct
            .add_file_with_permissions(url, owner, Vec::new())
            .await
    }

    /// Register a file with recipient permissions, preferring the relay.
    pub async fn add_file_with_permissions(
        &self,
        url: String,
        owner: Address,
        permissions: Vec<FilePermissionEntry>,
    ) -> Result<FileRegistration, SubmissionError> {
        if let Some(relay) = self.relays.add_file_with_permissions.as_ref() {
            return with_retry_if(
                &self.relay_retry,
                |e: &RelayError| matches!(e, RelayError::Transport(_)),
                || relay(url.clone(), owner, permissions.clone()),
            )
            .await
            .map_err(|e| SubmissionError::Relay(e.to_string()));
        }

        self.direct
            .add_file_with_permissions(url, owner, permissions)
            .await
    }
}

// =============================================================================
// Direct Writer (production)
// =============================================================================

/// Submits direct transactions to the registry from a local account.
pub struct RegistryWriter {
    provider: SignerProvider,
    registry: Address,
    receipt_retry: RetryPolicy,
}

impl RegistryWriter {
    /// Connect a write-capable provider for the configured chain.
    pub fn new(config: &SdkConfig, wallet: EthereumWallet) -> Result<Self, SubmissionError> {
        let provider = signer_provider(config, wallet)?;
        let registry = config
            .registry_address()
            .map_err(RegistryError::InvalidAddress)?;

        Ok(Self {
            provider,
            registry,
            receipt_retry: RetryPolicy {
                max_attempts: 10,
                delay_ms: 1000,
            },
        })
    }

    /// Override the receipt polling policy.
    pub fn with_receipt_retry(mut self, policy: RetryPolicy) -> Self {
        self.receipt_retry = policy;
        self
    }

    fn contract(&self) -> IDataRegistry::IDataRegistryInstance<SignerProvider> {
        IDataRegistry::new(self.registry, self.provider.clone())
    }

    /// Poll for the transaction receipt, retrying transient RPC failures.
    async fn await_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt, SubmissionError> {
        with_retry_if(
            &self.receipt_retry,
            |e: &SubmissionError| matches!(e, SubmissionError::Rpc(_)),
            || async {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => Ok(receipt),
                    Ok(None) => Err(SubmissionError::Rpc(format!(
                        "transaction {:#x} not yet mined",
                        tx_hash
                    ))),
                    Err(e) => Err(SubmissionError::Rpc(format!(
                        "Failed to get receipt: {}",
                        e
                    ))),
                }
            },
        )
        .await
    }

    async fn confirm(
        &self,
        tx_hash: TxHash,
        expected_event: Option<&'static str>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let receipt = self.await_receipt(tx_hash).await?;
        let tx = format!("{:#x}", receipt.transaction_hash);

        if !receipt.status() {
            return Err(SubmissionError::Transaction(format!(
                "transaction {} reverted",
                tx
            )));
        }

        let ids = match expected_event {
            Some("PermissionGranted") => {
                let id = decode_permission_id(receipt.inner.logs()).ok_or_else(|| {
                    SubmissionError::MissingExpectedEvent {
                        event: "PermissionGranted",
                        tx_hash: tx.clone(),
                    }
                })?;
                vec![id]
            }
            Some("FileAdded") => {
                let ids = decode_file_ids(receipt.inner.logs());
                if ids.is_empty() {
                    return Err(SubmissionError::MissingExpectedEvent {
                        event: "FileAdded",
                        tx_hash: tx,
                    });
                }
                ids
            }
            Some("SchemaAdded") => {
                let id = decode_schema_id(receipt.inner.logs()).ok_or_else(|| {
                    SubmissionError::MissingExpectedEvent {
                        event: "SchemaAdded",
                        tx_hash: tx.clone(),
                    }
                })?;
                vec![id]
            }
            Some("RefinerAdded") => {
                let id = decode_refiner_id(receipt.inner.logs()).ok_or_else(|| {
                    SubmissionError::MissingExpectedEvent {
                        event: "RefinerAdded",
                        tx_hash: tx.clone(),
                    }
                })?;
                vec![id]
            }
            _ => Vec::new(),
        };

        Ok(SubmissionReceipt {
            transaction: tx,
            mode: SubmissionMode::Direct,
            ids,
        })
    }

    /// Register a schema definition. Returns the created schema and the
    /// confirming receipt.
    pub async fn add_schema(
        &self,
        name: String,
        definition_url: String,
    ) -> Result<(SchemaRef, SubmissionReceipt), SubmissionError> {
        let pending = self
            .contract()
            .addSchema(name.clone(), definition_url.clone())
            .send()
            .await
            .map_err(|e| SubmissionError::Transaction(format!("Failed to add schema: {}", e)))?;

        let receipt = self.confirm(*pending.tx_hash(), Some("SchemaAdded")).await?;
        let schema = SchemaRef {
            id: receipt.ids[0],
            name,
            definition_url,
        };
        Ok((schema, receipt))
    }

    /// Register a refiner for a schema. `owner` is the registering
    /// account. Returns the created refiner and the confirming receipt.
    pub async fn add_refiner(
        &self,
        dlp_id: U256,
        schema_id: U256,
        instruction_url: String,
        owner: Address,
    ) -> Result<(RefinerRef, SubmissionReceipt), SubmissionError> {
        let pending = self
            .contract()
            .addRefiner(dlp_id, schema_id, instruction_url.clone())
            .send()
            .await
            .map_err(|e| SubmissionError::Transaction(format!("Failed to add refiner: {}", e)))?;

        let receipt = self.confirm(*pending.tx_hash(), Some("RefinerAdded")).await?;
        let refiner = RefinerRef {
            id: receipt.ids[0],
            dlp_id,
            schema_id,
            instruction_url,
            owner,
        };
        Ok((refiner, receipt))
    }
}

#[async_trait]
impl DirectWriter for RegistryWriter {
    async fn submit_authorization(
        &self,
        payload: &AuthorizationPayload,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let contract = self.contract();

        let (pending, expected_event) = match payload {
            AuthorizationPayload::Grant(m) => (
                contract
                    .addPermission(m.grantee, m.grant.clone(), m.nonce)
                    .send()
                    .await
                    .map_err(|e| {
                        SubmissionError::Transaction(format!("Failed to grant permission: {}", e))
                    })?,
                Some("PermissionGranted"),
            ),
            AuthorizationPayload::Revoke(m) => (
                contract
                    .revokePermission(m.permissionId)
                    .send()
                    .await
                    .map_err(|e| {
                        SubmissionError::Transaction(format!("Failed to revoke permission: {}", e))
                    })?,
                None,
            ),
            AuthorizationPayload::Trust(m) => (
                contract
                    .trustServer(m.serverId, m.serverUrl.clone())
                    .send()
                    .await
                    .map_err(|e| {
                        SubmissionError::Transaction(format!("Failed to trust server: {}", e))
                    })?,
                None,
            ),
            AuthorizationPayload::Untrust(m) => (
                contract
                    .untrustServer(m.serverId)
                    .send()
                    .await
                    .map_err(|e| {
                        SubmissionError::Transaction(format!("Failed to untrust server: {}", e))
                    })?,
                None,
            ),
            AuthorizationPayload::AddAndTrust(m) => (
                contract
                    .addAndTrustServer(
                        m.serverId,
                        m.serverUrl.clone(),
                        m.serverPublicKey.clone(),
                    )
                    .send()
                    .await
                    .map_err(|e| {
                        SubmissionError::Transaction(format!(
                            "Failed to add and trust server: {}",
                            e
                        ))
                    })?,
                None,
            ),
            AuthorizationPayload::ServerFiles(m) => (
                contract
                    .addServerFilesAndPermissions(
                        m.fileUrls.clone(),
                        m.schemaIds.clone(),
                        m.filePermissions
                            .iter()
                            .map(|entries| {
                                entries
                                    .iter()
                                    .map(|claim| IDataRegistry::FilePermission {
                                        account: claim.account,
                                        key: claim.key.clone(),
                                    })
                                    .collect()
                            })
                            .collect(),
                        m.serverId,
                        m.serverUrl.clone(),
                        m.serverPublicKey.clone(),
                    )
                    .send()
                    .await
                    .map_err(|e| {
                        SubmissionError::Transaction(format!(
                            "Failed to add file with permissions and schema: {}",
                            e
                        ))
                    })?,
                Some("FileAdded"),
            ),
        };

        self.confirm(*pending.tx_hash(), expected_event).await
    }

    async fn add_file_with_permissions(
        &self,
        url: String,
        owner: Address,
        permissions: Vec<FilePermissionEntry>,
    ) -> Result<FileRegistration, SubmissionError> {
        let entries: Vec<IDataRegistry::FilePermission> = permissions
            .into_iter()
            .map(|entry| IDataRegistry::FilePermission {
                account: entry.account,
                key: entry.key,
            })
            .collect();

        let pending = self
            .contract()
            .addFileWithPermissions(url, owner, entries)
            .send()
            .await
            .map_err(|e| {
                SubmissionError::Transaction(format!(
                    "Failed to add file with permissions and schema: {}",
                    e
                ))
            })?;

        let receipt = self.confirm(*pending.tx_hash(), Some("FileAdded")).await?;
        Ok(FileRegistration {
            file_id: receipt.ids[0],
            transaction: receipt.transaction,
        })
    }
}

// =============================================================================
// Event Decoding
// =============================================================================

/// Extract the granted permission id, tolerating unrelated log entries.
pub(crate) fn decode_permission_id(logs: &[Log]) -> Option<U256> {
    logs.iter().find_map(|log| {
        log.log_decode::<IDataRegistry::PermissionGranted>()
            .ok()
            .map(|decoded| decoded.inner.data.id)
    })
}

/// Extract all registered file ids, in log order.
pub(crate) fn decode_file_ids(logs: &[Log]) -> Vec<U256> {
    logs.iter()
        .filter_map(|log| {
            log.log_decode::<IDataRegistry::FileAdded>()
                .ok()
                .map(|decoded| decoded.inner.data.fileId)
        })
        .collect()
}

/// Extract the new schema id.
pub(crate) fn decode_schema_id(logs: &[Log]) -> Option<U256> {
    logs.iter().find_map(|log| {
        log.log_decode::<IDataRegistry::SchemaAdded>()
            .ok()
            .map(|decoded| decoded.inner.data.schemaId)
    })
}

/// Extract the new refiner id.
pub(crate) fn decode_refiner_id(logs: &[Log]) -> Option<U256> {
    logs.iter().find_map(|log| {
        log.log_decode::<IDataRegistry::RefinerAdded>()
            .ok()
            .map(|decoded| decoded.inner.data.refinerId)
    })
}
