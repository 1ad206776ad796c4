// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Top-level SDK error taxonomy.
//!
//! Module errors stay close to the code that produces them; this type
//! aggregates them at the orchestration layer so callers can branch on
//! error kind without inspecting transport internals. Validation and
//! user-rejection failures are never retried; transport failures are
//! retried inside the producing module before they surface here.

use thiserror::Error;

use crate::authorization::AuthorizationError;
use crate::crypto::CryptoError;
use crate::gateway::GatewayError;
use crate::registry::RegistryError;
use crate::resolver::ResolveError;
use crate::submission::SubmissionError;
use crate::wallet::WalletError;

/// Aggregated SDK error.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Malformed input, caught before any I/O or signing.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The wallet declined to sign.
    #[error("signature request rejected: {0}")]
    UserRejected(String),

    /// The wallet has no bound account.
    #[error("no account is bound to this wallet")]
    MissingAccount,

    /// The signer's current nonce could not be read.
    #[error("Failed to fetch nonce: {0}")]
    NonceFetch(String),

    /// Other wallet failure.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Cryptographic failure (wrong key, malformed material).
    #[error(transparent)]
    Crypto(CryptoError),

    /// Submission failure (relay, transaction, missing event).
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Both state read paths failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Content storage or retrieval failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Registry chain client failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<WalletError> for SdkError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::MissingAccount => SdkError::MissingAccount,
            WalletError::Rejected(reason) => SdkError::UserRejected(reason),
            WalletError::Signing(reason) => SdkError::Wallet(reason),
        }
    }
}

impl From<AuthorizationError> for SdkError {
    fn from(e: AuthorizationError) -> Self {
        match e {
            AuthorizationError::Validation(msg) => SdkError::Validation(msg),
            AuthorizationError::NonceFetch(msg) => SdkError::NonceFetch(msg),
            AuthorizationError::UserRejected(msg) => SdkError::UserRejected(msg),
            AuthorizationError::Wallet(w) => w.into(),
        }
    }
}

impl From<CryptoError> for SdkError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Wallet(w) => w.into(),
            other => SdkError::Crypto(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_errors_map_to_their_kinds() {
        assert!(matches!(
            SdkError::from(WalletError::MissingAccount),
            SdkError::MissingAccount
        ));
        assert!(matches!(
            SdkError::from(WalletError::Rejected("declined".to_string())),
            SdkError::UserRejected(_)
        ));
    }

    #[test]
    fn authorization_validation_stays_a_validation_error() {
        let err = SdkError::from(AuthorizationError::Validation("bad lengths".to_string()));
        assert!(matches!(err, SdkError::Validation(_)));
        assert!(err.to_string().contains("bad lengths"));
    }

    #[test]
    fn missing_account_surfaces_through_crypto() {
        let err = SdkError::from(CryptoError::Wallet(WalletError::MissingAccount));
        assert!(matches!(err, SdkError::MissingAccount));

        let err = SdkError::from(CryptoError::WrongKey);
        assert!(matches!(err, SdkError::Crypto(CryptoError::WrongKey)));
    }
}
