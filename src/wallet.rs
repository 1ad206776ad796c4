// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signing abstraction.
//!
//! The SDK never holds private keys itself; it talks to a [`WalletSigner`].
//! Interactive wallets (browser extensions, hardware devices) implement the
//! trait in the host application and may suspend indefinitely awaiting user
//! approval. [`LocalWallet`] wraps an in-process key for non-interactive
//! use (servers, tests).

use alloy::primitives::{Address, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by wallet interactions.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The wallet has no bound account.
    #[error("no account is bound to this wallet")]
    MissingAccount,

    /// The user (or policy) declined to sign.
    #[error("signature request rejected: {0}")]
    Rejected(String),

    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// An account that can produce signatures on request.
///
/// `sign_message` uses EIP-191 personal-message signing; `sign_hash` signs
/// a 32-byte digest directly (used for typed structured data, where the
/// caller computes the domain-bound hash).
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// The bound account address.
    fn address(&self) -> Result<Address, WalletError>;

    /// Sign an EIP-191 personal message.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError>;

    /// Sign a precomputed 32-byte digest.
    async fn sign_hash(&self, hash: B256) -> Result<Signature, WalletError>;
}

/// In-process wallet over a raw secp256k1 key.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    /// Wrap an existing alloy signer.
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Create a wallet from a hex-encoded private key (with or without
    /// `0x` prefix).
    pub fn from_hex(private_key_hex: &str) -> Result<Self, WalletError> {
        let trimmed = private_key_hex.trim_start_matches("0x");
        let key_bytes = alloy::hex::decode(trimmed)
            .map_err(|e| WalletError::Signing(format!("Invalid private key hex: {}", e)))?;

        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| WalletError::Signing(format!("Invalid private key: {}", e)))?;

        Ok(Self { signer })
    }

    /// Generate a wallet with a random key.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Access the underlying alloy signer (for provider wiring).
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    fn address(&self) -> Result<Address, WalletError> {
        Ok(self.signer.address())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| WalletError::Signing(e.to_string()))
    }

    async fn sign_hash(&self, hash: B256) -> Result<Signature, WalletError> {
        self.signer
            .sign_hash(&hash)
            .await
            .map_err(|e| WalletError::Signing(e.to_string()))
    }
}
