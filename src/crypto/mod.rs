// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key derivation, envelope encryption, and per-recipient key wrapping.
//!
//! ## Key Model
//!
//! Files are encrypted with a symmetric key derived from the owner's
//! wallet: the wallet signs a fixed seed message and the signature itself
//! is the secret. Because EIP-191 signatures are deterministic for a given
//! key and message, the owner can re-derive the same secret on any device
//! without persisting anything.
//!
//! Sharing works by wrapping a file key under each recipient's public key
//! ([`keywrap`]): an access list of N recipients costs exactly N wrap
//! operations, independent of file size. Plaintext key material is never
//! persisted or transmitted.

pub mod envelope;
pub mod keywrap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::wallet::{WalletError, WalletSigner};

pub use envelope::{Envelope, EnvelopeFormat};
pub use keywrap::WrappedKey;

/// Fixed seed message signed to derive the user's encryption secret.
///
/// Changing this string changes every derived key; it is part of the
/// storage format.
pub const USER_KEY_SEED: &str =
    "Relational Registry: sign this message to derive your file encryption key. \
     This signature never leaves your device.";

/// Errors from cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Authenticated decryption failed; the key does not match.
    #[error("decryption failed: wrong key")]
    WrongKey,

    /// Decryption failed for a structural reason (truncated or malformed
    /// ciphertext), distinguished from a key mismatch.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Key material could not be parsed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Envelope or wrapped-key encoding error.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The wallet interaction failed.
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// The user's symmetric secret, derived from a wallet signature.
///
/// The hex-encoded signature is used verbatim as the secret; its length
/// and format are stable across wallet implementations.
#[derive(Clone, PartialEq, Eq)]
pub struct UserKey(String);

impl UserKey {
    /// Wrap an externally supplied secret (e.g. restored from a signature).
    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        write!(f, "UserKey(..)")
    }
}

/// Derive the user's symmetric secret by signing `seed` with the wallet.
///
/// Fails with [`WalletError::MissingAccount`] (wrapped) before requesting a
/// signature if the wallet has no bound account.
pub async fn derive_user_key(
    wallet: &dyn WalletSigner,
    seed: &str,
) -> Result<UserKey, CryptoError> {
    wallet.address()?;

    let signature = wallet.sign_message(seed.as_bytes()).await?;
    Ok(UserKey(alloy::hex::encode_prefixed(signature.as_bytes())))
}

/// HKDF-SHA256 (extract-then-expand) producing a 32-byte key.
pub(crate) fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<[u8; 32], CryptoError> {
    // Extract
    let mut mac = Hmac::<Sha256>::new_from_slice(salt)
        .map_err(|e| CryptoError::Encryption(format!("HKDF extract failed: {}", e)))?;
    mac.update(ikm);
    let prk = mac.finalize().into_bytes();

    // Expand (single block; 32 bytes <= SHA-256 output)
    let mut mac = Hmac::<Sha256>::new_from_slice(prk.as_slice())
        .map_err(|e| CryptoError::Encryption(format!("HKDF expand failed: {}", e)))?;
    mac.update(info);
    mac.update(&[0x01]);
    let okm = mac.finalize().into_bytes();

    let mut out = [0u8; 32];
    out.copy_from_slice(okm.as_slice());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::LocalWallet;

    #[tokio::test]
    async fn derived_key_is_deterministic_per_wallet() {
        let wallet = LocalWallet::from_hex(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        )
        .unwrap();

        let first = derive_user_key(&wallet, USER_KEY_SEED).await.unwrap();
        let second = derive_user_key(&wallet, USER_KEY_SEED).await.unwrap();
        assert_eq!(first.as_str(), second.as_str());

        // 65-byte signature, hex encoded with 0x prefix.
        assert_eq!(first.as_str().len(), 2 + 65 * 2);
        assert!(first.as_str().starts_with("0x"));
    }

    #[tokio::test]
    async fn different_wallets_derive_different_keys() {
        let a = derive_user_key(&LocalWallet::random(), USER_KEY_SEED)
            .await
            .unwrap();
        let b = derive_user_key(&LocalWallet::random(), USER_KEY_SEED)
            .await
            .unwrap();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn hkdf_is_deterministic_and_domain_separated() {
        let a = hkdf_sha256(b"ikm", b"salt", b"context-a").unwrap();
        let b = hkdf_sha256(b"ikm", b"salt", b"context-a").unwrap();
        let c = hkdf_sha256(b"ikm", b"salt", b"context-b").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn user_key_debug_hides_secret() {
        let key = UserKey::from_secret("0xdeadbeef");
        assert_eq!(format!("{:?}", key), "UserKey(..)");
    }
}
