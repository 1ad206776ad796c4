// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-recipient file-key wrapping.
//!
//! A file key is wrapped under a recipient's raw secp256k1 public key via
//! ephemeral ECDH: the sender generates a one-time keypair, derives a wrap
//! key from the shared secret, and encrypts the file key with
//! ChaCha20-Poly1305. Only the holder of the recipient's private key can
//! recover the shared secret and unwrap.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::RngCore;

use super::CryptoError;

/// Domain-separation label for the wrap-key schedule.
const KEYWRAP_KDF_INFO: &[u8] = b"relational-registry/keywrap";

/// Compressed SEC1 point length in bytes.
const POINT_LEN: usize = 33;

/// ChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Poly1305 authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// A file key wrapped for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    /// Sender's ephemeral public key, compressed SEC1.
    pub ephemeral_public: Vec<u8>,
    /// AEAD nonce.
    pub nonce: Vec<u8>,
    /// Encrypted file key including the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl WrappedKey {
    /// Encode as a single hex string: `ephemeral_public || nonce || ciphertext`.
    ///
    /// This is the form embedded in a file registration's permission entry.
    pub fn encode(&self) -> String {
        let mut out = Vec::with_capacity(POINT_LEN + NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.ephemeral_public);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        alloy::hex::encode_prefixed(out)
    }

    /// Decode from the hex form produced by [`encode`](WrappedKey::encode).
    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = alloy::hex::decode(encoded.trim_start_matches("0x"))
            .map_err(|e| CryptoError::Encoding(format!("invalid wrapped key hex: {}", e)))?;

        if bytes.len() < POINT_LEN + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Encoding(format!(
                "wrapped key too short: {} bytes",
                bytes.len()
            )));
        }

        Ok(Self {
            ephemeral_public: bytes[..POINT_LEN].to_vec(),
            nonce: bytes[POINT_LEN..POINT_LEN + NONCE_LEN].to_vec(),
            ciphertext: bytes[POINT_LEN + NONCE_LEN..].to_vec(),
        })
    }
}

/// Wrap `file_key` under a recipient's public key (hex SEC1, compressed or
/// uncompressed, with or without `0x` prefix).
pub fn wrap_key_for(file_key: &str, recipient_public: &str) -> Result<WrappedKey, CryptoError> {
    let recipient = parse_public_key(recipient_public)?;

    let ephemeral_secret = SecretKey::random(&mut rand::thread_rng());
    let ephemeral_public = ephemeral_secret
        .public_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec();

    let shared = k256::ecdh::diffie_hellman(
        ephemeral_secret.to_nonzero_scalar(),
        recipient.as_affine(),
    );
    let wrap_key = super::hkdf_sha256(
        shared.raw_secret_bytes().as_slice(),
        &ephemeral_public,
        KEYWRAP_KDF_INFO,
    )?;

    let mut nonce = vec![0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new_from_slice(&wrap_key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), file_key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(WrappedKey {
        ephemeral_public,
        nonce,
        ciphertext,
    })
}

/// Unwrap a file key with the recipient's private key (hex, with or
/// without `0x` prefix).
pub fn unwrap_key_with(wrapped: &WrappedKey, recipient_secret: &str) -> Result<String, CryptoError> {
    let secret_bytes = alloy::hex::decode(recipient_secret.trim_start_matches("0x"))
        .map_err(|e| CryptoError::InvalidKey(format!("invalid private key hex: {}", e)))?;
    let secret = SecretKey::from_slice(&secret_bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid private key: {}", e)))?;

    let ephemeral = PublicKey::from_sec1_bytes(&wrapped.ephemeral_public)
        .map_err(|e| CryptoError::Decryption(format!("invalid ephemeral public key: {}", e)))?;

    if wrapped.nonce.len() != NONCE_LEN {
        return Err(CryptoError::Decryption(format!(
            "invalid nonce length: expected {}, got {}",
            NONCE_LEN,
            wrapped.nonce.len()
        )));
    }

    let shared = k256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
    let wrap_key = super::hkdf_sha256(
        shared.raw_secret_bytes().as_slice(),
        &wrapped.ephemeral_public,
        KEYWRAP_KDF_INFO,
    )?;

    let cipher = ChaCha20Poly1305::new_from_slice(&wrap_key)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    let file_key = cipher
        .decrypt(Nonce::from_slice(&wrapped.nonce), wrapped.ciphertext.as_ref())
        .map_err(|_| CryptoError::WrongKey)?;

    String::from_utf8(file_key)
        .map_err(|e| CryptoError::Decryption(format!("file key is not valid UTF-8: {}", e)))
}

/// Generate a recipient keypair as `(private_hex, public_hex)`.
///
/// Servers publish the public half when registering; the private half
/// stays with the server for unwrapping delegated keys.
pub fn generate_keypair() -> (String, String) {
    let secret = SecretKey::random(&mut rand::thread_rng());
    let public = secret.public_key().to_encoded_point(false);
    (
        alloy::hex::encode_prefixed(secret.to_bytes()),
        alloy::hex::encode_prefixed(public.as_bytes()),
    )
}

fn parse_public_key(hex: &str) -> Result<PublicKey, CryptoError> {
    let bytes = alloy::hex::decode(hex.trim_start_matches("0x"))
        .map_err(|e| CryptoError::InvalidKey(format!("invalid public key hex: {}", e)))?;
    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid public key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let (secret, public) = generate_keypair();
        let file_key = "file-key-7f3a1c";

        let wrapped = wrap_key_for(file_key, &public).unwrap();
        let unwrapped = unwrap_key_with(&wrapped, &secret).unwrap();

        assert_eq!(unwrapped, file_key);
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() {
        let (_, public) = generate_keypair();
        let (wrong_secret, _) = generate_keypair();

        let wrapped = wrap_key_for("file-key", &public).unwrap();
        let err = unwrap_key_with(&wrapped, &wrong_secret).unwrap_err();

        assert!(matches!(err, CryptoError::WrongKey));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let (secret, public) = generate_keypair();
        let wrapped = wrap_key_for("file-key", &public).unwrap();

        let encoded = wrapped.encode();
        assert!(encoded.starts_with("0x"));

        let decoded = WrappedKey::decode(&encoded).unwrap();
        assert_eq!(decoded, wrapped);
        assert_eq!(unwrap_key_with(&decoded, &secret).unwrap(), "file-key");
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let err = WrappedKey::decode("0x0102").unwrap_err();
        assert!(matches!(err, CryptoError::Encoding(_)));
    }

    #[test]
    fn accepts_compressed_recipient_keys() {
        let secret = SecretKey::random(&mut rand::thread_rng());
        let compressed = alloy::hex::encode(secret.public_key().to_encoded_point(true).as_bytes());
        let secret_hex = alloy::hex::encode_prefixed(secret.to_bytes());

        let wrapped = wrap_key_for("file-key", &compressed).unwrap();
        assert_eq!(unwrap_key_with(&wrapped, &secret_hex).unwrap(), "file-key");
    }

    #[test]
    fn rejects_garbage_public_key() {
        let err = wrap_key_for("file-key", "0x1234").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[test]
    fn each_wrap_uses_a_fresh_ephemeral_key() {
        let (_, public) = generate_keypair();
        let a = wrap_key_for("file-key", &public).unwrap();
        let b = wrap_key_for("file-key", &public).unwrap();
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
