// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password-based symmetric envelope for file payloads.
//!
//! The envelope derives a ChaCha20-Poly1305 key from the caller's secret
//! via HKDF-SHA256 with a random per-envelope salt. Decrypting with the
//! wrong secret fails the authentication tag and surfaces as
//! [`CryptoError::WrongKey`], never as silently corrupted plaintext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::CryptoError;

/// Domain-separation label for the envelope key schedule.
const ENVELOPE_KDF_INFO: &[u8] = b"relational-registry/envelope";

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// ChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Envelope cipher/KDF identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeFormat {
    /// HKDF-SHA256 key schedule + ChaCha20-Poly1305.
    ChaCha20Poly1305,
}

/// An encrypted payload with the metadata needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Cipher/KDF identifier.
    pub format: EnvelopeFormat,
    /// Per-envelope KDF salt.
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    /// AEAD nonce.
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext including the authentication tag.
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encrypt `data` under `secret`.
    pub fn encrypt(data: &[u8], secret: &str) -> Result<Self, CryptoError> {
        let mut salt = vec![0u8; SALT_LEN];
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut nonce);

        let key = super::hkdf_sha256(secret.as_bytes(), &salt, ENVELOPE_KDF_INFO)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(Self {
            format: EnvelopeFormat::ChaCha20Poly1305,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Encrypt string content under `secret`.
    pub fn encrypt_str(content: &str, secret: &str) -> Result<Self, CryptoError> {
        Self::encrypt(content.as_bytes(), secret)
    }

    /// Decrypt with `secret`. A mismatched secret fails the authentication
    /// tag and returns [`CryptoError::WrongKey`].
    pub fn decrypt(&self, secret: &str) -> Result<Vec<u8>, CryptoError> {
        if self.nonce.len() != NONCE_LEN {
            return Err(CryptoError::Decryption(format!(
                "invalid nonce length: expected {}, got {}",
                NONCE_LEN,
                self.nonce.len()
            )));
        }

        let key = super::hkdf_sha256(secret.as_bytes(), &self.salt, ENVELOPE_KDF_INFO)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;

        match self.format {
            EnvelopeFormat::ChaCha20Poly1305 => cipher
                .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_ref())
                .map_err(|_| CryptoError::WrongKey),
        }
    }

    /// Decrypt string content with `secret`.
    pub fn decrypt_to_string(&self, secret: &str) -> Result<String, CryptoError> {
        let bytes = self.decrypt(secret)?;
        String::from_utf8(bytes)
            .map_err(|e| CryptoError::Decryption(format!("payload is not valid UTF-8: {}", e)))
    }

    /// Serialize to JSON bytes for storage or upload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        serde_json::to_vec(self).map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::Encoding(e.to_string()))
    }
}

/// Hex (de)serialization for byte fields.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&alloy::hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        alloy::hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_bytes() {
        let data = b"raw payload with\nnewlines and bytes: \x00\x01\x02";
        let envelope = Envelope::encrypt(data, "0xsecret-signature").unwrap();

        assert_ne!(envelope.ciphertext, data.to_vec());
        let decrypted = envelope.decrypt("0xsecret-signature").unwrap();
        assert_eq!(decrypted, data);
    }

    #[test]
    fn roundtrip_string_content() {
        let envelope = Envelope::encrypt_str("{\"kind\":\"profile\"}", "secret").unwrap();
        let decrypted = envelope.decrypt_to_string("secret").unwrap();
        assert_eq!(decrypted, "{\"kind\":\"profile\"}");
    }

    #[test]
    fn wrong_secret_is_distinguishable() {
        let envelope = Envelope::encrypt(b"confidential", "right secret").unwrap();
        let err = envelope.decrypt("wrong secret").unwrap_err();
        assert!(matches!(err, CryptoError::WrongKey));
    }

    #[test]
    fn empty_payload_roundtrips() {
        let envelope = Envelope::encrypt(b"", "secret").unwrap();
        assert_eq!(envelope.decrypt("secret").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn serialization_roundtrip() {
        let envelope = Envelope::encrypt(b"payload", "secret").unwrap();
        let bytes = envelope.to_bytes().unwrap();

        // Ciphertext travels hex-encoded, never raw.
        let json = String::from_utf8(bytes.clone()).unwrap();
        assert!(json.contains(&alloy::hex::encode(&envelope.ciphertext)));

        let recovered = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(recovered, envelope);
        assert_eq!(recovered.decrypt("secret").unwrap(), b"payload");
    }

    #[test]
    fn salts_differ_between_envelopes() {
        let a = Envelope::encrypt(b"same", "secret").unwrap();
        let b = Envelope::encrypt(b"same", "secret").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn truncated_nonce_is_a_structural_error() {
        let mut envelope = Envelope::encrypt(b"payload", "secret").unwrap();
        envelope.nonce.truncate(4);
        let err = envelope.decrypt("secret").unwrap_err();
        assert!(matches!(err, CryptoError::Decryption(_)));
    }
}
