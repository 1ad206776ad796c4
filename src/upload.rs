// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted upload orchestration.
//!
//! Sequences the full "share an encrypted file" flow: derive the user
//! key, encrypt the payload, store the blob, wrap the file key for each
//! recipient, and submit the registration with its permission entries.

use std::sync::Arc;

use alloy::primitives::{Address, U256};

use crate::authorization::{AuthorizationSigner, ServerFileRegistration};
use crate::crypto::{derive_user_key, keywrap, CryptoError, Envelope, USER_KEY_SEED};
use crate::error::SdkError;
use crate::gateway::BlobStore;
use crate::models::{FilePermissionEntry, GrantDocument};
use crate::submission::{FileRegistration, SubmissionReceipt, SubmissionRouter};
use crate::wallet::WalletSigner;

/// A recipient allowed to decrypt an uploaded file.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Recipient account.
    pub account: Address,
    /// Recipient key-wrapping public key, hex-encoded.
    pub public_key: String,
}

/// A server receiving files through the batched registration path.
#[derive(Debug, Clone)]
pub struct ServerTarget {
    /// Server identity address.
    pub id: Address,
    /// Server endpoint URL.
    pub url: String,
    /// Server key-wrapping public key, hex-encoded.
    pub public_key: String,
}

/// Result of an encrypted upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Content URI of the stored encrypted blob.
    pub url: String,
    /// The registered file's on-chain id.
    pub file_id: U256,
    /// Transaction identifier.
    pub transaction: String,
}

/// Orchestrates encrypted uploads end to end.
pub struct EncryptedUploader {
    wallet: Arc<dyn WalletSigner>,
    store: Arc<dyn BlobStore>,
    signer: AuthorizationSigner,
    router: Arc<SubmissionRouter>,
}

impl EncryptedUploader {
    /// Assemble an uploader from its collaborators.
    pub fn new(
        wallet: Arc<dyn WalletSigner>,
        store: Arc<dyn BlobStore>,
        signer: AuthorizationSigner,
        router: Arc<SubmissionRouter>,
    ) -> Self {
        Self {
            wallet,
            store,
            signer,
            router,
        }
    }

    /// Encrypt `data`, store it, and register it with per-recipient
    /// wrapped keys.
    pub async fn upload_with_permissions(
        &self,
        name: &str,
        data: &[u8],
        recipients: &[Recipient],
    ) -> Result<UploadOutcome, SdkError> {
        let owner = self.wallet.address().map_err(SdkError::from)?;
        let key = derive_user_key(self.wallet.as_ref(), USER_KEY_SEED).await?;

        let envelope = Envelope::encrypt(data, key.as_str())?;
        let url = self.store.store(name, envelope.to_bytes()?).await?;

        let entries = wrap_for_recipients(key.as_str(), recipients)?;

        let FileRegistration {
            file_id,
            transaction,
        } = self
            .router
            .add_file_with_permissions(url.clone(), owner, entries)
            .await?;

        tracing::info!(%url, %file_id, "Encrypted file registered");
        Ok(UploadOutcome {
            url,
            file_id,
            transaction,
        })
    }

    /// Encrypt `data`, store it, and submit a signed server registration
    /// carrying the file, its schema, and the server's wrapped key.
    pub async fn upload_to_server(
        &self,
        name: &str,
        data: &[u8],
        schema_id: U256,
        server: &ServerTarget,
    ) -> Result<(String, SubmissionReceipt), SdkError> {
        let key = derive_user_key(self.wallet.as_ref(), USER_KEY_SEED).await?;

        let envelope = Envelope::encrypt(data, key.as_str())?;
        let url = self.store.store(name, envelope.to_bytes()?).await?;

        let entry = FilePermissionEntry {
            account: server.id,
            key: keywrap::wrap_key_for(key.as_str(), &server.public_key)?.encode(),
        };

        let authorization = self
            .signer
            .register_server_files(ServerFileRegistration {
                file_urls: vec![url.clone()],
                schema_ids: vec![schema_id],
                file_permissions: vec![vec![entry]],
                server_id: server.id,
                server_url: server.url.clone(),
                server_public_key: server.public_key.clone(),
            })
            .await?;

        let receipt = self.router.submit(&authorization).await?;
        Ok((url, receipt))
    }

    /// Store a grant document and sign + submit a permission grant
    /// referencing it by URI.
    pub async fn grant_with_document(
        &self,
        grantee: Address,
        document: &GrantDocument,
    ) -> Result<SubmissionReceipt, SdkError> {
        let bytes = serde_json::to_vec(document)
            .map_err(|e| SdkError::Validation(format!("grant document not serializable: {}", e)))?;
        let uri = self.store.store("grant.json", bytes).await?;

        let authorization = self.signer.grant_permission(grantee, &uri).await?;
        self.router.submit(&authorization).await.map_err(Into::into)
    }
}

fn wrap_for_recipients(
    file_key: &str,
    recipients: &[Recipient],
) -> Result<Vec<FilePermissionEntry>, SdkError> {
    recipients
        .iter()
        .map(|recipient| {
            let wrapped =
                keywrap::wrap_key_for(file_key, &recipient.public_key).map_err(|e| match e {
                    CryptoError::InvalidKey(msg) => SdkError::Validation(format!(
                        "recipient {} has an invalid public key: {}",
                        recipient.account, msg
                    )),
                    other => SdkError::from(other),
                })?;
            Ok(FilePermissionEntry {
                account: recipient.account,
                key: wrapped.encode(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{signing_domain, AuthorizationPayload};
    use crate::config::REGISTRY_TESTNET;
    use crate::crypto::keywrap::{generate_keypair, unwrap_key_with, WrappedKey};
    use crate::gateway::GatewayError;
    use crate::registry::{NonceSource, RegistryError};
    use crate::submission::{DirectWriter, RelayCallbacks, SubmissionError, SubmissionMode};
    use crate::wallet::LocalWallet;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedNonce;

    #[async_trait]
    impl NonceSource for FixedNonce {
        async fn nonce(&self, _user: Address) -> Result<U256, RegistryError> {
            Ok(U256::from(1))
        }
    }

    /// Blob store keeping uploads in memory.
    #[derive(Default)]
    struct MemoryStore {
        blobs: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl BlobStore for MemoryStore {
        async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<String, GatewayError> {
            let mut blobs = self.blobs.lock().unwrap();
            let uri = format!("ipfs://blob{}", blobs.len());
            blobs.push((name.to_string(), bytes));
            Ok(uri)
        }
    }

    /// Direct writer recording file registrations.
    #[derive(Default)]
    struct RecordingWriter {
        files: Mutex<Vec<(String, Address, Vec<FilePermissionEntry>)>>,
        payloads: Mutex<Vec<AuthorizationPayload>>,
    }

    #[async_trait]
    impl DirectWriter for RecordingWriter {
        async fn submit_authorization(
            &self,
            payload: &AuthorizationPayload,
        ) -> Result<crate::submission::SubmissionReceipt, SubmissionError> {
            self.payloads.lock().unwrap().push(payload.clone());
            Ok(crate::submission::SubmissionReceipt {
                transaction: "0xdirect".to_string(),
                mode: SubmissionMode::Direct,
                ids: vec![U256::from(5)],
            })
        }

        async fn add_file_with_permissions(
            &self,
            url: String,
            owner: Address,
            permissions: Vec<FilePermissionEntry>,
        ) -> Result<FileRegistration, SubmissionError> {
            self.files.lock().unwrap().push((url, owner, permissions));
            Ok(FileRegistration {
                file_id: U256::from(42),
                transaction: "0xdirect".to_string(),
            })
        }
    }

    fn uploader(
        wallet: Arc<LocalWallet>,
        store: Arc<MemoryStore>,
        writer: Arc<RecordingWriter>,
    ) -> EncryptedUploader {
        let signer = AuthorizationSigner::new(
            Arc::clone(&wallet) as Arc<dyn WalletSigner>,
            Arc::new(FixedNonce),
            signing_domain(&REGISTRY_TESTNET, Address::repeat_byte(0x11)),
        );
        let router = Arc::new(SubmissionRouter::new(RelayCallbacks::default(), writer));
        EncryptedUploader::new(wallet, store, signer, router)
    }

    #[tokio::test]
    async fn upload_stores_ciphertext_and_wraps_key_per_recipient() {
        let wallet = Arc::new(LocalWallet::random());
        let store = Arc::new(MemoryStore::default());
        let writer = Arc::new(RecordingWriter::default());

        let (recipient_secret, recipient_public) = generate_keypair();
        let recipients = vec![Recipient {
            account: Address::repeat_byte(0x33),
            public_key: recipient_public,
        }];

        let outcome = uploader(Arc::clone(&wallet), Arc::clone(&store), Arc::clone(&writer))
            .upload_with_permissions("profile.json", b"sensitive payload", &recipients)
            .await
            .unwrap();

        assert_eq!(outcome.file_id, U256::from(42));

        // The stored blob is an envelope, not the plaintext, and the
        // owner can decrypt it with the re-derived key.
        let blobs = store.blobs.lock().unwrap();
        let (_, stored) = &blobs[0];
        assert_ne!(stored.as_slice(), b"sensitive payload".as_slice());

        let envelope = Envelope::from_bytes(stored).unwrap();
        let user_key = derive_user_key(wallet.as_ref(), USER_KEY_SEED).await.unwrap();
        assert_eq!(
            envelope.decrypt(user_key.as_str()).unwrap(),
            b"sensitive payload"
        );

        // The recipient can unwrap the file key with their private key.
        let files = writer.files.lock().unwrap();
        let (_, _, entries) = &files[0];
        assert_eq!(entries.len(), 1);
        let wrapped = WrappedKey::decode(&entries[0].key).unwrap();
        assert_eq!(
            unwrap_key_with(&wrapped, &recipient_secret).unwrap(),
            user_key.as_str()
        );
    }

    #[tokio::test]
    async fn invalid_recipient_key_aborts_before_submission() {
        let wallet = Arc::new(LocalWallet::random());
        let store = Arc::new(MemoryStore::default());
        let writer = Arc::new(RecordingWriter::default());

        let recipients = vec![Recipient {
            account: Address::repeat_byte(0x33),
            public_key: "0x1234".to_string(),
        }];

        let err = uploader(Arc::clone(&wallet), store, Arc::clone(&writer))
            .upload_with_permissions("profile.json", b"payload", &recipients)
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Validation(_)));
        assert!(writer.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_upload_signs_a_batched_registration() {
        let wallet = Arc::new(LocalWallet::random());
        let store = Arc::new(MemoryStore::default());
        let writer = Arc::new(RecordingWriter::default());

        let (_, server_public) = generate_keypair();
        let server = ServerTarget {
            id: Address::repeat_byte(0x44),
            url: "https://server.example".to_string(),
            public_key: server_public,
        };

        let (url, receipt) = uploader(Arc::clone(&wallet), store, Arc::clone(&writer))
            .upload_to_server("data.bin", b"payload", U256::from(3), &server)
            .await
            .unwrap();

        assert_eq!(receipt.mode, SubmissionMode::Direct);

        let payloads = writer.payloads.lock().unwrap();
        match &payloads[0] {
            AuthorizationPayload::ServerFiles(m) => {
                assert_eq!(m.fileUrls, vec![url]);
                assert_eq!(m.schemaIds, vec![U256::from(3)]);
                assert_eq!(m.filePermissions[0][0].account, Address::repeat_byte(0x44));
            }
            other => panic!("expected server files payload, got {:?}", other.kind()),
        }
    }

    #[tokio::test]
    async fn grant_document_travels_by_uri() {
        let wallet = Arc::new(LocalWallet::random());
        let store = Arc::new(MemoryStore::default());
        let writer = Arc::new(RecordingWriter::default());

        let document = GrantDocument {
            grantee: format!("{:#x}", Address::repeat_byte(0x22)),
            operation: "llm_inference".to_string(),
            parameters: String::new(),
            files: vec!["ipfs://bafyfile".to_string()],
            expires: None,
        };

        let receipt = uploader(Arc::clone(&wallet), Arc::clone(&store), Arc::clone(&writer))
            .grant_with_document(Address::repeat_byte(0x22), &document)
            .await
            .unwrap();

        assert_eq!(receipt.mode, SubmissionMode::Direct);

        // The signed message carries the URI, not the document.
        let payloads = writer.payloads.lock().unwrap();
        match &payloads[0] {
            AuthorizationPayload::Grant(m) => {
                assert!(m.grant.starts_with("ipfs://"));
                assert!(!m.grant.contains("llm_inference"));
            }
            other => panic!("expected grant payload, got {:?}", other.kind()),
        }

        // The document itself lives in the blob store.
        let blobs = store.blobs.lock().unwrap();
        let (_, stored) = &blobs[0];
        let parsed: GrantDocument = serde_json::from_slice(stored).unwrap();
        assert_eq!(parsed, document);
    }
}
