// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content-addressed storage boundary.
//!
//! Uploads go through the caller-supplied [`BlobStore`]; retrievals go
//! through [`GatewayFetcher`], which tries an ordered list of gateway base
//! URLs and falls through the list on any non-success response. An error
//! is raised only after every gateway has failed.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from content storage and retrieval.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The content URI could not be interpreted.
    #[error("invalid content URI `{0}`")]
    InvalidUri(String),

    /// Every configured gateway failed for this fetch.
    #[error("Failed to fetch {uri}: all {attempts} gateways failed; last error: {last_error}")]
    AllGatewaysFailed {
        uri: String,
        attempts: usize,
        last_error: String,
    },

    /// The blob store rejected an upload.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Upload-side storage collaborator.
///
/// Implementations address content by hash (IPFS-style pinning services,
/// local stores in tests) and return the URI the registry will reference.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name` and return its content URI.
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<String, GatewayError>;
}

/// Fetches content-addressed blobs through an ordered gateway list.
pub struct GatewayFetcher {
    gateways: Vec<String>,
    client: reqwest::Client,
}

impl GatewayFetcher {
    /// Create a fetcher over the given gateway base URLs.
    pub fn new(gateways: Vec<String>) -> Self {
        Self {
            gateways,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch `uri` (an `ipfs://hash` URI, a bare hash, or a plain HTTP
    /// URL), trying each configured gateway in order.
    pub async fn fetch(&self, uri: &str) -> Result<Vec<u8>, GatewayError> {
        // Plain HTTP(S) content is fetched as-is, without the gateway list.
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return self.fetch_one(uri).await.map_err(|e| {
                GatewayError::AllGatewaysFailed {
                    uri: uri.to_string(),
                    attempts: 1,
                    last_error: e,
                }
            });
        }

        let hash = content_hash(uri)?;
        if self.gateways.is_empty() {
            return Err(GatewayError::AllGatewaysFailed {
                uri: uri.to_string(),
                attempts: 0,
                last_error: "no gateways configured".to_string(),
            });
        }

        let mut last_error = String::new();
        for gateway in &self.gateways {
            let url = gateway_url(gateway, &hash);
            match self.fetch_one(&url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    tracing::debug!(gateway = %gateway, error = %e, "Gateway fetch failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(GatewayError::AllGatewaysFailed {
            uri: uri.to_string(),
            attempts: self.gateways.len(),
            last_error,
        })
    }

    async fn fetch_one(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| format!("body read failed: {}", e))
    }
}

/// Extract the content hash from `scheme://hash` or a bare hash.
fn content_hash(uri: &str) -> Result<String, GatewayError> {
    let hash = match uri.split_once("://") {
        Some((_, rest)) => rest,
        None => uri,
    };

    if hash.is_empty() {
        return Err(GatewayError::InvalidUri(uri.to_string()));
    }
    Ok(hash.trim_matches('/').to_string())
}

/// Join a gateway base URL and a content hash.
fn gateway_url(gateway: &str, hash: &str) -> String {
    format!("{}/{}", gateway.trim_end_matches('/'), hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hash_from_scheme_uris() {
        assert_eq!(content_hash("ipfs://bafy123").unwrap(), "bafy123");
        assert_eq!(content_hash("bafy123").unwrap(), "bafy123");
        assert_eq!(content_hash("ipfs://bafy123/").unwrap(), "bafy123");
    }

    #[test]
    fn rejects_empty_uris() {
        assert!(matches!(
            content_hash("ipfs://"),
            Err(GatewayError::InvalidUri(_))
        ));
        assert!(matches!(content_hash(""), Err(GatewayError::InvalidUri(_))));
    }

    #[test]
    fn joins_gateway_and_hash() {
        assert_eq!(
            gateway_url("https://ipfs.io/ipfs/", "bafy123"),
            "https://ipfs.io/ipfs/bafy123"
        );
        assert_eq!(
            gateway_url("https://ipfs.io/ipfs", "bafy123"),
            "https://ipfs.io/ipfs/bafy123"
        );
    }

    #[tokio::test]
    async fn no_gateways_fails_with_zero_attempts() {
        let fetcher = GatewayFetcher::new(Vec::new());
        let err = fetcher.fetch("ipfs://bafy123").await.unwrap_err();

        match err {
            GatewayError::AllGatewaysFailed { attempts, .. } => assert_eq!(attempts, 0),
            other => panic!("unexpected error: {}", other),
        }
    }
}
