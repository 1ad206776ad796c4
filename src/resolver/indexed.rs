// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Indexed query source.
//!
//! Queries an event-indexing service over HTTP POST with a GraphQL body.
//! The index is eventually consistent and faster than direct contract
//! reads; it returns the user's full permission/trust edge set sorted by
//! recency, which the resolver paginates in memory.

use std::str::FromStr;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Permission, TrustedServer};

/// Errors from the indexed query path.
#[derive(Debug, Error)]
pub enum IndexedError {
    /// HTTP-level failure.
    #[error("query transport error: {0}")]
    Transport(String),

    /// The service answered with an unexpected shape.
    #[error("query response schema error: {0}")]
    Schema(String),
}

/// Source of indexed permission/trust edges for a user.
#[async_trait]
pub trait IndexedSource: Send + Sync {
    /// All permissions granted by `user`, most recent first.
    async fn permissions_for(&self, user: Address) -> Result<Vec<Permission>, IndexedError>;

    /// All servers trusted by `user`, most recent first.
    async fn trusted_servers_for(&self, user: Address) -> Result<Vec<TrustedServer>, IndexedError>;
}

const PERMISSIONS_QUERY: &str = "\
query UserPermissions($user: String!) {
  permissions(where: { grantor: $user }, orderBy: addedAtTimestamp, orderDirection: desc) {
    id
    grant
    nonce
    addedAtBlock
    addedAtTimestamp
    transactionHash
  }
}";

const TRUSTED_SERVERS_QUERY: &str = "\
query UserTrustedServers($user: String!) {
  serverTrusts(where: { user: $user }, orderBy: trustedAt, orderDirection: desc) {
    id
    serverUrl
    trustedAt
    addedAtBlock
    transactionHash
  }
}";

/// GraphQL-over-HTTP implementation of [`IndexedSource`].
pub struct GraphQlIndexedSource {
    endpoint: String,
    client: reqwest::Client,
}

impl GraphQlIndexedSource {
    /// Create a source for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post(
        &self,
        query: &'static str,
        user: Address,
    ) -> Result<serde_json::Value, IndexedError> {
        let body = serde_json::json!({
            "query": query,
            "variables": { "user": format!("{:#x}", user) },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexedError::Transport(format!("Query request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(IndexedError::Transport(format!(
                "Query service returned status {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| IndexedError::Schema(format!("Invalid JSON response: {}", e)))?;

        if let Some(errors) = payload.get("errors") {
            return Err(IndexedError::Schema(format!(
                "Query service reported errors: {}",
                errors
            )));
        }

        payload
            .get("data")
            .cloned()
            .ok_or_else(|| IndexedError::Schema("response has no data field".to_string()))
    }
}

#[async_trait]
impl IndexedSource for GraphQlIndexedSource {
    async fn permissions_for(&self, user: Address) -> Result<Vec<Permission>, IndexedError> {
        let data = self.post(PERMISSIONS_QUERY, user).await?;
        parse_permission_rows(&data, user)
    }

    async fn trusted_servers_for(&self, user: Address) -> Result<Vec<TrustedServer>, IndexedError> {
        let data = self.post(TRUSTED_SERVERS_QUERY, user).await?;
        parse_server_rows(&data, user)
    }
}

// =============================================================================
// Row Parsing
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionRow {
    id: String,
    grant: String,
    nonce: String,
    // addedAtTimestamp and transactionHash are requested for ordering and
    // audit display but not carried into the normalized item.
    #[serde(default)]
    added_at_block: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerRow {
    id: String,
    server_url: String,
    trusted_at: String,
}

/// The index stores permission edges without the full on-chain record;
/// absent fields default so both read paths share one item type.
pub(crate) fn parse_permission_rows(
    data: &serde_json::Value,
    user: Address,
) -> Result<Vec<Permission>, IndexedError> {
    let rows: Vec<PermissionRow> = serde_json::from_value(
        data.get("permissions")
            .cloned()
            .ok_or_else(|| IndexedError::Schema("response has no permissions field".to_string()))?,
    )
    .map_err(|e| IndexedError::Schema(format!("malformed permission rows: {}", e)))?;

    rows.into_iter()
        .map(|row| {
            Ok(Permission {
                id: parse_u256("permission id", &row.id)?,
                grantor: user,
                grantee: Address::ZERO,
                grant: row.grant,
                nonce: parse_u256("permission nonce", &row.nonce)?,
                operation: String::new(),
                file_ids: Vec::new(),
                parameters: String::new(),
                start_block: row
                    .added_at_block
                    .as_deref()
                    .and_then(|b| b.parse().ok())
                    .unwrap_or(0),
                end_block: 0,
                active: true,
            })
        })
        .collect()
}

pub(crate) fn parse_server_rows(
    data: &serde_json::Value,
    _user: Address,
) -> Result<Vec<TrustedServer>, IndexedError> {
    let rows: Vec<ServerRow> = serde_json::from_value(
        data.get("serverTrusts")
            .cloned()
            .ok_or_else(|| IndexedError::Schema("response has no serverTrusts field".to_string()))?,
    )
    .map_err(|e| IndexedError::Schema(format!("malformed server rows: {}", e)))?;

    rows.into_iter()
        .map(|row| {
            Ok(TrustedServer {
                server_id: Address::from_str(&row.id).map_err(|e| {
                    IndexedError::Schema(format!("invalid server id `{}`: {}", row.id, e))
                })?,
                url: row.server_url,
                owner: Address::ZERO,
                public_key: String::new(),
                trusted_at: row.trusted_at.parse().unwrap_or(0),
            })
        })
        .collect()
}

fn parse_u256(field: &str, value: &str) -> Result<U256, IndexedError> {
    U256::from_str(value)
        .map_err(|e| IndexedError::Schema(format!("invalid {} `{}`: {}", field, value, e)))
}
