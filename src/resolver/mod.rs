// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Dual-mode state resolution.
//!
//! Answers "what permissions / trusted servers does this user have" with
//! pagination. The resolver walks an explicit path: Indexed -> Direct ->
//! Resolved or Exhausted. A transport or schema failure on the indexed
//! path becomes a warning on the returned page, never an error; only both
//! paths failing raises an error, and that error names both causes.
//!
//! `used_mode` on the returned page always reflects the path that
//! actually produced it, regardless of which mode the caller prefers.
//!
//! Ordering is internally consistent per path (insertion order for
//! direct reads, provider recency order for indexed reads) but not
//! guaranteed identical across paths.

pub mod direct;
pub mod indexed;

use std::sync::Arc;

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::ReadModePreference;
use crate::models::{EntryResult, Page, Permission, ReadMode, TrustedServer};

pub use direct::{DirectError, DirectSource, MulticallReader};
pub use indexed::{GraphQlIndexedSource, IndexedError, IndexedSource};

/// Error when every read path has failed.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Neither the indexed service nor direct reads produced a page.
    #[error("all read paths failed: indexed path: {indexed}; direct path: {direct}")]
    Exhausted {
        /// Why the indexed path produced nothing.
        indexed: String,
        /// Why the direct path failed.
        direct: String,
    },
}

/// Dual-mode reader over indexed and direct sources.
pub struct StateResolver {
    indexed: Option<Arc<dyn IndexedSource>>,
    direct: Arc<dyn DirectSource>,
    preference: ReadModePreference,
}

impl StateResolver {
    /// Create a resolver. Without an indexed source every read uses the
    /// direct path.
    pub fn new(
        indexed: Option<Arc<dyn IndexedSource>>,
        direct: Arc<dyn DirectSource>,
        preference: ReadModePreference,
    ) -> Self {
        Self {
            indexed,
            direct,
            preference,
        }
    }

    /// List permissions granted by `user`, paginated.
    pub async fn permissions_for(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Permission>, ResolveError> {
        let mut warnings = Vec::new();

        let indexed_cause = match self.try_indexed_permissions(user).await {
            IndexedOutcome::Rows(rows) => {
                return Ok(paginate_indexed(rows, offset, limit).with_warnings(warnings));
            }
            IndexedOutcome::Unavailable(cause) => {
                if let Some(warning) = cause.warning() {
                    warnings.push(warning);
                }
                cause
            }
        };

        let total = match self.direct.permission_count(user).await {
            Ok(total) => total,
            Err(e) => return Err(exhausted(indexed_cause, e)),
        };

        let page_limit = page_span(offset, limit, total);
        let entries = if page_limit == 0 {
            Vec::new()
        } else {
            match self.direct.permission_page(user, offset, page_limit).await {
                Ok(entries) => entries,
                Err(e) => return Err(exhausted(indexed_cause, e)),
            }
        };

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                EntryResult::Ok(permission) => items.push(permission),
                EntryResult::Failed { reason } => {
                    tracing::warn!(user = %user, reason = %reason, "Degraded permission entry");
                    warnings.push(format!("degraded entry: {}", reason));
                    items.push(placeholder_permission());
                }
            }
        }

        Ok(Page::new(items, total, offset, limit, ReadMode::Rpc).with_warnings(warnings))
    }

    /// List servers trusted by `user`, paginated.
    pub async fn trusted_servers_for(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Page<TrustedServer>, ResolveError> {
        let mut warnings = Vec::new();

        let indexed_cause = match self.try_indexed_servers(user).await {
            IndexedOutcome::Rows(rows) => {
                return Ok(paginate_indexed(rows, offset, limit).with_warnings(warnings));
            }
            IndexedOutcome::Unavailable(cause) => {
                if let Some(warning) = cause.warning() {
                    warnings.push(warning);
                }
                cause
            }
        };

        let total = match self.direct.server_count(user).await {
            Ok(total) => total,
            Err(e) => return Err(exhausted(indexed_cause, e)),
        };

        let page_limit = page_span(offset, limit, total);
        let entries = if page_limit == 0 {
            Vec::new()
        } else {
            match self.direct.server_page(user, offset, page_limit).await {
                Ok(entries) => entries,
                Err(e) => return Err(exhausted(indexed_cause, e)),
            }
        };

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                EntryResult::Ok(server) => items.push(server),
                EntryResult::Failed { reason } => {
                    tracing::warn!(user = %user, reason = %reason, "Degraded server entry");
                    warnings.push(format!("degraded entry: {}", reason));
                    items.push(placeholder_server());
                }
            }
        }

        Ok(Page::new(items, total, offset, limit, ReadMode::Rpc).with_warnings(warnings))
    }

    async fn try_indexed_permissions(&self, user: Address) -> IndexedOutcome<Permission> {
        match self.indexed_source() {
            Ok(source) => match source.permissions_for(user).await {
                Ok(rows) => IndexedOutcome::Rows(rows),
                Err(e) => {
                    tracing::warn!(error = %e, "Indexed query failed, falling back to direct reads");
                    IndexedOutcome::Unavailable(IndexedCause::Failed(e.to_string()))
                }
            },
            Err(cause) => IndexedOutcome::Unavailable(cause),
        }
    }

    async fn try_indexed_servers(&self, user: Address) -> IndexedOutcome<TrustedServer> {
        match self.indexed_source() {
            Ok(source) => match source.trusted_servers_for(user).await {
                Ok(rows) => IndexedOutcome::Rows(rows),
                Err(e) => {
                    tracing::warn!(error = %e, "Indexed query failed, falling back to direct reads");
                    IndexedOutcome::Unavailable(IndexedCause::Failed(e.to_string()))
                }
            },
            Err(cause) => IndexedOutcome::Unavailable(cause),
        }
    }

    fn indexed_source(&self) -> Result<&Arc<dyn IndexedSource>, IndexedCause> {
        if self.preference == ReadModePreference::Rpc {
            return Err(IndexedCause::SkippedByPreference);
        }
        self.indexed.as_ref().ok_or(IndexedCause::NotConfigured)
    }
}

/// Outcome of the indexed step of the state machine.
enum IndexedOutcome<T> {
    Rows(Vec<T>),
    Unavailable(IndexedCause),
}

/// Why the indexed step produced no rows.
enum IndexedCause {
    SkippedByPreference,
    NotConfigured,
    Failed(String),
}

impl IndexedCause {
    /// Warning to attach to a fallback-assembled page, if any.
    fn warning(&self) -> Option<String> {
        match self {
            IndexedCause::SkippedByPreference => None,
            IndexedCause::NotConfigured => None,
            IndexedCause::Failed(e) => Some(format!("indexed query failed: {}", e)),
        }
    }

    fn describe(&self) -> String {
        match self {
            IndexedCause::SkippedByPreference => "skipped by read mode preference".to_string(),
            IndexedCause::NotConfigured => "no indexed query service configured".to_string(),
            IndexedCause::Failed(e) => e.clone(),
        }
    }
}

fn exhausted(indexed: IndexedCause, direct: DirectError) -> ResolveError {
    ResolveError::Exhausted {
        indexed: indexed.describe(),
        direct: direct.to_string(),
    }
}

/// Entries to request for the direct page `[offset, offset+limit)` given
/// the on-chain total.
fn page_span(offset: u64, limit: u64, total: u64) -> u64 {
    total.saturating_sub(offset).min(limit)
}

/// Slice the indexed full set down to the requested page.
fn paginate_indexed<T>(rows: Vec<T>, offset: u64, limit: u64) -> Page<T> {
    let total = rows.len() as u64;
    let items: Vec<T> = rows
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    Page::new(items, total, offset, limit, ReadMode::Indexed)
}

fn placeholder_permission() -> Permission {
    Permission {
        id: alloy::primitives::U256::ZERO,
        grantor: Address::ZERO,
        grantee: Address::ZERO,
        grant: String::new(),
        nonce: alloy::primitives::U256::ZERO,
        operation: String::new(),
        file_ids: Vec::new(),
        parameters: String::new(),
        start_block: 0,
        end_block: 0,
        active: false,
    }
}

fn placeholder_server() -> TrustedServer {
    TrustedServer {
        server_id: Address::ZERO,
        url: String::new(),
        owner: Address::ZERO,
        public_key: String::new(),
        trusted_at: 0,
    }
}
