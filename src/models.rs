// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Registry Data Models
//!
//! Core entities of the data registry and the shapes the SDK returns to
//! callers. All types derive `Serialize` and `Deserialize` for JSON
//! handling where they cross a process boundary.
//!
//! ## Model Categories
//!
//! - **Permissions**: on-chain access grants and the off-chain grant document
//! - **Trusted servers**: addresses a user has pre-approved for delegation
//! - **Schemas / refiners**: optional structural validation references
//! - **Pages**: the normalized result shape of paginated state reads

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

// =============================================================================
// Permissions
// =============================================================================

/// An on-chain access permission.
///
/// Created by signing and submitting a grant; deactivated by a revoke that
/// targets the permission `id`. The `nonce` is per-grantor and monotonically
/// increasing; it protects the signed grant against replay, while `id` is
/// the entity's identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    /// On-chain permission identifier.
    pub id: U256,
    /// Account that granted the permission.
    pub grantor: Address,
    /// Account the permission was granted to.
    pub grantee: Address,
    /// URI of the off-chain grant document.
    pub grant: String,
    /// Grantor nonce the grant was signed with.
    pub nonce: U256,
    /// Operation the grantee is authorized to perform.
    pub operation: String,
    /// Files covered by this permission.
    pub file_ids: Vec<U256>,
    /// Operation parameters, as an opaque string.
    pub parameters: String,
    /// First block at which the permission is valid.
    pub start_block: u64,
    /// Last block at which the permission is valid (0 = unbounded).
    pub end_block: u64,
    /// Whether the permission is currently active.
    pub active: bool,
}

/// Off-chain grant document referenced by a permission's `grant` URI.
///
/// The signed on-chain message never embeds this document; it carries only
/// the content-addressed URI, which pins the document's integrity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantDocument {
    /// Account the grant is addressed to.
    pub grantee: String,
    /// Operation being authorized.
    pub operation: String,
    /// Operation parameters, as an opaque string.
    pub parameters: String,
    /// File URLs the grant covers.
    pub files: Vec<String>,
    /// Optional expiry, RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<chrono::DateTime<chrono::Utc>>,
}

/// One recipient's wrapped decryption key for a file.
///
/// The `key` field holds the asymmetric-wrapped file key; plaintext key
/// material never appears here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilePermissionEntry {
    /// Recipient account.
    pub account: Address,
    /// Wrapped file key, hex-encoded.
    pub key: String,
}

// =============================================================================
// Trusted Servers
// =============================================================================

/// A server address a user has pre-approved for delegated decryption access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustedServer {
    /// Server identity (an address).
    pub server_id: Address,
    /// Server endpoint URL.
    pub url: String,
    /// Account that operates the server.
    pub owner: Address,
    /// Server public key for key wrapping, hex-encoded.
    pub public_key: String,
    /// Unix timestamp at which the trust edge was recorded.
    pub trusted_at: u64,
}

// =============================================================================
// Schemas and Refiners
// =============================================================================

/// A structural-validation schema referenced by file registrations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaRef {
    /// On-chain schema identifier.
    pub id: U256,
    /// Human-readable schema name.
    pub name: String,
    /// URL of the schema definition document.
    pub definition_url: String,
}

/// A refiner that post-processes registered files against a schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefinerRef {
    /// On-chain refiner identifier.
    pub id: U256,
    /// Data liquidity pool the refiner belongs to.
    pub dlp_id: U256,
    /// Schema the refiner validates against.
    pub schema_id: U256,
    /// URL of the refinement instruction document.
    pub instruction_url: String,
    /// Account that registered the refiner.
    pub owner: Address,
}

// =============================================================================
// Paginated Read Results
// =============================================================================

/// Which read path actually produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// The indexed query service.
    Indexed,
    /// Direct contract reads over RPC.
    Rpc,
}

/// One page of a paginated state read, normalized across read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Entries in this page, in path-consistent order.
    pub items: Vec<T>,
    /// Total number of entries for the queried user.
    pub total: u64,
    /// Requested offset.
    pub offset: u64,
    /// Requested limit.
    pub limit: u64,
    /// Whether entries exist beyond this page.
    pub has_more: bool,
    /// The read path that produced this page.
    pub used_mode: ReadMode,
    /// Degradations encountered while assembling the page.
    pub warnings: Vec<String>,
}

impl<T> Page<T> {
    /// Assemble a page, deriving `has_more` from offset, limit, and total.
    pub fn new(items: Vec<T>, total: u64, offset: u64, limit: u64, used_mode: ReadMode) -> Self {
        Self {
            items,
            total,
            offset,
            limit,
            has_more: offset + limit < total,
            used_mode,
            warnings: Vec::new(),
        }
    }

    /// Attach warnings collected while assembling the page.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Per-entry outcome of a batched read.
///
/// Detail reads inside a page are failure-isolated: a single bad entry
/// degrades to `Failed` instead of aborting the page. Downstream code must
/// handle both arms explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryResult<T> {
    /// The entry was read successfully.
    Ok(T),
    /// The read for this entry failed; the page continues without it.
    Failed {
        /// Why the entry could not be read.
        reason: String,
    },
}

impl<T> EntryResult<T> {
    /// Whether this entry was read successfully.
    pub fn is_ok(&self) -> bool {
        matches!(self, EntryResult::Ok(_))
    }
}
