// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Registry SDK - Scoped Access Grants on the Data Registry
//!
//! This crate is the client-side engine for granting, revoking, and
//! delegating scoped access to encrypted files registered on the data
//! registry chain. Callers never manage RPC plumbing or pay gas directly:
//! writes go through caller-supplied relay callbacks with a direct
//! transaction fallback, and reads prefer an indexed query service with a
//! transparent fallback to batched contract reads.
//!
//! ## Modules
//!
//! - `authorization` - EIP-712 message construction and signing
//! - `config` - chain presets and SDK configuration
//! - `crypto` - key derivation, envelope encryption, key wrapping
//! - `gateway` - content-addressed storage boundary
//! - `registry` - registry chain client and contract bindings
//! - `resolver` - dual-mode (indexed/RPC) state reads
//! - `retry` / `notify` - resilience primitives
//! - `submission` - relay/direct submission routing
//! - `upload` - encrypted upload orchestration
//! - `wallet` - wallet signing abstraction

pub mod authorization;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod submission;
pub mod upload;
pub mod wallet;

pub use config::{ChainConfig, ReadModePreference, SdkConfig, REGISTRY_MAINNET, REGISTRY_TESTNET};
pub use error::SdkError;
pub use models::{Page, Permission, ReadMode, TrustedServer};
