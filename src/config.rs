// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SDK configuration: chain presets and per-instance settings.
//!
//! The SDK is configured at construction time with a [`SdkConfig`]. Known
//! registry chains ship as const presets ([`REGISTRY_MAINNET`],
//! [`REGISTRY_TESTNET`]); custom deployments build a [`ChainConfig`] by hand.

use std::str::FromStr;

use alloy::primitives::Address;

/// Data registry chain configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Chain name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Default RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
    /// Registry contract address on this chain
    pub registry_address: &'static str,
}

/// Relational data registry mainnet configuration.
pub const REGISTRY_MAINNET: ChainConfig = ChainConfig {
    name: "Relational Registry",
    chain_id: 7300,
    rpc_url: "https://rpc.registry.relational.network",
    explorer_url: "https://scan.registry.relational.network",
    registry_address: "0x92A2401D89BDDc0A80B3c1D2C0a4cB37f71B4D22",
};

/// Relational data registry testnet configuration.
pub const REGISTRY_TESTNET: ChainConfig = ChainConfig {
    name: "Relational Registry Testnet",
    chain_id: 7301,
    rpc_url: "https://rpc.testnet.registry.relational.network",
    explorer_url: "https://testnet.scan.relational.network",
    registry_address: "0x8C8788f98385F6ba1adD4234e4FD87B9f4e7A556",
};

/// Canonical Multicall3 deployment, present on all supported chains.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

/// EIP-712 domain name used by the registry contract.
pub const SIGNING_DOMAIN_NAME: &str = "DataRegistry";

/// EIP-712 domain version used by the registry contract.
pub const SIGNING_DOMAIN_VERSION: &str = "1";

/// Default public gateways for content-addressed fetches.
pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://gateway.relational.network/ipfs",
    "https://ipfs.io/ipfs",
    "https://cloudflare-ipfs.com/ipfs",
];

/// Which read path the state resolver should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadModePreference {
    /// Prefer the indexed query service, fall back to direct RPC reads.
    #[default]
    Auto,
    /// Use the indexed query service, with RPC fallback when it fails.
    Indexed,
    /// Skip the indexed service entirely and read from the contract.
    Rpc,
}

/// Per-instance SDK configuration.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Target chain.
    pub chain: ChainConfig,
    /// RPC endpoint override (defaults to the chain preset).
    pub rpc_url: String,
    /// Indexed query service endpoint, if one is deployed for this chain.
    pub query_endpoint: Option<String>,
    /// Ordered gateway base URLs for content-addressed fetches.
    pub gateways: Vec<String>,
    /// Read path preference for state resolution.
    pub read_mode: ReadModePreference,
}

impl SdkConfig {
    /// Create a configuration for the given chain with preset defaults.
    pub fn new(chain: ChainConfig) -> Self {
        Self {
            rpc_url: chain.rpc_url.to_string(),
            chain,
            query_endpoint: None,
            gateways: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            read_mode: ReadModePreference::default(),
        }
    }

    /// Override the RPC endpoint.
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    /// Configure an indexed query service endpoint.
    pub fn with_query_endpoint(mut self, url: impl Into<String>) -> Self {
        self.query_endpoint = Some(url.into());
        self
    }

    /// Replace the gateway list.
    pub fn with_gateways(mut self, gateways: Vec<String>) -> Self {
        self.gateways = gateways;
        self
    }

    /// Set the read path preference.
    pub fn with_read_mode(mut self, mode: ReadModePreference) -> Self {
        self.read_mode = mode;
        self
    }

    /// The registry contract address as a checked [`Address`].
    pub fn registry_address(&self) -> Result<Address, String> {
        Address::from_str(self.chain.registry_address)
            .map_err(|e| format!("Invalid registry address in chain config: {}", e))
    }
}
