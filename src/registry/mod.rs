// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Data registry chain client.
//!
//! Wraps an alloy HTTP provider for the registry chain, exposing the
//! contract read surface the SDK needs (nonces, entry counts, entries)
//! and the wallet-filled provider used for direct write submission.

pub mod contracts;

use std::str::FromStr;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, TxHash, U256},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, ProviderBuilder, RootProvider,
    },
};
use async_trait::async_trait;

use crate::config::{SdkConfig, MULTICALL3_ADDRESS};

pub use contracts::{IDataRegistry, IMulticall3};

/// HTTP provider type for the registry chain (with all fillers).
pub type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Wallet-filled provider type used for direct write submission.
pub type SignerProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Errors that can occur during registry chain operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),
}

/// Read-path client for the data registry.
#[derive(Debug)]
pub struct RegistryClient {
    provider: HttpProvider,
    registry: Address,
    multicall: Address,
    explorer_url: String,
}

impl RegistryClient {
    /// Connect to the configured chain.
    pub fn new(config: &SdkConfig) -> Result<Self, RegistryError> {
        let url: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| RegistryError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        let registry = config
            .registry_address()
            .map_err(RegistryError::InvalidAddress)?;
        let multicall = Address::from_str(MULTICALL3_ADDRESS)
            .map_err(|e| RegistryError::InvalidAddress(e.to_string()))?;

        Ok(Self {
            provider,
            registry,
            multicall,
            explorer_url: config.chain.explorer_url.to_string(),
        })
    }

    /// The underlying provider.
    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    /// The registry contract address.
    pub fn registry_address(&self) -> Address {
        self.registry
    }

    /// The Multicall3 contract address.
    pub fn multicall_address(&self) -> Address {
        self.multicall
    }

    /// Block explorer URL for a transaction.
    pub fn tx_url(&self, hash: &TxHash) -> String {
        format!("{}/tx/{:#x}", self.explorer_url, hash)
    }

    /// Read the user's current authorization nonce from the contract.
    pub async fn nonce(&self, user: Address) -> Result<U256, RegistryError> {
        let contract = IDataRegistry::new(self.registry, self.provider.clone());
        contract
            .nonces(user)
            .call()
            .await
            .map_err(|e| RegistryError::Contract(format!("Failed to read nonce: {}", e)))
    }
}

/// Source of per-account authorization nonces.
///
/// The nonce is read immediately before building each message and never
/// cached across calls.
#[async_trait]
pub trait NonceSource: Send + Sync {
    /// The user's current on-chain nonce.
    async fn nonce(&self, user: Address) -> Result<U256, RegistryError>;
}

#[async_trait]
impl NonceSource for RegistryClient {
    async fn nonce(&self, user: Address) -> Result<U256, RegistryError> {
        RegistryClient::nonce(self, user).await
    }
}

/// Build a wallet-filled provider for direct write submission.
pub fn signer_provider(
    config: &SdkConfig,
    wallet: EthereumWallet,
) -> Result<SignerProvider, RegistryError> {
    let url: url::Url = config
        .rpc_url
        .parse()
        .map_err(|e: url::ParseError| RegistryError::InvalidRpcUrl(e.to_string()))?;

    Ok(ProviderBuilder::new().wallet(wallet).connect_http(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REGISTRY_TESTNET;

    #[test]
    fn client_rejects_malformed_rpc_url() {
        let config = SdkConfig::new(REGISTRY_TESTNET).with_rpc_url("not a url");
        let err = RegistryClient::new(&config).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRpcUrl(_)));
    }

    #[test]
    fn client_connects_and_formats_explorer_links() {
        let config = SdkConfig::new(REGISTRY_TESTNET);
        let client = RegistryClient::new(&config).unwrap();

        let hash = TxHash::repeat_byte(0x1f);
        let url = client.tx_url(&hash);
        assert!(url.starts_with(REGISTRY_TESTNET.explorer_url));
        assert!(url.contains("/tx/0x1f1f"));
    }
}
