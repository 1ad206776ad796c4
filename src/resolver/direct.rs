// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Direct contract read source.
//!
//! Reads entry counts and page entries straight from the registry
//! contract. Per-index id reads and per-entry detail reads are bundled
//! through Multicall3 so a page costs a constant number of round trips.
//! Detail reads run with `allowFailure`, so one deleted or corrupt entry
//! degrades to a tagged failure instead of aborting the page.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EntryResult, Permission, TrustedServer};
use crate::registry::{HttpProvider, IDataRegistry, IMulticall3, RegistryClient};

/// Errors from the direct read path.
#[derive(Debug, Error)]
pub enum DirectError {
    /// Transport-level RPC failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// A contract call that must not fail did fail.
    #[error("Contract error: {0}")]
    Contract(String),
}

/// Source of authoritative contract-state pages for a user.
#[async_trait]
pub trait DirectSource: Send + Sync {
    /// Number of permissions granted by `user`.
    async fn permission_count(&self, user: Address) -> Result<u64, DirectError>;

    /// Permission entries `[offset, offset+limit)` in insertion order.
    async fn permission_page(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EntryResult<Permission>>, DirectError>;

    /// Number of servers trusted by `user`.
    async fn server_count(&self, user: Address) -> Result<u64, DirectError>;

    /// Trust-set entries `[offset, offset+limit)` in insertion order.
    async fn server_page(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EntryResult<TrustedServer>>, DirectError>;
}

/// Multicall-batched [`DirectSource`] over the registry contract.
pub struct MulticallReader {
    provider: HttpProvider,
    registry: Address,
    multicall: Address,
}

impl MulticallReader {
    /// Create a reader sharing the client's provider.
    pub fn new(client: &RegistryClient) -> Self {
        Self {
            provider: client.provider().clone(),
            registry: client.registry_address(),
            multicall: client.multicall_address(),
        }
    }

    fn registry_contract(&self) -> IDataRegistry::IDataRegistryInstance<HttpProvider> {
        IDataRegistry::new(self.registry, self.provider.clone())
    }

    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>, DirectError> {
        let multicall = IMulticall3::new(self.multicall, self.provider.clone());
        multicall
            .aggregate3(calls)
            .call()
            .await
            .map_err(|e| DirectError::Rpc(format!("Multicall failed: {}", e)))
    }

    /// Read the permission ids at `[offset, offset+limit)` in one batch.
    async fn permission_ids(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<U256>, DirectError> {
        let calls = (offset..offset + limit)
            .map(|index| IMulticall3::Call3 {
                target: self.registry,
                allowFailure: false,
                callData: IDataRegistry::userPermissionIdsAtCall {
                    user,
                    index: U256::from(index),
                }
                .abi_encode()
                .into(),
            })
            .collect();

        let results = self.aggregate(calls).await?;
        results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                if !result.success {
                    return Err(DirectError::Contract(format!(
                        "permission id read at index {} failed",
                        offset + i as u64
                    )));
                }
                IDataRegistry::userPermissionIdsAtCall::abi_decode_returns(&result.returnData)
                    .map_err(|e| {
                        DirectError::Contract(format!(
                            "Failed to decode permission id at index {}: {}",
                            offset + i as u64,
                            e
                        ))
                    })
            })
            .collect()
    }

    /// Read the trusted server ids at `[offset, offset+limit)` in one batch.
    async fn server_ids(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Address>, DirectError> {
        let calls = (offset..offset + limit)
            .map(|index| IMulticall3::Call3 {
                target: self.registry,
                allowFailure: false,
                callData: IDataRegistry::userServerIdsAtCall {
                    user,
                    index: U256::from(index),
                }
                .abi_encode()
                .into(),
            })
            .collect();

        let results = self.aggregate(calls).await?;
        results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                if !result.success {
                    return Err(DirectError::Contract(format!(
                        "server id read at index {} failed",
                        offset + i as u64
                    )));
                }
                IDataRegistry::userServerIdsAtCall::abi_decode_returns(&result.returnData).map_err(
                    |e| {
                        DirectError::Contract(format!(
                            "Failed to decode server id at index {}: {}",
                            offset + i as u64,
                            e
                        ))
                    },
                )
            })
            .collect()
    }
}

#[async_trait]
impl DirectSource for MulticallReader {
    async fn permission_count(&self, user: Address) -> Result<u64, DirectError> {
        let count = self
            .registry_contract()
            .userPermissionIdsLength(user)
            .call()
            .await
            .map_err(|e| DirectError::Contract(format!("Failed to read permission count: {}", e)))?;
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn permission_page(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EntryResult<Permission>>, DirectError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let ids = self.permission_ids(user, offset, limit).await?;

        // Detail reads tolerate per-entry failure.
        let calls = ids
            .iter()
            .map(|id| IMulticall3::Call3 {
                target: self.registry,
                allowFailure: true,
                callData: IDataRegistry::permissionsCall { id: *id }.abi_encode().into(),
            })
            .collect();
        let results = self.aggregate(calls).await?;

        Ok(ids
            .iter()
            .zip(results.iter())
            .map(|(id, result)| {
                if !result.success || result.returnData.is_empty() {
                    return EntryResult::Failed {
                        reason: format!("permission {} read failed", id),
                    };
                }
                match IDataRegistry::permissionsCall::abi_decode_returns(&result.returnData) {
                    Ok(info) => EntryResult::Ok(to_permission(info)),
                    Err(e) => EntryResult::Failed {
                        reason: format!("permission {} decode failed: {}", id, e),
                    },
                }
            })
            .collect())
    }

    async fn server_count(&self, user: Address) -> Result<u64, DirectError> {
        let count = self
            .registry_contract()
            .userServerIdsLength(user)
            .call()
            .await
            .map_err(|e| DirectError::Contract(format!("Failed to read server count: {}", e)))?;
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn server_page(
        &self,
        user: Address,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EntryResult<TrustedServer>>, DirectError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let ids = self.server_ids(user, offset, limit).await?;

        let calls = ids
            .iter()
            .map(|id| IMulticall3::Call3 {
                target: self.registry,
                allowFailure: true,
                callData: IDataRegistry::serversCall { id: *id }.abi_encode().into(),
            })
            .collect();
        let results = self.aggregate(calls).await?;

        Ok(ids
            .iter()
            .zip(results.iter())
            .map(|(id, result)| {
                if !result.success || result.returnData.is_empty() {
                    return EntryResult::Failed {
                        reason: format!("server {} read failed", id),
                    };
                }
                match IDataRegistry::serversCall::abi_decode_returns(&result.returnData) {
                    Ok(info) => EntryResult::Ok(to_server(info)),
                    Err(e) => EntryResult::Failed {
                        reason: format!("server {} decode failed: {}", id, e),
                    },
                }
            })
            .collect())
    }
}

fn to_permission(info: IDataRegistry::PermissionInfo) -> Permission {
    Permission {
        id: info.id,
        grantor: info.grantor,
        grantee: info.grantee,
        grant: info.grant,
        nonce: info.nonce,
        operation: info.operation,
        file_ids: info.fileIds,
        parameters: info.parameters,
        start_block: u64::try_from(info.startBlock).unwrap_or(u64::MAX),
        end_block: u64::try_from(info.endBlock).unwrap_or(u64::MAX),
        active: info.active,
    }
}

fn to_server(info: IDataRegistry::ServerInfo) -> TrustedServer {
    TrustedServer {
        server_id: info.id,
        url: info.url,
        owner: info.owner,
        public_key: info.publicKey,
        trusted_at: u64::try_from(info.trustedAt).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_carry_all_fields() {
        let info = IDataRegistry::PermissionInfo {
            id: U256::from(9),
            grantor: Address::repeat_byte(0x21),
            grantee: Address::repeat_byte(0x22),
            grant: "ipfs://bafygrant".to_string(),
            nonce: U256::from(4),
            operation: "llm_inference".to_string(),
            fileIds: vec![U256::from(1), U256::from(2)],
            parameters: "{}".to_string(),
            startBlock: U256::from(100),
            endBlock: U256::ZERO,
            active: true,
        };

        let permission = to_permission(info);
        assert_eq!(permission.id, U256::from(9));
        assert_eq!(permission.file_ids.len(), 2);
        assert_eq!(permission.start_block, 100);
        assert!(permission.active);

        let server = to_server(IDataRegistry::ServerInfo {
            id: Address::repeat_byte(0x44),
            url: "https://server.example".to_string(),
            owner: Address::repeat_byte(0x21),
            publicKey: "0x04ab".to_string(),
            trustedAt: U256::from(1733000000u64),
        });
        assert_eq!(server.server_id, Address::repeat_byte(0x44));
        assert_eq!(server.trusted_at, 1733000000);
    }

    #[test]
    fn oversized_block_numbers_saturate() {
        let info = IDataRegistry::PermissionInfo {
            id: U256::ZERO,
            grantor: Address::ZERO,
            grantee: Address::ZERO,
            grant: String::new(),
            nonce: U256::ZERO,
            operation: String::new(),
            fileIds: Vec::new(),
            parameters: String::new(),
            startBlock: U256::MAX,
            endBlock: U256::MAX,
            active: false,
        };

        let permission = to_permission(info);
        assert_eq!(permission.start_block, u64::MAX);
        assert_eq!(permission.end_block, u64::MAX);
    }
}
