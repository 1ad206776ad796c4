// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry contract bindings.
//!
//! The data registry exposes per-user permission and trust-set enumeration
//! (length + indexed access), entity lookups, and one write function per
//! authorization kind. Multicall3 batches independent reads into a single
//! round trip.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IDataRegistry {
        struct PermissionInfo {
            uint256 id;
            address grantor;
            address grantee;
            string grant;
            uint256 nonce;
            string operation;
            uint256[] fileIds;
            string parameters;
            uint256 startBlock;
            uint256 endBlock;
            bool active;
        }

        struct ServerInfo {
            address id;
            string url;
            address owner;
            string publicKey;
            uint256 trustedAt;
        }

        struct FilePermission {
            address account;
            string key;
        }

        // ---- Reads ----
        function nonces(address user) external view returns (uint256);
        function userPermissionIdsLength(address user) external view returns (uint256);
        function userPermissionIdsAt(address user, uint256 index) external view returns (uint256);
        function permissions(uint256 id) external view returns (PermissionInfo memory);
        function userServerIdsLength(address user) external view returns (uint256);
        function userServerIdsAt(address user, uint256 index) external view returns (address);
        function servers(address id) external view returns (ServerInfo memory);

        // ---- Writes ----
        function addPermission(address grantee, string grant, uint256 nonce) external returns (uint256);
        function revokePermission(uint256 permissionId) external;
        function trustServer(address serverId, string serverUrl) external;
        function untrustServer(address serverId) external;
        function addAndTrustServer(address serverId, string serverUrl, string serverPublicKey) external;
        function addFileWithPermissions(string url, address ownerAddress, FilePermission[] permissions) external returns (uint256);
        function addServerFilesAndPermissions(
            string[] fileUrls,
            uint256[] schemaIds,
            FilePermission[][] filePermissions,
            address serverId,
            string serverUrl,
            string serverPublicKey
        ) external;
        function addSchema(string name, string definitionUrl) external returns (uint256);
        function addRefiner(uint256 dlpId, uint256 schemaId, string instructionUrl) external returns (uint256);

        // ---- Events ----
        event PermissionGranted(uint256 indexed id, address indexed grantor, address indexed grantee, string grant);
        event PermissionRevoked(uint256 indexed id);
        event FileAdded(uint256 indexed fileId, address indexed owner, string url);
        event ServerTrusted(address indexed user, address indexed serverId);
        event ServerUntrusted(address indexed user, address indexed serverId);
        event SchemaAdded(uint256 indexed schemaId, string name, string definitionUrl);
        event RefinerAdded(uint256 indexed refinerId, uint256 indexed dlpId, uint256 schemaId);
    }
}

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn read_calls_encode_with_selector() {
        let call = IDataRegistry::userPermissionIdsAtCall {
            user: Address::ZERO,
            index: U256::from(3),
        };
        let encoded = call.abi_encode();

        // 4-byte selector + two 32-byte words.
        assert_eq!(encoded.len(), 4 + 64);
    }

    #[test]
    fn static_returns_decode() {
        use alloy::sol_types::SolValue;

        let word = U256::from(5).abi_encode();
        let decoded = IDataRegistry::noncesCall::abi_decode_returns(&word).unwrap();
        assert_eq!(decoded, U256::from(5));

        let addr = Address::repeat_byte(0xAB).abi_encode();
        let decoded = IDataRegistry::userServerIdsAtCall::abi_decode_returns(&addr).unwrap();
        assert_eq!(decoded, Address::repeat_byte(0xAB));
    }
}
