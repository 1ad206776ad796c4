// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-712 type definitions for registry authorization messages.
//!
//! These types MUST match the registry contract's verification code
//! exactly. Any mismatch in type names, field names, or field types
//! changes the struct hash and the contract will recover a different
//! signer.

use std::borrow::Cow;

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::Eip712Domain;

use crate::config::{ChainConfig, SIGNING_DOMAIN_NAME, SIGNING_DOMAIN_VERSION};

sol! {
    /// Grant of a permission to a grantee.
    ///
    /// `grant` is the URI of the off-chain grant document; the document
    /// itself is never part of the signed message.
    #[derive(Debug, PartialEq)]
    struct PermissionGrant {
        address grantee;
        string grant;
        uint256 nonce;
    }

    /// Revocation of a previously granted permission, by permission id.
    #[derive(Debug, PartialEq)]
    struct PermissionRevoke {
        uint256 permissionId;
        uint256 nonce;
    }

    /// Addition of a server to the signer's trust set.
    #[derive(Debug, PartialEq)]
    struct TrustServer {
        address serverId;
        string serverUrl;
        uint256 nonce;
    }

    /// Removal of a server from the signer's trust set.
    #[derive(Debug, PartialEq)]
    struct UntrustServer {
        address serverId;
        uint256 nonce;
    }

    /// Registration of a server combined with trusting it.
    #[derive(Debug, PartialEq)]
    struct AddAndTrustServer {
        address serverId;
        string serverUrl;
        string serverPublicKey;
        uint256 nonce;
    }

    /// One recipient's wrapped key claim inside a file registration.
    ///
    /// Used as a nested type in ServerFilesAndPermissions.
    #[derive(Debug, PartialEq)]
    struct FilePermissionClaim {
        address account;
        string key;
    }

    /// Batched registration of files with per-file schema and per-file
    /// recipient permission lists, attributed to a server.
    #[derive(Debug, PartialEq)]
    struct ServerFilesAndPermissions {
        string[] fileUrls;
        uint256[] schemaIds;
        FilePermissionClaim[][] filePermissions;
        address serverId;
        string serverUrl;
        string serverPublicKey;
        uint256 nonce;
    }
}

/// EIP-712 domain for all registry authorization messages on `chain`.
pub fn signing_domain(chain: &ChainConfig, verifying_contract: Address) -> Eip712Domain {
    Eip712Domain {
        name: Some(Cow::Borrowed(SIGNING_DOMAIN_NAME)),
        version: Some(Cow::Borrowed(SIGNING_DOMAIN_VERSION)),
        chain_id: Some(U256::from(chain.chain_id)),
        verifying_contract: Some(verifying_contract),
        salt: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{REGISTRY_MAINNET, REGISTRY_TESTNET};
    use alloy::sol_types::SolStruct;

    #[test]
    fn root_types_are_stable() {
        assert_eq!(
            PermissionGrant::eip712_root_type(),
            "PermissionGrant(address grantee,string grant,uint256 nonce)"
        );
        assert_eq!(
            TrustServer::eip712_root_type(),
            "TrustServer(address serverId,string serverUrl,uint256 nonce)"
        );
    }

    #[test]
    fn signing_hash_is_deterministic() {
        let domain = signing_domain(&REGISTRY_TESTNET, Address::repeat_byte(0x11));
        let message = PermissionGrant {
            grantee: Address::repeat_byte(0x22),
            grant: "ipfs://bafygrant".to_string(),
            nonce: U256::from(7),
        };

        assert_eq!(
            message.eip712_signing_hash(&domain),
            message.eip712_signing_hash(&domain)
        );
    }

    #[test]
    fn signing_hash_is_domain_bound() {
        let message = PermissionGrant {
            grantee: Address::repeat_byte(0x22),
            grant: "ipfs://bafygrant".to_string(),
            nonce: U256::from(7),
        };

        let testnet = signing_domain(&REGISTRY_TESTNET, Address::repeat_byte(0x11));
        let mainnet = signing_domain(&REGISTRY_MAINNET, Address::repeat_byte(0x11));
        let other_contract = signing_domain(&REGISTRY_TESTNET, Address::repeat_byte(0x12));

        let hash = message.eip712_signing_hash(&testnet);
        assert_ne!(hash, message.eip712_signing_hash(&mainnet));
        assert_ne!(hash, message.eip712_signing_hash(&other_contract));
    }

    #[test]
    fn nonce_changes_the_hash() {
        let domain = signing_domain(&REGISTRY_TESTNET, Address::repeat_byte(0x11));

        let first = PermissionRevoke {
            permissionId: U256::from(3),
            nonce: U256::from(1),
        };
        let replayed = PermissionRevoke {
            permissionId: U256::from(3),
            nonce: U256::from(2),
        };

        assert_ne!(
            first.eip712_signing_hash(&domain),
            replayed.eip712_signing_hash(&domain)
        );
    }

    #[test]
    fn nested_permission_claims_hash() {
        let domain = signing_domain(&REGISTRY_TESTNET, Address::repeat_byte(0x11));
        let message = ServerFilesAndPermissions {
            fileUrls: vec!["ipfs://bafyfile".to_string()],
            schemaIds: vec![U256::ZERO],
            filePermissions: vec![vec![FilePermissionClaim {
                account: Address::repeat_byte(0x33),
                key: "0xwrapped".to_string(),
            }]],
            serverId: Address::repeat_byte(0x44),
            serverUrl: "https://server.example".to_string(),
            serverPublicKey: "0x04ab".to_string(),
            nonce: U256::from(1),
        };

        // A different wrapped key must change the hash.
        let mut altered = message.clone();
        altered.filePermissions[0][0].key = "0xother".to_string();

        assert_ne!(
            message.eip712_signing_hash(&domain),
            altered.eip712_signing_hash(&domain)
        );
    }
}
