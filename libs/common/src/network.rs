use std::collections::HashMap;

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

use crate::events::ContractKind;

/// Deployed contract addresses for one network. The payment hub is optional;
/// without it channel settlement stays off-chain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractSet {
    pub stream_token: Address,
    pub stream_amm: Address,
    pub lazy_content_minter: Address,
    #[serde(default)]
    pub payment_hub: Option<Address>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub network_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub contracts: ContractSet,
}

/// Lookup table for every network the service talks to.
#[derive(Clone, Debug, Default)]
pub struct NetworkRegistry {
    networks: HashMap<u64, NetworkDescriptor>,
}

impl NetworkRegistry {
    pub fn new(descriptors: Vec<NetworkDescriptor>) -> Self {
        let networks = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.network_id, descriptor))
            .collect();
        Self { networks }
    }

    /// The mainnet deployments the platform ships with.
    pub fn mainnet_defaults() -> Vec<NetworkDescriptor> {
        vec![
            NetworkDescriptor {
                network_id: 1,
                name: "ethereum".to_string(),
                rpc_url: "https://eth-mainnet.g.alchemy.com/v2/demo".to_string(),
                contracts: ContractSet {
                    stream_token: address!("4A8f5F96D5436e43112c87fec524BDCA68088D11"),
                    stream_amm: address!("7D1AfA7B718fb893dB30A3aBc0Cfc608AaCfeBB0"),
                    lazy_content_minter: address!("dAC17F958D2ee523a2206206994597C13D831ec7"),
                    payment_hub: None,
                },
            },
            NetworkDescriptor {
                network_id: 137,
                name: "polygon".to_string(),
                rpc_url: "https://polygon-rpc.com".to_string(),
                contracts: ContractSet {
                    stream_token: address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
                    stream_amm: address!("7ceB23fD6bC0adD59E62ac25578270cFf1b9f619"),
                    lazy_content_minter: address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
                    payment_hub: None,
                },
            },
            NetworkDescriptor {
                network_id: 42161,
                name: "arbitrum".to_string(),
                rpc_url: "https://arb1.arbitrum.io/rpc".to_string(),
                contracts: ContractSet {
                    stream_token: address!("912CE59144191C1204E64559FE8253a0e49E6548"),
                    stream_amm: address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
                    lazy_content_minter: address!("FF970A61A04b1cA14834A43f5dE4533eBDDB5CC8"),
                    payment_hub: None,
                },
            },
            NetworkDescriptor {
                network_id: 10,
                name: "optimism".to_string(),
                rpc_url: "https://mainnet.optimism.io".to_string(),
                contracts: ContractSet {
                    stream_token: address!("4200000000000000000000000000000000000042"),
                    stream_amm: address!("4200000000000000000000000000000000000043"),
                    lazy_content_minter: address!("4200000000000000000000000000000000000044"),
                    payment_hub: None,
                },
            },
            NetworkDescriptor {
                network_id: 8453,
                name: "base".to_string(),
                rpc_url: "https://mainnet.base.org".to_string(),
                contracts: ContractSet {
                    stream_token: address!("8544Fe9d190fD7EC52860abBf45088E81Ee24a93"),
                    stream_amm: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
                    lazy_content_minter: address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb"),
                    payment_hub: None,
                },
            },
        ]
    }

    pub fn network(&self, network_id: u64) -> Option<&NetworkDescriptor> {
        self.networks.get(&network_id)
    }

    pub fn supports(&self, network_id: u64) -> bool {
        self.networks.contains_key(&network_id)
    }

    pub fn network_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.networks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Descriptors for every known network, ordered by network id.
    pub fn descriptors(&self) -> Vec<NetworkDescriptor> {
        let mut descriptors: Vec<NetworkDescriptor> = self.networks.values().cloned().collect();
        descriptors.sort_by_key(|descriptor| descriptor.network_id);
        descriptors
    }

    pub fn contract_address(&self, network_id: u64, kind: ContractKind) -> Option<Address> {
        let contracts = &self.networks.get(&network_id)?.contracts;
        match kind {
            ContractKind::StreamToken => Some(contracts.stream_token),
            ContractKind::StreamAmm => Some(contracts.stream_amm),
            ContractKind::LazyContentMinter => Some(contracts.lazy_content_minter),
            ContractKind::PaymentHub => contracts.payment_hub,
        }
    }

    pub fn payment_hub(&self, network_id: u64) -> Option<Address> {
        self.networks.get(&network_id)?.contracts.payment_hub
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_networks() {
        let registry = NetworkRegistry::new(NetworkRegistry::mainnet_defaults());
        assert_eq!(registry.network_ids(), vec![1, 10, 137, 8453, 42161]);

        for id in registry.network_ids() {
            assert!(registry.supports(id));
            assert!(registry
                .contract_address(id, ContractKind::StreamToken)
                .is_some());
            assert!(registry
                .contract_address(id, ContractKind::LazyContentMinter)
                .is_some());
            // No hub is deployed by default, so settlement is off-chain.
            assert!(registry.payment_hub(id).is_none());
        }
    }

    #[test]
    fn test_unknown_network() {
        let registry = NetworkRegistry::new(NetworkRegistry::mainnet_defaults());
        assert!(!registry.supports(999));
        assert!(registry
            .contract_address(999, ContractKind::StreamToken)
            .is_none());
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptors = NetworkRegistry::mainnet_defaults();
        let json = serde_json::to_string(&descriptors).unwrap();
        let decoded: Vec<NetworkDescriptor> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, descriptors);
    }
}
