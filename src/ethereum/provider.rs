use crate::config::{Config, NetworkConfig};
use alloy::primitives::U64;
use anyhow::{anyhow, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{
    transport::{HttpTransport, RpcTransport, ETH_CHAIN_ID},
    utils,
};

/// One transport per configured network.
pub struct ProviderManager {
    transports: HashMap<String, Arc<dyn RpcTransport>>,
    networks: HashMap<String, NetworkConfig>,
    default_network: String,
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("networks", &self.get_available_networks())
            .field("default_network", &self.default_network)
            .finish()
    }
}

impl ProviderManager {
    pub fn new(config: &Config) -> Result<Self> {
        let mut transports: HashMap<String, Arc<dyn RpcTransport>> = HashMap::new();

        for (network_name, network_config) in &config.networks {
            let transport = Self::create_transport(network_config)
                .map_err(|e| anyhow!("Invalid RPC URL for network '{}': {}", network_name, e))?;
            transports.insert(network_name.clone(), Arc::new(transport));
        }

        Ok(Self {
            transports,
            networks: config.networks.clone(),
            default_network: config.default_network.clone(),
        })
    }

    fn create_transport(network_config: &NetworkConfig) -> Result<HttpTransport> {
        HttpTransport::new(
            &network_config.rpc_url,
            Duration::from_millis(network_config.request_timeout_ms),
        )
    }

    /// Registers or replaces the transport behind `network`.
    pub fn insert_transport(&mut self, network: &str, chain_id: u64, transport: Arc<dyn RpcTransport>) {
        self.networks.insert(
            network.to_string(),
            NetworkConfig {
                rpc_url: transport.url().to_string(),
                chain_id,
                request_timeout_ms: 0,
            },
        );
        self.transports.insert(network.to_string(), transport);
    }

    pub fn resolve_network<'a>(&'a self, network: Option<&'a str>) -> &'a str {
        network.unwrap_or(&self.default_network)
    }

    pub fn get_transport(&self, network: Option<&str>) -> Result<Arc<dyn RpcTransport>> {
        let network_name = self.resolve_network(network);
        self.transports.get(network_name).cloned().ok_or_else(|| {
            anyhow!(
                "Network '{}' not found. Available networks: {}",
                network_name,
                self.get_available_networks().join(", ")
            )
        })
    }

    pub fn get_network_config(&self, network: Option<&str>) -> Result<&NetworkConfig> {
        let network_name = self.resolve_network(network);
        self.networks
            .get(network_name)
            .ok_or_else(|| anyhow!("Network '{}' not configured", network_name))
    }

    pub fn get_available_networks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transports.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validates network connectivity and that the node serves the
    /// configured chain. A configured chain id of 0 accepts any chain.
    pub async fn validate_network_connection(&self, network: Option<&str>) -> Result<u64> {
        let network_name = self.resolve_network(network);
        let transport = self.get_transport(network)?;
        let expected = self.get_network_config(network)?.chain_id;

        let raw = transport.request(ETH_CHAIN_ID, json!([])).await.map_err(|e| {
            anyhow!(
                "Cannot connect to network '{}': {}. Please check your RPC endpoint configuration and network connectivity.",
                network_name,
                utils::interpret_rpc_error(&e.to_string())
            )
        })?;
        let chain_id: u64 = serde_json::from_value::<U64>(raw)
            .map_err(|e| anyhow!("Unexpected eth_chainId response from '{}': {}", network_name, e))?
            .to();

        if expected != 0 && chain_id != expected {
            return Err(anyhow!(
                "Network '{}' is configured for chain {} but the node reports chain {}",
                network_name,
                expected,
                chain_id
            ));
        }
        Ok(chain_id)
    }

    pub async fn check_connection(&self, network: Option<&str>) -> bool {
        match self.validate_network_connection(network).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(
                    "Connection check failed for network {}: {}",
                    self.resolve_network(network),
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::transport::mock::MockTransport;

    #[test]
    fn builds_a_transport_per_network() {
        let config = Config::default();
        let manager = ProviderManager::new(&config).unwrap();
        assert_eq!(manager.get_available_networks(), config.network_names());
        assert!(manager.get_transport(None).is_ok());
        assert!(manager.get_transport(Some("unknown")).is_err());
    }

    #[test]
    fn rejects_invalid_rpc_urls() {
        let mut config = Config::default();
        config.networks.get_mut("local").unwrap().rpc_url = "not a url".into();
        assert!(ProviderManager::new(&config).is_err());
    }

    #[tokio::test]
    async fn connection_check_compares_chain_ids() {
        let mut manager = ProviderManager::new(&Config::default()).unwrap();
        let transport = Arc::new(MockTransport::new());
        transport
            .reply(ETH_CHAIN_ID, json!("0x7a69"))
            .reply(ETH_CHAIN_ID, json!("0x1"));
        manager.insert_transport("local", 31337, transport.clone());

        assert_eq!(manager.validate_network_connection(Some("local")).await.unwrap(), 31337);
        assert!(!manager.check_connection(Some("local")).await);
        assert_eq!(transport.count(ETH_CHAIN_ID), 2);
    }
}
