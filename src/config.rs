use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::ethereum::utils;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub default_network: String,
    pub networks: HashMap<String, NetworkConfig>,
    #[serde(default)]
    pub contracts: HashMap<String, ContractConfig>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// A named contract the server can address without an explicit ABI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: String,
    /// JSON ABI or compiler artifact; fetched from Etherscan when absent.
    pub abi_path: Option<PathBuf>,
    pub network: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub allow_write_operations: bool,
    /// Node-managed account used as `from` when a request names none.
    pub default_from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub transport: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".to_string(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        let networks = [
            ("ethereum", "https://eth-mainnet.g.alchemy.com/v2/demo", 1),
            ("sepolia", "https://eth-sepolia.g.alchemy.com/v2/demo", 11155111),
            ("polygon", "https://polygon-mainnet.g.alchemy.com/v2/demo", 137),
            ("arbitrum", "https://arb-mainnet.g.alchemy.com/v2/demo", 42161),
            ("local", "http://127.0.0.1:8545", 31337),
        ]
        .into_iter()
        .map(|(name, rpc_url, chain_id)| {
            (
                name.to_string(),
                NetworkConfig {
                    rpc_url: rpc_url.to_string(),
                    chain_id,
                    request_timeout_ms: default_request_timeout_ms(),
                },
            )
        })
        .collect();

        Self {
            default_network: "ethereum".to_string(),
            networks,
            contracts: HashMap::new(),
            security: SecurityConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    fn apply_env_vars(&mut self) {
        match std::env::var("ALCHEMY_API_KEY") {
            Ok(api_key) => {
                tracing::info!("Using ALCHEMY_API_KEY environment variable for RPC URLs");
                self.substitute_api_key(&api_key);
            }
            Err(_) => {
                for (network_name, network_config) in &self.networks {
                    if network_config.rpc_url.contains("/demo") {
                        tracing::warn!("Using demo RPC endpoint for {}, set ALCHEMY_API_KEY environment variable for better reliability", network_name);
                    }
                }
            }
        }

        if std::env::var("ETHERSCAN_API_KEY").is_ok() {
            tracing::debug!("ETHERSCAN_API_KEY found, will be used for ABI resolution");
        }
    }

    /// Replaces Alchemy demo keys and `YOUR_API_KEY_HERE` placeholders.
    fn substitute_api_key(&mut self, api_key: &str) {
        for (network_name, network_config) in &mut self.networks {
            let url = &network_config.rpc_url;
            let replaced = if url.contains("alchemy.com/v2/demo") {
                url.replace("/demo", &format!("/{}", api_key))
            } else if url.contains("YOUR_API_KEY_HERE") {
                url.replace("YOUR_API_KEY_HERE", api_key)
            } else {
                continue;
            };
            network_config.rpc_url = replaced;
            tracing::debug!("Updated {} RPC URL with API key", network_name);
        }
    }

    /// Makes `network` the default, optionally pointing it at `rpc_url`.
    ///
    /// An unknown network is only accepted together with an RPC URL and
    /// gets chain id 0, which the connection check accepts for any chain.
    pub fn select_network(&mut self, network: &str, rpc_url: Option<&str>) -> Result<()> {
        if let Some(url) = rpc_url {
            self.networks
                .entry(network.to_string())
                .and_modify(|config| config.rpc_url = url.to_string())
                .or_insert_with(|| NetworkConfig {
                    rpc_url: url.to_string(),
                    chain_id: 0,
                    request_timeout_ms: default_request_timeout_ms(),
                });
        } else if !self.networks.contains_key(network) {
            return Err(anyhow!(
                "Network '{}' is not configured. Available networks: {}",
                network,
                self.network_names().join(", ")
            ));
        }
        self.default_network = network.to_string();
        Ok(())
    }

    pub fn network_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.networks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contract(&self, name: &str) -> Option<&ContractConfig> {
        self.contracts.get(name)
    }

    pub fn default_from(&self) -> Result<Option<Address>> {
        self.security
            .default_from
            .as_deref()
            .map(|from| {
                utils::validate_address(from).map_err(|e| anyhow!("Invalid security.default_from: {}", e))
            })
            .transpose()
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("contract-rpc").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# contract-rpc configuration file

# Default network to use when none is specified
default_network = "ethereum"

[networks.ethereum]
rpc_url = "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 1
request_timeout_ms = 30000

[networks.sepolia]
rpc_url = "https://eth-sepolia.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 11155111

[networks.local]
rpc_url = "http://127.0.0.1:8545"
chain_id = 31337
request_timeout_ms = 5000

# Contracts addressable by name. Without abi_path the ABI is fetched from
# Etherscan and cached on disk.
[contracts.usdc]
address = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
network = "ethereum"

# [contracts.token]
# address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
# abi_path = "out/Token.sol/Token.json"
# network = "local"

[security]
allow_write_operations = false
# Node-managed account used as `from` when a request names none
# default_from = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"

[server]
transport = "stdio"

# Environment variables that can be used:
# ETHERSCAN_API_KEY - Your Etherscan API key for ABI resolution
# ALCHEMY_API_KEY - Your Alchemy API key (replaces YOUR_API_KEY_HERE above)
"#;
        sample_config.to_string()
    }
}
