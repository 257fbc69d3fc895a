use alloy::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::utils;

/// ABI source configuration
#[derive(Debug, Clone)]
pub struct AbiSource {
    pub etherscan_api_key: Option<String>,
    pub cache_dir: PathBuf,
}

impl Default for AbiSource {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("contract-rpc")
            .join("abi-cache");

        Self {
            etherscan_api_key: std::env::var("ETHERSCAN_API_KEY").ok(),
            cache_dir,
        }
    }
}

/// An interface plus, for compiler artifacts, the creation bytecode.
#[derive(Debug, Clone, Default)]
pub struct ContractArtifact {
    pub abi: JsonAbi,
    pub bytecode: Option<Bytes>,
}

impl ContractArtifact {
    /// Accepts a bare ABI array, or a Hardhat / Foundry artifact whose
    /// `bytecode` is either a hex string or `{ "object": "0x..." }`.
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| anyhow!("Failed to parse ABI JSON: {}", e))?;

        let (abi_value, bytecode) = match value {
            Value::Array(_) => (value, None),
            Value::Object(mut object) => {
                let abi = object
                    .remove("abi")
                    .ok_or_else(|| anyhow!("Artifact has no 'abi' field"))?;
                let bytecode = match object.remove("bytecode") {
                    Some(Value::String(code)) => Some(code),
                    Some(Value::Object(mut code)) => match code.remove("object") {
                        Some(Value::String(code)) => Some(code),
                        _ => None,
                    },
                    _ => None,
                };
                (abi, bytecode)
            }
            _ => return Err(anyhow!("Expected an ABI array or an artifact object")),
        };

        let abi: JsonAbi = serde_json::from_value(abi_value)
            .map_err(|e| anyhow!("Failed to parse ABI JSON: {}", e))?;
        let bytecode = match bytecode.as_deref().map(str::trim) {
            None | Some("") | Some("0x") => None,
            Some(code) => Some(utils::normalize_bytecode(code)?),
        };

        Ok(Self { abi, bytecode })
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read ABI file {:?}: {}", path, e))?;
        Self::parse(&content).map_err(|e| anyhow!("{:?}: {}", path, e))
    }
}

/// ABI resolver that can fetch and cache contract ABIs
#[derive(Debug)]
pub struct AbiResolver {
    client: Client,
    config: AbiSource,
    memory_cache: HashMap<String, JsonAbi>,
}

impl AbiResolver {
    pub fn new(config: AbiSource) -> Self {
        Self {
            client: Client::new(),
            config,
            memory_cache: HashMap::new(),
        }
    }

    fn cache_key(address: &str, network: Option<&str>) -> String {
        format!("{}_{}", network.unwrap_or("mainnet"), address.to_lowercase())
    }

    /// Get ABI for a contract, trying cache first, then Etherscan
    pub async fn get_abi(&mut self, address: &str, network: Option<&str>) -> Result<JsonAbi> {
        let cache_key = Self::cache_key(address, network);

        if let Some(abi) = self.memory_cache.get(&cache_key) {
            debug!("ABI cache hit for {}", address);
            return Ok(abi.clone());
        }

        if let Ok(abi) = self.load_cached_abi(&cache_key).await {
            debug!("ABI disk cache hit for {}", address);
            self.memory_cache.insert(cache_key.clone(), abi.clone());
            return Ok(abi);
        }

        info!("Fetching ABI from Etherscan for {}", address);
        let abi = self
            .fetch_from_etherscan(&address.to_lowercase(), network)
            .await?;

        if let Err(e) = self.cache_abi(&cache_key, &abi).await {
            warn!("Failed to cache ABI for {}: {}", address, e);
        }

        self.memory_cache.insert(cache_key, abi.clone());
        Ok(abi)
    }

    fn etherscan_base_url(network: Option<&str>) -> Result<&'static str> {
        match network.unwrap_or("mainnet") {
            "mainnet" | "ethereum" => Ok("https://api.etherscan.io"),
            "sepolia" => Ok("https://api-sepolia.etherscan.io"),
            "holesky" => Ok("https://api-holesky.etherscan.io"),
            "polygon" => Ok("https://api.polygonscan.com"),
            "arbitrum" => Ok("https://api.arbiscan.io"),
            "optimism" => Ok("https://api-optimistic.etherscan.io"),
            "base" => Ok("https://api.basescan.org"),
            other => Err(anyhow!("Unsupported network for Etherscan: {}", other)),
        }
    }

    async fn fetch_from_etherscan(&self, address: &str, network: Option<&str>) -> Result<JsonAbi> {
        let mut url = format!(
            "{}/api?module=contract&action=getabi&address={}&format=json",
            Self::etherscan_base_url(network)?,
            address
        );

        if let Some(api_key) = &self.config.etherscan_api_key {
            url.push_str(&format!("&apikey={}", api_key));
        }

        let response: Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch from Etherscan: {}", e))?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Etherscan response: {}", e))?;

        Self::parse_etherscan_response(&response)
    }

    fn parse_etherscan_response(response: &Value) -> Result<JsonAbi> {
        let abi_str = response["result"]
            .as_str()
            .ok_or_else(|| anyhow!("No ABI found in response"))?;

        if response["status"] != "1" {
            let message = response["message"].as_str().unwrap_or("Unknown error");
            return Err(anyhow!("Etherscan API error: {} ({})", message, abi_str));
        }

        if abi_str == "Contract source code not verified" {
            return Err(anyhow!("Contract source code is not verified on Etherscan"));
        }

        serde_json::from_str(abi_str).map_err(|e| anyhow!("Failed to parse ABI JSON: {}", e))
    }

    async fn load_cached_abi(&self, cache_key: &str) -> Result<JsonAbi> {
        let cache_path = self.config.cache_dir.join(format!("{}.json", cache_key));

        if !cache_path.exists() {
            return Err(anyhow!("Cache file does not exist"));
        }

        let content = fs::read_to_string(&cache_path)
            .await
            .map_err(|e| anyhow!("Failed to read cache file: {}", e))?;

        serde_json::from_str(&content).map_err(|e| anyhow!("Failed to parse cached ABI: {}", e))
    }

    async fn cache_abi(&self, cache_key: &str, abi: &JsonAbi) -> Result<()> {
        if !self.config.cache_dir.exists() {
            fs::create_dir_all(&self.config.cache_dir)
                .await
                .map_err(|e| anyhow!("Failed to create cache directory: {}", e))?;
        }

        let cache_path = self.config.cache_dir.join(format!("{}.json", cache_key));
        let content = serde_json::to_string_pretty(abi)
            .map_err(|e| anyhow!("Failed to serialize ABI: {}", e))?;

        fs::write(&cache_path, content)
            .await
            .map_err(|e| anyhow!("Failed to write cache file: {}", e))?;

        debug!("Cached ABI to {:?}", cache_path);
        Ok(())
    }
}
