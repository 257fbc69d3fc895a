use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{B256, U256},
};
use anyhow::{anyhow, Result};
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::{
    config::Config,
    error::ContractError,
    ethereum::{
        abi::{AbiResolver, AbiSource, ContractArtifact},
        contract::{Contract, ContractBuilder},
        events::{FilterOptions, LiveFilter},
        function::{BoundFunction, CallOptions},
        provider::ProviderManager,
        registry::AbiRegistry,
        transport::{ETH_GET_FILTER_CHANGES, ETH_GET_FILTER_LOGS, ETH_UNINSTALL_FILTER},
        tx::{parse_block_identifier, TxParams},
        utils,
    },
};

/// Installed filters by network name and node-issued filter id.
type FilterTable = HashMap<(String, String), Arc<LiveFilter>>;

#[derive(Clone)]
pub struct ContractRpcServer {
    providers: Arc<ProviderManager>,
    abi_resolver: Arc<Mutex<AbiResolver>>,
    filters: Arc<Mutex<FilterTable>>,
    config: Arc<Config>,
}

/// Which contract a request targets: a configured name, or an address with
/// an optional inline ABI. An inline ABI without address gives an
/// address-less handle.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
struct ContractTarget {
    /// Name of a contract from the configuration file
    contract: Option<String>,
    address: Option<String>,
    /// JSON ABI array or compiler artifact; fetched from Etherscan when omitted
    abi: Option<Value>,
    network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct FunctionRequest {
    #[serde(flatten)]
    target: ContractTarget,
    /// Function name, canonical signature or 0x selector
    function: String,
    #[serde(default)]
    args: Vec<Value>,
    /// Arguments by parameter name
    #[serde(default)]
    kwargs: Map<String, Value>,
    from: Option<String>,
    /// Wei, decimal or 0x hex
    value: Option<String>,
    gas: Option<u64>,
    gas_price: Option<String>,
    /// latest, earliest, pending, safe, finalized, a number or a block hash
    block: Option<String>,
    /// Follow EIP-3668 offchain lookups during calls (default true)
    ccip_read: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct EventRequest {
    #[serde(flatten)]
    target: ContractTarget,
    /// Event name, canonical signature or topic 0
    event: String,
    /// Indexed argument name to a value or a list of alternatives
    #[serde(default)]
    filters: Map<String, Value>,
    from_block: Option<String>,
    to_block: Option<String>,
    block_hash: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct PollFilterRequest {
    filter_id: String,
    /// Network the filter was created on; defaults to the default network
    network: Option<String>,
    /// Return every entry matching the filter instead of only new ones
    #[serde(default)]
    all: bool,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct UninstallFilterRequest {
    filter_id: String,
    network: Option<String>,
}

fn describe_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ContractError>() {
        Some(ContractError::Transport(inner)) => utils::interpret_rpc_error(&inner.to_string()),
        _ => e.to_string(),
    }
}

fn respond(operation: &str, result: Result<Value>) -> String {
    match result {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "Failed to serialize result".to_string()),
        Err(e) => {
            error!("Failed to {}: {}", operation, e);
            format!("Error: {}", describe_error(&e))
        }
    }
}

fn parse_block_tag(field: &str, block: Option<&str>) -> Result<Option<BlockNumberOrTag>> {
    match block.map(parse_block_identifier).transpose().map_err(|e| anyhow!("{}: {}", field, e))? {
        None => Ok(None),
        Some(BlockId::Number(tag)) => Ok(Some(tag)),
        Some(BlockId::Hash(_)) => Err(anyhow!("{} must be a block number or tag", field)),
    }
}

impl FunctionRequest {
    fn tx_params(&self) -> Result<TxParams> {
        let mut tx = TxParams::new();
        if let Some(from) = &self.from {
            tx = tx.from(utils::validate_address(from)?);
        }
        if let Some(value) = &self.value {
            tx = tx.value(utils::parse_quantity(value)?);
        }
        if let Some(gas) = self.gas {
            tx = tx.gas(gas);
        }
        if let Some(gas_price) = &self.gas_price {
            let price = utils::parse_quantity(gas_price)?;
            if price > U256::from(u128::MAX) {
                return Err(anyhow!("gas_price {} is out of range", gas_price));
            }
            tx = tx.gas_price(price.to());
        }
        Ok(tx)
    }

    fn block(&self) -> Result<Option<BlockId>> {
        self.block
            .as_deref()
            .map(parse_block_identifier)
            .transpose()
            .map_err(|e| anyhow!("block: {}", e))
    }
}

impl EventRequest {
    fn filter_options(&self) -> Result<FilterOptions> {
        let block_hash = self
            .block_hash
            .as_deref()
            .map(B256::from_str)
            .transpose()
            .map_err(|e| anyhow!("block_hash: {}", e))?;

        Ok(FilterOptions {
            argument_filters: self.filters.clone(),
            from_block: parse_block_tag("from_block", self.from_block.as_deref())?,
            to_block: parse_block_tag("to_block", self.to_block.as_deref())?,
            block_hash,
            ..Default::default()
        })
    }
}

impl ContractRpcServer {
    pub fn new(config: Config) -> Result<Self> {
        let providers = Arc::new(ProviderManager::new(&config)?);
        config.default_from()?;

        Ok(Self {
            providers,
            abi_resolver: Arc::new(Mutex::new(AbiResolver::new(AbiSource::default()))),
            filters: Arc::new(Mutex::new(HashMap::new())),
            config: Arc::new(config),
        })
    }

    pub async fn run(&self) -> Result<()> {
        info!("Starting contract-rpc MCP server");

        if !self.providers.check_connection(None).await {
            tracing::warn!(
                "Default network '{}' is not reachable; requests to it will fail until it is",
                self.config.default_network
            );
        }

        let service = self.clone().serve(stdio()).await?;

        info!("contract-rpc MCP server started successfully");
        let _ = service.waiting().await;
        Ok(())
    }

    /// Builds a contract handle for `target`, returning it with the name of
    /// the network it is bound to.
    async fn contract(&self, target: &ContractTarget) -> Result<(String, Contract)> {
        let configured = match &target.contract {
            Some(name) => Some(
                self.config
                    .contract(name)
                    .ok_or_else(|| anyhow!("Contract '{}' is not configured", name))?,
            ),
            None => None,
        };

        let network = target
            .network
            .clone()
            .or_else(|| configured.and_then(|c| c.network.clone()))
            .unwrap_or_else(|| self.config.default_network.clone());
        let address = target
            .address
            .as_deref()
            .or(configured.map(|c| c.address.as_str()))
            .map(utils::validate_address)
            .transpose()?;

        let artifact = match (&target.abi, configured.and_then(|c| c.abi_path.as_ref())) {
            (Some(abi), _) => ContractArtifact::parse(&abi.to_string())?,
            (None, Some(path)) => ContractArtifact::load(path).await?,
            (None, None) => {
                let address = address
                    .ok_or_else(|| anyhow!("Either 'address', 'contract' or 'abi' is required"))?;
                let abi = self
                    .abi_resolver
                    .lock()
                    .await
                    .get_abi(&address.to_string(), Some(&network))
                    .await
                    .map_err(|e| anyhow!(utils::interpret_abi_error(&e.to_string(), &address.to_string())))?;
                ContractArtifact { abi, bytecode: None }
            }
        };

        let mut builder = ContractBuilder::new(AbiRegistry::new(artifact.abi))
            .transport(self.providers.get_transport(Some(&network))?);
        if let Some(address) = address {
            builder = builder.address(address);
        }
        if let Some(bytecode) = artifact.bytecode {
            builder = builder.bytecode(bytecode);
        }
        if let Some(from) = self.config.default_from()? {
            builder = builder.default_account(from);
        }

        Ok((network, builder.build()))
    }

    async fn bound_function(&self, request: &FunctionRequest) -> Result<BoundFunction> {
        let (_, contract) = self.contract(&request.target).await?;
        let bound = contract
            .function(&request.function)?
            .bind_with(request.args.clone(), request.kwargs.clone())?;
        Ok(bound)
    }

    async fn call(&self, request: FunctionRequest) -> Result<Value> {
        let function = self.bound_function(&request).await?;
        let options = CallOptions {
            tx: request.tx_params()?,
            block: request.block()?.unwrap_or_else(BlockId::latest),
            ccip_read: request.ccip_read.unwrap_or(true),
            ..Default::default()
        };
        let result = function.call(&options).await?;
        Ok(json!({ "function": function.signature(), "result": result.to_json() }))
    }

    async fn estimate(&self, request: FunctionRequest) -> Result<Value> {
        let function = self.bound_function(&request).await?;
        let gas = function
            .estimate_gas(&request.tx_params()?, request.block()?)
            .await?;
        Ok(json!({ "function": function.signature(), "gas": gas }))
    }

    async fn build(&self, request: FunctionRequest) -> Result<Value> {
        let function = self.bound_function(&request).await?;
        let tx = function.build_transaction(&request.tx_params()?).await?;
        Ok(json!({ "function": function.signature(), "transaction": tx }))
    }

    async fn send(&self, request: FunctionRequest) -> Result<Value> {
        if !self.config.security.allow_write_operations {
            return Err(anyhow!(
                "Write operations are disabled. Use --allow-writes flag to enable transaction sending."
            ));
        }
        let function = self.bound_function(&request).await?;
        let hash = function.transact(&request.tx_params()?).await?;
        Ok(json!({ "function": function.signature(), "transaction_hash": hash }))
    }

    async fn logs(&self, request: EventRequest) -> Result<Value> {
        let (_, contract) = self.contract(&request.target).await?;
        let event = contract.event(&request.event)?;
        let events = event.get_logs(&request.filter_options()?).await?;
        Ok(Value::Array(events.iter().map(|e| e.to_json()).collect()))
    }

    async fn install_filter(&self, request: EventRequest) -> Result<Value> {
        let (network, contract) = self.contract(&request.target).await?;
        let event = contract.event(&request.event)?;
        let filter = event.create_filter(request.filter_options()?).await?;
        let filter_id = filter.filter_id().to_string();
        let params = serde_json::to_value(filter.params())?;

        self.filters
            .lock()
            .await
            .insert((network.clone(), filter_id.clone()), Arc::new(filter));
        Ok(json!({ "filter_id": filter_id, "network": network, "params": params }))
    }

    fn filter_key(&self, network: Option<&str>, filter_id: &str) -> (String, String) {
        (
            self.providers.resolve_network(network).to_string(),
            filter_id.to_string(),
        )
    }

    async fn poll(&self, request: PollFilterRequest) -> Result<Value> {
        let key = self.filter_key(request.network.as_deref(), &request.filter_id);
        // the table stays unlocked while the node answers
        let filter = self
            .filters
            .lock()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown filter '{}' on network '{}'", key.1, key.0))?;

        let method = if request.all {
            ETH_GET_FILTER_LOGS
        } else {
            ETH_GET_FILTER_CHANGES
        };
        let transport = self.providers.get_transport(Some(&key.0))?;
        let raw = transport
            .request(method, json!([key.1]))
            .await
            .map_err(ContractError::from)?;
        let events = filter.format_entries(raw)?;
        Ok(Value::Array(events.iter().map(|e| e.to_json()).collect()))
    }

    async fn uninstall(&self, request: UninstallFilterRequest) -> Result<Value> {
        let key = self.filter_key(request.network.as_deref(), &request.filter_id);
        let removed = self.filters.lock().await.remove(&key);
        if removed.is_none() {
            return Err(anyhow!("Unknown filter '{}' on network '{}'", key.1, key.0));
        }

        let transport = self.providers.get_transport(Some(&key.0))?;
        let uninstalled = transport
            .request(ETH_UNINSTALL_FILTER, json!([key.1]))
            .await
            .map_err(ContractError::from)?;
        info!("Uninstalled filter {} on {}", key.1, key.0);
        Ok(json!({ "filter_id": key.1, "network": key.0, "uninstalled": uninstalled }))
    }
}

#[tool(tool_box)]
impl ContractRpcServer {
    #[tool(description = "Call a contract function read-only (eth_call) and return its decoded result")]
    async fn call_function(&self, #[tool(aggr)] request: FunctionRequest) -> String {
        respond("call function", self.call(request).await)
    }

    #[tool(description = "Estimate gas for a contract function call")]
    async fn estimate_gas(&self, #[tool(aggr)] request: FunctionRequest) -> String {
        respond("estimate gas", self.estimate(request).await)
    }

    #[tool(description = "Build an unsigned transaction for a contract function with chain id, gas and gas price filled in")]
    async fn build_transaction(&self, #[tool(aggr)] request: FunctionRequest) -> String {
        respond("build transaction", self.build(request).await)
    }

    #[tool(description = "Send a contract function transaction from a node-managed account (eth_sendTransaction)")]
    async fn send_transaction(&self, #[tool(aggr)] request: FunctionRequest) -> String {
        respond("send transaction", self.send(request).await)
    }

    #[tool(description = "Query historical logs of a contract event and decode them")]
    async fn get_logs(&self, #[tool(aggr)] request: EventRequest) -> String {
        respond("get logs", self.logs(request).await)
    }

    #[tool(description = "Install a node-side filter for a contract event; poll it with poll_filter")]
    async fn create_filter(&self, #[tool(aggr)] request: EventRequest) -> String {
        respond("create filter", self.install_filter(request).await)
    }

    #[tool(description = "Fetch and decode new entries of a filter created with create_filter")]
    async fn poll_filter(&self, #[tool(aggr)] request: PollFilterRequest) -> String {
        respond("poll filter", self.poll(request).await)
    }

    #[tool(description = "Remove a filter created with create_filter from the server and the node")]
    async fn uninstall_filter(&self, #[tool(aggr)] request: UninstallFilterRequest) -> String {
        respond("uninstall filter", self.uninstall(request).await)
    }
}

#[tool(tool_box)]
impl ServerHandler for ContractRpcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("MCP server for Ethereum contract interaction over JSON-RPC. Supports read-only calls, gas estimation, transaction building, sending from node-managed accounts, and event log queries and filters that can be polled and uninstalled. Functions accept overloaded names, canonical signatures or selectors.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
