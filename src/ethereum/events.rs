//! Topic filters for contract events, one-shot log queries and node-side
//! live filters.

use alloy::{
    dyn_abi::DynSolType,
    eips::BlockNumberOrTag,
    json_abi::{Event, EventParam},
    primitives::{Address, B256},
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{
    codec,
    contract::Contract,
    logs::{DecodedEvent, LogDecoder, LogEntry},
    transport::{RpcTransport, ETH_GET_LOGS, ETH_NEW_FILTER},
    tx::{from_rpc_value, to_rpc_value},
};
use crate::error::{ContractError, Result};

/// One topic position: a single value or any of several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TopicFilter {
    Exact(B256),
    AnyOf(Vec<B256>),
}

/// Filter object accepted by `eth_getLogs` and `eth_newFilter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<BlockNumberOrTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<BlockNumberOrTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    /// `None` entries match any value at that position.
    pub topics: Vec<Option<TopicFilter>>,
}

/// Caller-side knobs for building a [`FilterParams`].
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Indexed argument name to a value, or a JSON array of alternatives.
    /// `null` leaves the position unconstrained.
    pub argument_filters: Map<String, Value>,
    pub from_block: Option<BlockNumberOrTag>,
    pub to_block: Option<BlockNumberOrTag>,
    /// Exclusive with `from_block` / `to_block`.
    pub block_hash: Option<B256>,
    pub address: Option<Address>,
    /// Replaces the generated topic list verbatim.
    pub topics: Option<Vec<Option<TopicFilter>>>,
}

impl FilterOptions {
    pub fn range(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block: Some(BlockNumberOrTag::Number(from_block)),
            to_block: Some(BlockNumberOrTag::Number(to_block)),
            ..Default::default()
        }
    }

    pub fn arg(mut self, name: &str, value: Value) -> Self {
        self.argument_filters.insert(name.to_string(), value);
        self
    }
}

/// Topic 0 for non-anonymous events.
pub fn event_topic(event: &Event) -> Option<B256> {
    (!event.anonymous).then(|| event.selector())
}

/// Builds the filter object for `event`.
///
/// `contract_address` is the address of the handle the event came from;
/// an explicit `options.address` must agree with it.
pub fn build_filter_params(
    event: &Event,
    contract_address: Option<Address>,
    options: &FilterOptions,
) -> Result<FilterParams> {
    if options.block_hash.is_some() && (options.from_block.is_some() || options.to_block.is_some())
    {
        return Err(ContractError::InvalidFilterParams(
            "blockHash cannot be combined with fromBlock or toBlock".to_string(),
        ));
    }

    let address = match (contract_address, options.address) {
        (Some(contract), Some(explicit)) if contract != explicit => {
            return Err(ContractError::InvalidFilterParams(format!(
                "address {} does not match contract address {}",
                explicit, contract
            )))
        }
        (contract, explicit) => contract.or(explicit),
    };

    let topics = match &options.topics {
        Some(explicit) => {
            if !options.argument_filters.is_empty() {
                return Err(ContractError::InvalidFilterParams(
                    "explicit topics cannot be combined with argument filters".to_string(),
                ));
            }
            explicit.clone()
        }
        None => event_topics(event, &options.argument_filters)?,
    };

    Ok(FilterParams {
        address,
        from_block: options.from_block,
        to_block: options.to_block,
        block_hash: options.block_hash,
        topics,
    })
}

fn event_topics(event: &Event, argument_filters: &Map<String, Value>) -> Result<Vec<Option<TopicFilter>>> {
    for name in argument_filters.keys() {
        let param = event
            .inputs
            .iter()
            .find(|p| &p.name == name)
            .ok_or_else(|| {
                ContractError::InvalidFilterParams(format!(
                    "event '{}' has no argument named '{}'",
                    event.name, name
                ))
            })?;
        if !param.indexed {
            return Err(ContractError::InvalidFilterParams(format!(
                "argument '{}' of '{}' is not indexed and cannot be filtered by topic",
                name, event.name
            )));
        }
    }

    let mut topics = Vec::with_capacity(event.inputs.len() + 1);
    if let Some(selector) = event_topic(event) {
        topics.push(Some(TopicFilter::Exact(selector)));
    }
    for param in event.inputs.iter().filter(|p| p.indexed) {
        let topic = match argument_filters.get(&param.name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(encode_argument_filter(event, param, value)?),
        };
        topics.push(topic);
    }
    Ok(topics)
}

fn encode_argument_filter(event: &Event, param: &EventParam, value: &Value) -> Result<TopicFilter> {
    let invalid = |reason: String| {
        ContractError::InvalidFilterParams(format!(
            "argument '{}' of '{}': {}",
            param.name, event.name, reason
        ))
    };

    let ty = codec::resolve_event_param(param).map_err(invalid)?;
    if matches!(ty, DynSolType::Array(_) | DynSolType::FixedArray(..)) {
        return Err(invalid("array-typed arguments cannot be filtered".to_string()));
    }

    let encode = |v: &Value| {
        codec::json_to_component_value(v, &ty, &param.components)
            .map(|value| codec::encode_topic(&value))
            .map_err(invalid)
    };

    match value {
        Value::Array(options) if !matches!(ty, DynSolType::Tuple(_)) => {
            let topics = options.iter().map(encode).collect::<Result<Vec<_>>>()?;
            match topics.as_slice() {
                [] => Err(invalid("empty list of alternatives".to_string())),
                [single] => Ok(TopicFilter::Exact(*single)),
                _ => Ok(TopicFilter::AnyOf(topics)),
            }
        }
        single => encode(single).map(TopicFilter::Exact),
    }
}

/// Mutable builder for a live filter on one event.
#[derive(Debug, Clone)]
pub struct EventFilterBuilder {
    decoder: LogDecoder,
    contract_address: Option<Address>,
    options: FilterOptions,
}

impl EventFilterBuilder {
    pub fn new(event: Event, contract_address: Option<Address>) -> Self {
        Self {
            decoder: LogDecoder::new(event),
            contract_address,
            options: FilterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FilterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_block(mut self, block: BlockNumberOrTag) -> Self {
        self.options.from_block = Some(block);
        self
    }

    pub fn to_block(mut self, block: BlockNumberOrTag) -> Self {
        self.options.to_block = Some(block);
        self
    }

    pub fn block_hash(mut self, hash: B256) -> Self {
        self.options.block_hash = Some(hash);
        self
    }

    pub fn match_single(mut self, arg: &str, value: Value) -> Self {
        self.options.argument_filters.insert(arg.to_string(), value);
        self
    }

    pub fn match_any(mut self, arg: &str, values: Vec<Value>) -> Self {
        self.options
            .argument_filters
            .insert(arg.to_string(), Value::Array(values));
        self
    }

    pub fn event(&self) -> &Event {
        self.decoder.event()
    }

    pub fn build(&self) -> Result<FilterParams> {
        build_filter_params(self.decoder.event(), self.contract_address, &self.options)
    }

    /// Installs the filter on the node via `eth_newFilter`.
    pub async fn deploy(self, transport: &dyn RpcTransport) -> Result<LiveFilter> {
        let params = self.build()?;
        let raw = transport
            .request(ETH_NEW_FILTER, json!([to_rpc_value(&params)?]))
            .await?;
        let filter_id: String = from_rpc_value(raw)?;
        info!(
            "Installed filter {} for event '{}' via {}",
            filter_id,
            self.decoder.event().name,
            transport.url()
        );

        Ok(LiveFilter {
            filter_id,
            params,
            decoder: self.decoder.clone(),
            builder: self,
        })
    }
}

/// Handle to a node-side filter.
///
/// Polling and uninstalling belong to the caller; the handle only knows how
/// to decode what the node returns for it.
#[derive(Debug, Clone)]
pub struct LiveFilter {
    filter_id: String,
    params: FilterParams,
    decoder: LogDecoder,
    builder: EventFilterBuilder,
}

impl LiveFilter {
    pub fn filter_id(&self) -> &str {
        &self.filter_id
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn builder(&self) -> &EventFilterBuilder {
        &self.builder
    }

    pub fn format_entry(&self, entry: &LogEntry) -> Result<DecodedEvent> {
        self.decoder.decode(entry)
    }

    /// Decodes a raw `eth_getFilterChanges` / `eth_getFilterLogs` result.
    pub fn format_entries(&self, raw: Value) -> Result<Vec<DecodedEvent>> {
        self.decoder.decode_raw(raw)
    }
}

/// One event of a contract handle.
#[derive(Clone)]
pub struct ContractEvent {
    contract: Contract,
    event: Event,
}

impl std::fmt::Debug for ContractEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractEvent")
            .field("address", &self.contract.address())
            .field("event", &self.event.signature())
            .finish()
    }
}

impl ContractEvent {
    pub(crate) fn new(contract: Contract, event: Event) -> Self {
        Self { contract, event }
    }

    pub fn abi(&self) -> &Event {
        &self.event
    }

    pub fn topic(&self) -> Option<B256> {
        event_topic(&self.event)
    }

    pub fn filter_params(&self, options: &FilterOptions) -> Result<FilterParams> {
        build_filter_params(&self.event, self.contract.address(), options)
    }

    /// Decodes one log entry emitted by this event.
    pub fn process_log(&self, log: &LogEntry) -> Result<DecodedEvent> {
        super::logs::decode_log(&self.event, log)
    }

    /// Stateless query through `eth_getLogs`; nothing is installed node-side.
    pub async fn get_logs(&self, options: &FilterOptions) -> Result<Vec<DecodedEvent>> {
        let params = self.filter_params(options)?;
        let transport = self.contract.transport()?;
        debug!("eth_getLogs for '{}': {:?}", self.event.name, params);

        let raw = transport
            .request(ETH_GET_LOGS, json!([to_rpc_value(&params)?]))
            .await?;
        let entries: Vec<LogEntry> = from_rpc_value(raw)?;
        entries.iter().map(|entry| self.process_log(entry)).collect()
    }

    /// Registers a filter on the node and returns a handle that decodes the
    /// entries it yields.
    pub async fn create_filter(&self, options: FilterOptions) -> Result<LiveFilter> {
        if options.from_block.is_none() && options.block_hash.is_none() {
            return Err(ContractError::InvalidFilterParams(
                "create_filter requires fromBlock".to_string(),
            ));
        }
        let transport = self.contract.transport()?;
        let builder = EventFilterBuilder::new(self.event.clone(), self.contract.address())
            .with_options(options);
        builder.deploy(&**transport).await
    }

    /// A builder preloaded with this contract's address.
    pub fn build_filter(&self) -> EventFilterBuilder {
        EventFilterBuilder::new(self.event.clone(), self.contract.address())
    }
}
