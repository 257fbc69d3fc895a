//! Raw log entries and their decoding into named event arguments.

use alloy::{
    dyn_abi::{DynSolValue, EventExt},
    json_abi::Event,
    primitives::{Address, Bytes, B256, U64},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::codec;
use crate::error::{ContractError, Result};

/// A log entry as returned by `eth_getLogs` / `eth_getFilterChanges`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub block_hash: Option<B256>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub transaction_index: Option<U64>,
    #[serde(default)]
    pub log_index: Option<U64>,
    #[serde(default)]
    pub removed: bool,
}

impl LogEntry {
    fn describe(&self) -> String {
        match (self.transaction_hash, self.log_index) {
            (Some(tx), Some(index)) => format!("{}#{}", tx, index),
            (Some(tx), None) => tx.to_string(),
            _ => format!("from {}", self.address),
        }
    }
}

/// An event decoded from a [`LogEntry`].
///
/// A detached view: it keeps no reference to the filter or node it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub event: String,
    /// Arguments keyed by parameter name, in declaration order.
    pub args: IndexMap<String, DynSolValue>,
    pub address: Address,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub transaction_hash: Option<B256>,
    pub transaction_index: Option<u64>,
    pub log_index: Option<u64>,
}

impl DecodedEvent {
    pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
        self.args.get(name)
    }

    pub fn to_json(&self) -> Value {
        let args: serde_json::Map<String, Value> = self
            .args
            .iter()
            .map(|(name, value)| (name.clone(), codec::dyn_sol_value_to_json(value)))
            .collect();
        json!({
            "event": self.event,
            "args": args,
            "address": self.address.to_checksum(None),
            "blockNumber": self.block_number,
            "blockHash": self.block_hash,
            "transactionHash": self.transaction_hash,
            "transactionIndex": self.transaction_index,
            "logIndex": self.log_index,
        })
    }
}

/// Decodes `log` as an occurrence of `event`.
///
/// Topics after the selector map positionally onto the indexed parameters,
/// the data payload onto the rest. Any mismatch fails the whole entry.
pub fn decode_log(event: &Event, log: &LogEntry) -> Result<DecodedEvent> {
    let decode_error = |reason: String| ContractError::LogDecode {
        event: event.signature(),
        log: log.describe(),
        reason,
    };

    let decoded = event
        .decode_log_parts(log.topics.iter().copied(), &log.data, true)
        .map_err(|e| decode_error(e.to_string()))?;

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut args = IndexMap::with_capacity(event.inputs.len());
    for (position, param) in event.inputs.iter().enumerate() {
        let source = if param.indexed { indexed.next() } else { body.next() };
        let value = source.ok_or_else(|| {
            decode_error(format!("missing value for parameter '{}'", param.name))
        })?;
        let name = if param.name.is_empty() {
            position.to_string()
        } else {
            param.name.clone()
        };
        args.insert(name, value);
    }

    Ok(DecodedEvent {
        event: event.name.clone(),
        args,
        address: log.address,
        block_number: log.block_number.map(|n| n.to()),
        block_hash: log.block_hash,
        transaction_hash: log.transaction_hash,
        transaction_index: log.transaction_index.map(|n| n.to()),
        log_index: log.log_index.map(|n| n.to()),
    })
}

/// Decoder bound to one event, stored by filters to format new entries.
#[derive(Debug, Clone)]
pub struct LogDecoder {
    event: Event,
}

impl LogDecoder {
    pub fn new(event: Event) -> Self {
        Self { event }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn decode(&self, log: &LogEntry) -> Result<DecodedEvent> {
        decode_log(&self.event, log)
    }

    /// Decodes a raw RPC array of log objects.
    pub fn decode_raw(&self, raw: Value) -> Result<Vec<DecodedEvent>> {
        let entries: Vec<LogEntry> = serde_json::from_value(raw).map_err(|e| {
            ContractError::LogDecode {
                event: self.event.signature(),
                log: "<rpc result>".to_string(),
                reason: e.to_string(),
            }
        })?;
        entries.iter().map(|entry| self.decode(entry)).collect()
    }
}
