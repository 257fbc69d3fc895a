//! EIP-3668 offchain lookups. A read-only call that reverts with
//! `OffchainLookup` is answered by one of the gateways the contract names,
//! then retried through the contract's callback.

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes},
    rpc::types::{TransactionInput, TransactionRequest},
    sol,
    sol_types::SolError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{debug, warn};

use super::{
    transport::{RpcTransport, ETH_CALL},
    tx::to_rpc_value,
};
use crate::error::{ContractError, Result, TransportError};

/// Lookups followed for one call before giving up.
pub const MAX_REDIRECTS: usize = 4;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    error OffchainLookup(address sender, string[] urls, bytes callData, bytes4 callbackFunction, bytes extraData);
}

/// How a gateway request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// 4xx: the lookup itself is invalid, other URLs are not tried.
    Rejected(String),
    /// 5xx, connection or body errors: the next URL is tried.
    Unavailable(String),
}

/// Answers the `callData` of an offchain lookup.
#[async_trait]
pub trait CcipGateway: Send + Sync + 'static {
    /// `url` is the template from the revert, `{sender}` and `{data}` not
    /// yet substituted.
    async fn fetch(&self, url: &str, sender: Address, call_data: &Bytes) -> Result<Bytes, GatewayError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpGateway {
    client: Client,
}

#[derive(Deserialize)]
struct GatewayResponse {
    data: Bytes,
}

#[async_trait]
impl CcipGateway for HttpGateway {
    async fn fetch(&self, url: &str, sender: Address, call_data: &Bytes) -> Result<Bytes, GatewayError> {
        let sender_hex = format!("0x{}", hex::encode(sender));
        let data_hex = format!("0x{}", hex::encode(call_data));
        let target = url.replace("{sender}", &sender_hex).replace("{data}", &data_hex);

        // GET when the template carries the data, POST otherwise
        let request = if url.contains("{data}") {
            self.client.get(&target)
        } else {
            self.client
                .post(&target)
                .json(&json!({ "data": data_hex, "sender": sender_hex }))
        };

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("{}: {}", target, e)))?;
        let status = response.status();
        if status.is_client_error() {
            return Err(GatewayError::Rejected(format!("{} returned {}", target, status)));
        }
        if !status.is_success() {
            return Err(GatewayError::Unavailable(format!("{} returned {}", target, status)));
        }

        response
            .json::<GatewayResponse>()
            .await
            .map(|body| body.data)
            .map_err(|e| GatewayError::Unavailable(format!("{}: invalid response: {}", target, e)))
    }
}

/// The `OffchainLookup` carried by a reverted call, if any.
pub fn offchain_lookup(err: &TransportError) -> Option<OffchainLookup> {
    let TransportError::Rpc { data: Some(data), .. } = err else {
        return None;
    };
    let revert = revert_data(data)?;
    if !revert.starts_with(&OffchainLookup::SELECTOR) {
        return None;
    }
    OffchainLookup::abi_decode(&revert, true).ok()
}

/// Nodes report revert data as a hex string, sometimes nested under `data`.
fn revert_data(raw: &str) -> Option<Bytes> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(hex)) => Bytes::from_str(&hex).ok(),
        Ok(Value::Object(object)) => object
            .get("data")
            .and_then(|inner| revert_data(&inner.to_string())),
        _ => Bytes::from_str(raw.trim()).ok(),
    }
}

fn callback_data(lookup: &OffchainLookup, response: Bytes) -> Bytes {
    let args = DynSolValue::Tuple(vec![
        DynSolValue::Bytes(response.to_vec()),
        DynSolValue::Bytes(lookup.extraData.to_vec()),
    ]);
    let mut data = lookup.callbackFunction.to_vec();
    data.extend(args.abi_encode_params());
    data.into()
}

async fn query_gateways(gateway: &dyn CcipGateway, lookup: &OffchainLookup) -> Result<Bytes> {
    let mut last_failure = None;
    for url in &lookup.urls {
        match gateway.fetch(url, lookup.sender, &lookup.callData).await {
            Ok(data) => return Ok(data),
            Err(GatewayError::Rejected(reason)) => return Err(ContractError::OffchainLookup(reason)),
            Err(GatewayError::Unavailable(reason)) => {
                warn!("Offchain gateway failed, trying next: {}", reason);
                last_failure = Some(reason);
            }
        }
    }
    Err(ContractError::OffchainLookup(
        last_failure.unwrap_or_else(|| "lookup names no gateway URLs".to_string()),
    ))
}

/// Answers `lookup` and re-issues the call through the callback, following
/// further lookups up to [`MAX_REDIRECTS`]. `tail` holds the `eth_call`
/// parameters after the transaction (block, state override).
pub(crate) async fn follow(
    transport: &dyn RpcTransport,
    gateway: &dyn CcipGateway,
    mut request: TransactionRequest,
    tail: &[Value],
    mut lookup: OffchainLookup,
) -> Result<Value> {
    let target = request.to.and_then(|kind| kind.to().copied());

    for _ in 0..MAX_REDIRECTS {
        if Some(lookup.sender) != target {
            return Err(ContractError::OffchainLookup(format!(
                "lookup sender {} is not the called contract",
                lookup.sender
            )));
        }
        debug!("Offchain lookup for {} via {} gateway(s)", lookup.sender, lookup.urls.len());

        let response = query_gateways(gateway, &lookup).await?;
        request.input = TransactionInput::both(callback_data(&lookup, response));

        let mut params = vec![to_rpc_value(&request)?];
        params.extend(tail.iter().cloned());
        match transport.request(ETH_CALL, Value::Array(params)).await {
            Ok(raw) => return Ok(raw),
            Err(err) => match offchain_lookup(&err) {
                Some(next) => lookup = next,
                None => return Err(err.into()),
            },
        }
    }

    Err(ContractError::OffchainLookup(format!(
        "more than {} redirects",
        MAX_REDIRECTS
    )))
}
