//! The transport seam between the contract layer and a node's JSON-RPC API.

use alloy::{
    providers::{Provider, ProviderBuilder, RootProvider},
    transports::{
        http::{Client, Http},
        RpcError, TransportErrorKind,
    },
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;

pub const ETH_CALL: &str = "eth_call";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const ETH_ESTIMATE_GAS: &str = "eth_estimateGas";
pub const ETH_GET_LOGS: &str = "eth_getLogs";
pub const ETH_NEW_FILTER: &str = "eth_newFilter";
pub const ETH_GET_FILTER_CHANGES: &str = "eth_getFilterChanges";
pub const ETH_GET_FILTER_LOGS: &str = "eth_getFilterLogs";
pub const ETH_UNINSTALL_FILTER: &str = "eth_uninstallFilter";
pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_GAS_PRICE: &str = "eth_gasPrice";

/// Performs one named JSON-RPC request and returns the raw `result`.
///
/// Implementations own timeouts and cancellation. Nothing above this trait
/// retries.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// `params` is the positional parameter array.
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Endpoint identifier, for logs.
    fn url(&self) -> &str;
}

/// HTTP transport backed by an alloy provider.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    provider: RootProvider<Http<Client>>,
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(rpc_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        Ok(Self {
            provider,
            url: rpc_url.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        debug!("-> {} {}", method, params);
        let fut = self.provider.raw_request(method.to_string().into(), params);

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(map_rpc_error),
            Err(_) => Err(TransportError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

fn map_rpc_error(err: RpcError<TransportErrorKind>) -> TransportError {
    if let Some(payload) = err.as_error_resp() {
        return TransportError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
            data: payload.data.as_ref().map(|d| d.get().to_string()),
        };
    }
    match err {
        RpcError::DeserError { err, .. } => TransportError::Deserialization(err),
        RpcError::NullResp => TransportError::Http("node returned an empty response".to_string()),
        RpcError::Transport(TransportErrorKind::BackendGone) => {
            TransportError::Cancelled("transport backend shut down".to_string())
        }
        other => TransportError::Http(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays scripted responses per method and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        replies: Mutex<HashMap<String, VecDeque<Result<Value, TransportError>>>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(&self, method: &str, result: Value) -> &Self {
            self.push(method, Ok(result))
        }

        pub(crate) fn fail(&self, method: &str, err: TransportError) -> &Self {
            self.push(method, Err(err))
        }

        fn push(&self, method: &str, reply: Result<Value, TransportError>) -> &Self {
            self.replies
                .lock()
                .unwrap()
                .entry(method.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        pub(crate) fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, method: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|(m, _)| m == method).count()
        }

        pub(crate) fn last_params(&self, method: &str) -> Option<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(m, _)| m == method)
                .map(|(_, p)| p.clone())
        }
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            self.replies
                .lock()
                .unwrap()
                .get_mut(method)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(TransportError::Http(format!("no mock reply for {}", method))))
        }

        fn url(&self) -> &str {
            "mock://node"
        }
    }
}
