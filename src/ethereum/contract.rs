use alloy::{
    eips::BlockId,
    json_abi::{Event, Function},
    primitives::{Address, Bytes},
};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{
    ccip::{CcipGateway, HttpGateway},
    events::ContractEvent,
    function::{BoundFunction, CallOptions, ContractConstructor, ContractFunction, ReturnValue},
    registry::AbiRegistry,
    resolver::{self, Identifier},
    transport::RpcTransport,
    tx::{NodeTxDefaults, TxDefaults, TxParams},
};
use crate::error::{ContractError, Result};

struct ContractInner {
    registry: AbiRegistry,
    address: Option<Address>,
    bytecode: Option<Bytes>,
    transport: Option<Arc<dyn RpcTransport>>,
    tx_defaults: Arc<dyn TxDefaults>,
    ccip_gateway: Arc<dyn CcipGateway>,
    default_account: Option<Address>,
}

/// A contract interface bound to an optional address, bytecode and node.
///
/// Cheap to clone; every proxy handed out shares the same read-only state.
#[derive(Clone)]
pub struct Contract {
    inner: Arc<ContractInner>,
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract")
            .field("address", &self.inner.address)
            .field("functions", &self.inner.registry.functions().count())
            .field("events", &self.inner.registry.events().count())
            .field("bytecode", &self.inner.bytecode.as_ref().map(|b| b.len()))
            .field("transport", &self.inner.transport.as_ref().map(|t| t.url()))
            .finish()
    }
}

pub struct ContractBuilder {
    registry: AbiRegistry,
    address: Option<Address>,
    bytecode: Option<Bytes>,
    transport: Option<Arc<dyn RpcTransport>>,
    tx_defaults: Arc<dyn TxDefaults>,
    ccip_gateway: Arc<dyn CcipGateway>,
    default_account: Option<Address>,
}

impl ContractBuilder {
    pub fn new(registry: AbiRegistry) -> Self {
        Self {
            registry,
            address: None,
            bytecode: None,
            transport: None,
            tx_defaults: Arc::new(NodeTxDefaults),
            ccip_gateway: Arc::new(HttpGateway::default()),
            default_account: None,
        }
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn bytecode(mut self, bytecode: Bytes) -> Self {
        self.bytecode = Some(bytecode);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn tx_defaults(mut self, tx_defaults: Arc<dyn TxDefaults>) -> Self {
        self.tx_defaults = tx_defaults;
        self
    }

    /// Answers EIP-3668 offchain lookups raised by read-only calls.
    pub fn ccip_gateway(mut self, gateway: Arc<dyn CcipGateway>) -> Self {
        self.ccip_gateway = gateway;
        self
    }

    /// Account used as `from` when the caller supplies none.
    pub fn default_account(mut self, account: Address) -> Self {
        self.default_account = Some(account);
        self
    }

    pub fn build(self) -> Contract {
        Contract {
            inner: Arc::new(ContractInner {
                registry: self.registry,
                address: self.address,
                bytecode: self.bytecode,
                transport: self.transport,
                tx_defaults: self.tx_defaults,
                ccip_gateway: self.ccip_gateway,
                default_account: self.default_account,
            }),
        }
    }
}

impl Contract {
    /// Starts a builder from a JSON ABI document.
    pub fn builder(abi_json: &str) -> serde_json::Result<ContractBuilder> {
        AbiRegistry::from_json(abi_json).map(ContractBuilder::new)
    }

    pub fn address(&self) -> Option<Address> {
        self.inner.address
    }

    pub fn registry(&self) -> &AbiRegistry {
        &self.inner.registry
    }

    pub fn bytecode(&self) -> Option<&Bytes> {
        self.inner.bytecode.as_ref()
    }

    pub fn default_account(&self) -> Option<Address> {
        self.inner.default_account
    }

    pub(crate) fn tx_defaults(&self) -> &dyn TxDefaults {
        self.inner.tx_defaults.as_ref()
    }

    pub(crate) fn ccip_gateway(&self) -> &dyn CcipGateway {
        self.inner.ccip_gateway.as_ref()
    }

    pub fn transport(&self) -> Result<&Arc<dyn RpcTransport>> {
        self.inner.transport.as_ref().ok_or(ContractError::NotInitialized)
    }

    /// Proxy for a function name, canonical signature or `0x` selector.
    pub fn function(&self, identifier: &str) -> Result<ContractFunction> {
        let identifier = Identifier::parse(identifier);
        let registry = self.registry();
        let exists = match &identifier {
            Identifier::Name(name) => !registry.functions_named(name).is_empty(),
            Identifier::Signature(signature) => registry.function_by_signature(signature).is_some(),
            Identifier::Selector(selector) => registry.function_by_selector(*selector).is_some(),
            Identifier::Topic(_) => false,
        };
        if !exists {
            return Err(ContractError::NotFound {
                kind: "function",
                identifier: identifier.to_string(),
            });
        }
        Ok(ContractFunction::named(self.clone(), identifier))
    }

    /// Resolves `identifier` against the arguments, the way dispatch does.
    pub fn find_function(
        &self,
        identifier: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<&Function> {
        resolver::resolve_function(self.registry(), &Identifier::parse(identifier), args, kwargs)
    }

    /// Proxy for an event name, canonical signature or topic 0.
    pub fn event(&self, identifier: &str) -> Result<ContractEvent> {
        let event = self.find_event(identifier)?.clone();
        Ok(ContractEvent::new(self.clone(), event))
    }

    pub fn find_event(&self, identifier: &str) -> Result<&Event> {
        resolver::resolve_event(self.registry(), &Identifier::parse(identifier))
    }

    pub fn constructor(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<ContractConstructor> {
        ContractConstructor::new(self.clone(), args, kwargs)
    }

    pub fn fallback(&self) -> Result<ContractFunction> {
        match self.registry().fallback() {
            Some(_) => Ok(ContractFunction::fallback(self.clone())),
            None => Err(ContractError::NotFound {
                kind: "fallback",
                identifier: "fallback()".to_string(),
            }),
        }
    }

    pub fn receive(&self) -> Result<ContractFunction> {
        match self.registry().receive() {
            Some(_) => Ok(ContractFunction::receive(self.clone())),
            None => Err(ContractError::NotFound {
                kind: "receive",
                identifier: "receive()".to_string(),
            }),
        }
    }

    /// Read-only facade calling at "latest" with default parameters.
    pub fn caller(&self) -> ContractCaller {
        ContractCaller {
            contract: self.clone(),
            options: CallOptions::default(),
        }
    }
}

/// Invokes functions directly by name and returns decoded results.
#[derive(Debug, Clone)]
pub struct ContractCaller {
    contract: Contract,
    options: CallOptions,
}

impl ContractCaller {
    /// A new caller with a different transaction and block context.
    pub fn with_context(&self, tx: TxParams, block: BlockId) -> Self {
        Self {
            contract: self.contract.clone(),
            options: CallOptions {
                tx,
                block,
                ..self.options.clone()
            },
        }
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    pub async fn call(&self, identifier: &str, args: Vec<Value>) -> Result<ReturnValue> {
        self.call_with(identifier, args, Map::new()).await
    }

    pub async fn call_with(
        &self,
        identifier: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<ReturnValue> {
        let bound: BoundFunction = self.contract.function(identifier)?.bind_with(args, kwargs)?;
        bound.call(&self.options).await
    }
}
