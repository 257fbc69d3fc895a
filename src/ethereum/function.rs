//! Function proxies and the four dispatch paths: call, transact,
//! estimate_gas and build_transaction.

use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    eips::BlockId,
    json_abi::{Constructor, Function, Param},
    primitives::{Bytes, B256, U64},
    rpc::types::{state::StateOverride, TransactionRequest},
};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{
    ccip, codec,
    contract::Contract,
    resolver::{self, Identifier},
    transport::{ETH_CALL, ETH_ESTIMATE_GAS, ETH_SEND_TRANSACTION},
    tx::{block_param, from_rpc_value, to_rpc_value, TxParams},
};
use crate::error::{ContractError, Result};

/// Decoded result of a read-only call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    /// The function declares no outputs.
    Empty,
    Single(DynSolValue),
    Tuple(Vec<DynSolValue>),
    /// Several outputs, all of them named.
    Named(IndexMap<String, DynSolValue>),
}

impl ReturnValue {
    fn from_outputs(outputs: &[Param], mut values: Vec<DynSolValue>) -> Self {
        match values.len() {
            0 => Self::Empty,
            1 => Self::Single(values.remove(0)),
            _ if outputs.iter().all(|p| !p.name.is_empty()) => Self::Named(
                outputs
                    .iter()
                    .map(|p| p.name.clone())
                    .zip(values)
                    .collect(),
            ),
            _ => Self::Tuple(values),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Single(value) => codec::dyn_sol_value_to_json(value),
            Self::Tuple(values) => codec::dyn_sol_values_to_json(values),
            Self::Named(values) => Value::Object(
                values
                    .iter()
                    .map(|(name, value)| (name.clone(), codec::dyn_sol_value_to_json(value)))
                    .collect(),
            ),
        }
    }
}

/// Context for a read-only call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub tx: TxParams,
    pub block: BlockId,
    /// Sent as the third `eth_call` parameter, untouched.
    pub state_override: Option<StateOverride>,
    /// Follow EIP-3668 `OffchainLookup` reverts through the contract's
    /// gateway. On by default.
    pub ccip_read: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            tx: TxParams::default(),
            block: BlockId::latest(),
            state_override: None,
            ccip_read: true,
        }
    }
}

impl CallOptions {
    pub fn at_block(block: BlockId) -> Self {
        Self {
            block,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Function(Identifier),
    Fallback,
    Receive,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function(identifier) => write!(f, "{}", identifier),
            Self::Fallback => f.write_str("fallback()"),
            Self::Receive => f.write_str("receive()"),
        }
    }
}

/// Unbound proxy for one function name, signature or selector.
#[derive(Debug, Clone)]
pub struct ContractFunction {
    contract: Contract,
    target: Target,
}

impl ContractFunction {
    pub(crate) fn named(contract: Contract, identifier: Identifier) -> Self {
        Self {
            contract,
            target: Target::Function(identifier),
        }
    }

    pub(crate) fn fallback(contract: Contract) -> Self {
        Self {
            contract,
            target: Target::Fallback,
        }
    }

    pub(crate) fn receive(contract: Contract) -> Self {
        Self {
            contract,
            target: Target::Receive,
        }
    }

    pub fn identifier(&self) -> String {
        self.target.to_string()
    }

    pub fn bind(&self, args: Vec<Value>) -> Result<BoundFunction> {
        self.bind_with(args, Map::new())
    }

    /// Binds positional and keyword arguments, resolving overloads.
    pub fn bind_with(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<BoundFunction> {
        let abi = match &self.target {
            Target::Function(identifier) => Some(
                resolver::resolve_function(self.contract.registry(), identifier, &args, &kwargs)?
                    .clone(),
            ),
            _ if args.is_empty() && kwargs.is_empty() => None,
            target => {
                return Err(ContractError::Encoding {
                    signature: target.to_string(),
                    reason: "takes no arguments".to_string(),
                })
            }
        };

        Ok(BoundFunction {
            contract: self.contract.clone(),
            target: self.target.clone(),
            args,
            kwargs,
            abi,
        })
    }
}

/// A proxy with arguments applied. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct BoundFunction {
    contract: Contract,
    target: Target,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    abi: Option<Function>,
}

impl BoundFunction {
    /// The entry resolved at bind time; `None` for fallback and receive.
    pub fn abi(&self) -> Option<&Function> {
        self.abi.as_ref()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn signature(&self) -> String {
        match &self.abi {
            Some(function) => function.signature(),
            None => self.target.to_string(),
        }
    }

    /// A new proxy for the same identifier with different arguments.
    pub fn rebind(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<BoundFunction> {
        ContractFunction {
            contract: self.contract.clone(),
            target: self.target.clone(),
        }
        .bind_with(args, kwargs)
    }

    /// Encoded call data for the current arguments.
    pub fn calldata(&self) -> Result<Bytes> {
        self.prepare().map(|(_, data)| data)
    }

    fn prepare(&self) -> Result<(Option<Function>, Bytes)> {
        match &self.target {
            Target::Function(identifier) => {
                let function = resolver::resolve_function(
                    self.contract.registry(),
                    identifier,
                    &self.args,
                    &self.kwargs,
                )?;
                let data = encode_call(function, &self.args, &self.kwargs)?;
                Ok((Some(function.clone()), data))
            }
            Target::Fallback | Target::Receive => Ok((None, Bytes::new())),
        }
    }

    fn transaction(&self, tx: &TxParams, data: Bytes, operation: &str) -> Result<TransactionRequest> {
        let request = tx.merge(self.contract.address(), data, self.contract.default_account())?;
        if request.to.is_none() {
            return Err(ContractError::MissingAddress {
                operation: format!("{} {}", operation, self.target),
            });
        }
        Ok(request)
    }

    /// Executes the function read-only through `eth_call`.
    pub async fn call(&self, options: &CallOptions) -> Result<ReturnValue> {
        let (function, data) = self.prepare()?;
        let request = self.transaction(&options.tx, data, "call")?;
        let transport = self.contract.transport()?;

        let mut tail = vec![block_param(&options.block)?];
        if let Some(state_override) = &options.state_override {
            tail.push(to_rpc_value(state_override)?);
        }
        let mut params = vec![to_rpc_value(&request)?];
        params.extend(tail.iter().cloned());
        debug!("eth_call {} at {:?}", self.target, options.block);

        let raw = match transport.request(ETH_CALL, Value::Array(params)).await {
            Ok(raw) => raw,
            Err(err) => match ccip::offchain_lookup(&err).filter(|_| options.ccip_read) {
                Some(lookup) => {
                    let gateway = self.contract.ccip_gateway();
                    ccip::follow(&**transport, gateway, request, &tail, lookup).await?
                }
                None => return Err(err.into()),
            },
        };
        let output: Bytes = from_rpc_value(raw)?;
        match function {
            Some(function) => decode_output(&function, &output),
            None => Ok(ReturnValue::Empty),
        }
    }

    /// Submits the call through `eth_sendTransaction` and returns the hash
    /// without waiting for a receipt.
    pub async fn transact(&self, tx: &TxParams) -> Result<B256> {
        let (_, data) = self.prepare()?;
        let request = self.transaction(tx, data, "transact")?;
        let transport = self.contract.transport()?;

        let raw = transport
            .request(ETH_SEND_TRANSACTION, json!([to_rpc_value(&request)?]))
            .await?;
        let hash: B256 = from_rpc_value(raw)?;
        info!("Submitted {} via {}: {}", self.signature(), transport.url(), hash);
        Ok(hash)
    }

    pub async fn estimate_gas(&self, tx: &TxParams, block: Option<BlockId>) -> Result<u64> {
        let (_, data) = self.prepare()?;
        let request = self.transaction(tx, data, "estimate_gas")?;
        let transport = self.contract.transport()?;

        let mut params = vec![to_rpc_value(&request)?];
        if let Some(block) = &block {
            params.push(block_param(block)?);
        }
        let gas: U64 = from_rpc_value(transport.request(ETH_ESTIMATE_GAS, Value::Array(params)).await?)?;
        Ok(gas.to())
    }

    /// The complete transaction, defaults filled, ready for external signing.
    pub async fn build_transaction(&self, tx: &TxParams) -> Result<TransactionRequest> {
        let (_, data) = self.prepare()?;
        let request = self.transaction(tx, data, "build_transaction")?;
        let transport = self.contract.transport()?;
        self.contract.tx_defaults().fill(&**transport, request).await
    }
}

pub(crate) fn encode_call(
    function: &Function,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> Result<Bytes> {
    let encoding = |reason: String| ContractError::Encoding {
        signature: function.signature(),
        reason,
    };
    let merged = resolver::merge_args(&function.inputs, args, kwargs).map_err(encoding)?;
    let values = codec::coerce_args(&function.inputs, &merged).map_err(encoding)?;
    let data = function
        .abi_encode_input(&values)
        .map_err(|e| encoding(e.to_string()))?;
    Ok(data.into())
}

pub(crate) fn decode_output(function: &Function, output: &[u8]) -> Result<ReturnValue> {
    let decoding = |reason: String| ContractError::Decoding {
        signature: function.signature(),
        reason,
    };
    if output.is_empty() && !function.outputs.is_empty() {
        return Err(decoding(
            "call returned no data; is the contract deployed and the chain synced?".to_string(),
        ));
    }
    let values = function
        .abi_decode_output(output, false)
        .map_err(|e| decoding(e.to_string()))?;
    Ok(ReturnValue::from_outputs(&function.outputs, values))
}

fn constructor_signature(constructor: &Constructor) -> String {
    let types: Vec<_> = constructor.inputs.iter().map(|p| p.selector_type()).collect();
    format!("constructor({})", types.join(","))
}

/// Deployment of the contract's bytecode with constructor arguments.
#[derive(Debug, Clone)]
pub struct ContractConstructor {
    contract: Contract,
    bytecode: Bytes,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl ContractConstructor {
    pub(crate) fn new(contract: Contract, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Self> {
        let bytecode = contract.bytecode().cloned().ok_or(ContractError::NoBytecode)?;
        let constructor = Self {
            contract,
            bytecode,
            args,
            kwargs,
        };
        constructor.data()?;
        Ok(constructor)
    }

    /// Bytecode followed by the encoded constructor arguments.
    pub fn data(&self) -> Result<Bytes> {
        let encoded = match self.contract.registry().constructor() {
            Some(constructor) => {
                let encoding = |reason: String| ContractError::Encoding {
                    signature: constructor_signature(constructor),
                    reason,
                };
                let merged = resolver::merge_args(&constructor.inputs, &self.args, &self.kwargs)
                    .map_err(encoding)?;
                let values = codec::coerce_args(&constructor.inputs, &merged).map_err(encoding)?;
                constructor
                    .abi_encode_input(&values)
                    .map_err(|e| encoding(e.to_string()))?
            }
            None if self.args.is_empty() && self.kwargs.is_empty() => Vec::new(),
            None => {
                return Err(ContractError::Encoding {
                    signature: "constructor()".to_string(),
                    reason: "the ABI declares no constructor arguments".to_string(),
                })
            }
        };

        let mut data = self.bytecode.to_vec();
        data.extend_from_slice(&encoded);
        Ok(data.into())
    }

    fn transaction(&self, tx: &TxParams) -> Result<TransactionRequest> {
        if tx.to.is_some() {
            return Err(ContractError::ConflictingParams { field: "to" });
        }
        tx.merge(None, self.data()?, self.contract.default_account())
    }

    pub async fn transact(&self, tx: &TxParams) -> Result<B256> {
        let request = self.transaction(tx)?;
        let transport = self.contract.transport()?;
        let raw = transport
            .request(ETH_SEND_TRANSACTION, json!([to_rpc_value(&request)?]))
            .await?;
        let hash: B256 = from_rpc_value(raw)?;
        info!("Submitted deployment via {}: {}", transport.url(), hash);
        Ok(hash)
    }

    pub async fn estimate_gas(&self, tx: &TxParams, block: Option<BlockId>) -> Result<u64> {
        let request = self.transaction(tx)?;
        let transport = self.contract.transport()?;
        let mut params = vec![to_rpc_value(&request)?];
        if let Some(block) = &block {
            params.push(block_param(block)?);
        }
        let gas: U64 = from_rpc_value(transport.request(ETH_ESTIMATE_GAS, Value::Array(params)).await?)?;
        Ok(gas.to())
    }

    pub async fn build_transaction(&self, tx: &TxParams) -> Result<TransactionRequest> {
        let request = self.transaction(tx)?;
        let transport = self.contract.transport()?;
        self.contract.tx_defaults().fill(&**transport, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::ethereum::{
        registry::tests::TOKEN_ABI,
        transport::{mock::MockTransport, ETH_CHAIN_ID, ETH_GAS_PRICE},
    };
    use alloy::primitives::{Address, TxKind, U256};
    use std::sync::Arc;

    const TOKEN: Address = Address::new([0xcc; 20]);
    const OWNER: Address = Address::new([0x0a; 20]);
    const ALICE: &str = "0x1111111111111111111111111111111111111111";

    fn contract(transport: &Arc<MockTransport>) -> Contract {
        Contract::builder(TOKEN_ABI)
            .unwrap()
            .address(TOKEN)
            .default_account(OWNER)
            .transport(transport.clone())
            .build()
    }

    fn sent(transport: &MockTransport, method: &str) -> TransactionRequest {
        let params = transport.last_params(method).unwrap();
        serde_json::from_value(params[0].clone()).unwrap()
    }

    fn word(value: u64) -> Value {
        json!(Bytes::from(DynSolValue::Uint(U256::from(value), 256).abi_encode()))
    }

    #[tokio::test]
    async fn call_decodes_single_output() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_CALL, word(1000));

        let balance = contract(&transport)
            .function("balanceOf")
            .unwrap()
            .bind(vec![json!(ALICE)])
            .unwrap();
        let result = balance.call(&CallOptions::default()).await.unwrap();

        assert_eq!(result, ReturnValue::Single(DynSolValue::Uint(U256::from(1000), 256)));
        assert_eq!(result.to_json(), json!("1000"));

        let params = transport.last_params(ETH_CALL).unwrap();
        assert_eq!(params[1], json!("latest"));
        let tx = sent(&transport, ETH_CALL);
        assert_eq!(tx.to, Some(TxKind::Call(TOKEN)));
        assert_eq!(tx.from, Some(OWNER));
        let data = tx.input.input().unwrap();
        assert_eq!(&data[..4], balance.abi().unwrap().selector().as_slice());
        assert_eq!(data.len(), 36);
    }

    #[tokio::test]
    async fn call_shapes_multiple_outputs() {
        let transport = Arc::new(MockTransport::new());
        let reserves = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(1), 112),
            DynSolValue::Uint(U256::from(2), 112),
        ]);
        let pair = DynSolValue::Tuple(vec![
            DynSolValue::Address(TOKEN),
            DynSolValue::Uint(U256::from(18), 8),
        ]);
        transport
            .reply(ETH_CALL, json!(Bytes::from(reserves.abi_encode_params())))
            .reply(ETH_CALL, json!(Bytes::from(pair.abi_encode_params())));
        let contract = contract(&transport);

        let named = contract
            .function("reserves")
            .unwrap()
            .bind(vec![])
            .unwrap()
            .call(&CallOptions::default())
            .await
            .unwrap();
        match &named {
            ReturnValue::Named(values) => {
                let keys: Vec<_> = values.keys().cloned().collect();
                assert_eq!(keys, vec!["reserve0", "reserve1"]);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
        assert_eq!(named.to_json()["reserve1"], json!("2"));

        let tuple = contract
            .function("pair")
            .unwrap()
            .bind(vec![])
            .unwrap()
            .call(&CallOptions::default())
            .await
            .unwrap();
        assert!(matches!(tuple, ReturnValue::Tuple(ref v) if v.len() == 2));
    }

    #[tokio::test]
    async fn empty_output_is_a_decoding_error() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_CALL, json!("0x"));
        let result = contract(&transport)
            .function("balanceOf")
            .unwrap()
            .bind(vec![json!(ALICE)])
            .unwrap()
            .call(&CallOptions::default())
            .await;
        assert!(matches!(result, Err(ContractError::Decoding { .. })));
    }

    #[tokio::test]
    async fn call_passes_block_and_state_override_through() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_CALL, word(1));
        let mut state_override = StateOverride::default();
        state_override.insert(TOKEN, Default::default());
        let options = CallOptions {
            block: BlockId::number(100),
            state_override: Some(state_override),
            ..Default::default()
        };

        contract(&transport)
            .function("balanceOf")
            .unwrap()
            .bind(vec![json!(ALICE)])
            .unwrap()
            .call(&options)
            .await
            .unwrap();

        let params = transport.last_params(ETH_CALL).unwrap();
        assert_eq!(params[1], json!("0x64"));
        assert!(params[2].is_object());
    }

    #[tokio::test]
    async fn resolution_errors_precede_any_request() {
        let transport = Arc::new(MockTransport::new());
        let transfer = contract(&transport).function("transfer").unwrap();
        assert!(matches!(
            transfer.bind(vec![json!(ALICE)]),
            Err(ContractError::NoMatchingOverload { .. })
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn rebinding_leaves_the_original_untouched() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_CALL, word(0)).reply(ETH_CALL, word(1));
        let contract = contract(&transport);

        let two = contract
            .function("transfer")
            .unwrap()
            .bind(vec![json!(ALICE), json!(5)])
            .unwrap();
        let three = two
            .rebind(vec![json!(ALICE), json!(5), json!("0x01")], Map::new())
            .unwrap();

        assert_eq!(two.signature(), "transfer(address,uint256)");
        assert_eq!(three.signature(), "transfer(address,uint256,bytes)");
        assert_eq!(two.args().len(), 2);

        // dispatch the rebound proxy first; the original must not see its state
        let three_result = three.call(&CallOptions::default()).await.unwrap();
        let two_result = two.call(&CallOptions::default()).await.unwrap();
        assert_eq!(three_result, ReturnValue::Single(DynSolValue::Bool(false)));
        assert_eq!(two_result, ReturnValue::Single(DynSolValue::Bool(true)));

        let sent_data: Vec<Bytes> = transport
            .calls()
            .iter()
            .map(|(_, params)| {
                let tx: TransactionRequest = serde_json::from_value(params[0].clone()).unwrap();
                tx.input.input().unwrap().clone()
            })
            .collect();
        assert_eq!(sent_data, vec![three.calldata().unwrap(), two.calldata().unwrap()]);
        assert_eq!(&sent_data[1][..4], two.abi().unwrap().selector().as_slice());
        assert_eq!(&sent_data[0][..4], three.abi().unwrap().selector().as_slice());
        assert_ne!(sent_data[0], sent_data[1]);
    }

    #[tokio::test]
    async fn offchain_lookups_are_followed_through_the_callback() {
        use crate::ethereum::ccip::tests::{lookup_revert, StaticGateway};

        let transport = Arc::new(MockTransport::new());
        transport
            .fail(ETH_CALL, lookup_revert(TOKEN, &["https://gateway/{sender}/{data}"]))
            .reply(ETH_CALL, word(42));
        let gateway = Arc::new(StaticGateway::answering(vec![Ok(Bytes::from(vec![0x01]))]));
        let contract = Contract::builder(TOKEN_ABI)
            .unwrap()
            .address(TOKEN)
            .transport(transport.clone())
            .ccip_gateway(gateway.clone())
            .build();
        let balance = contract.function("balanceOf").unwrap().bind(vec![json!(ALICE)]).unwrap();

        let result = balance.call(&CallOptions::default()).await.unwrap();
        assert_eq!(result.to_json(), json!("42"));
        assert_eq!(transport.count(ETH_CALL), 2);
        assert_eq!(
            *gateway.fetched.lock().unwrap(),
            vec!["https://gateway/{sender}/{data}".to_string()]
        );
        let callback = sent(&transport, ETH_CALL);
        assert_eq!(&callback.input.input().unwrap()[..4], &[0x12, 0x34, 0x56, 0x78]);

        transport.fail(ETH_CALL, lookup_revert(TOKEN, &["https://gateway"]));
        let disabled = CallOptions {
            ccip_read: false,
            ..Default::default()
        };
        assert!(matches!(
            balance.call(&disabled).await,
            Err(ContractError::Transport(TransportError::Rpc { .. }))
        ));
        assert_eq!(gateway.fetched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transact_returns_the_hash() {
        let transport = Arc::new(MockTransport::new());
        let hash = B256::repeat_byte(0xab);
        transport.reply(ETH_SEND_TRANSACTION, json!(hash));

        let kwargs = json!({ "amount": 5 }).as_object().cloned().unwrap();
        let got = contract(&transport)
            .function("transfer(address,uint256)")
            .unwrap()
            .bind_with(vec![json!(ALICE)], kwargs)
            .unwrap()
            .transact(&TxParams::new().value(U256::ZERO))
            .await
            .unwrap();

        assert_eq!(got, hash);
        let tx = sent(&transport, ETH_SEND_TRANSACTION);
        assert_eq!(tx.from, Some(OWNER));
        assert_eq!(tx.to, Some(TxKind::Call(TOKEN)));
    }

    #[tokio::test]
    async fn estimate_gas_propagates_reverts() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_ESTIMATE_GAS, json!("0x5208")).fail(
            ETH_ESTIMATE_GAS,
            TransportError::Rpc {
                code: 3,
                message: "execution reverted".into(),
                data: None,
            },
        );
        let transfer = contract(&transport)
            .function("transfer")
            .unwrap()
            .bind(vec![json!(ALICE), json!(5)])
            .unwrap();

        let gas = transfer
            .estimate_gas(&TxParams::new(), Some(BlockId::latest()))
            .await
            .unwrap();
        assert_eq!(gas, 21_000);
        assert_eq!(transport.last_params(ETH_ESTIMATE_GAS).unwrap()[1], json!("latest"));

        match transfer.estimate_gas(&TxParams::new(), None).await {
            Err(ContractError::Transport(err)) => assert!(err.is_execution_error()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeouts_are_not_swallowed() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(ETH_CALL, TransportError::Timeout { ms: 250 });
        let result = contract(&transport)
            .function("balanceOf")
            .unwrap()
            .bind(vec![json!(ALICE)])
            .unwrap()
            .call(&CallOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(ContractError::Transport(TransportError::Timeout { ms: 250 }))
        ));
        assert_eq!(transport.count(ETH_CALL), 1);
    }

    #[tokio::test]
    async fn build_transaction_fills_defaults_without_sending() {
        let transport = Arc::new(MockTransport::new());
        transport
            .reply(ETH_CHAIN_ID, json!("0x1"))
            .reply(ETH_GAS_PRICE, json!("0x2"))
            .reply(ETH_ESTIMATE_GAS, json!("0x7530"));

        let tx = contract(&transport)
            .function("transfer")
            .unwrap()
            .bind(vec![json!(ALICE), json!(5)])
            .unwrap()
            .build_transaction(&TxParams::new())
            .await
            .unwrap();

        assert_eq!(tx.chain_id, Some(1));
        assert_eq!(tx.gas, Some(30_000));
        assert_eq!(tx.to, Some(TxKind::Call(TOKEN)));
        assert_eq!(transport.count(ETH_SEND_TRANSACTION), 0);
    }

    #[tokio::test]
    async fn caller_to_conflicts_with_contract_address() {
        let transport = Arc::new(MockTransport::new());
        let tx = TxParams {
            to: Some(Address::ZERO),
            ..Default::default()
        };
        let result = contract(&transport)
            .function("balanceOf")
            .unwrap()
            .bind(vec![json!(ALICE)])
            .unwrap()
            .transact(&tx)
            .await;
        assert!(matches!(result, Err(ContractError::ConflictingParams { field: "to" })));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn address_less_handles_need_a_target() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_CALL, word(7));
        let contract = Contract::builder(TOKEN_ABI)
            .unwrap()
            .transport(transport.clone())
            .build();
        let balance = contract
            .function("balanceOf")
            .unwrap()
            .bind(vec![json!(ALICE)])
            .unwrap();

        assert!(matches!(
            balance.call(&CallOptions::default()).await,
            Err(ContractError::MissingAddress { .. })
        ));

        let options = CallOptions {
            tx: TxParams {
                to: Some(TOKEN),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(balance.call(&options).await.is_ok());
    }

    #[tokio::test]
    async fn fallback_and_receive_send_empty_data() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_SEND_TRANSACTION, json!(B256::ZERO));
        let contract = contract(&transport);

        let receive = contract.receive().unwrap().bind(vec![]).unwrap();
        receive
            .transact(&TxParams::new().value(U256::from(1)))
            .await
            .unwrap();
        let tx = sent(&transport, ETH_SEND_TRANSACTION);
        assert!(tx.input.input().unwrap().is_empty());
        assert_eq!(tx.value, Some(U256::from(1)));

        assert!(matches!(
            contract.fallback().unwrap().bind(vec![json!(1)]),
            Err(ContractError::Encoding { .. })
        ));
    }

    #[tokio::test]
    async fn constructor_appends_encoded_arguments() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(ETH_SEND_TRANSACTION, json!(B256::repeat_byte(1)));
        let bytecode = Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]);
        let contract = Contract::builder(TOKEN_ABI)
            .unwrap()
            .bytecode(bytecode.clone())
            .transport(transport.clone())
            .build();

        let deploy = contract.constructor(vec![json!(1_000_000)], Map::new()).unwrap();
        let data = deploy.data().unwrap();
        assert_eq!(&data[..4], bytecode.as_ref());
        assert_eq!(data.len(), 4 + 32);

        deploy.transact(&TxParams::new()).await.unwrap();
        let tx = sent(&transport, ETH_SEND_TRANSACTION);
        assert_eq!(tx.to, None);

        let with_to = TxParams {
            to: Some(TOKEN),
            ..Default::default()
        };
        assert!(matches!(
            deploy.transact(&with_to).await,
            Err(ContractError::ConflictingParams { field: "to" })
        ));
    }

    #[test]
    fn constructor_requires_bytecode() {
        let contract = Contract::builder(TOKEN_ABI).unwrap().build();
        assert!(matches!(
            contract.constructor(vec![json!(1)], Map::new()),
            Err(ContractError::NoBytecode)
        ));
    }

    #[tokio::test]
    async fn dispatch_without_transport_is_not_initialized() {
        let contract = Contract::builder(TOKEN_ABI).unwrap().address(TOKEN).build();
        let result = contract
            .function("balanceOf")
            .unwrap()
            .bind(vec![json!(ALICE)])
            .unwrap()
            .call(&CallOptions::default())
            .await;
        assert!(matches!(result, Err(ContractError::NotInitialized)));
    }
}
