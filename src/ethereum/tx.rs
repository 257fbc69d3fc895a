//! Transaction parameters, block identifiers and transaction defaults.

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, Bytes, TxKind, B256, U128, U256, U64},
    rpc::types::{TransactionInput, TransactionRequest},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::debug;

use super::{
    transport::{RpcTransport, ETH_CHAIN_ID, ETH_ESTIMATE_GAS, ETH_GAS_PRICE},
    utils::strip_hex_prefix,
};
use crate::error::{ContractError, Result};

/// Caller-supplied transaction fields.
///
/// Every field defaults to "unset". `to` and `data` are derived from the
/// contract and the bound call; supplying them is a conflict unless the
/// contract handle has no address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxParams {
    pub from: Option<Address>,
    pub to: Option<Address>,
    /// Wei sent with the call. Unset means no value transfer.
    pub value: Option<U256>,
    /// Gas limit.
    pub gas: Option<u64>,
    /// Legacy gas price, mutually usable with the EIP-1559 pair below.
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub data: Option<Bytes>,
    pub nonce: Option<u64>,
    pub chain_id: Option<u64>,
}

impl TxParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Merges these parameters over the values derived from the contract.
    ///
    /// `target` is the contract address (`None` for deployments and
    /// address-less handles), `default_from` the handle's default account.
    pub fn merge(
        &self,
        target: Option<Address>,
        input: Bytes,
        default_from: Option<Address>,
    ) -> Result<TransactionRequest> {
        if self.data.is_some() {
            return Err(ContractError::ConflictingParams { field: "data" });
        }
        let to = match (target, self.to) {
            (Some(_), Some(_)) => return Err(ContractError::ConflictingParams { field: "to" }),
            (Some(address), None) | (None, Some(address)) => Some(TxKind::Call(address)),
            (None, None) => None,
        };

        Ok(TransactionRequest {
            from: self.from.or(default_from),
            to,
            value: self.value,
            gas: self.gas,
            gas_price: self.gas_price,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            nonce: self.nonce,
            chain_id: self.chain_id,
            input: TransactionInput::both(input),
            ..Default::default()
        })
    }
}

/// Parses "latest", "earliest", "pending", "safe", "finalized", a decimal
/// or hex block number, or a 32-byte block hash.
pub fn parse_block_identifier(identifier: &str) -> std::result::Result<BlockId, String> {
    let identifier = identifier.trim();
    let tag = match identifier.to_ascii_lowercase().as_str() {
        "latest" => Some(BlockNumberOrTag::Latest),
        "earliest" => Some(BlockNumberOrTag::Earliest),
        "pending" => Some(BlockNumberOrTag::Pending),
        "safe" => Some(BlockNumberOrTag::Safe),
        "finalized" => Some(BlockNumberOrTag::Finalized),
        _ => None,
    };
    if let Some(tag) = tag {
        return Ok(BlockId::Number(tag));
    }

    match strip_hex_prefix(identifier) {
        Some(hex_part) if hex_part.len() == 64 => B256::from_str(identifier)
            .map(BlockId::from)
            .map_err(|e| format!("invalid block hash '{}': {}", identifier, e)),
        Some(hex_part) => u64::from_str_radix(hex_part, 16)
            .map(BlockId::number)
            .map_err(|_| format!("invalid block number '{}'", identifier)),
        None => identifier
            .parse::<u64>()
            .map(BlockId::number)
            .map_err(|_| format!("invalid block identifier '{}'", identifier)),
    }
}

/// JSON form of a block reference; hashes use the EIP-1898 object form.
pub fn block_param(block: &BlockId) -> Result<Value> {
    to_rpc_value(block)
}

pub(crate) fn to_rpc_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ContractError::Transport(e.into()))
}

pub(crate) fn from_rpc_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ContractError::Transport(e.into()))
}

/// Fills the fields a node needs before a transaction can be signed.
#[async_trait]
pub trait TxDefaults: Send + Sync {
    async fn fill(
        &self,
        transport: &dyn RpcTransport,
        tx: TransactionRequest,
    ) -> Result<TransactionRequest>;
}

/// Queries the node for chain id, gas price and gas limit.
///
/// Nonces are left to the signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeTxDefaults;

#[async_trait]
impl TxDefaults for NodeTxDefaults {
    async fn fill(
        &self,
        transport: &dyn RpcTransport,
        mut tx: TransactionRequest,
    ) -> Result<TransactionRequest> {
        if tx.value.is_none() {
            tx.value = Some(U256::ZERO);
        }

        if tx.chain_id.is_none() {
            let chain_id: U64 = from_rpc_value(transport.request(ETH_CHAIN_ID, json!([])).await?)?;
            tx.chain_id = Some(chain_id.to());
        }

        let has_fee = tx.gas_price.is_some()
            || tx.max_fee_per_gas.is_some()
            || tx.max_priority_fee_per_gas.is_some();
        if !has_fee {
            let price: U128 = from_rpc_value(transport.request(ETH_GAS_PRICE, json!([])).await?)?;
            tx.gas_price = Some(price.to());
        }

        if tx.gas.is_none() {
            let params = json!([to_rpc_value(&tx)?]);
            let gas: U64 = from_rpc_value(transport.request(ETH_ESTIMATE_GAS, params).await?)?;
            tx.gas = Some(gas.to());
        }

        debug!(
            "Filled transaction defaults: chain_id={:?} gas={:?} gas_price={:?}",
            tx.chain_id, tx.gas, tx.gas_price
        );
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::transport::mock::MockTransport;

    const CONTRACT: Address = Address::new([0x42; 20]);

    #[test]
    fn merge_fills_contract_fields() {
        let from = Address::repeat_byte(0x01);
        let tx = TxParams::new()
            .value(U256::from(7))
            .merge(Some(CONTRACT), Bytes::from_static(&[1, 2]), Some(from))
            .unwrap();

        assert_eq!(tx.to, Some(TxKind::Call(CONTRACT)));
        assert_eq!(tx.from, Some(from));
        assert_eq!(tx.value, Some(U256::from(7)));
        assert_eq!(tx.input.input().unwrap().to_vec(), vec![1u8, 2]);
    }

    #[test]
    fn merge_rejects_conflicting_fields() {
        let params = TxParams {
            to: Some(Address::ZERO),
            ..Default::default()
        };
        assert!(matches!(
            params.merge(Some(CONTRACT), Bytes::new(), None),
            Err(ContractError::ConflictingParams { field: "to" })
        ));

        let params = TxParams {
            data: Some(Bytes::from_static(&[0xff])),
            ..Default::default()
        };
        assert!(matches!(
            params.merge(Some(CONTRACT), Bytes::new(), None),
            Err(ContractError::ConflictingParams { field: "data" })
        ));
    }

    #[test]
    fn caller_to_is_used_without_contract_address() {
        let params = TxParams {
            to: Some(CONTRACT),
            ..Default::default()
        };
        let tx = params.merge(None, Bytes::new(), None).unwrap();
        assert_eq!(tx.to, Some(TxKind::Call(CONTRACT)));
    }

    #[test]
    fn parses_block_identifiers() {
        assert_eq!(
            parse_block_identifier("latest").unwrap(),
            BlockId::Number(BlockNumberOrTag::Latest)
        );
        assert_eq!(parse_block_identifier("100").unwrap(), BlockId::number(100));
        assert_eq!(parse_block_identifier("0x64").unwrap(), BlockId::number(100));
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(matches!(parse_block_identifier(&hash).unwrap(), BlockId::Hash(_)));
        assert!(parse_block_identifier("yesterday").is_err());
    }

    #[test]
    fn block_params_use_rpc_encoding() {
        assert_eq!(block_param(&BlockId::number(100)).unwrap(), json!("0x64"));
        assert_eq!(block_param(&BlockId::latest()).unwrap(), json!("latest"));
        let hash = B256::repeat_byte(0xab);
        let param = block_param(&BlockId::from(hash)).unwrap();
        assert_eq!(param["blockHash"], json!(hash));
    }

    #[tokio::test]
    async fn node_defaults_fill_missing_fields() {
        let transport = MockTransport::new();
        transport
            .reply(ETH_CHAIN_ID, json!("0x1"))
            .reply(ETH_GAS_PRICE, json!("0x3b9aca00"))
            .reply(ETH_ESTIMATE_GAS, json!("0x5208"));

        let tx = TxParams::new()
            .merge(Some(CONTRACT), Bytes::new(), None)
            .unwrap();
        let filled = NodeTxDefaults.fill(&transport, tx).await.unwrap();

        assert_eq!(filled.chain_id, Some(1));
        assert_eq!(filled.gas_price, Some(1_000_000_000));
        assert_eq!(filled.gas, Some(21_000));
        assert_eq!(filled.value, Some(U256::ZERO));
    }

    #[tokio::test]
    async fn node_defaults_keep_caller_fees() {
        let transport = MockTransport::new();
        transport.reply(ETH_CHAIN_ID, json!("0x5"));

        let tx = TxParams::new()
            .gas(50_000)
            .gas_price(7)
            .merge(Some(CONTRACT), Bytes::new(), None)
            .unwrap();
        let filled = NodeTxDefaults.fill(&transport, tx).await.unwrap();

        assert_eq!(filled.gas_price, Some(7));
        assert_eq!(filled.gas, Some(50_000));
        assert_eq!(transport.count(ETH_GAS_PRICE), 0);
        assert_eq!(transport.count(ETH_ESTIMATE_GAS), 0);
    }
}
