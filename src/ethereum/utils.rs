use alloy::primitives::{Address, Bytes, U256};
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Validates and canonicalizes a `0x`-prefixed 20-byte address
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    let Some(hex_part) = strip_hex_prefix(address) else {
        return Err(anyhow!(
            "Invalid address format: '{}'. Addresses must start with '0x'",
            address
        ));
    };

    if hex_part.len() != 40 {
        return Err(anyhow!(
            "Invalid address length: '{}'. Addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        ));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        ));
    }

    Address::from_str(address).map_err(|e| anyhow!("Invalid address: '{}'. Error: {}", address, e))
}

/// Validates deployable bytecode given as a hex string.
pub fn normalize_bytecode(bytecode: &str) -> Result<Bytes> {
    let trimmed = bytecode.trim();
    let hex_part = strip_hex_prefix(trimmed).unwrap_or(trimmed);

    if hex_part.is_empty() {
        return Err(anyhow!("Bytecode cannot be empty"));
    }

    let bytes = hex::decode(hex_part).map_err(|e| {
        let head: String = trimmed.chars().take(12).collect();
        anyhow!("Invalid bytecode '{}...': {}", head, e)
    })?;
    Ok(Bytes::from(bytes))
}

/// Parses a decimal or `0x` hex quantity (wei values, gas prices)
pub fn parse_quantity(value_str: &str) -> Result<U256> {
    let value_str = value_str.trim();
    if value_str.is_empty() {
        return Err(anyhow!("Value cannot be empty"));
    }

    match strip_hex_prefix(value_str) {
        Some(hex_part) => U256::from_str_radix(hex_part, 16)
            .map_err(|_| anyhow!("Invalid hexadecimal value: '{}'", value_str)),
        None => U256::from_str(value_str).map_err(|_| {
            anyhow!(
                "Invalid numeric value: '{}'. Use decimal format or '0x' prefixed hex",
                value_str
            )
        }),
    }
}

pub(crate) fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        format!(
            "The contract function reverted execution. This usually means the function's requirements were not met. ({})",
            error
        )
    } else if error.contains("insufficient funds") {
        "Insufficient funds to cover value and gas costs for the sending account.".to_string()
    } else if error.contains("gas required exceeds allowance") {
        "Gas limit too low. Try increasing the gas limit for this transaction.".to_string()
    } else if error.contains("nonce too low") {
        "Nonce too low. Another transaction was already mined with this nonce.".to_string()
    } else if error.contains("query returned more than") || error.contains("block range") {
        format!(
            "The node rejected the log query range. Narrow fromBlock/toBlock and try again. ({})",
            error
        )
    } else if error.contains("filter not found") {
        "Filter not found. The node may have expired it after a period without polling.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check your RPC URL configuration.".to_string()
    } else if error.contains("timed out") || error.contains("timeout") {
        "Network error: Request timed out. The RPC endpoint may be overloaded or unreachable."
            .to_string()
    } else if error.contains("method not found") {
        "The requested method is not supported by this RPC endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}

/// Creates user-friendly error messages for ABI loading errors
pub fn interpret_abi_error(error: &str, contract_address: &str) -> String {
    if error.contains("not verified") || error.contains("not found") {
        format!(
            "No ABI available for {}: the contract is not verified. Provide an abi_path for it in the configuration.",
            contract_address
        )
    } else if error.contains("rate limit") || error.contains("429") {
        "Etherscan rate limit reached. Try again later or set ETHERSCAN_API_KEY.".to_string()
    } else if error.contains("invalid API key") || error.contains("403") {
        "Invalid Etherscan API key. Check the ETHERSCAN_API_KEY environment variable.".to_string()
    } else {
        format!("ABI resolution error: {}", error)
    }
}
