//! Conversions between caller-supplied JSON values and alloy's dynamic ABI
//! values, plus event topic encoding.

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, Specifier, Word},
    json_abi::{EventParam, Param},
    primitives::{keccak256, Address, Function, B256, I256, U256},
};
use serde_json::Value;
use std::str::FromStr;

use super::utils::strip_hex_prefix;

pub type CodecResult<T> = std::result::Result<T, String>;

pub fn resolve_param(param: &Param) -> CodecResult<DynSolType> {
    param
        .resolve()
        .map_err(|e| format!("unsupported type '{}': {}", param.ty, e))
}

pub fn resolve_event_param(param: &EventParam) -> CodecResult<DynSolType> {
    param
        .resolve()
        .map_err(|e| format!("unsupported type '{}': {}", param.ty, e))
}

/// Converts positional JSON arguments into ABI values for `inputs`.
///
/// Fails on arity mismatch or on the first argument that cannot be encoded
/// as its declared type.
pub fn coerce_args(inputs: &[Param], args: &[Value]) -> CodecResult<Vec<DynSolValue>> {
    if inputs.len() != args.len() {
        return Err(format!(
            "expected {} argument(s), got {}",
            inputs.len(),
            args.len()
        ));
    }

    inputs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (param, arg))| {
            let ty = resolve_param(param)?;
            json_to_component_value(arg, &ty, &param.components).map_err(|e| {
                format!(
                    "invalid argument #{} ('{}' of type '{}'): {}",
                    i + 1,
                    param.name,
                    param.ty,
                    e
                )
            })
        })
        .collect()
}

/// Whether every argument can be encoded as the matching input type.
pub fn is_encodable(inputs: &[Param], args: &[Value]) -> bool {
    coerce_args(inputs, args).is_ok()
}

/// Convert a JSON value to a `DynSolValue` of the given Solidity type.
/// Tuples must be JSON arrays here; see [`json_to_component_value`].
pub fn json_to_dyn_sol_value(value: &Value, ty: &DynSolType) -> CodecResult<DynSolValue> {
    json_to_component_value(value, ty, &[])
}

/// Like [`json_to_dyn_sol_value`], but tuples (and arrays of tuples) may
/// also be JSON objects keyed by the names in `components`.
pub fn json_to_component_value(
    value: &Value,
    ty: &DynSolType,
    components: &[Param],
) -> CodecResult<DynSolValue> {
    match ty {
        DynSolType::Address => {
            let s = value.as_str().ok_or("address must be a string")?;
            let hex_part = strip_hex_prefix(s).ok_or("address must be 0x-prefixed")?;
            if hex_part.len() != 40 {
                return Err(format!("address must be 20 bytes: {}", s));
            }
            Address::from_str(s)
                .map(DynSolValue::Address)
                .map_err(|e| e.to_string())
        }
        DynSolType::Bool => value
            .as_bool()
            .map(DynSolValue::Bool)
            .ok_or_else(|| "bool must be a boolean".to_string()),
        DynSolType::Uint(bits) => {
            let num = parse_uint(value)?;
            if num.bit_len() > *bits {
                return Err(format!("{} does not fit in uint{}", num, bits));
            }
            Ok(DynSolValue::Uint(num, *bits))
        }
        DynSolType::Int(bits) => {
            let num = parse_int(value)?;
            let limit = U256::from(1u8) << (*bits - 1);
            let abs = num.unsigned_abs();
            let fits = if num.is_negative() { abs <= limit } else { abs < limit };
            if !fits {
                return Err(format!("{} does not fit in int{}", num, bits));
            }
            Ok(DynSolValue::Int(num, *bits))
        }
        DynSolType::FixedBytes(size) => {
            let bytes = parse_hex_bytes(value)?;
            if bytes.len() != *size {
                return Err(format!(
                    "bytes{} expects {} bytes, got {}",
                    size,
                    size,
                    bytes.len()
                ));
            }
            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(Word::from(word), *size))
        }
        DynSolType::Bytes => parse_hex_bytes(value).map(DynSolValue::Bytes),
        DynSolType::String => value
            .as_str()
            .map(|s| DynSolValue::String(s.to_string()))
            .ok_or_else(|| "string must be a string".to_string()),
        DynSolType::Function => {
            let bytes = parse_hex_bytes(value)?;
            if bytes.len() != 24 {
                return Err("function must be 24 bytes".to_string());
            }
            Ok(DynSolValue::Function(Function::from_slice(&bytes)))
        }
        DynSolType::Array(inner) => {
            let items = value.as_array().ok_or("array must be a JSON array")?;
            items
                .iter()
                .map(|item| json_to_component_value(item, inner, components))
                .collect::<CodecResult<Vec<_>>>()
                .map(DynSolValue::Array)
        }
        DynSolType::FixedArray(inner, len) => {
            let items = value.as_array().ok_or("array must be a JSON array")?;
            if items.len() != *len {
                return Err(format!("expected {} elements, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| json_to_component_value(item, inner, components))
                .collect::<CodecResult<Vec<_>>>()
                .map(DynSolValue::FixedArray)
        }
        DynSolType::Tuple(types) => {
            let items = match value {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                Value::Object(fields) => named_components(fields, components, types.len())?,
                _ => return Err("tuple must be a JSON array or object".to_string()),
            };
            if items.len() != types.len() {
                return Err(format!(
                    "tuple expects {} components, got {}",
                    types.len(),
                    items.len()
                ));
            }
            items
                .into_iter()
                .zip(types)
                .enumerate()
                .map(|(i, (item, ty))| {
                    let nested = components.get(i).map_or(&[][..], |c| c.components.as_slice());
                    json_to_component_value(item, ty, nested)
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(DynSolValue::Tuple)
        }
        #[allow(unreachable_patterns)]
        other => Err(format!("unsupported Solidity type: {}", other)),
    }
}

fn parse_uint(value: &Value) -> CodecResult<U256> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("invalid uint value: {}", n)),
        Value::String(s) => {
            let parsed = match strip_hex_prefix(s) {
                Some(hex_part) => U256::from_str_radix(hex_part, 16),
                None => U256::from_str_radix(s, 10),
            };
            parsed.map_err(|_| format!("invalid uint string: {}", s))
        }
        _ => Err("uint must be a number or string".to_string()),
    }
}

/// Orders the fields of a struct given as a JSON object by declaration.
fn named_components<'a>(
    fields: &'a serde_json::Map<String, Value>,
    components: &[Param],
    arity: usize,
) -> CodecResult<Vec<&'a Value>> {
    if components.len() != arity || components.iter().any(|c| c.name.is_empty()) {
        return Err("tuple without component names must be a JSON array".to_string());
    }
    if let Some(unknown) = fields.keys().find(|k| !components.iter().any(|c| &c.name == *k)) {
        return Err(format!("unknown tuple component '{}'", unknown));
    }
    components
        .iter()
        .map(|c| {
            fields
                .get(&c.name)
                .ok_or_else(|| format!("missing tuple component '{}'", c.name))
        })
        .collect()
}

fn parse_int(value: &Value) -> CodecResult<I256> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => I256::from_dec_str(&n.to_string())
            .map_err(|_| format!("invalid int value: {}", n)),
        Value::Number(n) => Err(format!("invalid int value: {}", n)),
        Value::String(s) => {
            let digits = s.strip_prefix('-').unwrap_or(s);
            let parsed = if strip_hex_prefix(digits).is_some() {
                I256::from_hex_str(s)
            } else {
                I256::from_dec_str(s)
            };
            parsed.map_err(|_| format!("invalid int string: {}", s))
        }
        _ => Err("int must be a number or string".to_string()),
    }
}

fn parse_hex_bytes(value: &Value) -> CodecResult<Vec<u8>> {
    let s = value.as_str().ok_or("bytes must be a hex string")?;
    let hex_part = strip_hex_prefix(s).ok_or("bytes must be 0x-prefixed")?;
    hex::decode(hex_part).map_err(|_| format!("invalid hex string: {}", s))
}

/// Encodes one indexed event argument as a log topic.
///
/// Value types occupy the topic directly. Strings, bytes, arrays and tuples
/// are stored as the keccak256 of their in-place encoding.
pub fn encode_topic(value: &DynSolValue) -> B256 {
    if let Some(word) = value.as_word() {
        return word;
    }
    match value {
        DynSolValue::String(s) => keccak256(s.as_bytes()),
        DynSolValue::Bytes(b) => keccak256(b),
        _ => {
            let mut out = Vec::new();
            encode_in_place(value, &mut out);
            keccak256(out)
        }
    }
}

fn encode_in_place(value: &DynSolValue, out: &mut Vec<u8>) {
    if let Some(word) = value.as_word() {
        out.extend_from_slice(word.as_slice());
        return;
    }
    match value {
        DynSolValue::String(s) => pad_to_word(s.as_bytes(), out),
        DynSolValue::Bytes(b) => pad_to_word(b, out),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            for item in items {
                encode_in_place(item, out);
            }
        }
        _ => out.extend_from_slice(&value.abi_encode()),
    }
}

fn pad_to_word(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes);
    let rem = bytes.len() % 32;
    if rem != 0 {
        out.resize(out.len() + 32 - rem, 0);
    }
}

/// Convert a list of decoded values to JSON
pub fn dyn_sol_values_to_json(values: &[DynSolValue]) -> Value {
    Value::Array(values.iter().map(dyn_sol_value_to_json).collect())
}

/// Convert a single `DynSolValue` to JSON
pub fn dyn_sol_value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(addr) => Value::String(addr.to_checksum(None)),
        DynSolValue::Uint(num, _) => Value::String(num.to_string()),
        DynSolValue::Int(num, _) => Value::String(num.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Function(f) => Value::String(format!("0x{}", hex::encode(f))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            dyn_sol_values_to_json(items)
        }
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{:?}", other)),
    }
}
