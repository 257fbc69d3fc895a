//! Maps a function or event identifier plus call arguments onto exactly one
//! ABI entry.

use alloy::{
    json_abi::{Event, Function, Param},
    primitives::{Selector, B256},
};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::debug;

use super::{codec, registry::AbiRegistry, utils::strip_hex_prefix};
use crate::error::{ContractError, Result};

/// How a caller names a function or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Plain name; may be overloaded.
    Name(String),
    /// Canonical signature such as `transfer(address,uint256)`.
    Signature(String),
    /// 4-byte function selector.
    Selector(Selector),
    /// 32-byte event topic.
    Topic(B256),
}

impl Identifier {
    pub fn parse(identifier: &str) -> Self {
        let identifier = identifier.trim();
        if let Some(hex_part) = strip_hex_prefix(identifier) {
            if hex_part.len() == 8 {
                if let Ok(selector) = Selector::from_str(identifier) {
                    return Self::Selector(selector);
                }
            }
            if hex_part.len() == 64 {
                if let Ok(topic) = B256::from_str(identifier) {
                    return Self::Topic(topic);
                }
            }
        }
        if identifier.contains('(') {
            return Self::Signature(identifier.replace(' ', ""));
        }
        Self::Name(identifier.to_string())
    }

    /// Whether this identifier pins a single entry without looking at arguments.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::Name(_))
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) | Self::Signature(name) => f.write_str(name),
            Self::Selector(selector) => write!(f, "{}", selector),
            Self::Topic(topic) => write!(f, "{}", topic),
        }
    }
}

impl From<&str> for Identifier {
    fn from(identifier: &str) -> Self {
        Self::parse(identifier)
    }
}

/// Resolves a function identifier against bound arguments.
///
/// Concrete identifiers match exactly. A name with a single declaration
/// resolves without inspecting the arguments. Overloaded names are filtered
/// by arity and type compatibility and must leave exactly one survivor.
pub fn resolve_function<'a>(
    registry: &'a AbiRegistry,
    identifier: &Identifier,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> Result<&'a Function> {
    let not_found = || ContractError::NotFound {
        kind: "function",
        identifier: identifier.to_string(),
    };

    let name = match identifier {
        Identifier::Selector(selector) => {
            return registry.function_by_selector(*selector).ok_or_else(not_found)
        }
        Identifier::Signature(signature) => {
            return registry.function_by_signature(signature).ok_or_else(not_found)
        }
        Identifier::Topic(_) => return Err(not_found()),
        Identifier::Name(name) => name,
    };

    let candidates = registry.functions_named(name);
    match candidates {
        [] => Err(not_found()),
        [only] => Ok(only),
        _ => {
            let arg_count = args.len() + kwargs.len();
            let survivors: Vec<&Function> = candidates
                .iter()
                .filter(|f| f.inputs.len() == arg_count)
                .filter(|f| {
                    merge_args(&f.inputs, args, kwargs)
                        .map(|merged| codec::is_encodable(&f.inputs, &merged))
                        .unwrap_or(false)
                })
                .collect();

            debug!(
                "Resolved '{}' with {} argument(s): {} of {} overloads match",
                name,
                arg_count,
                survivors.len(),
                candidates.len()
            );

            match survivors.as_slice() {
                [function] => Ok(*function),
                [] => Err(ContractError::NoMatchingOverload {
                    name: name.clone(),
                    arg_count,
                    candidates: candidates.iter().map(Function::signature).collect(),
                }),
                _ => Err(ContractError::AmbiguousOverload {
                    name: name.clone(),
                    candidates: survivors.iter().map(|f| f.signature()).collect(),
                }),
            }
        }
    }
}

/// Resolves an event by name, signature or topic 0.
///
/// Events carry no arguments to tell overloads apart, so an overloaded name
/// is always ambiguous; callers must use the full signature instead.
pub fn resolve_event<'a>(registry: &'a AbiRegistry, identifier: &Identifier) -> Result<&'a Event> {
    let not_found = || ContractError::NotFound {
        kind: "event",
        identifier: identifier.to_string(),
    };

    match identifier {
        Identifier::Topic(topic) => registry.event_by_selector(*topic).ok_or_else(not_found),
        Identifier::Signature(signature) => {
            registry.event_by_signature(signature).ok_or_else(not_found)
        }
        Identifier::Selector(_) => Err(not_found()),
        Identifier::Name(name) => match registry.events_named(name) {
            [] => Err(not_found()),
            [only] => Ok(only),
            many => Err(ContractError::AmbiguousOverload {
                name: name.clone(),
                candidates: many.iter().map(Event::signature).collect(),
            }),
        },
    }
}

/// Merges positional and keyword arguments into declaration order.
pub fn merge_args(
    inputs: &[Param],
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> std::result::Result<Vec<Value>, String> {
    if kwargs.is_empty() {
        return Ok(args.to_vec());
    }
    if args.len() > inputs.len() {
        return Err(format!(
            "expected at most {} argument(s), got {}",
            inputs.len(),
            args.len()
        ));
    }

    for key in kwargs.keys() {
        match inputs.iter().position(|p| &p.name == key) {
            None => return Err(format!("unknown keyword argument '{}'", key)),
            Some(pos) if pos < args.len() => {
                return Err(format!("argument '{}' given both by position and keyword", key))
            }
            Some(_) => {}
        }
    }

    let mut merged = args.to_vec();
    for param in &inputs[args.len()..] {
        let value = kwargs
            .get(&param.name)
            .ok_or_else(|| format!("missing argument '{}'", param.name))?;
        merged.push(value.clone());
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::registry::tests::token_registry;
    use serde_json::json;

    const ADDR: &str = "0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e";

    fn kw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn parses_identifier_forms() {
        assert_eq!(Identifier::parse("transfer"), Identifier::Name("transfer".into()));
        assert_eq!(
            Identifier::parse("transfer(address, uint256)"),
            Identifier::Signature("transfer(address,uint256)".into())
        );
        assert!(matches!(Identifier::parse("0xa9059cbb"), Identifier::Selector(_)));
        assert!(Identifier::parse("0xa9059cbb").is_concrete());
    }

    #[test]
    fn overloads_resolve_by_arity() {
        let registry = token_registry();
        let id = Identifier::parse("transfer");
        let none = Map::new();

        let two = resolve_function(&registry, &id, &[json!(ADDR), json!(5)], &none).unwrap();
        assert_eq!(two.signature(), "transfer(address,uint256)");

        let three = resolve_function(&registry, &id, &[json!(ADDR), json!(5), json!("0x01")], &none)
            .unwrap();
        assert_eq!(three.signature(), "transfer(address,uint256,bytes)");

        let err = resolve_function(&registry, &id, &[json!(ADDR)], &none).unwrap_err();
        match err {
            ContractError::NoMatchingOverload { name, arg_count, candidates } => {
                assert_eq!(name, "transfer");
                assert_eq!(arg_count, 1);
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn overloads_filter_by_type_compatibility() {
        let registry = token_registry();
        let id = Identifier::parse("transfer");
        let err = resolve_function(&registry, &id, &[json!(5), json!(ADDR)], &Map::new());
        assert!(matches!(err, Err(ContractError::NoMatchingOverload { .. })));
    }

    #[test]
    fn compatible_overloads_are_ambiguous() {
        let registry = token_registry();
        let id = Identifier::parse("approve");
        let err = resolve_function(&registry, &id, &[json!(ADDR), json!(1)], &Map::new()).unwrap_err();
        match err {
            ContractError::AmbiguousOverload { candidates, .. } => {
                assert!(candidates.contains(&"approve(address,uint256)".to_string()));
                assert!(candidates.contains(&"approve(address,uint128)".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }

        // a value only uint256 can hold narrows it to one
        let big = "340282366920938463463374607431768211456";
        let f = resolve_function(&registry, &id, &[json!(ADDR), json!(big)], &Map::new()).unwrap();
        assert_eq!(f.signature(), "approve(address,uint256)");
    }

    #[test]
    fn single_declaration_skips_argument_checks() {
        let registry = token_registry();
        let id = Identifier::parse("balanceOf");
        let f = resolve_function(&registry, &id, &[json!(1), json!(2)], &Map::new()).unwrap();
        assert_eq!(f.name, "balanceOf");
    }

    #[test]
    fn concrete_identifiers_match_exactly() {
        let registry = token_registry();
        let sig = Identifier::parse("transfer(address,uint256,bytes)");
        let f = resolve_function(&registry, &sig, &[], &Map::new()).unwrap();
        assert_eq!(f.inputs.len(), 3);

        let selector = Identifier::Selector(f.selector());
        let by_selector = resolve_function(&registry, &selector, &[], &Map::new()).unwrap();
        assert_eq!(by_selector.signature(), f.signature());

        let missing = Identifier::parse("0xdeadbeef");
        assert!(matches!(
            resolve_function(&registry, &missing, &[], &Map::new()),
            Err(ContractError::NotFound { .. })
        ));
    }

    #[test]
    fn keyword_arguments_count_towards_arity() {
        let registry = token_registry();
        let id = Identifier::parse("transfer");
        let f = resolve_function(
            &registry,
            &id,
            &[json!(ADDR)],
            &kw(json!({ "amount": 5, "data": "0x" })),
        )
        .unwrap();
        assert_eq!(f.inputs.len(), 3);
    }

    #[test]
    fn merge_args_rejects_bad_keywords() {
        let registry = token_registry();
        let f = registry.function_by_signature("transfer(address,uint256)").unwrap();

        let merged = merge_args(&f.inputs, &[], &kw(json!({ "amount": 1, "to": ADDR }))).unwrap();
        assert_eq!(merged, vec![json!(ADDR), json!(1)]);

        assert!(merge_args(&f.inputs, &[json!(ADDR)], &kw(json!({ "to": ADDR }))).is_err());
        assert!(merge_args(&f.inputs, &[json!(ADDR)], &kw(json!({ "memo": 1 }))).is_err());
        assert!(merge_args(&f.inputs, &[], &kw(json!({ "to": ADDR }))).is_err());
    }

    #[test]
    fn events_resolve_by_name_and_topic() {
        let registry = token_registry();
        let transfer = resolve_event(&registry, &Identifier::parse("Transfer")).unwrap();
        let by_topic = resolve_event(&registry, &Identifier::Topic(transfer.selector())).unwrap();
        assert_eq!(by_topic.name, "Transfer");
        assert!(resolve_event(&registry, &Identifier::parse("Approval")).is_err());
    }
}
