//! Error taxonomy for contract interaction.

use thiserror::Error;

/// Failures reported by an [`RpcTransport`](crate::ethereum::transport::RpcTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, malformed HTTP response and similar.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error object returned by the node. Reverts land here.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// The request did not complete within the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The request was abandoned before a response arrived.
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// The node answered with a payload of the wrong shape.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` for node-side execution failures such as reverts.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }

    /// Returns `true` for timeouts and cancellations.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled(_))
    }
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Contract handle is not bound to a transport")]
    NotInitialized,

    #[error("The address argument is required for '{operation}'")]
    MissingAddress { operation: String },

    #[error("Cannot call constructor on a contract that does not have bytecode associated with it")]
    NoBytecode,

    #[error("No {kind} named '{identifier}' in contract ABI")]
    NotFound { kind: &'static str, identifier: String },

    #[error(
        "No overload of '{name}' accepts {arg_count} argument(s) of the given types. Candidates: {}",
        .candidates.join(", ")
    )]
    NoMatchingOverload {
        name: String,
        arg_count: usize,
        candidates: Vec<String>,
    },

    #[error(
        "Call to '{name}' is ambiguous, matching overloads: {}",
        .candidates.join(", ")
    )]
    AmbiguousOverload {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Failed to encode arguments for '{signature}': {reason}")]
    Encoding { signature: String, reason: String },

    #[error("Failed to decode output of '{signature}': {reason}")]
    Decoding { signature: String, reason: String },

    #[error("Transaction parameter '{field}' conflicts with the value derived from the contract")]
    ConflictingParams { field: &'static str },

    #[error("Invalid filter parameters: {0}")]
    InvalidFilterParams(String),

    #[error("Failed to decode log {log} as event '{event}': {reason}")]
    LogDecode {
        event: String,
        log: String,
        reason: String,
    },

    /// An EIP-3668 lookup could not be answered.
    #[error("Offchain lookup failed: {0}")]
    OffchainLookup(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T, E = ContractError> = std::result::Result<T, E>;
