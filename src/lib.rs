//! Typed contract interaction over an Ethereum node's JSON-RPC API: overload
//! resolution, call/transact/estimate/build dispatch, event filters and log
//! decoding, plus an MCP tool server exposing them.

pub mod config;
pub mod error;
pub mod ethereum;
pub mod server;

pub use error::{ContractError, Result, TransportError};
pub use ethereum::{Contract, ContractBuilder};
