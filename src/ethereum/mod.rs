pub mod abi;
pub mod ccip;
pub mod codec;
pub mod contract;
pub mod events;
pub mod function;
pub mod logs;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod transport;
pub mod tx;
pub mod utils;

pub use ccip::{CcipGateway, GatewayError, HttpGateway};
pub use contract::{Contract, ContractBuilder, ContractCaller};
pub use events::{ContractEvent, EventFilterBuilder, FilterOptions, FilterParams, LiveFilter, TopicFilter};
pub use function::{BoundFunction, CallOptions, ContractConstructor, ContractFunction, ReturnValue};
pub use logs::{DecodedEvent, LogDecoder, LogEntry};
pub use registry::{AbiEntry, AbiRegistry};
pub use resolver::Identifier;
pub use transport::{HttpTransport, RpcTransport};
pub use tx::{NodeTxDefaults, TxDefaults, TxParams};
