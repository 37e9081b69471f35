//! Gateway discovery, health checking and the signed request protocol.
//!
//! # Components
//!
//! - [`GatewayClient`]: signed JSON requests to a DVote gateway, response verification
//! - [`ChainClient`]: health and ENS contract resolution of an Ethereum JSON-RPC endpoint
//! - [`GatewayDiscovery`]: fetches bootnodes, checks candidates in escalating rounds, ranks
//!   and pairs the survivors
//! - [`GatewayPool`]: keeps the discovered pairs and fails over between them
//!
//! # Discovery Flow
//!
//! ```text
//! DiscoveryParams
//!       │ validate
//!       ▼
//! ┌──────────────────┐
//! │ BootnodeResolver │ ── mirrors raced ──► BootnodeDocument
//! └────────┬─────────┘
//!          │ digest_network (dedup by uri)
//!          ▼
//! ┌──────────────────┐
//! │ check_candidates │ rounds: timeout x [1, 2, 4, 16]
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  rank_and_pair   │ ──► Vec<GatewayPair>
//! └──────────────────┘
//! ```

pub mod attempts;
pub mod bootnodes;
pub mod discovery;
pub mod dvote;
pub mod ens;
pub mod errors;
pub mod http_client;
pub mod pool;
pub mod ranking;
pub mod scoring;
pub mod web3;

pub use attempts::{AttemptHistory, AttemptOutcome, AttemptRecord};
pub use bootnodes::{BootnodeResolver, BootnodeSource};
pub use discovery::{
    DiscoveryContext, DiscoveryOptions, DiscoveryParams, GatewayDiscovery, GatewayPair,
};
pub use dvote::{ClientStatus, GatewayClient};
pub use errors::{DiscoveryError, GatewayError, ValidationError};
pub use http_client::{HttpClient, HttpClientConfig};
pub use pool::GatewayPool;
pub use scoring::ScoreWeights;
pub use web3::{ChainClient, ChainRpc, ContractKind, JsonRpcChain};
