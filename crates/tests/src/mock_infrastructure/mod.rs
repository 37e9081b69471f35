//! Mock Infrastructure for Testing the DVote Gateway Client
//!
//! Reusable mocks standing in for gateways, chain nodes and bootnode mirrors, so tests run
//! without real network peers.
//!
//! ## Components
//!
//! - `GatewayMock`: mockito-backed gateway that echoes request ids and signs its responses
//! - `ChainMock`: Ethereum node answering `net_peerCount`, `eth_syncing`, `eth_blockNumber`
//! - `BootnodeMock`: mirror serving bootnode documents
//! - `SilentServer`: accepts connections and never replies, for timeout scenarios
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::GatewayMock;
//!
//! let mut gateway = GatewayMock::new().await;
//! gateway.mock_info(&["file", "vote"], 95);
//!
//! // Use gateway.url() and gateway.public_key() to configure a client
//! ```

pub mod bootnode_mock;
pub mod chain_mock;
pub mod gateway_mock;
pub mod silent_server;
pub mod test_helpers;

pub use bootnode_mock::{bootnode_document, BootnodeMock};
pub use chain_mock::ChainMock;
pub use gateway_mock::{request_id, request_signer, signed_envelope, GatewayMock};
pub use silent_server::SilentServer;
pub use test_helpers::*;
