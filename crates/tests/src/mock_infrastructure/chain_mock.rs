//! Ethereum JSON-RPC Node Mock
//!
//! Answers the calls a chain health check makes.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

/// Mock Ethereum node.
pub struct ChainMock {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl ChainMock {
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Bootnode document entry describing this node.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        json!({ "uri": self.url() })
    }

    /// A synced node with plenty of peers at `block_number`.
    pub fn mock_healthy(&mut self, block_number: u64) -> &mut Self {
        self.mock_peer_count(25).mock_syncing(false).mock_block_number(block_number)
    }

    /// Mocks a `net_peerCount` request.
    pub fn mock_peer_count(&mut self, peers: u64) -> &mut Self {
        self.mock_result("net_peerCount", json!(format!("0x{peers:x}")))
    }

    /// Mocks an `eth_syncing` request.
    pub fn mock_syncing(&mut self, syncing: bool) -> &mut Self {
        let result = if syncing {
            json!({ "startingBlock": "0x0", "currentBlock": "0x10", "highestBlock": "0x100" })
        } else {
            json!(false)
        };
        self.mock_result("eth_syncing", result)
    }

    /// Mocks an `eth_blockNumber` request.
    pub fn mock_block_number(&mut self, block_number: u64) -> &mut Self {
        self.mock_result("eth_blockNumber", json!(format!("0x{block_number:x}")))
    }

    /// Answers `method` with a JSON-RPC "method not found" error.
    pub fn mock_method_not_found(&mut self, method: &str) -> &mut Self {
        let error = json!({
            "code": -32601,
            "message": format!("the method {method} does not exist/is not available")
        });
        self.mock_reply(method, json!({ "jsonrpc": "2.0", "id": 1, "error": error }))
    }

    fn mock_result(&mut self, method: &str, result: Value) -> &mut Self {
        self.mock_reply(method, json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    fn mock_reply(&mut self, method: &str, body: Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create();

        self.mocks.push(mock);
        self
    }
}
