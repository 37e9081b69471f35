//! Bootnode Document Mirror Mock

use mockito::{Mock, Server, ServerGuard};
use serde_json::{json, Map, Value};

/// Serves bootnode documents over GET.
pub struct BootnodeMock {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl BootnodeMock {
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    /// URL of `path` on this mirror.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.url())
    }

    /// Serves `document` at `path`.
    pub fn mock_document(&mut self, path: &str, document: &Value) -> &mut Self {
        self.mock_body(path, 200, &document.to_string())
    }

    /// Answers `path` with an arbitrary status and body.
    pub fn mock_body(&mut self, path: &str, status: usize, body: &str) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();

        self.mocks.push(mock);
        self
    }
}

/// Builds a single-network bootnode document.
#[must_use]
pub fn bootnode_document(network: &str, dvote: &[Value], web3: &[Value]) -> Value {
    let mut document = Map::new();
    document.insert(network.to_string(), json!({ "dvote": dvote, "web3": web3 }));
    Value::Object(document)
}
