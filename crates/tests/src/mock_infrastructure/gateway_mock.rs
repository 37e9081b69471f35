//! DVote Gateway Mock
//!
//! Wraps mockito to answer gateway requests with signed response envelopes. Every mock echoes
//! the id of the incoming request, so responses pass the client's id check unless a test asks
//! otherwise.

use std::sync::Arc;

use dvote_core::crypto::{address_of, recover_public_key, to_canonical_string, Signer, Wallet};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

const GATEWAY_PATH: &str = "/dvote";

/// Mock DVote gateway signing its responses with its own wallet.
pub struct GatewayMock {
    server: ServerGuard,
    wallet: Arc<Wallet>,
    mocks: Vec<Mock>,
    expected_signer: Option<String>,
}

impl GatewayMock {
    /// Creates a gateway mock with a fresh server and a random signing key.
    pub async fn new() -> Self {
        Self {
            server: Server::new_async().await,
            wallet: Arc::new(Wallet::random()),
            mocks: Vec::new(),
            expected_signer: None,
        }
    }

    /// Returns the gateway endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{GATEWAY_PATH}", self.server.url())
    }

    /// Compressed public key the gateway signs with.
    #[must_use]
    pub fn public_key(&self) -> String {
        self.wallet.public_key_hex()
    }

    /// Bootnode document entry describing this gateway.
    #[must_use]
    pub fn descriptor(&self, apis: &[&str]) -> Value {
        json!({ "uri": self.url(), "apis": apis, "pubKey": self.public_key() })
    }

    /// Only matches requests whose signature recovers to `address` from now on.
    ///
    /// Unmatched requests get mockito's default 501 reply.
    pub fn require_signer(&mut self, address: impl Into<String>) -> &mut Self {
        self.expected_signer = Some(address.into().to_lowercase());
        self
    }

    /// Answers `getInfo` with the given API list and health.
    pub fn mock_info(&mut self, apis: &[&str], health: u8) -> &mut Self {
        let fields = json!({ "apiList": apis, "health": health, "chainId": "0x5" });
        self.mock_result("getInfo", fields)
    }

    /// Answers `method` with `ok: true` plus the given fields.
    pub fn mock_result(&mut self, method: &str, fields: Value) -> &mut Self {
        self.mock_signed(method, move |id| response_body(id, true, &fields))
    }

    /// Answers `method` with `ok: false` and `message`.
    pub fn mock_rejection(&mut self, method: &str, message: &str) -> &mut Self {
        let fields = json!({ "message": message });
        self.mock_signed(method, move |id| response_body(id, false, &fields))
    }

    /// Answers `method` as if the response belonged to another request.
    pub fn mock_foreign_id(&mut self, method: &str) -> &mut Self {
        self.mock_signed(method, |_| response_body("0badc0ffee", true, &json!({})))
    }

    /// Fails every request with the given HTTP status.
    pub fn mock_status(&mut self, status: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", GATEWAY_PATH)
            .with_status(status)
            .with_body("internal error")
            .create();

        self.mocks.push(mock);
        self
    }

    fn mock_signed<F>(&mut self, method: &str, build: F) -> &mut Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        let expected_signer = self.expected_signer.clone();
        let wallet = Arc::clone(&self.wallet);
        let mock = self
            .server
            .mock("POST", GATEWAY_PATH)
            .match_body(Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#)))
            .match_request(move |request| match &expected_signer {
                Some(expected) => request
                    .body()
                    .ok()
                    .and_then(|body| request_signer(body.as_slice()))
                    .is_some_and(|signer| &signer == expected),
                None => true,
            })
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |request| {
                let id = request.body().map(|body| request_id(body.as_slice())).unwrap_or_default();
                signed_envelope(&wallet, &id, &build(&id))
            })
            .create();

        self.mocks.push(mock);
        self
    }
}

fn response_body(request_id: &str, ok: bool, fields: &Value) -> Value {
    let mut response = json!({ "ok": ok, "request": request_id, "timestamp": 1_700_000_000 });
    if let (Value::Object(target), Value::Object(extra)) = (&mut response, fields) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    response
}

/// Extracts the `id` of a request envelope.
#[must_use]
pub fn request_id(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|envelope| envelope.get("id").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}

/// Address recovered from the signature of a request envelope.
#[must_use]
pub fn request_signer(body: &[u8]) -> Option<String> {
    let envelope = serde_json::from_slice::<Value>(body).ok()?;
    let signature = envelope.get("signature")?.as_str()?;
    let request = envelope.get("request")?;
    let key = recover_public_key(signature, to_canonical_string(request).as_bytes()).ok()?;
    Some(address_of(&key).to_lowercase())
}

/// Serializes a response envelope whose signature covers the exact `response` bytes.
#[must_use]
pub fn signed_envelope(wallet: &Wallet, id: &str, response: &Value) -> Vec<u8> {
    let response = to_canonical_string(response);
    let signature = wallet.sign_message(response.as_bytes()).unwrap_or_default();
    format!(r#"{{"id":"{id}","response":{response},"signature":"{signature}"}}"#).into_bytes()
}
