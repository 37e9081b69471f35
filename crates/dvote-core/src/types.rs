//! Wire and domain types shared across the crate.
//!
//! ## Gateway protocol
//! - [`RequestEnvelope`]: `{ id, request, signature? }` as POSTed to a gateway
//! - [`RawResponseEnvelope`]: the response envelope with the literal bytes of `response`
//! - [`GatewayResponse`]: the parsed inner response
//!
//! ## Bootstrap
//! - [`BootnodeDocument`], [`GatewayDescriptor`], [`ChainDescriptor`]
//!
//! ## Chain JSON-RPC
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]
//!
//! ## API method tables
//! - [`api_methods`], [`is_always_allowed`]

use serde::{Deserialize, Serialize};
use serde_json::{value::RawValue, Map, Value};
use std::{borrow::Cow, collections::HashMap, fmt, str::FromStr};

use crate::gateway::errors::ValidationError;

/// JSON-RPC protocol version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// Methods every gateway answers regardless of its advertised APIs.
pub const INFO_METHODS: &[&str] = &["getInfo"];

/// Raw transaction relay, also always available.
pub const RAW_METHODS: &[&str] = &["submitRawTx"];

pub const FILE_METHODS: &[&str] = &["fetchFile", "addFile", "pinList", "pinFile", "unpinFile"];

pub const VOTE_METHODS: &[&str] = &[
    "submitEnvelope",
    "getEnvelopeStatus",
    "getEnvelope",
    "getEnvelopeHeight",
    "getProcessKeys",
    "getProcessList",
    "getProcessInfo",
    "getProcessCount",
    "getBlockHeight",
    "getBlockStatus",
    "getEnvelopeList",
];

pub const CENSUS_METHODS: &[&str] = &[
    "addCensus",
    "addClaim",
    "addClaimBulk",
    "getRoot",
    "genProof",
    "getSize",
    "dump",
    "dumpPlain",
    "importDump",
    "publish",
    "importRemote",
    "getCensusList",
    "checkProof",
];

pub const RESULTS_METHODS: &[&str] =
    &["getResults", "getResultsWeight", "getProcListResults", "getProcListLiveResults"];

pub const INDEXER_METHODS: &[&str] =
    &["getEntityList", "getEntityCount", "getProcessListByEntity", "getTxListForBlock", "getTx"];

/// Methods declared by an API name, or `None` for an unknown API.
#[must_use]
pub fn api_methods(api: &str) -> Option<&'static [&'static str]> {
    match api {
        "file" => Some(FILE_METHODS),
        "vote" => Some(VOTE_METHODS),
        "census" => Some(CENSUS_METHODS),
        "results" => Some(RESULTS_METHODS),
        "indexer" => Some(INDEXER_METHODS),
        "info" => Some(INFO_METHODS),
        "raw" => Some(RAW_METHODS),
        _ => None,
    }
}

/// Returns `true` for the info and raw methods that need no advertised API.
#[inline]
#[must_use]
pub fn is_always_allowed(method: &str) -> bool {
    INFO_METHODS.contains(&method) || RAW_METHODS.contains(&method)
}

/// Deployment environment of the voting contracts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Stg,
    Dev,
}

impl Environment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Stg => "stg",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" => Ok(Self::Prod),
            "stg" => Ok(Self::Stg),
            "dev" => Ok(Self::Dev),
            other => Err(ValidationError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Envelope POSTed to a gateway.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub id: String,
    /// Canonicalized request body
    pub request: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Gateway response envelope, keeping `response` as the literal bytes the gateway sent.
#[derive(Debug, Deserialize)]
pub struct RawResponseEnvelope<'a> {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(borrow, default)]
    pub response: Option<&'a RawValue>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// The inner `response` of a gateway envelope.
///
/// Method-specific fields (`result`, `apiList`, `health`, ...) are kept in [`Self::fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub ok: bool,
    /// Echo of the request id
    #[serde(default)]
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl GatewayResponse {
    /// Returns a method-specific field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }
}

/// Bootstrap document: network id to candidate endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BootnodeDocument(pub HashMap<String, NetworkBootnodes>);

impl BootnodeDocument {
    #[must_use]
    pub fn network(&self, network_id: &str) -> Option<&NetworkBootnodes> {
        self.0.get(network_id)
    }
}

/// Candidate endpoints of one network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkBootnodes {
    #[serde(default)]
    pub dvote: Vec<GatewayDescriptor>,
    #[serde(default)]
    pub web3: Vec<ChainDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayDescriptor {
    pub uri: String,
    #[serde(default)]
    pub apis: Vec<String>,
    #[serde(rename = "pubKey", default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub uri: String,
}

/// JSON-RPC 2.0 request sent to chain endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    pub params: Value,
    pub id: Value,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(JSONRPC_VERSION), method: method.into(), params, id }
    }
}

/// JSON-RPC 2.0 response. Contains either `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}
