//! Bootstrap document retrieval.
//!
//! The bootnode document lists candidate gateways and chain endpoints per network. It is
//! either supplied directly or fetched from one or more mirrors, which are raced so that a
//! slow mirror never delays a fast one.

use futures::future::{select_ok, FutureExt};
use serde::Deserialize;
use std::{collections::HashSet, sync::Arc, time::Duration};
use url::Url;

use crate::{
    types::{BootnodeDocument, NetworkBootnodes},
    utils::with_deadline,
};

use super::{
    errors::{DiscoveryError, GatewayError, ValidationError},
    http_client::HttpClient,
};

/// Where the bootnode document comes from.
///
/// Deserializes from a single URI string, a list of mirror URIs, or an inline document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "BootnodeSourceInput")]
pub enum BootnodeSource {
    Uris(Vec<String>),
    Document(BootnodeDocument),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BootnodeSourceInput {
    Uri(String),
    Uris(Vec<String>),
    Document(BootnodeDocument),
}

impl From<BootnodeSourceInput> for BootnodeSource {
    fn from(input: BootnodeSourceInput) -> Self {
        match input {
            BootnodeSourceInput::Uri(uri) => Self::Uris(vec![uri]),
            BootnodeSourceInput::Uris(uris) => Self::Uris(uris),
            BootnodeSourceInput::Document(doc) => Self::Document(doc),
        }
    }
}

impl From<&str> for BootnodeSource {
    fn from(uri: &str) -> Self {
        Self::Uris(vec![uri.to_string()])
    }
}

impl From<Vec<String>> for BootnodeSource {
    fn from(uris: Vec<String>) -> Self {
        Self::Uris(uris)
    }
}

impl From<BootnodeDocument> for BootnodeSource {
    fn from(doc: BootnodeDocument) -> Self {
        Self::Document(doc)
    }
}

impl BootnodeSource {
    /// Rejects an empty mirror list, URIs that are not absolute URLs and empty documents.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let valid = match self {
            Self::Uris(uris) => {
                !uris.is_empty() && uris.iter().all(|u| Url::parse(u.trim()).is_ok())
            }
            Self::Document(doc) => !doc.0.is_empty(),
        };
        if valid {
            Ok(())
        } else {
            Err(ValidationError::InvalidBootnodeSource)
        }
    }
}

/// Fetches and digests bootnode documents.
#[derive(Debug, Clone)]
pub struct BootnodeResolver {
    http_client: Arc<HttpClient>,
}

impl BootnodeResolver {
    pub fn new(http_client: Arc<HttpClient>) -> Self {
        Self { http_client }
    }

    /// Returns the document, racing all mirrors when given URIs.
    ///
    /// The first mirror that answers with a parseable document wins.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::BootnodeTimeout`] if no mirror answered within `timeout`
    /// - [`DiscoveryError::BootnodeFetch`] if every mirror failed
    pub async fn fetch(
        &self,
        source: &BootnodeSource,
        timeout: Duration,
    ) -> Result<BootnodeDocument, DiscoveryError> {
        let uris = match source {
            BootnodeSource::Document(doc) => return Ok(doc.clone()),
            BootnodeSource::Uris(uris) if uris.is_empty() => {
                return Err(ValidationError::InvalidBootnodeSource.into())
            }
            BootnodeSource::Uris(uris) => uris,
        };

        let race = select_ok(uris.iter().map(|uri| self.fetch_one(uri, timeout).boxed()));

        match with_deadline(timeout, race).await {
            Ok(Ok((doc, _pending))) => Ok(doc),
            Ok(Err(GatewayError::Timeout)) | Err(_) => {
                tracing::warn!(mirrors = uris.len(), "bootnode document fetch timed out");
                Err(DiscoveryError::BootnodeTimeout)
            }
            Ok(Err(e)) => {
                tracing::warn!(mirrors = uris.len(), error = %e, "bootnode document fetch failed");
                Err(DiscoveryError::BootnodeFetch(e.to_string()))
            }
        }
    }

    async fn fetch_one(&self, uri: &str, timeout: Duration) -> Result<BootnodeDocument, GatewayError> {
        let body = self.http_client.fetch_string(uri, timeout).await?;
        let doc = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid bootnode document: {e}")))?;
        tracing::debug!(uri = uri, "bootnode document fetched");
        Ok(doc)
    }
}

/// Extracts the candidates of `network_id`, deduplicated by URI.
///
/// Unknown networks yield empty lists.
#[must_use]
pub fn digest_network(doc: &BootnodeDocument, network_id: &str) -> NetworkBootnodes {
    let Some(network) = doc.network(network_id) else {
        return NetworkBootnodes::default();
    };
    NetworkBootnodes {
        dvote: dedup_by_uri(&network.dvote, |d| d.uri.as_str()),
        web3: dedup_by_uri(&network.web3, |d| d.uri.as_str()),
    }
}

/// Keeps the first occurrence of every URI, preserving order.
#[must_use]
pub fn dedup_by_uri<T, F>(items: &[T], uri: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().filter(|item| seen.insert(uri(*item).to_string())).cloned().collect()
}
