//! Failover across discovered gateway pairs.

use std::time::Duration;

use dvote_core::gateway::{DiscoveryParams, GatewayDiscovery, GatewayError, GatewayPool};
use serde_json::json;

use crate::mock_infrastructure::{
    bootnode_document, gateway_client, http_client, pair, BootnodeMock, ChainMock, GatewayMock,
    SilentServer,
};

fn unused_params() -> DiscoveryParams {
    DiscoveryParams::new("goerli", "http://127.0.0.1:1/doc.json")
}

#[tokio::test]
async fn test_timeout_shifts_to_next_gateway() {
    let silent = SilentServer::start().await;
    let mut gateway = GatewayMock::new().await;
    gateway.mock_result("addCensus", json!({ "result": "OK 1" }));

    let http = http_client();
    let slow = gateway_client(&silent.url(), &["census"], None, &http);
    let fast = gateway_client(&gateway.url(), &["census"], Some(gateway.public_key()), &http);
    let pool = GatewayPool::from_pairs(
        GatewayDiscovery::new(http.clone()),
        unused_params(),
        vec![pair(slow.clone(), &http), pair(fast, &http)],
    );

    let response = pool
        .send_request(json!({ "method": "addCensus" }), None, Some(Duration::from_millis(150)))
        .await
        .unwrap();

    assert_eq!(response.str_field("result"), Some("OK 1"));
    assert!(slow.timed_out_last_request());
    assert_eq!(pool.active().unwrap().dvote.uri(), gateway.url());
}

#[tokio::test]
async fn test_retries_are_capped() {
    let silent = SilentServer::start().await;
    let mut gateway = GatewayMock::new().await;
    gateway.mock_result("addCensus", json!({ "result": "OK 1" }));

    let http = http_client();
    let slow = gateway_client(&silent.url(), &["census"], None, &http);
    let fast = gateway_client(&gateway.url(), &["census"], None, &http);
    let pool = GatewayPool::from_pairs(
        GatewayDiscovery::new(http.clone()),
        unused_params(),
        vec![pair(slow, &http), pair(fast, &http)],
    )
    .with_max_retries(0);

    let err = pool
        .send_request(json!({ "method": "addCensus" }), None, Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let mut rejecting = GatewayMock::new().await;
    rejecting.mock_rejection("addCensus", "Invalid wallet");
    let mut other = GatewayMock::new().await;
    other.mock_result("addCensus", json!({ "result": "OK 1" }));

    let http = http_client();
    let first = gateway_client(&rejecting.url(), &["census"], Some(rejecting.public_key()), &http);
    let second = gateway_client(&other.url(), &["census"], Some(other.public_key()), &http);
    let pool = GatewayPool::from_pairs(
        GatewayDiscovery::new(http.clone()),
        unused_params(),
        vec![pair(first, &http), pair(second, &http)],
    );

    let err = pool.send_request(json!({ "method": "addCensus" }), None, None).await.unwrap_err();

    assert!(matches!(err, GatewayError::Rejected(ref m) if m == "Invalid wallet"));
    assert_eq!(pool.active().unwrap().dvote.uri(), rejecting.url());
}

#[tokio::test]
async fn test_unsupported_method_moves_to_capable_gateway() {
    let mut file_only = GatewayMock::new().await;
    file_only.mock_result("fetchFile", json!({ "content": "" }));
    let mut census = GatewayMock::new().await;
    census.mock_result("getRoot", json!({ "root": "0xabc" }));

    let http = http_client();
    let pool = GatewayPool::from_pairs(
        GatewayDiscovery::new(http.clone()),
        unused_params(),
        vec![
            pair(gateway_client(&file_only.url(), &["file"], None, &http), &http),
            pair(gateway_client(&census.url(), &["census"], None, &http), &http),
        ],
    );

    let response = pool.send_request(json!({ "method": "getRoot" }), None, None).await.unwrap();
    assert_eq!(response.str_field("root"), Some("0xabc"));
    assert_eq!(pool.active().unwrap().dvote.uri(), census.url());
}

#[tokio::test]
async fn test_discover_and_refresh() {
    let mut gateway = GatewayMock::new().await;
    gateway.mock_info(&["file", "vote"], 90);
    let mut chain = ChainMock::new().await;
    chain.mock_healthy(321);

    let mut boot = BootnodeMock::new().await;
    boot.mock_document(
        "/doc.json",
        &bootnode_document("goerli", &[gateway.descriptor(&[])], &[chain.descriptor()]),
    );

    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str())
        .with_number_of_gateways(1)
        .with_archive_pointer("https://archive.example/goerli");
    let pool = GatewayPool::discover(GatewayDiscovery::new(http_client()), params).await.unwrap();

    let active = pool.active().unwrap();
    assert_eq!(active.dvote.uri(), gateway.url());
    assert_eq!(active.web3.archive_pointer().as_deref(), Some("https://archive.example/goerli"));

    let info = pool.send_request(json!({ "method": "getInfo" }), None, None).await.unwrap();
    assert_eq!(info.field("health"), Some(&json!(90)));

    pool.refresh().await.unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.active().unwrap().dvote.uri(), gateway.url());
}
