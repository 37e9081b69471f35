//! End-to-end discovery runs against mock gateways, chain nodes and bootnode mirrors.

use std::collections::HashSet;

use dvote_core::gateway::{
    AttemptOutcome, ChainClient, DiscoveryError, DiscoveryOptions, DiscoveryParams,
    GatewayDiscovery, ValidationError,
};
use std::sync::Arc;

use crate::mock_infrastructure::{
    bootnode_document, gateway_client, http_client, BootnodeMock, ChainMock, GatewayMock,
    SilentServer,
};

#[tokio::test]
async fn test_single_gateway_network() {
    let mut gateway = GatewayMock::new().await;
    gateway.mock_info(&["file", "vote"], 95);
    let mut chain = ChainMock::new().await;
    chain.mock_healthy(1_000);

    let mut boot = BootnodeMock::new().await;
    boot.mock_document(
        "/doc.json",
        &bootnode_document("goerli", &[gateway.descriptor(&["file", "vote"])], &[chain.descriptor()]),
    );

    let discovery = GatewayDiscovery::new(http_client());
    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str()).with_number_of_gateways(1);
    let pairs = discovery.run(&params).await.unwrap();

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].dvote.uri(), gateway.url());
    assert!(pairs[0].dvote.is_ready());
    assert_eq!(pairs[0].dvote.public_key(), Some(gateway.public_key().as_str()));
    assert_eq!(pairs[0].web3.uri(), chain.url());
    assert_eq!(pairs[0].web3.last_block_number(), Some(1_000));
}

#[tokio::test]
async fn test_chain_node_without_peer_count_is_accepted() {
    let mut gateway = GatewayMock::new().await;
    gateway.mock_info(&["vote"], 80);
    let mut chain = ChainMock::new().await;
    chain.mock_method_not_found("net_peerCount").mock_syncing(false).mock_block_number(4_200);

    let mut boot = BootnodeMock::new().await;
    boot.mock_document(
        "/doc.json",
        &bootnode_document("goerli", &[gateway.descriptor(&["vote"])], &[chain.descriptor()]),
    );

    let discovery = GatewayDiscovery::new(http_client());
    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str()).with_number_of_gateways(1);
    let pairs = discovery.run(&params).await.unwrap();

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].web3.uri(), chain.url());
    assert_eq!(pairs[0].web3.peer_count(), None);
    assert_eq!(pairs[0].web3.last_block_number(), Some(4_200));
}

#[tokio::test]
async fn test_unhealthy_gateways_are_left_out() {
    let mut healthy_a = GatewayMock::new().await;
    healthy_a.mock_info(&["file"], 80);
    let mut healthy_b = GatewayMock::new().await;
    healthy_b.mock_info(&["vote"], 70);
    let mut broken = GatewayMock::new().await;
    broken.mock_status(500);

    let mut chain = ChainMock::new().await;
    chain.mock_healthy(42);

    let mut boot = BootnodeMock::new().await;
    boot.mock_document(
        "/doc.json",
        &bootnode_document(
            "goerli",
            &[broken.descriptor(&[]), healthy_a.descriptor(&[]), healthy_b.descriptor(&[])],
            &[chain.descriptor()],
        ),
    );

    let discovery = GatewayDiscovery::new(http_client());
    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str()).with_number_of_gateways(2);
    let pairs = discovery.run(&params).await.unwrap();

    let uris: HashSet<String> = pairs.iter().map(|p| p.dvote.uri().to_string()).collect();
    assert_eq!(uris, HashSet::from([healthy_a.url(), healthy_b.url()]));
    assert!(pairs.iter().all(|p| p.web3.uri() == chain.url()));
}

#[tokio::test]
async fn test_lagging_chain_nodes_rank_last() {
    let mut gateway = GatewayMock::new().await;
    gateway.mock_info(&["file"], 80);

    let mut tip_a = ChainMock::new().await;
    tip_a.mock_healthy(500);
    let mut tip_b = ChainMock::new().await;
    tip_b.mock_healthy(500);
    let mut lagging = ChainMock::new().await;
    lagging.mock_healthy(400);

    let mut boot = BootnodeMock::new().await;
    boot.mock_document(
        "/doc.json",
        &bootnode_document(
            "goerli",
            &[gateway.descriptor(&[])],
            &[lagging.descriptor(), tip_a.descriptor(), tip_b.descriptor()],
        ),
    );

    let options = DiscoveryOptions { parallelism: 3, ..DiscoveryOptions::default() };
    let discovery = GatewayDiscovery::with_options(http_client(), options);
    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str()).with_number_of_gateways(1);
    let pairs = discovery.run(&params).await.unwrap();

    assert_eq!(pairs.len(), 3);
    assert_eq!(pairs[2].web3.uri(), lagging.url());
    assert_eq!(pairs[0].web3.last_block_number(), Some(500));
}

#[tokio::test]
async fn test_unreachable_minimum_exhausts_rounds() {
    let mut healthy = GatewayMock::new().await;
    healthy.mock_info(&["file"], 80);
    let mut broken = GatewayMock::new().await;
    broken.mock_status(503);
    let mut chain = ChainMock::new().await;
    chain.mock_healthy(7);

    let mut boot = BootnodeMock::new().await;
    boot.mock_document(
        "/doc.json",
        &bootnode_document(
            "goerli",
            &[healthy.descriptor(&[]), broken.descriptor(&[])],
            &[chain.descriptor()],
        ),
    );

    let discovery = GatewayDiscovery::new(http_client());
    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str()).with_number_of_gateways(2);
    let err = discovery.run(&params).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Exhausted { dvote: 1, web3: 1 }), "unexpected error {err:?}");
}

#[tokio::test]
async fn test_syncing_chain_node_fails_discovery() {
    let mut gateway = GatewayMock::new().await;
    gateway.mock_info(&["file"], 80);
    let mut chain = ChainMock::new().await;
    chain.mock_peer_count(30).mock_syncing(true).mock_block_number(10);

    let mut boot = BootnodeMock::new().await;
    boot.mock_document(
        "/doc.json",
        &bootnode_document("goerli", &[gateway.descriptor(&[])], &[chain.descriptor()]),
    );

    let discovery = GatewayDiscovery::new(http_client());
    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str()).with_number_of_gateways(1);
    let err = discovery.run(&params).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Exhausted { dvote: 1, web3: 0 }), "unexpected error {err:?}");
}

#[tokio::test]
async fn test_timed_out_gateway_is_retried_next_round() {
    let silent = SilentServer::start().await;
    let mut chain = ChainMock::new().await;
    chain.mock_healthy(9);

    let http = http_client();
    let dvote = vec![gateway_client(&silent.url(), &[], None, &http)];
    let web3 = vec![Arc::new(ChainClient::new(chain.url(), Arc::clone(&http)))];

    let options = DiscoveryOptions { round_multipliers: vec![1, 2], ..DiscoveryOptions::default() };
    let discovery = GatewayDiscovery::with_options(Arc::clone(&http), options);
    let ctx = DiscoveryParams::new("goerli", "http://unused/doc.json")
        .with_number_of_gateways(1)
        .with_timeout_ms(60)
        .validate()
        .unwrap();

    let err = discovery.check_candidates(&ctx, &dvote, &web3).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Exhausted { dvote: 0, web3: 1 }), "unexpected error {err:?}");
    assert_eq!(dvote[0].attempts().len(), 2);
    assert!(dvote[0].timed_out_last_request());
}

#[tokio::test]
async fn test_silent_gateway_does_not_block_its_batch() {
    let silent = SilentServer::start().await;
    let mut gateway = GatewayMock::new().await;
    gateway.mock_info(&["file"], 90);
    let mut chain = ChainMock::new().await;
    chain.mock_healthy(9);

    let http = http_client();
    // The silent gateway is drawn first in the batch.
    let dvote = vec![
        gateway_client(&silent.url(), &[], None, &http),
        gateway_client(&gateway.url(), &[], Some(gateway.public_key()), &http),
    ];
    let web3 = vec![Arc::new(ChainClient::new(chain.url(), Arc::clone(&http)))];

    let options =
        DiscoveryOptions { parallelism: 2, round_multipliers: vec![1], ..DiscoveryOptions::default() };
    let discovery = GatewayDiscovery::with_options(Arc::clone(&http), options);
    let ctx = DiscoveryParams::new("goerli", "http://unused/doc.json")
        .with_number_of_gateways(1)
        .with_timeout_ms(400)
        .validate()
        .unwrap();

    let (confirmed, _) = discovery.check_candidates(&ctx, &dvote, &web3).await.unwrap();

    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].uri(), gateway.url());

    let healthy = dvote[1].attempts();
    assert_eq!(healthy.len(), 1);
    assert_eq!(healthy[0].round, Some(0));
    assert_eq!(healthy[0].outcome, AttemptOutcome::Succeeded);

    let stalled = dvote[0].attempts();
    assert_eq!(stalled.len(), 1);
    assert_eq!(stalled[0].round, Some(0));
    assert_eq!(stalled[0].outcome, AttemptOutcome::TimedOut);
    assert!(dvote[0].timed_out_last_request());
    assert!(healthy[0].at < stalled[0].at, "healthy check waited for the silent one");
}

#[tokio::test]
async fn test_not_enough_gateways_listed() {
    let gateway = GatewayMock::new().await;
    let mut boot = BootnodeMock::new().await;
    boot.mock_document("/doc.json", &bootnode_document("goerli", &[gateway.descriptor(&[])], &[]));

    let discovery = GatewayDiscovery::new(http_client());
    let params = DiscoveryParams::new("goerli", boot.url("/doc.json").as_str()).with_number_of_gateways(2);
    let err = discovery.run(&params).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::NotEnoughGateways { required: 2, available: 1 }));
}

#[tokio::test]
async fn test_invalid_params_fail_before_io() {
    let discovery = GatewayDiscovery::new(http_client());

    let err = discovery.run(&DiscoveryParams::new("", "http://127.0.0.1:1/doc.json")).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Validation(ValidationError::InvalidNetworkId)));

    let params = DiscoveryParams::new("goerli", "http://127.0.0.1:1/doc.json").with_number_of_gateways(-1);
    let err = discovery.run(&params).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Validation(ValidationError::InvalidGatewayCount(-1))));

    let params = DiscoveryParams::new("goerli", "http://127.0.0.1:1/doc.json").with_environment("qa");
    let err = discovery.run(&params).await.unwrap_err();
    assert!(err.is_validation());
}
