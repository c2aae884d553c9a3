use fulfillment_engine::chain::discovery::resolve_endpoints;
use fulfillment_engine::chain::redeem::redeem_topic;
use fulfillment_engine::chain::{EthRpcClient, RpcResolver, TransactionResolver};
use fulfillment_engine::config::NetworkConfig;
use fulfillment_engine::errors::FulfillmentError;
use fulfillment_engine::models::FulfillRequest;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;

const TX_HASH: &str = "0x6ba5f67b3c477422260808f3120a6b2efec9453d167661c171a3501e65f9d29d";
const CONTRACT: &str = "0x0000000000000000000000000000000000000ABC";
const REDEEMER_WORD: &str = "000000000000000000000000AAA0000000000000000000000000000000000001";

fn resolver(endpoint: String) -> RpcResolver {
    RpcResolver::new(
        EthRpcClient::new(reqwest::Client::new()),
        HashMap::from([("main".to_string(), endpoint)]),
    )
}

fn request(network: &str) -> FulfillRequest {
    FulfillRequest {
        transaction_id: TX_HASH.to_string(),
        caller_address: "0xaaa0000000000000000000000000000000000001".to_string(),
        network_id: network.to_string(),
    }
}

fn redeem_log() -> Value {
    // tokenId = 2^64, offerId = 2
    json!({
        "address": CONTRACT,
        "topics": [format!("0x{}", hex::encode(redeem_topic()))],
        "data": format!(
            "0x{}{:0>64}{:0>64}",
            REDEEMER_WORD, "10000000000000000", "2"
        )
    })
}

fn receipt(logs: Vec<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "transactionHash": TX_HASH,
            "blockNumber": "0x10",
            "status": "0x1",
            "logs": logs
        }
    })
}

fn transaction(block_number: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 2,
        "result": { "hash": TX_HASH, "blockNumber": block_number }
    })
}

#[tokio::test]
async fn test_resolves_confirmed_redemption() {
    let server = MockServer::start_async().await;
    let receipt_mock = server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionReceipt");
            then.status(200).json_body(receipt(vec![redeem_log()]));
        })
        .await;
    let tx_mock = server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionByHash");
            then.status(200).json_body(transaction(json!("0x10")));
        })
        .await;

    let tx = resolver(server.url("/")).resolve(&request("main")).await.unwrap();

    receipt_mock.assert_async().await;
    tx_mock.assert_async().await;
    assert_eq!(tx.contract_address, CONTRACT.to_lowercase());
    assert_eq!(tx.redeemer_address, "0xaaa0000000000000000000000000000000000001");
    assert_eq!(tx.token_id, "18446744073709551616");
    assert_eq!(tx.offer_id, "2");
    assert!(!tx.pending);
}

#[tokio::test]
async fn test_unknown_network() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(receipt(vec![]));
        })
        .await;

    let err = resolver(server.url("/")).resolve(&request("demov3")).await.unwrap_err();

    assert!(matches!(err, FulfillmentError::UnknownNetwork(network) if network == "demov3"));
    any.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_missing_receipt_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionReceipt");
            then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": null }));
        })
        .await;

    let err = resolver(server.url("/")).resolve(&request("main")).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound(_)));
}

#[tokio::test]
async fn test_rpc_error_object_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionReceipt");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "unknown transaction" }
            }));
        })
        .await;

    let err = resolver(server.url("/")).resolve(&request("main")).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound(_)));
}

#[tokio::test]
async fn test_receipt_without_logs_is_invalid() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionReceipt");
            then.status(200).json_body(receipt(vec![]));
        })
        .await;

    let err = resolver(server.url("/")).resolve(&request("main")).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::InvalidReceipt(_)));
}

#[tokio::test]
async fn test_foreign_event_fails_to_decode() {
    let server = MockServer::start_async().await;
    let mut log = redeem_log();
    log["topics"] = json!([format!("0x{:0>64}", "ddf252ad")]);
    server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionReceipt");
            then.status(200).json_body(receipt(vec![log]));
        })
        .await;

    let err = resolver(server.url("/")).resolve(&request("main")).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Decode(_)));
}

#[tokio::test]
async fn test_unmined_transaction_is_pending() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionReceipt");
            then.status(200).json_body(receipt(vec![redeem_log()]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).body_contains("eth_getTransactionByHash");
            then.status(200).json_body(transaction(Value::Null));
        })
        .await;

    let err = resolver(server.url("/")).resolve(&request("main")).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Pending(hash) if hash == TX_HASH));
}

#[tokio::test]
async fn test_malformed_hash_rejected_before_rpc() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(receipt(vec![]));
        })
        .await;

    let mut bad = request("main");
    bad.transaction_id = "0x1234".to_string();
    let err = resolver(server.url("/")).resolve(&bad).await.unwrap_err();

    assert!(matches!(err, FulfillmentError::InvalidInput(_)));
    any.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_rpc_failure_does_not_echo_endpoint_credentials() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/");
            then.status(500).body("upstream down");
        })
        .await;

    let endpoint = server.url("/?apikey=SUPERSECRETKEY");
    let err = resolver(endpoint).resolve(&request("main")).await.unwrap_err();

    assert!(matches!(err, FulfillmentError::Rpc(_)));
    assert!(!err.to_string().contains("SUPERSECRETKEY"));
}

#[tokio::test]
async fn test_endpoints_discovered_from_network_config() {
    let server = MockServer::start_async().await;
    let config_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/config");
            then.status(200).json_body(json!({
                "network": {
                    "services": {
                        "ethereum_api": ["https://host-1.example/eth/", "https://host-2.example/eth/"]
                    }
                }
            }));
        })
        .await;

    let networks = HashMap::from([
        (
            "main".to_string(),
            NetworkConfig {
                rpc_url: None,
                config_url: Some(server.url("/config")),
            },
        ),
        (
            "local".to_string(),
            NetworkConfig {
                rpc_url: Some("http://localhost:8545".to_string()),
                config_url: None,
            },
        ),
    ]);

    let endpoints = resolve_endpoints(&reqwest::Client::new(), &networks).await.unwrap();

    config_mock.assert_async().await;
    assert_eq!(endpoints["main"], "https://host-1.example/eth/");
    assert_eq!(endpoints["local"], "http://localhost:8545");
}

#[tokio::test]
async fn test_network_config_without_ethereum_api_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/config");
            then.status(200).json_body(json!({ "network": { "services": {} } }));
        })
        .await;

    let networks = HashMap::from([(
        "main".to_string(),
        NetworkConfig {
            rpc_url: None,
            config_url: Some(server.url("/config")),
        },
    )]);

    let err = resolve_endpoints(&reqwest::Client::new(), &networks).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Config(_)));
}
