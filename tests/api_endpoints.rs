//! Integration tests for the FileChain HTTP API
//!
//! These tests drive the router in-process and check the JSON contract of
//! every endpoint, including the submission and mining scenarios.

use axum_test::TestServer;
use filechain::api::{build_api_router, Node};
use filechain::blockchain::is_valid_chain;
use filechain::config::Config;
use filechain::network::ChainSnapshot;
use serde_json::{json, Value};
use std::sync::Arc;

fn test_server() -> (TestServer, Arc<Node>) {
    let node = Arc::new(Node::from_config(&Config::default()).expect("Failed to create node"));
    let app = build_api_router(node.clone());
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, node)
}

fn alice() -> Value {
    json!({
        "user": "alice",
        "v_file": "a.txt",
        "file_data": "68656c6c6f",
        "file_size": 5
    })
}

#[tokio::test]
async fn test_submit_then_mine_scenario() {
    let (server, _node) = test_server();

    let response = server.post("/new_transaction").json(&alice()).await;
    assert_eq!(response.status_code(), 201);
    let json: Value = response.json();
    assert_eq!(json["message"], "Transaction added");
    assert_eq!(json["block_index"], 1);
    assert_eq!(
        json["transaction"],
        json!({"user": "alice", "v_file": "a.txt", "file_size": 5})
    );

    let pending: Value = server.get("/pending_tx").await.json();
    assert_eq!(pending["count"], 1);
    assert_eq!(
        pending["pending"],
        json!([{"user": "alice", "v_file": "a.txt", "file_size": 5}])
    );

    let response = server.get("/mine").await;
    assert_eq!(response.status_code(), 200);
    let mined: Value = response.json();
    assert_eq!(mined["message"], "New Block Forged");
    assert_eq!(mined["index"], 1);
    assert_eq!(
        mined["transactions"],
        json!([{"user": "alice", "v_file": "a.txt", "file_size": 5}])
    );
    assert!(mined["hash"].as_str().unwrap().starts_with("00"));
    assert!(mined["nonce"].is_u64());
    assert!(mined["timestamp"].is_f64());

    let chain: Value = server.get("/chain").await.json();
    assert_eq!(chain["length"], 2);
    assert_eq!(chain["chain"][1]["transactions"], json!([alice()]));
    assert_eq!(chain["chain"][1]["previous_hash"], chain["chain"][0]["hash"]);
    assert_eq!(mined["previous_hash"], chain["chain"][0]["hash"]);

    let pending: Value = server.get("/pending_tx").await.json();
    assert_eq!(pending["count"], 0);
    assert_eq!(pending["pending"], json!([]));
}

#[tokio::test]
async fn test_invalid_hex_is_rejected() {
    let (server, node) = test_server();
    let mut tx = alice();
    tx["file_data"] = json!("zz");

    let response = server.post("/new_transaction").json(&tx).await;

    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json, json!({"error": "file_data must be valid hex string"}));
    assert!(node.ledger.read().await.pending().is_empty());
}

#[tokio::test]
async fn test_submission_validation_messages() {
    let (server, _node) = test_server();

    let response = server.post("/new_transaction").json(&json!({"user": "alice"})).await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json["error"], "Missing required fields: v_file, file_data, file_size");

    let mut tx = alice();
    tx["file_size"] = json!(-1);
    let json: Value = server.post("/new_transaction").json(&tx).await.json();
    assert_eq!(json["error"], "file_size must be a non-negative integer");

    let mut tx = alice();
    tx["user"] = json!(7);
    let json: Value = server.post("/new_transaction").json(&tx).await.json();
    assert_eq!(json["error"], "user must be a string");

    let json: Value = server.post("/new_transaction").json(&json!([1, 2])).await.json();
    assert_eq!(json["error"], "Transaction must be a JSON object");
}

#[tokio::test]
async fn test_non_json_body_is_rejected() {
    let (server, node) = test_server();

    let response = server.post("/new_transaction").text("user=alice").await;

    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json, json!({"error": "Request must be JSON"}));
    assert!(node.ledger.read().await.pending().is_empty());
}

#[tokio::test]
async fn test_mine_with_empty_pool_is_noop() {
    let (server, node) = test_server();

    for _ in 0..2 {
        let response = server.get("/mine").await;
        assert_eq!(response.status_code(), 200);
        let json: Value = response.json();
        assert_eq!(json, json!({"message": "No transactions to mine", "pending_count": 0}));
    }
    assert_eq!(node.ledger.read().await.len(), 1);
}

#[tokio::test]
async fn test_chain_listing_round_trips_hashes() {
    let (server, _node) = test_server();
    for (i, user) in ["alice", "bob", "carol"].iter().enumerate() {
        let tx = json!({
            "user": user,
            "v_file": format!("{}.bin", i),
            "file_data": "00ff10",
            "file_size": 3
        });
        server.post("/new_transaction").json(&tx).await;
        server.get("/mine").await;
    }

    let snapshot: ChainSnapshot = server.get("/chain").await.json();

    assert_eq!(snapshot.length, 4);
    assert_eq!(snapshot.chain.len(), 4);
    for block in &snapshot.chain {
        assert_eq!(block.compute_hash(), block.hash);
    }
    assert!(is_valid_chain(&snapshot.chain));
}

#[tokio::test]
async fn test_peer_registration() {
    let (server, _node) = test_server();

    let response = server.post("/register_peer").json(&json!({})).await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json["error"], "peer is required");

    let response = server
        .post("/register_peer")
        .json(&json!({"peer": "http://127.0.0.1:8801/"}))
        .await;
    assert_eq!(response.status_code(), 201);
    let json: Value = response.json();
    assert_eq!(json["message"], "New peer added");
    assert_eq!(json["peers"], json!(["http://127.0.0.1:8801"]));

    // Registering the same peer again is idempotent.
    server
        .post("/register_peer")
        .json(&json!({"peer": "http://127.0.0.1:8801"}))
        .await;

    let json: Value = server.get("/peers").await.json();
    assert_eq!(json, json!({"peers": ["http://127.0.0.1:8801"]}));
}

#[tokio::test]
async fn test_resolve_without_peers_is_authoritative() {
    let (server, _node) = test_server();

    let response = server.get("/resolve").await;

    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json, json!({"message": "Chain is authoritative", "length": 1}));
}

#[tokio::test]
async fn test_health_reports_ledger_counts() {
    let (server, _node) = test_server();
    server.post("/new_transaction").json(&alice()).await;

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["chain_length"], 1);
    assert_eq!(json["pending_count"], 1);
    assert_eq!(json["peer_count"], 0);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_large_file_is_accepted() {
    let (server, node) = test_server();
    let file = vec![0xabu8; 1_200_000];
    let tx = json!({
        "user": "alice",
        "v_file": "large.bin",
        "file_data": hex::encode(&file),
        "file_size": file.len()
    });

    let response = server.post("/new_transaction").json(&tx).await;

    assert_eq!(response.status_code(), 201);
    let json: Value = response.json();
    assert_eq!(json["transaction"]["file_size"], 1_200_000);
    let ledger = node.ledger.read().await;
    assert_eq!(ledger.pending()[0].file_bytes().unwrap(), file);
}

#[tokio::test]
async fn test_body_over_limit_is_payload_too_large() {
    let mut config = Config::default();
    config.network.max_body_bytes = 1024;
    let node = Arc::new(Node::from_config(&config).expect("Failed to create node"));
    let app = build_api_router(node.clone());
    let server = TestServer::new(app).expect("Failed to create test server");
    let tx = json!({
        "user": "alice",
        "v_file": "a.bin",
        "file_data": "00".repeat(2048),
        "file_size": 2048
    });

    let response = server.post("/new_transaction").json(&tx).await;

    assert_eq!(response.status_code(), 413);
    let json: Value = response.json();
    assert_eq!(json, json!({"error": "Request body too large"}));
    assert!(node.ledger.read().await.pending().is_empty());
}
