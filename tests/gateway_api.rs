use std::sync::Arc;

use referral_tree::engine::{EngineSettings, ReferralEngine};
use referral_tree::gateway::{router, state::AppState};
use referral_tree::node::NewParticipant;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Serve a fresh engine on an ephemeral port, returns the base URL
async fn spawn_gateway() -> String {
    let engine = ReferralEngine::with_founder(
        EngineSettings::default(),
        NewParticipant::founder("F", "f@x.io"),
    )
    .unwrap();
    let app = router(Arc::new(AppState::new(Arc::new(engine))));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn register(client: &reqwest::Client, base: &str, sponsor: u64, name: &str) -> Value {
    client
        .post(format!("{base}/api/v1/participants"))
        .json(&json!({"sponsor_id": sponsor, "name": name, "email": format!("{name}@x.io")}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn register_sell_and_list_over_http() {
    let base = spawn_gateway().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["code"], 0);

    let c1 = register(&client, &base, 1, "C1").await;
    assert_eq!(c1["code"], 0);
    assert_eq!(c1["data"]["node_id"], 2);
    assert_eq!(c1["data"]["side"], "left");
    register(&client, &base, 1, "C2").await;
    let c3 = register(&client, &base, 1, "C3").await;
    assert_eq!(c3["data"]["structural_parent_id"], 2);
    assert_eq!(c3["data"]["spillover"], true);

    // 10.00 in a two-decimal currency
    let sale: Value = client
        .post(format!("{base}/api/v1/sales"))
        .json(&json!({"seller_id": 4, "amount": "10.00"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sale["code"], 0);
    assert_eq!(sale["data"]["receipt"]["amount"], 1000);
    assert_eq!(sale["data"]["receipt"]["direct"]["node_id"], 1);
    assert_eq!(sale["data"]["receipt"]["direct"]["amount"], 100);
    assert_eq!(sale["data"]["total_paid_display"], "1.50");

    let c1_view: Value = client
        .get(format!("{base}/api/v1/participants/2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(c1_view["data"]["indirect_income"], 50);

    let tree: Value = client
        .get(format!("{base}/api/v1/tree"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tree["data"]["total_nodes"], 4);
    assert_eq!(tree["data"]["levels"].as_array().unwrap().len(), 3);

    let report: Value = client
        .post(format!("{base}/api/v1/consolidation"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["data"]["run_id"], 1);
    assert_eq!(report["data"]["total_users"], 4);

    let csv = client
        .get(format!("{base}/api/v1/ledger.csv"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(csv.starts_with("seq,sale_id,node_id,field,reason,op,delta,value_after"));
}

#[tokio::test]
async fn errors_use_the_envelope() {
    let base = spawn_gateway().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/v1/participants/99"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 4001);
    assert!(body.get("data").is_none());

    // Excess precision is refused before the engine sees it
    let resp = client
        .post(format!("{base}/api/v1/sales"))
        .json(&json!({"seller_id": 1, "amount": "1.001"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 1002);

    let resp = client
        .post(format!("{base}/api/v1/participants"))
        .json(&json!({"sponsor_id": 1, "name": "X", "email": "x@x.io", "user_type": "founder"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{base}/api/v1/corrections"))
        .json(&json!({"node_id": 1, "direct_income": "-5.00"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_published_tree_version() {
    let base = spawn_gateway().await;
    let client = reqwest::Client::new();
    let tree_version = |body: Value| body["data"]["tree_version"].as_u64().unwrap();

    let health: Value = client
        .get(format!("{base}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let before = tree_version(health);

    register(&client, &base, 1, "C1").await;
    let health: Value = client
        .get(format!("{base}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tree_version(health), before + 1);
}
