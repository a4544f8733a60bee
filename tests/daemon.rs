mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use defier::daemon::{build_router, AppState};

use common::{
    text, usdc_balances, Harness, QueueLlmProvider, RecordingBridgeProvider, RecordingSigner,
    StaticToolCatalog, ALICE, WALLET,
};

const VITALIK: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

fn app(harness: Harness) -> Router {
    build_router(AppState {
        orchestrator: Arc::new(harness.orchestrator),
    })
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn default_app() -> Router {
    app(Harness::with_bridge(RecordingBridgeProvider::with_balances(
        usdc_balances(&[(421614, "100")]),
    )))
}

#[tokio::test]
async fn health_reports_ok() {
    let app = default_app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn chat_returns_the_reply_and_intent() {
    let llm = QueueLlmProvider::new(vec![text("Sending 5 USDC to Alice on Base.")]).with_text(vec![Ok(
        format!(
            "Intent: {{\"action\":\"transfer\",\"token\":\"USDC\",\"amount\":\"5\",\"recipient\":\"{ALICE}\",\"chain\":\"base\"}}"
        ),
    )]);
    let app = app(Harness::new(
        llm,
        StaticToolCatalog::default(),
        RecordingBridgeProvider::default(),
        RecordingSigner::default(),
    ));

    let (status, body) = post(
        &app,
        "/chat",
        json!({"messages": [{"role": "user", "content": format!("send 5 usdc to {ALICE} on base")}], "wallet": WALLET}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], json!("Sending 5 USDC to Alice on Base."));
    assert_eq!(body["intent"]["action"], json!("transfer"));
    assert_eq!(body["intent"]["chain"], json!("base"));
}

#[tokio::test]
async fn chat_with_a_wallet_carries_a_dry_run_plan() {
    let intent = format!(
        "Intent: {{\"action\":\"transfer\",\"token\":\"USDC\",\"amount\":\"10\",\"recipient\":\"{ALICE}\",\"chain\":\"arbitrum\"}}"
    );
    let llm = QueueLlmProvider::new(vec![
        text("Sending 10 USDC to Alice on Arbitrum."),
        text("Sending 10 USDC to Alice on Arbitrum."),
    ])
    .with_text(vec![Ok(intent.clone()), Ok(intent)]);
    let harness = Harness::new(
        llm,
        StaticToolCatalog::default(),
        RecordingBridgeProvider::with_balances(usdc_balances(&[(421614, "100")])),
        RecordingSigner::default(),
    );
    let bridge = harness.bridge.clone();
    let app = app(harness);
    let messages = json!([{"role": "user", "content": format!("send 10 usdc to {ALICE} on arbitrum")}]);

    let (status, body) = post(&app, "/chat", json!({"messages": messages, "wallet": WALLET})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["outcome"], json!("planned"));
    assert_eq!(body["plan"]["strategy"]["strategy"], json!("direct_transfer"));

    let (status, body) = post(&app, "/chat", json!({"messages": messages})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"]["action"], json!("transfer"));
    assert!(body.get("plan").is_none());

    assert!(bridge.transfers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn chat_configuration_errors_are_500() {
    let llm = QueueLlmProvider::new(vec![Err(defier::error::DefierError::Config(
        "missing OpenAI API key".to_string(),
    ))]);
    let app = app(Harness::new(
        llm,
        StaticToolCatalog::default(),
        RecordingBridgeProvider::default(),
        RecordingSigner::default(),
    ));
    let (status, body) = post(
        &app,
        "/chat",
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("missing OpenAI API key"));
}

#[tokio::test]
async fn intent_requires_text_and_falls_back_to_heuristics() {
    let app = default_app();

    let (status, body) = post(&app, "/intent", json!({"text": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = post(
        &app,
        "/intent",
        json!({"text": format!("send 0.5 eth to {ALICE} on base")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["intent"],
        json!({"action": "transfer", "token": "ETH", "amount": "0.5", "recipient": ALICE, "chain": "base"})
    );

    let (status, body) = post(&app, "/intent", json!({"text": "what's new in crypto?"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], Value::Null);
}

#[tokio::test]
async fn ens_lookup_statuses() {
    let tools = StaticToolCatalog::default()
        .with_result("get_address_by_ens_name", json!({"data": {"address": VITALIK}}));
    let app = app(Harness::new(
        QueueLlmProvider::default(),
        tools,
        RecordingBridgeProvider::default(),
        RecordingSigner::default(),
    ));

    let (status, body) = post(&app, "/ens", json!({"name": "vitalik.eth"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"address": VITALIK}));

    let (status, body) = post(&app, "/ens", json!({"name": "vitalik"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "invalid_name"}));

    let no_tools = default_app();
    let (status, body) = post(&no_tools, "/ens", json!({"name": "ghost.eth"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "not_found"}));
}

#[tokio::test]
async fn execute_and_confirm_round_trip() {
    let app = default_app();

    let (status, body) = post(
        &app,
        "/execute",
        json!({
            "intent": {"action": "transfer", "token": "USDC", "amount": "10", "recipient": ALICE, "chain": "arbitrum"},
            "wallet": WALLET
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], json!("executed"));
    assert_eq!(body["strategy"]["strategy"], json!("direct_transfer"));
    assert_eq!(body["result"]["status"], json!("success"));

    let (status, body) = post(
        &app,
        "/execute",
        json!({
            "intent": {"action": "bridge", "token": "USDC", "amount": "5", "recipient": "self", "chain": "base"},
            "wallet": WALLET,
            "source": "arbitrum"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], json!("bridge_preview"));

    let mut preview = body.clone();
    preview.as_object_mut().unwrap().remove("outcome");
    let (status, body) = post(
        &app,
        "/bridge/confirm",
        json!({"preview": preview, "wallet": WALLET}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["tx_hash"], json!("0xbridge"));
}

#[tokio::test]
async fn execute_reports_rejections_and_plans() {
    let app = default_app();

    let (_, body) = post(
        &app,
        "/execute",
        json!({
            "intent": {"action": "bridge", "token": "USDC", "amount": "5", "recipient": "self", "chain": "base"},
            "wallet": WALLET
        }),
    )
    .await;
    assert_eq!(body["outcome"], json!("rejected"));
    assert!(body["reason"].as_str().unwrap().contains("source chain"));

    let (_, body) = post(
        &app,
        "/execute",
        json!({
            "intent": {"action": "transfer", "token": "USDC", "amount": "10", "recipient": ALICE, "chain": "arbitrum"},
            "wallet": WALLET,
            "dry_run": true
        }),
    )
    .await;
    assert_eq!(body["outcome"], json!("planned"));
}
