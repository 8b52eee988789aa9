use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use execai_agents::{ExecutiveAgent, MockCalendar};
use execai_api::build_app;
use execai_core::PipelineConfig;
use execai_llm::NullIntentAdapter;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let anchor = NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|day| day.and_hms_opt(8, 0, 0))
        .unwrap();
    let agent = ExecutiveAgent::with_mock_handlers(Arc::new(NullIntentAdapter), MockCalendar::new(anchor));
    build_app(agent, PipelineConfig::default(), false, &[])
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_adapter_and_defaults() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let parsed = json_body(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["adapter"], "null");
    assert_eq!(parsed["defaults"]["llm_enabled"], false);
    assert_eq!(parsed["metrics"]["requests_total"], 0);
}

#[tokio::test]
async fn blank_text_is_rejected() {
    for uri in ["/v1/assistant", "/v1/parse-intent"] {
        let response = app()
            .oneshot(post_json(uri, json!({ "text": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "text_required");
    }

    let response = app().oneshot(post_json("/v1/assistant", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assistant_returns_full_outcome() {
    let response = app()
        .oneshot(post_json(
            "/v1/assistant",
            json!({ "text": "Email Sarah the invoice professionally" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert!(parsed["request_id"].is_string());
    assert_eq!(parsed["resolved"]["intent"], "email_drafting");
    assert_eq!(parsed["resolved"]["source"], "rule");
    assert_eq!(parsed["resolved"]["entities"]["recipient"], "Sarah");
    assert_eq!(parsed["resolved"]["entities"]["tone"], "professional");
    assert_eq!(parsed["plan"]["action_type"], "draft_email");
    assert_eq!(parsed["result"]["status"], "success");
    assert_eq!(parsed["result"]["payload"]["email"]["to"], "Sarah");
    assert!(parsed["trace"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn parse_intent_stops_before_planning() {
    let response = app()
        .oneshot(post_json(
            "/v1/parse-intent",
            json!({ "text": "asdkjasdkj random gibberish" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["resolved"]["intent"], "unknown");
    assert_eq!(parsed["resolved"]["confidence"], 0.0);
    assert!(parsed.get("plan").is_none());
    let stages = parsed["trace"]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["stage"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert!(!stages.contains(&"orchestrator".to_string()));
}

#[tokio::test]
async fn request_can_enable_the_llm() {
    let response = app()
        .oneshot(post_json(
            "/v1/assistant",
            json!({ "text": "Find a time for all four of us to meet tomorrow", "llm_enabled": true }),
        ))
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["resolved"]["source"], "rule");
    assert_eq!(parsed["resolved"]["entities"]["timeframe"], "tomorrow");
    assert_eq!(parsed["result"]["status"], "success");
    let fallback = parsed["trace"]
        .as_array()
        .unwrap()
        .iter()
        .find(|record| record["stage"] == "fallback")
        .expect("fallback record");
    assert!(fallback["description"]
        .as_str()
        .unwrap()
        .contains("adapter_unavailable"));
}
