use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use execai_agents::{ExecutiveAgent, MockCalendar};
use execai_core::{EntityKey, Intent, PipelineConfig, Source, TraceStage};
use execai_llm::{
    AdapterFailure, IntentAdapter, OpenAiIntentAdapter, OpenAiRuntimeConfig, UnavailableReason,
};
use serde_json::{json, Value};

const API_KEY: &str = "test-key";

#[derive(Clone)]
enum Reply {
    Json(StatusCode, Value),
    Raw(StatusCode, &'static str),
}

/// Local stand-in for the chat completions endpoint. Rejects requests that
/// lack the bearer token or the JSON response format.
async fn spawn_stub(reply: Reply, delay: Duration) -> String {
    let handler = move |headers: HeaderMap, Json(payload): Json<Value>| {
        let reply = reply.clone();
        async move {
            tokio::time::sleep(delay).await;
            let authorized = headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                == Some(format!("Bearer {API_KEY}").as_str());
            if !authorized {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            if payload["response_format"]["type"] != "json_object" || payload["temperature"] != 0 {
                return StatusCode::BAD_REQUEST.into_response();
            }
            match reply {
                Reply::Json(status, body) => (status, Json(body)).into_response(),
                Reply::Raw(status, body) => (status, body).into_response(),
            }
        }
    };
    let app = Router::new().route("/v1/chat/completions", post(handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn adapter(base_url: &str, api_key: &str) -> OpenAiIntentAdapter {
    let runtime = OpenAiRuntimeConfig::new(api_key).with_base_url(base_url);
    OpenAiIntentAdapter::new(Some(runtime)).unwrap()
}

fn agent(adapter: OpenAiIntentAdapter) -> ExecutiveAgent<OpenAiIntentAdapter> {
    let anchor = NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|day| day.and_hms_opt(8, 0, 0))
        .unwrap();
    ExecutiveAgent::with_mock_handlers(Arc::new(adapter), MockCalendar::new(anchor))
}

fn unavailable(failure: AdapterFailure) -> UnavailableReason {
    match failure {
        AdapterFailure::Unavailable(reason) => reason,
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn valid_completion_resolves_through_llm() {
    let content = r#"{"intent":"meeting_scheduling","confidence":0.88,"entities":{"participants":["Dana","Lee"],"timeframe":"next week","duration_min":45,"mood":"upbeat"}}"#;
    let base_url = spawn_stub(
        Reply::Json(StatusCode::OK, completion(content)),
        Duration::ZERO,
    )
    .await;

    let resolution = adapter(&base_url, API_KEY)
        .resolve("set up 45 minutes with Dana and Lee next week", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(resolution.intent, Intent::MeetingScheduling);
    assert_eq!(resolution.entities.text(EntityKey::DurationMin), Some("45"));
    assert_eq!(resolution.ignored_keys, vec!["mood".to_string()]);

    let outcome = agent(adapter(&base_url, API_KEY))
        .resolve_and_execute(
            "set up 45 minutes with Dana and Lee next week",
            &PipelineConfig::default().with_llm(true),
        )
        .await;
    assert_eq!(outcome.resolved.source, Source::Llm);
    assert!(!outcome.trace.has_stage(TraceStage::Fallback));
    assert_eq!(outcome.result.payload["options"][0]["start"], "2026-10-26T09:00:00");
}

#[tokio::test]
async fn quota_rejection_falls_back_with_reason() {
    let base_url = spawn_stub(
        Reply::Json(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "type": "insufficient_quota", "message": "You exceeded your current quota" } }),
        ),
        Duration::ZERO,
    )
    .await;

    let reason = unavailable(
        adapter(&base_url, API_KEY)
            .resolve("anything", Duration::from_secs(5))
            .await
            .unwrap_err(),
    );
    assert!(matches!(reason, UnavailableReason::QuotaExceeded { status: 429, .. }));

    let outcome = agent(adapter(&base_url, API_KEY))
        .resolve_and_execute(
            "Find a time for all four of us to meet tomorrow",
            &PipelineConfig::default().with_llm(true),
        )
        .await;
    assert_eq!(outcome.resolved.source, Source::Rule);
    assert_eq!(outcome.resolved.intent, Intent::MeetingScheduling);
    assert!(outcome.trace.stage_descriptions(TraceStage::Fallback)[0].contains("quota"));
}

#[tokio::test]
async fn wrong_key_is_unauthorized() {
    let base_url = spawn_stub(
        Reply::Json(StatusCode::OK, completion(r#"{"intent":"unknown"}"#)),
        Duration::ZERO,
    )
    .await;
    let reason = unavailable(
        adapter(&base_url, "not-the-key")
            .resolve("hello", Duration::from_secs(5))
            .await
            .unwrap_err(),
    );
    assert_eq!(reason, UnavailableReason::Unauthorized(401));
}

#[tokio::test]
async fn missing_credential_never_calls_out() {
    let failure = OpenAiIntentAdapter::new(None)
        .unwrap()
        .resolve("hello", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(unavailable(failure), UnavailableReason::MissingCredential);
}

#[tokio::test]
async fn garbage_bodies_are_malformed() {
    for reply in [
        Reply::Raw(StatusCode::OK, "<html>gateway</html>"),
        Reply::Json(StatusCode::OK, completion("I think this is about a meeting.")),
        Reply::Json(StatusCode::OK, json!({ "choices": [] })),
    ] {
        let base_url = spawn_stub(reply, Duration::ZERO).await;
        let failure = adapter(&base_url, API_KEY)
            .resolve("hello", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), "adapter_error");
    }
}

#[tokio::test]
async fn slow_endpoint_times_out_into_fallback() {
    let base_url = spawn_stub(
        Reply::Json(StatusCode::OK, completion(r#"{"intent":"email_drafting"}"#)),
        Duration::from_secs(3),
    )
    .await;

    let config = PipelineConfig::new(true, 200, 0.6);
    let (resolved, trace) = agent(adapter(&base_url, API_KEY))
        .resolve("Remind me to renew the lease", &config)
        .await;

    assert_eq!(resolved.source, Source::Rule);
    assert_eq!(resolved.intent, Intent::FollowUpReminder);
    assert!(trace.stage_descriptions(TraceStage::Fallback)[0].contains("timed out after 200 ms"));
}
