use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use execai_agents::{ExecutiveAgent, MockCalendar};
use execai_core::{
    classify_intent_rules, extract_entities, ActionType, EntityKey, ExecutionStatus, Intent,
    PipelineConfig, Source, TraceStage,
};
use execai_llm::{AdapterFailure, IntentAdapter, LlmResolution, NullIntentAdapter};
use proptest::prelude::*;

struct AlwaysMalformed;

impl IntentAdapter for AlwaysMalformed {
    fn name(&self) -> &'static str {
        "always_malformed"
    }

    async fn resolve(
        &self,
        _text: &str,
        _timeout: Duration,
    ) -> Result<LlmResolution, AdapterFailure> {
        Err(AdapterFailure::Malformed("not json".to_string()))
    }
}

fn calendar() -> MockCalendar {
    let anchor = NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|day| day.and_hms_opt(8, 0, 0))
        .unwrap();
    MockCalendar::new(anchor)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn expected_action(intent: Intent) -> ActionType {
    match intent {
        Intent::MeetingScheduling => ActionType::ScheduleMeeting,
        Intent::EmailDrafting => ActionType::DraftEmail,
        Intent::FollowUpReminder => ActionType::CreateReminder,
        Intent::Unknown => ActionType::NoAction,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn any_text_with_a_failing_model_still_resolves(text in "\\PC{0,160}") {
        let agent = ExecutiveAgent::with_mock_handlers(Arc::new(AlwaysMalformed), calendar());
        let config = PipelineConfig::default().with_llm(true);
        let outcome = runtime().block_on(agent.resolve_and_execute(&text, &config));

        prop_assert_eq!(outcome.resolved.source, Source::Rule);
        prop_assert!((0.0..=1.0).contains(&outcome.resolved.confidence));
        prop_assert_eq!(outcome.plan.action_type, expected_action(outcome.resolved.intent));
        prop_assert_eq!(outcome.trace.stage_descriptions(TraceStage::Fallback).len(), 1);
        prop_assert_eq!(outcome.trace.stage_descriptions(TraceStage::Resolution).len(), 1);
        for (key, value) in outcome.plan.parameters.iter() {
            prop_assert_eq!(outcome.resolved.entities.get(key), Some(value));
        }
        if outcome.resolved.intent == Intent::Unknown {
            prop_assert_eq!(outcome.result.status, ExecutionStatus::Success);
            prop_assert!(outcome.plan.parameters.is_empty());
        }
    }

    #[test]
    fn rule_engine_is_total_and_deterministic(text in any::<String>()) {
        let first = classify_intent_rules(&text);
        let second = classify_intent_rules(&text);
        prop_assert_eq!(first, second);
        prop_assert!([0.0, 0.6, 1.0].contains(&first.confidence));
        if first.intent == Intent::Unknown {
            prop_assert_eq!(first.confidence, 0.0);
        }
        prop_assert_eq!(extract_entities(&text, None), extract_entities(&text, None));
    }
}

#[tokio::test]
async fn scheduling_scenario() {
    let agent = ExecutiveAgent::with_mock_handlers(Arc::new(NullIntentAdapter), calendar());
    let outcome = agent
        .resolve_and_execute(
            "Find a time for all four of us to meet tomorrow",
            &PipelineConfig::default(),
        )
        .await;

    assert_eq!(outcome.resolved.intent, Intent::MeetingScheduling);
    assert_eq!(outcome.resolved.confidence, 1.0);
    assert_eq!(outcome.resolved.entities.text(EntityKey::Timeframe), Some("tomorrow"));
    assert_eq!(outcome.resolved.entities.text(EntityKey::ParticipantCount), Some("4"));
    assert_eq!(outcome.plan.action_type, ActionType::ScheduleMeeting);
    assert_eq!(outcome.result.status, ExecutionStatus::Success);
    assert_eq!(outcome.result.payload["options"][0]["start"], "2026-10-20T09:00:00");
    assert_eq!(outcome.result.payload["options"][0]["label"], "Option A");
}

#[tokio::test]
async fn email_scenario() {
    let agent = ExecutiveAgent::with_mock_handlers(Arc::new(NullIntentAdapter), calendar());
    let outcome = agent
        .resolve_and_execute("Email Sarah the invoice professionally", &PipelineConfig::default())
        .await;

    assert_eq!(outcome.resolved.intent, Intent::EmailDrafting);
    assert_eq!(outcome.resolved.entities.text(EntityKey::Recipient), Some("Sarah"));
    assert_eq!(outcome.resolved.entities.text(EntityKey::Tone), Some("professional"));
    assert_eq!(outcome.plan.action_type, ActionType::DraftEmail);
    let body = outcome.result.payload["email"]["body"].as_str().unwrap();
    assert!(body.starts_with("Hello Sarah,"));
    assert!(body.ends_with("Best regards,\nExecAI (Draft)"));
}

#[tokio::test]
async fn gibberish_scenario() {
    let agent = ExecutiveAgent::with_mock_handlers(Arc::new(NullIntentAdapter), calendar());
    let outcome = agent
        .resolve_and_execute("asdkjasdkj random gibberish", &PipelineConfig::default())
        .await;

    assert_eq!(outcome.resolved.intent, Intent::Unknown);
    assert_eq!(outcome.resolved.confidence, 0.0);
    assert_eq!(outcome.plan.action_type, ActionType::NoAction);
    assert_eq!(outcome.result.status, ExecutionStatus::Success);
    assert_eq!(outcome.result.payload, serde_json::json!({}));
}

#[tokio::test]
async fn low_confidence_plan_is_kept() {
    let agent = ExecutiveAgent::with_mock_handlers(Arc::new(NullIntentAdapter), calendar());
    let outcome = agent
        .resolve_and_execute("Can you draft something for me", &PipelineConfig::default())
        .await;

    assert_eq!(outcome.resolved.intent, Intent::EmailDrafting);
    assert_eq!(outcome.resolved.confidence, 0.6);
    assert_eq!(outcome.plan.action_type, ActionType::DraftEmail);

    let strict = PipelineConfig::new(false, 1_000, 0.9);
    let outcome = agent
        .resolve_and_execute("Can you draft something for me", &strict)
        .await;
    assert_eq!(outcome.plan.action_type, ActionType::DraftEmail);
    assert!(outcome
        .trace
        .stage_descriptions(TraceStage::Orchestrator)
        .iter()
        .any(|line| line.contains("below threshold")));
}
