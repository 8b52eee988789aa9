mod dispatch;
mod handlers;
mod resolver;

use std::sync::Arc;

use execai_core::{
    build_action_plan, ActionPlan, DecisionTrace, ExecutionResult, PipelineConfig,
    ResolvedRequest, TraceRecorder,
};
use execai_llm::IntentAdapter;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

pub use dispatch::{ActionDispatcher, ActionHandler, HandlerFailure};
pub use handlers::{
    mock_dispatcher, CreateReminderHandler, DraftEmailHandler, MockCalendar,
    ScheduleMeetingHandler, DEFAULT_EVENT_TITLE, DEFAULT_MEETING_MINUTES, MAX_MEETING_MINUTES,
    MIN_MEETING_MINUTES,
};
pub use resolver::HybridResolver;

/// Everything one request produced, in the shape callers serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub request_id: Uuid,
    pub resolved: ResolvedRequest,
    pub plan: ActionPlan,
    pub trace: DecisionTrace,
    pub result: ExecutionResult,
}

/// Entry point for a request: resolve, plan, dispatch. Immutable once built.
pub struct ExecutiveAgent<A> {
    resolver: HybridResolver<A>,
    dispatcher: ActionDispatcher,
}

impl<A> Clone for ExecutiveAgent<A> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<A> ExecutiveAgent<A>
where
    A: IntentAdapter,
{
    pub fn new(adapter: Arc<A>, dispatcher: ActionDispatcher) -> Self {
        Self {
            resolver: HybridResolver::new(adapter),
            dispatcher,
        }
    }

    /// Agent with the mock calendar, mail and reminder handlers registered.
    pub fn with_mock_handlers(adapter: Arc<A>, calendar: MockCalendar) -> Self {
        Self::new(adapter, mock_dispatcher(calendar))
    }

    pub fn adapter_name(&self) -> &'static str {
        self.resolver.adapter_name()
    }

    #[instrument(skip(self, raw_text, config), fields(llm_enabled = config.llm_enabled))]
    pub async fn resolve(
        &self,
        raw_text: &str,
        config: &PipelineConfig,
    ) -> (ResolvedRequest, DecisionTrace) {
        let mut trace = TraceRecorder::new();
        let resolved = self.resolver.resolve(raw_text, config, &mut trace).await;
        info!(
            intent = %resolved.intent,
            source = resolved.source.as_str(),
            confidence = resolved.confidence,
            "request resolved"
        );
        (resolved, trace.into_trace())
    }

    #[instrument(skip(self, raw_text, config), fields(llm_enabled = config.llm_enabled))]
    pub async fn resolve_and_execute(
        &self,
        raw_text: &str,
        config: &PipelineConfig,
    ) -> PipelineOutcome {
        let request_id = Uuid::new_v4();
        let mut trace = TraceRecorder::new();

        let resolved = self.resolver.resolve(raw_text, config, &mut trace).await;
        let plan = build_action_plan(&resolved, config.confidence_threshold, &mut trace);
        let result = self.dispatcher.dispatch(&plan, &mut trace);

        info!(
            request_id = %request_id,
            intent = %resolved.intent,
            source = resolved.source.as_str(),
            action = %plan.action_type,
            status = ?result.status,
            "request handled"
        );

        PipelineOutcome {
            request_id,
            resolved,
            plan,
            trace: trace.into_trace(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::NaiveDate;
    use execai_core::{
        ActionType, Entities, EntityKey, ExecutionStatus, Intent, Source, TraceStage,
    };
    use execai_llm::{
        parse_model_reply, AdapterFailure, LlmResolution, NullIntentAdapter, UnavailableReason,
    };

    use super::*;

    enum Behaviour {
        Answer(Intent, f32),
        Reply(&'static str),
        Fail(AdapterFailure),
        Hang,
    }

    struct StubAdapter {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl StubAdapter {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl IntentAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn resolve(
            &self,
            _text: &str,
            _timeout: Duration,
        ) -> Result<LlmResolution, AdapterFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Answer(intent, confidence) => {
                    let mut entities = Entities::new();
                    entities.insert_text(EntityKey::Recipient, "Priya");
                    Ok(LlmResolution {
                        intent: *intent,
                        entities,
                        confidence: *confidence,
                        model: "stub-model".to_string(),
                        coerced_label: None,
                        ignored_keys: vec!["room".to_string()],
                        rejected_values: Vec::new(),
                    })
                }
                Behaviour::Reply(reply) => parse_model_reply(reply, "stub-model"),
                Behaviour::Fail(failure) => Err(failure.clone()),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(AdapterFailure::Malformed("unreachable".to_string()))
                }
            }
        }
    }

    fn calendar() -> MockCalendar {
        let anchor = NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|day| day.and_hms_opt(8, 0, 0))
            .unwrap();
        MockCalendar::new(anchor)
    }

    fn agent<A: IntentAdapter>(adapter: Arc<A>) -> ExecutiveAgent<A> {
        ExecutiveAgent::with_mock_handlers(adapter, calendar())
    }

    fn enabled() -> PipelineConfig {
        PipelineConfig::default().with_llm(true)
    }

    #[tokio::test]
    async fn disabled_llm_is_never_called() {
        let adapter = StubAdapter::new(Behaviour::Answer(Intent::EmailDrafting, 0.9));
        let outcome = agent(adapter.clone())
            .resolve_and_execute("Email Sarah the invoice professionally", &PipelineConfig::default())
            .await;

        assert_eq!(adapter.calls(), 0);
        assert_eq!(outcome.resolved.source, Source::Rule);
        assert_eq!(
            outcome.trace.stage_descriptions(TraceStage::LlmAdapter),
            vec!["llm adapter disabled by configuration"]
        );
        assert!(!outcome.trace.has_stage(TraceStage::Fallback));
    }

    #[tokio::test]
    async fn successful_adapter_wins_without_fallback() {
        let adapter = StubAdapter::new(Behaviour::Answer(Intent::EmailDrafting, 0.9));
        let outcome = agent(adapter.clone())
            .resolve_and_execute("write something to priya", &enabled())
            .await;

        assert_eq!(adapter.calls(), 1);
        assert_eq!(outcome.resolved.source, Source::Llm);
        assert_eq!(outcome.resolved.intent, Intent::EmailDrafting);
        assert_eq!(outcome.plan.action_type, ActionType::DraftEmail);
        assert_eq!(outcome.result.payload["email"]["to"], "Priya");
        assert!(!outcome.trace.has_stage(TraceStage::Fallback));
        assert!(!outcome.trace.has_stage(TraceStage::RuleClassifier));
        assert!(outcome
            .trace
            .stage_descriptions(TraceStage::LlmAdapter)
            .iter()
            .any(|line| line.contains("room")));
    }

    #[tokio::test]
    async fn model_clock_times_and_lengths_reach_the_handlers() {
        let adapter = StubAdapter::new(Behaviour::Reply(
            r#"{"intent":"follow_up_reminder","confidence":0.9,"entities":{"topic":"call the bank","timeframe":"Tomorrow","time_of_day":"3pm"}}"#,
        ));
        let outcome = agent(adapter)
            .resolve_and_execute("remind me to call the bank tomorrow at 3pm", &enabled())
            .await;
        assert_eq!(outcome.resolved.source, Source::Llm);
        assert_eq!(outcome.result.status, ExecutionStatus::Success);
        assert_eq!(outcome.result.payload["reminder"]["due_date"], "2026-10-20");
        assert_eq!(outcome.result.payload["reminder"]["due_time"], "15:00");

        let adapter = StubAdapter::new(Behaviour::Reply(
            r#"{"intent":"meeting_scheduling","confidence":0.9,"entities":{"timeframe":"tomorrow","time_of_day":"3pm","duration_min":"45 minutes"}}"#,
        ));
        let outcome = agent(adapter)
            .resolve_and_execute("book 45 minutes tomorrow at 3pm", &enabled())
            .await;
        assert_eq!(outcome.result.status, ExecutionStatus::Success);
        assert_eq!(outcome.result.payload["meeting"]["duration_min"], 45);
        assert_eq!(outcome.result.payload["options"][0]["start"], "2026-10-20T15:00:00");
        assert_eq!(outcome.result.payload["options"][0]["end"], "2026-10-20T15:45:00");
    }

    #[tokio::test]
    async fn unusable_model_values_are_dropped_and_traced() {
        let adapter = StubAdapter::new(Behaviour::Reply(
            r#"{"intent":"follow_up_reminder","entities":{"topic":"renew the lease","time_of_day":"whenever works"}}"#,
        ));
        let outcome = agent(adapter)
            .resolve_and_execute("remind me to renew the lease whenever works", &enabled())
            .await;

        assert_eq!(outcome.resolved.source, Source::Llm);
        assert!(!outcome.resolved.entities.contains(EntityKey::TimeOfDay));
        assert_eq!(outcome.result.status, ExecutionStatus::Success);
        assert_eq!(outcome.result.payload["reminder"]["due_time"], "10:00");
        assert!(outcome
            .trace
            .stage_descriptions(TraceStage::LlmAdapter)
            .iter()
            .any(|line| line.contains("dropped unnormalizable entity values: time_of_day")));
    }

    #[tokio::test]
    async fn quota_failure_falls_back_to_rules() {
        let failure = AdapterFailure::Unavailable(UnavailableReason::QuotaExceeded {
            status: 429,
            detail: "insufficient_quota".to_string(),
        });
        let adapter = StubAdapter::new(Behaviour::Fail(failure));
        let outcome = agent(adapter)
            .resolve_and_execute("Find a time for all four of us to meet tomorrow", &enabled())
            .await;

        assert_eq!(outcome.resolved.source, Source::Rule);
        assert_eq!(outcome.resolved.intent, Intent::MeetingScheduling);
        let fallback = outcome.trace.stage_descriptions(TraceStage::Fallback);
        assert_eq!(fallback.len(), 1);
        assert!(fallback[0].contains("quota"));
        assert!(outcome.trace.stage_descriptions(TraceStage::Resolution)[0].contains("fallback"));
        assert_eq!(outcome.result.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn hung_adapter_times_out_into_fallback() {
        let adapter = StubAdapter::new(Behaviour::Hang);
        let config = PipelineConfig::new(true, 100, 0.6);
        let (resolved, trace) = agent(adapter)
            .resolve("Remind me to send the deck on Friday", &config)
            .await;

        assert_eq!(resolved.source, Source::Rule);
        assert_eq!(resolved.intent, Intent::FollowUpReminder);
        assert!(trace.stage_descriptions(TraceStage::Fallback)[0].contains("timed out after 100 ms"));
    }

    #[tokio::test]
    async fn null_adapter_enabled_still_resolves() {
        let outcome = agent(Arc::new(NullIntentAdapter))
            .resolve_and_execute("asdkjasdkj random gibberish", &enabled())
            .await;

        assert_eq!(outcome.resolved.intent, Intent::Unknown);
        assert_eq!(outcome.resolved.confidence, 0.0);
        assert_eq!(outcome.plan.action_type, ActionType::NoAction);
        assert_eq!(outcome.result.status, ExecutionStatus::Success);
        assert!(outcome.trace.has_stage(TraceStage::Fallback));
    }

    #[tokio::test]
    async fn repeated_requests_are_identical_apart_from_id() {
        let agent = agent(Arc::new(NullIntentAdapter));
        let config = PipelineConfig::default();
        let text = "Schedule a 45 minute call with Dana next Tuesday at 3pm";

        let first = agent.resolve_and_execute(text, &config).await;
        let second = agent.resolve_and_execute(text, &config).await;

        assert_ne!(first.request_id, second.request_id);
        assert_eq!(first.resolved, second.resolved);
        assert_eq!(first.plan, second.plan);
        assert_eq!(first.result, second.result);
        assert_eq!(first.trace, second.trace);
    }
}
