use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use execai_agents::PipelineOutcome;
use execai_core::{ActionType, ExecutionStatus, Intent, Source, TraceStage};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide request counters. Lives in the outer layers only; the
/// pipeline itself never touches it.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    requests_total: AtomicU64,
    llm_resolved_total: AtomicU64,
    fallback_total: AtomicU64,
    failed_actions_total: AtomicU64,
    intent_totals: [AtomicU64; 4],
    action_totals: [AtomicU64; 4],
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentCounts {
    pub meeting_scheduling: u64,
    pub email_drafting: u64,
    pub follow_up_reminder: u64,
    pub unknown: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionCounts {
    pub schedule_meeting: u64,
    pub draft_email: u64,
    pub create_reminder: u64,
    pub no_action: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub llm_resolved_total: u64,
    pub fallback_total: u64,
    pub failed_actions_total: u64,
    pub intents: IntentCounts,
    pub actions: ActionCounts,
    pub avg_latency_millis: f64,
}

impl PipelineMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Counts a request that only went through resolution.
    pub fn record_resolution(&self, intent: Intent, source: Source, fell_back: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.intent_totals[intent_slot(intent)].fetch_add(1, Ordering::Relaxed);
        if source == Source::Llm {
            self.llm_resolved_total.fetch_add(1, Ordering::Relaxed);
        }
        if fell_back {
            self.fallback_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_outcome(&self, outcome: &PipelineOutcome) {
        self.record_resolution(
            outcome.resolved.intent,
            outcome.resolved.source,
            outcome.trace.has_stage(TraceStage::Fallback),
        );
        self.action_totals[action_slot(outcome.plan.action_type)].fetch_add(1, Ordering::Relaxed);
        if outcome.result.status == ExecutionStatus::Failed {
            self.failed_actions_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);
        let intent = |slot: usize| self.intent_totals[slot].load(Ordering::Relaxed);
        let action = |slot: usize| self.action_totals[slot].load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            llm_resolved_total: self.llm_resolved_total.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            failed_actions_total: self.failed_actions_total.load(Ordering::Relaxed),
            intents: IntentCounts {
                meeting_scheduling: intent(intent_slot(Intent::MeetingScheduling)),
                email_drafting: intent(intent_slot(Intent::EmailDrafting)),
                follow_up_reminder: intent(intent_slot(Intent::FollowUpReminder)),
                unknown: intent(intent_slot(Intent::Unknown)),
            },
            actions: ActionCounts {
                schedule_meeting: action(action_slot(ActionType::ScheduleMeeting)),
                draft_email: action(action_slot(ActionType::DraftEmail)),
                create_reminder: action(action_slot(ActionType::CreateReminder)),
                no_action: action(action_slot(ActionType::NoAction)),
            },
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

fn intent_slot(intent: Intent) -> usize {
    match intent {
        Intent::MeetingScheduling => 0,
        Intent::EmailDrafting => 1,
        Intent::FollowUpReminder => 2,
        Intent::Unknown => 3,
    }
}

fn action_slot(action: ActionType) -> usize {
    match action {
        ActionType::ScheduleMeeting => 0,
        ActionType::DraftEmail => 1,
        ActionType::CreateReminder => 2,
        ActionType::NoAction => 3,
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,execai_agents=info,execai_llm=info",
                service_name.replace('-', "_")
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
