use crate::models::{
    ActionPlan, ActionType, EntityKey, Intent, ResolvedRequest, TraceRecorder, TraceStage,
};

struct PlanRule {
    name: &'static str,
    action_type: ActionType,
    parameter_keys: &'static [EntityKey],
}

/// The only place intents map to plans. Adding an intent fails to compile until it is handled here.
fn plan_rule(intent: Intent) -> PlanRule {
    match intent {
        Intent::MeetingScheduling => PlanRule {
            name: "meeting_scheduling_to_schedule_meeting",
            action_type: ActionType::ScheduleMeeting,
            parameter_keys: &[
                EntityKey::Participants,
                EntityKey::ParticipantCount,
                EntityKey::Timeframe,
                EntityKey::TimeOfDay,
                EntityKey::DurationMin,
                EntityKey::MeetingType,
                EntityKey::Topic,
            ],
        },
        Intent::EmailDrafting => PlanRule {
            name: "email_drafting_to_draft_email",
            action_type: ActionType::DraftEmail,
            parameter_keys: &[EntityKey::Recipient, EntityKey::Topic, EntityKey::Tone],
        },
        Intent::FollowUpReminder => PlanRule {
            name: "follow_up_reminder_to_create_reminder",
            action_type: ActionType::CreateReminder,
            parameter_keys: &[EntityKey::Topic, EntityKey::Timeframe, EntityKey::TimeOfDay],
        },
        Intent::Unknown => PlanRule {
            name: "unknown_to_no_action",
            action_type: ActionType::NoAction,
            parameter_keys: &[],
        },
    }
}

/// Picks the plan for a resolved request. Confidence never changes the plan;
/// a score under `confidence_threshold` is only noted in the trace.
pub fn build_action_plan(
    resolved: &ResolvedRequest,
    confidence_threshold: f32,
    trace: &mut TraceRecorder,
) -> ActionPlan {
    let rule = plan_rule(resolved.intent);
    let parameters = resolved.entities.project(rule.parameter_keys);

    let missing = rule
        .parameter_keys
        .iter()
        .filter(|key| !parameters.contains(**key))
        .map(|key| key.as_str())
        .collect::<Vec<_>>();

    let mut description = format!(
        "rule {} fired: intent {} -> action {}",
        rule.name, resolved.intent, rule.action_type
    );
    if !missing.is_empty() {
        description.push_str(&format!(" (absent: {})", missing.join(", ")));
    }
    trace.record(TraceStage::Orchestrator, description);

    if resolved.confidence < confidence_threshold {
        trace.record(
            TraceStage::Orchestrator,
            format!(
                "confidence {:.2} below threshold {:.2}; plan kept, score is informational",
                resolved.confidence, confidence_threshold
            ),
        );
    }

    ActionPlan {
        action_type: rule.action_type,
        parameters,
    }
}
