use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    MeetingScheduling,
    EmailDrafting,
    FollowUpReminder,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Self::MeetingScheduling,
        Self::EmailDrafting,
        Self::FollowUpReminder,
        Self::Unknown,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            Self::MeetingScheduling => "meeting_scheduling",
            Self::EmailDrafting => "email_drafting",
            Self::FollowUpReminder => "follow_up_reminder",
            Self::Unknown => "unknown",
        }
    }

    /// Exact label lookup. Returns `None` for anything outside the enumeration.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "meeting_scheduling" => Some(Self::MeetingScheduling),
            "email_drafting" => Some(Self::EmailDrafting),
            "follow_up_reminder" => Some(Self::FollowUpReminder),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Like [`Intent::from_label`] but total: unrecognized labels become `Unknown`.
    pub fn coerce_label(value: &str) -> Self {
        Self::from_label(value).unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Closed set of entity names the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    Participants,
    ParticipantCount,
    Recipient,
    Timeframe,
    TimeOfDay,
    DurationMin,
    Topic,
    Tone,
    MeetingType,
}

impl EntityKey {
    pub const ALL: [EntityKey; 9] = [
        Self::Participants,
        Self::ParticipantCount,
        Self::Recipient,
        Self::Timeframe,
        Self::TimeOfDay,
        Self::DurationMin,
        Self::Topic,
        Self::Tone,
        Self::MeetingType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Participants => "participants",
            Self::ParticipantCount => "participant_count",
            Self::Recipient => "recipient",
            Self::Timeframe => "timeframe",
            Self::TimeOfDay => "time_of_day",
            Self::DurationMin => "duration_min",
            Self::Topic => "topic",
            Self::Tone => "tone",
            Self::MeetingType => "meeting_type",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim().to_lowercase())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    List(Vec<String>),
}

impl EntityValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::List(_) => None,
        }
    }

    /// List view of the value; a single text value is a one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Text(value) => vec![value.clone()],
            Self::List(values) => values.clone(),
        }
    }
}

/// Entity mapping. Absent keys mean "not detected"; there are no null placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entities(BTreeMap<EntityKey, EntityValue>);

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a trimmed text value. Blank values are dropped.
    pub fn insert_text(&mut self, key: EntityKey, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.0.insert(key, EntityValue::Text(trimmed.to_string()));
        }
    }

    /// Inserts a list, dropping blank items. An empty list is not stored.
    pub fn insert_list(&mut self, key: EntityKey, values: Vec<String>) {
        let values = values
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>();
        if !values.is_empty() {
            self.0.insert(key, EntityValue::List(values));
        }
    }

    pub fn get(&self, key: EntityKey) -> Option<&EntityValue> {
        self.0.get(&key)
    }

    pub fn text(&self, key: EntityKey) -> Option<&str> {
        self.get(key).and_then(EntityValue::as_text)
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &EntityValue)> + '_ {
        self.0.iter().map(|(key, value)| (*key, value))
    }

    /// Copies only the listed keys that are present. Missing keys stay missing.
    pub fn project(&self, keys: &[EntityKey]) -> Self {
        let mut out = Self::new();
        for key in keys {
            if let Some(value) = self.0.get(key) {
                out.0.insert(*key, value.clone());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Rule,
    Llm,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Llm => "llm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub raw_text: String,
    pub intent: Intent,
    pub entities: Entities,
    pub confidence: f32,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
    LlmAdapter,
    Fallback,
    RuleClassifier,
    EntityExtractor,
    Resolution,
    Orchestrator,
    Dispatcher,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub stage: TraceStage,
    pub description: String,
}

/// Ordered record of every pipeline step for one request. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTrace {
    records: Vec<TraceRecord>,
}

impl DecisionTrace {
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn has_stage(&self, stage: TraceStage) -> bool {
        self.records.iter().any(|record| record.stage == stage)
    }

    pub fn stage_descriptions(&self, stage: TraceStage) -> Vec<&str> {
        self.records
            .iter()
            .filter(|record| record.stage == stage)
            .map(|record| record.description.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Request-local, append-only builder for a [`DecisionTrace`].
#[derive(Debug, Default)]
pub struct TraceRecorder {
    records: Vec<TraceRecord>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: TraceStage, description: impl Into<String>) {
        self.records.push(TraceRecord {
            stage,
            description: description.into(),
        });
    }

    pub fn into_trace(self) -> DecisionTrace {
        DecisionTrace {
            records: self.records,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ScheduleMeeting,
    DraftEmail,
    CreateReminder,
    NoAction,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScheduleMeeting => "schedule_meeting",
            Self::DraftEmail => "draft_email",
            Self::CreateReminder => "create_reminder",
            Self::NoAction => "no_action",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub action_type: ActionType,
    pub parameters: Entities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub action_type: ActionType,
    pub status: ExecutionStatus,
    pub payload: Value,
}

impl ExecutionResult {
    pub fn success(action_type: ActionType, payload: Value) -> Self {
        Self {
            action_type,
            status: ExecutionStatus::Success,
            payload,
        }
    }

    pub fn failed(action_type: ActionType, payload: Value) -> Self {
        Self {
            action_type,
            status: ExecutionStatus::Failed,
            payload,
        }
    }
}
