use execai_core::{normalize_entity_value, Entities, EntityKey, Intent};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::{AdapterFailure, LlmResolution};

/// Used when the model omits a confidence or returns a non-number.
pub const DEFAULT_LLM_CONFIDENCE: f32 = 0.5;

const RESERVED_KEYS: &[&str] = &["intent", "confidence", "entities", "original_text"];

/// Slice from the first `{` to the last `}`; models like to wrap JSON in prose or fences.
pub fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

pub fn parse_model_reply(reply: &str, model: &str) -> Result<LlmResolution, AdapterFailure> {
    let json = extract_json(reply)
        .ok_or_else(|| AdapterFailure::Malformed("no JSON object in model reply".to_string()))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|error| AdapterFailure::Malformed(format!("model reply is not valid JSON: {error}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| AdapterFailure::Malformed("model reply is not a JSON object".to_string()))?;

    let label = object
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterFailure::Malformed("model reply has no string `intent`".to_string()))?;
    let intent = Intent::coerce_label(label);
    let coerced_label = Intent::from_label(label)
        .is_none()
        .then(|| label.to_string());

    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|value| value as f32)
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_LLM_CONFIDENCE);

    let collected = collect_entities(object);
    if !collected.ignored.is_empty() {
        debug!(ignored = ?collected.ignored, "model returned unrecognized entity keys");
    }
    if !collected.rejected.is_empty() {
        debug!(rejected = ?collected.rejected, "model returned entity values in an unusable form");
    }

    Ok(LlmResolution {
        intent,
        entities: collected.entities,
        confidence,
        model: model.to_string(),
        coerced_label,
        ignored_keys: collected.ignored,
        rejected_values: collected.rejected,
    })
}

#[derive(Default)]
struct CollectedEntities {
    entities: Entities,
    ignored: Vec<String>,
    rejected: Vec<String>,
}

impl CollectedEntities {
    fn insert(&mut self, name: &str, key: EntityKey, raw: &str) {
        match normalize_entity_value(key, raw) {
            Some(value) => self.entities.insert_text(key, value),
            None => self.rejected.push(format!("{name}={raw:?}")),
        }
    }
}

/// Reads entities from a nested `entities` object and from top-level fields.
/// Values go through the same normalization the rule extractor applies.
/// Unknown names are reported back, never stored.
fn collect_entities(object: &Map<String, Value>) -> CollectedEntities {
    let mut collected = CollectedEntities::default();

    let nested = object
        .get("entities")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.iter());
    let top_level = object
        .iter()
        .filter(|(name, _)| !RESERVED_KEYS.contains(&name.as_str()));

    for (name, value) in nested.chain(top_level) {
        if value.is_null() {
            continue;
        }
        let Some(key) = EntityKey::parse(name) else {
            collected.ignored.push(name.clone());
            continue;
        };

        match (key, value) {
            // the original schema sent participants as a head count
            (EntityKey::Participants, Value::Number(count)) => {
                collected.insert(name, EntityKey::ParticipantCount, &number_text(count));
            }
            (EntityKey::Participants, Value::Array(items)) => {
                let names = items
                    .iter()
                    .filter_map(scalar_text)
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<_>>();
                if !names.is_empty() {
                    collected.entities.insert_list(key, names);
                }
            }
            (_, Value::Array(items)) => {
                let joined = items.iter().filter_map(scalar_text).collect::<Vec<_>>().join(", ");
                collected.insert(name, key, &joined);
            }
            (_, Value::String(_) | Value::Number(_)) => {
                if let Some(text) = scalar_text(value) {
                    collected.insert(name, key, &text);
                }
            }
            _ => collected.ignored.push(name.clone()),
        }
    }

    collected
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number_text(number)),
        _ => None,
    }
}

/// `45.0` reads as `45`; minutes and head counts are whole numbers.
fn number_text(number: &Number) -> String {
    number
        .as_u64()
        .map(|value| value.to_string())
        .or_else(|| {
            number
                .as_f64()
                .filter(|value| *value >= 0.0 && value.fract() == 0.0)
                .map(|value| format!("{value:.0}"))
        })
        .unwrap_or_else(|| number.to_string())
}
