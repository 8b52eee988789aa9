use std::sync::Arc;

use execai_core::{
    classify_intent_rules, extract_entities, normalize_text, Entities, PipelineConfig,
    ResolvedRequest, Source, TraceRecorder, TraceStage,
};
use execai_llm::{AdapterFailure, IntentAdapter, LlmResolution};
use tracing::{debug, warn};

/// Tries the language model when the config allows it and falls back to the
/// rule engine on any failure. Always yields a [`ResolvedRequest`].
pub struct HybridResolver<A> {
    adapter: Arc<A>,
}

impl<A> Clone for HybridResolver<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
        }
    }
}

impl<A> HybridResolver<A>
where
    A: IntentAdapter,
{
    pub fn new(adapter: Arc<A>) -> Self {
        Self { adapter }
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub async fn resolve(
        &self,
        raw_text: &str,
        config: &PipelineConfig,
        trace: &mut TraceRecorder,
    ) -> ResolvedRequest {
        let failure = if config.llm_enabled {
            match self.call_adapter(raw_text, config, trace).await {
                Ok(resolution) => return self.accept_llm(raw_text, resolution, trace),
                Err(failure) => {
                    warn!(
                        adapter = self.adapter.name(),
                        kind = failure.kind(),
                        error = %failure,
                        "llm adapter failed, using rule engine"
                    );
                    trace.record(
                        TraceStage::Fallback,
                        format!("{}: {failure}; falling back to rule engine", failure.kind()),
                    );
                    Some(failure)
                }
            }
        } else {
            trace.record(TraceStage::LlmAdapter, "llm adapter disabled by configuration");
            None
        };

        let resolved = resolve_with_rules(raw_text, trace);
        let description = match failure {
            Some(failure) => format!(
                "source rule after fallback ({}: {failure}); intent {}",
                failure.kind(),
                resolved.intent
            ),
            None => format!("source rule; intent {}", resolved.intent),
        };
        trace.record(TraceStage::Resolution, description);
        resolved
    }

    async fn call_adapter(
        &self,
        raw_text: &str,
        config: &PipelineConfig,
        trace: &mut TraceRecorder,
    ) -> Result<LlmResolution, AdapterFailure> {
        let limit = config.llm_timeout();
        trace.record(
            TraceStage::LlmAdapter,
            format!(
                "calling adapter {} with timeout {} ms",
                self.adapter.name(),
                config.llm_timeout_ms
            ),
        );
        match tokio::time::timeout(limit, self.adapter.resolve(raw_text, limit)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdapterFailure::timeout(limit)),
        }
    }

    fn accept_llm(
        &self,
        raw_text: &str,
        resolution: LlmResolution,
        trace: &mut TraceRecorder,
    ) -> ResolvedRequest {
        trace.record(
            TraceStage::LlmAdapter,
            format!(
                "model {} returned intent {} with confidence {:.2}",
                resolution.model, resolution.intent, resolution.confidence
            ),
        );
        if let Some(label) = &resolution.coerced_label {
            debug!(label = %label, "model label outside intent set");
            trace.record(
                TraceStage::LlmAdapter,
                format!("label {label:?} is not a known intent; coerced to unknown"),
            );
        }
        if !resolution.ignored_keys.is_empty() {
            warn!(keys = ?resolution.ignored_keys, "ignoring unrecognized entity keys from model");
            trace.record(
                TraceStage::LlmAdapter,
                format!(
                    "ignored unrecognized entity keys: {}",
                    resolution.ignored_keys.join(", ")
                ),
            );
        }
        if !resolution.rejected_values.is_empty() {
            warn!(
                values = ?resolution.rejected_values,
                "dropping entity values the model returned in an unusable form"
            );
            trace.record(
                TraceStage::LlmAdapter,
                format!(
                    "dropped unnormalizable entity values: {}",
                    resolution.rejected_values.join(", ")
                ),
            );
        }
        trace.record(
            TraceStage::Resolution,
            format!("source llm; intent {}", resolution.intent),
        );

        ResolvedRequest {
            raw_text: raw_text.to_string(),
            intent: resolution.intent,
            entities: resolution.entities,
            confidence: resolution.confidence,
            source: Source::Llm,
        }
    }
}

fn resolve_with_rules(raw_text: &str, trace: &mut TraceRecorder) -> ResolvedRequest {
    let normalized = normalize_text(raw_text);
    let rule = classify_intent_rules(&normalized);
    trace.record(
        TraceStage::RuleClassifier,
        format!(
            "rule {} matched: intent {} confidence {:.2}",
            rule.rule, rule.intent, rule.confidence
        ),
    );

    let entities = extract_entities(&normalized, Some(rule.intent));
    trace.record(TraceStage::EntityExtractor, describe_entities(&entities));

    ResolvedRequest {
        raw_text: raw_text.to_string(),
        intent: rule.intent,
        entities,
        confidence: rule.confidence,
        source: Source::Rule,
    }
}

fn describe_entities(entities: &Entities) -> String {
    if entities.is_empty() {
        return "no entities extracted".to_string();
    }
    let keys = entities.keys().map(|key| key.as_str()).collect::<Vec<_>>();
    format!("extracted {}", keys.join(", "))
}
