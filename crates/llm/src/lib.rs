mod openai;
mod parse;

use std::future::Future;
use std::time::Duration;

use execai_core::{Entities, Intent};
use thiserror::Error;

pub use openai::{OpenAiIntentAdapter, OpenAiRuntimeConfig};
pub use parse::{extract_json, parse_model_reply, DEFAULT_LLM_CONFIDENCE};

/// What a language model said about a request, already validated against the
/// fixed intent set.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResolution {
    pub intent: Intent,
    pub entities: Entities,
    pub confidence: f32,
    pub model: String,
    /// Original label when the model answered outside the intent set.
    pub coerced_label: Option<String>,
    /// Entity names the model returned that the pipeline does not recognize.
    pub ignored_keys: Vec<String>,
    /// `key="value"` pairs for recognized entities whose value could not be
    /// normalized; they are dropped from `entities`.
    pub rejected_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnavailableReason {
    #[error("llm adapter disabled")]
    Disabled,
    #[error("missing llm credential")]
    MissingCredential,
    #[error("credential rejected (http {0})")]
    Unauthorized(u16),
    #[error("quota or billing rejection (http {status}): {detail}")]
    QuotaExceeded { status: u16, detail: String },
    #[error("upstream service error (http {0})")]
    Upstream(u16),
    #[error("network failure: {0}")]
    Network(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
}

/// Every way an adapter call can fail. Both variants are recoverable by
/// falling back to the rule engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterFailure {
    #[error("adapter unavailable: {0}")]
    Unavailable(UnavailableReason),
    #[error("adapter error: {0}")]
    Malformed(String),
}

impl AdapterFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "adapter_unavailable",
            Self::Malformed(_) => "adapter_error",
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::Unavailable(UnavailableReason::Timeout(limit.as_millis() as u64))
    }
}

/// Capability seam for the optional language-model backend.
pub trait IntentAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(
        &self,
        text: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<LlmResolution, AdapterFailure>> + Send;
}

/// Stand-in used when no model backend is wired up. Always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIntentAdapter;

impl IntentAdapter for NullIntentAdapter {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn resolve(
        &self,
        _text: &str,
        _timeout: Duration,
    ) -> Result<LlmResolution, AdapterFailure> {
        Err(AdapterFailure::Unavailable(UnavailableReason::Disabled))
    }
}
