use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 8_000;
pub const MIN_LLM_TIMEOUT_MS: u64 = 100;
pub const MAX_LLM_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Per-request pipeline settings. Passed into every resolution call; there is
/// no process-wide switch for the language model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub llm_enabled: bool,
    pub llm_timeout_ms: u64,
    pub confidence_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_enabled: false,
            llm_timeout_ms: DEFAULT_LLM_TIMEOUT_MS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn new(llm_enabled: bool, llm_timeout_ms: u64, confidence_threshold: f32) -> Self {
        Self {
            llm_enabled,
            llm_timeout_ms,
            confidence_threshold,
        }
        .sanitized()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let llm_enabled = env::var("EXECAI_LLM_ENABLED")
            .ok()
            .and_then(|value| parse_flag(&value))
            .unwrap_or(defaults.llm_enabled);
        let llm_timeout_ms = env::var("EXECAI_LLM_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(defaults.llm_timeout_ms);
        let confidence_threshold = env::var("EXECAI_CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|value| value.trim().parse::<f32>().ok())
            .unwrap_or(defaults.confidence_threshold);

        Self::new(llm_enabled, llm_timeout_ms, confidence_threshold)
    }

    pub fn with_llm(mut self, enabled: bool) -> Self {
        self.llm_enabled = enabled;
        self
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    /// Clamps the timeout and threshold into their supported ranges.
    pub fn sanitized(mut self) -> Self {
        self.llm_timeout_ms = self
            .llm_timeout_ms
            .clamp(MIN_LLM_TIMEOUT_MS, MAX_LLM_TIMEOUT_MS);
        self.confidence_threshold = if self.confidence_threshold.is_finite() {
            self.confidence_threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_CONFIDENCE_THRESHOLD
        };
        self
    }
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}
