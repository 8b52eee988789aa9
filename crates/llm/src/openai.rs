use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use execai_core::{Entities, Intent};
use tracing::{info, instrument, warn};

use crate::parse::parse_model_reply;
use crate::{AdapterFailure, IntentAdapter, LlmResolution, UnavailableReason};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(6);
const ERROR_DETAIL_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You classify executive-assistant requests. \
Reply with one JSON object and nothing else. \
Fields: \"intent\" is one of \"meeting_scheduling\", \"email_drafting\", \"follow_up_reminder\", \"unknown\"; \
\"confidence\" is a number from 0 to 1; \
\"entities\" is an object that may contain participants (array of names), \
participant_count (integer), recipient (name or e-mail address), \
timeframe (lowercase relative phrase such as \"tomorrow\", \"next week\" or \"friday\"), \
time_of_day (24-hour \"HH:MM\", or one of \"morning\", \"afternoon\", \"evening\"), \
duration_min (integer minutes), topic, tone (one adjective such as \"professional\" or \"friendly\"), \
meeting_type. \
Omit entities that are not stated in the request.";

#[derive(Debug, Clone)]
pub struct OpenAiRuntimeConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiRuntimeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    /// `None` when no API key is set; the adapter then reports a missing credential.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("EXECAI_OPENAI_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|value| !value.trim().is_empty())?;
        let model = env::var("EXECAI_OPENAI_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let base_url = env::var("EXECAI_OPENAI_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        Some(Self {
            api_key,
            model,
            base_url,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Chat-completions backed adapter. Every transport or provider problem comes
/// back as an [`AdapterFailure`], never a panic.
#[derive(Debug, Clone)]
pub struct OpenAiIntentAdapter {
    http_client: reqwest::Client,
    runtime: Option<OpenAiRuntimeConfig>,
}

impl OpenAiIntentAdapter {
    pub fn new(runtime: Option<OpenAiRuntimeConfig>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            http_client,
            runtime,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiRuntimeConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.runtime.as_ref().map(|runtime| runtime.model.as_str())
    }
}

impl IntentAdapter for OpenAiIntentAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn resolve(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<LlmResolution, AdapterFailure> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or(AdapterFailure::Unavailable(UnavailableReason::MissingCredential))?;

        if text.trim().is_empty() {
            return Ok(LlmResolution {
                intent: Intent::Unknown,
                entities: Entities::new(),
                confidence: 0.0,
                model: runtime.model.clone(),
                coerced_label: None,
                ignored_keys: Vec::new(),
                rejected_values: Vec::new(),
            });
        }

        let payload = serde_json::json!({
            "model": runtime.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text }
            ]
        });

        let response = self
            .http_client
            .post(runtime.completions_url())
            .bearer_auth(runtime.api_key.as_str())
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|error| transport_failure(&error, timeout))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = status_failure(status, &body);
            warn!(status, error = %failure, "OpenAI intent request rejected");
            return Err(failure);
        }

        let body: serde_json::Value = response.json().await.map_err(|error| {
            if error.is_timeout() {
                AdapterFailure::timeout(timeout)
            } else {
                AdapterFailure::Malformed(format!("completion body is not JSON: {error}"))
            }
        })?;
        let content = extract_message_content(&body).ok_or_else(|| {
            AdapterFailure::Malformed("completion has no message content".to_string())
        })?;

        let resolution = parse_model_reply(&content, &runtime.model)?;
        info!(
            intent = %resolution.intent,
            confidence = resolution.confidence,
            model = %resolution.model,
            "OpenAI intent resolved"
        );
        Ok(resolution)
    }
}

fn extract_message_content(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

fn transport_failure(error: &reqwest::Error, timeout: Duration) -> AdapterFailure {
    if error.is_timeout() {
        AdapterFailure::timeout(timeout)
    } else {
        AdapterFailure::Unavailable(UnavailableReason::Network(error.to_string()))
    }
}

/// Maps a non-success provider status onto a typed failure.
fn status_failure(status: u16, body: &str) -> AdapterFailure {
    let reason = match status {
        401 | 403 => UnavailableReason::Unauthorized(status),
        402 | 429 => UnavailableReason::QuotaExceeded {
            status,
            detail: body.chars().take(ERROR_DETAIL_CHARS).collect(),
        },
        _ => UnavailableReason::Upstream(status),
    };
    AdapterFailure::Unavailable(reason)
}
