use crate::clock;
use crate::estimation::local::LocalEstimator;
use crate::estimation::{Prediction, PredictionInput, PredictionProvider, PredictionSource};
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const RECENT_PATTERN_LEN: usize = 20;
const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f64 = 0.3;
const SYSTEM_PROMPT: &str = "You are an assistant for a smart parking system. \
Analyze parking data and answer with a JSON object only.";

#[derive(Clone)]
pub struct ExternalSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

impl fmt::Debug for ExternalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// OpenAI-compatible chat-completion provider. Any failure degrades to the
/// wrapped local estimator.
pub struct ExternalProvider {
    client: reqwest::Client,
    settings: ExternalSettings,
    fallback: LocalEstimator,
}

impl ExternalProvider {
    pub fn new(settings: ExternalSettings, fallback: LocalEstimator) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| AppError::ExternalService(err.to_string()))?;
        Ok(Self {
            client,
            settings,
            fallback,
        })
    }

    pub fn settings(&self) -> &ExternalSettings {
        &self.settings
    }

    async fn call_remote(&self, input: &PredictionInput<'_>) -> Result<Prediction, RemoteError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(input),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let mut builder = self
            .client
            .post(url)
            .bearer_auth(&self.settings.api_key)
            .json(&request);
        if self.settings.base_url.contains("openrouter.ai") {
            if let Some(site_url) = &self.settings.site_url {
                builder = builder.header("HTTP-Referer", site_url);
            }
            if let Some(site_name) = &self.settings.site_name {
                builder = builder.header("X-Title", site_name);
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status(status.as_u16(), body));
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(RemoteError::EmptyReply)?;
        debug!(content = %content, "External prediction reply");

        let parsed: RemotePrediction = serde_json::from_str(extract_json(&content))?;
        if !(0.0..=1.0).contains(&parsed.confidence) {
            return Err(RemoteError::InvalidConfidence(parsed.confidence));
        }

        let local = self.fallback.estimate(input.history, input.query_time);
        Ok(Prediction {
            predicted_available: parsed.predicted_available,
            confidence: parsed.confidence,
            occupancy_rate: local.occupancy_rate,
            samples: local.samples,
            source: PredictionSource::External,
            reasoning: parsed.reasoning,
            model: Some(self.settings.model.clone()),
        })
    }
}

impl fmt::Debug for ExternalProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalProvider")
            .field("settings", &self.settings)
            .field("fallback", &self.fallback)
            .finish()
    }
}

#[async_trait]
impl PredictionProvider for ExternalProvider {
    async fn predict(&self, input: PredictionInput<'_>) -> Prediction {
        match self.call_remote(&input).await {
            Ok(prediction) => prediction,
            Err(err) => {
                warn!(
                    spot_id = input.spot.id,
                    error = %err,
                    "External prediction failed, falling back to local estimator"
                );
                self.fallback.estimate(input.history, input.query_time)
            }
        }
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

fn build_prompt(input: &PredictionInput<'_>) -> String {
    let mut recent: Vec<_> = input.history.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let pattern: Vec<bool> = recent
        .into_iter()
        .take(RECENT_PATTERN_LEN)
        .map(|row| row.occupied)
        .collect();

    format!(
        "Parking spot {spot} (id {id}).\n\
         Query time (UTC): {time}\n\
         Recent occupancy pattern, most recent first: {pattern:?}\n\
         Predict whether this spot will be available at the query time. \
         Return only a JSON object with: predicted_available (boolean), \
         confidence (0-1), reasoning (string).",
        spot = input.spot.spot_number,
        id = input.spot.id,
        time = clock::format_timestamp_lossy(input.query_time),
    )
}

/// Pull the JSON object out of a completion that may wrap it in prose or a
/// fenced code block.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemotePrediction {
    predicted_available: bool,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Error)]
enum RemoteError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {0}: {1}")]
    Status(u16, String),
    #[error("completion had no content")]
    EmptyReply,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("confidence out of range: {0}")]
    InvalidConfidence(f64),
}
