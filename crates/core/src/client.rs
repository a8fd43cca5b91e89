//! # Model Client Adapter
//!
//! Thin retrying wrapper around a multimodal model service. Callers send
//! prompt parts (text and inline attachments), get raw response text back,
//! and are responsible for parsing it themselves (see [`crate::decode`]).
//!
//! Transient failures (429, 5xx, transport errors) are retried with bounded
//! exponential backoff; everything else surfaces immediately.

use crate::models::{LlmProvider, ModelConfig};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// One part of a multimodal prompt.
#[derive(Debug, Clone)]
pub enum PromptPart {
    /// Plain text
    Text(String),
    /// Inline binary attachment, base64-encoded
    Inline { mime: String, data_b64: String },
}

impl PromptPart {
    /// Build an inline part from raw bytes
    pub fn inline(mime: impl Into<String>, data: &[u8]) -> Self {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        PromptPart::Inline {
            mime: mime.into(),
            data_b64: STANDARD.encode(data),
        }
    }

    /// Build a text part
    pub fn text(text: impl Into<String>) -> Self {
        PromptPart::Text(text.into())
    }
}

/// Per-call tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl InvokeOptions {
    pub fn with_system(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            ..Self::default()
        }
    }
}

/// The seam every stage and swarm agent talks through.
///
/// Exactly one real implementation exists ([`HttpModelClient`]); tests
/// substitute scripted fakes.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(
        &self,
        parts: &[PromptPart],
        model: &str,
        opts: &InvokeOptions,
    ) -> Result<String>;
}

/// Retry policy for transient model-service failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts (first call included)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Real HTTP client for the model adapter contract.
pub struct HttpModelClient {
    http: reqwest::Client,
    config: ModelConfig,
    api_key: String,
    retry: RetryPolicy,
}

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

impl HttpModelClient {
    /// Build a client from a model config, loading the API key from the
    /// provider's environment variable.
    pub fn from_env(config: ModelConfig) -> Result<Self> {
        let env = config.provider.api_key_env();
        let api_key = std::env::var(env).with_context(|| format!("{env} is not set"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            api_key,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn gemini_request(
        &self,
        parts: &[PromptPart],
        model: &str,
        opts: &InvokeOptions,
    ) -> (String, serde_json::Value) {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_BASE_URL, model, self.api_key
        );
        let parts_json: Vec<serde_json::Value> = parts
            .iter()
            .map(|p| match p {
                PromptPart::Text(t) => json!({ "text": t }),
                PromptPart::Inline { mime, data_b64 } => json!({
                    "inlineData": { "mimeType": mime, "data": data_b64 }
                }),
            })
            .collect();

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts_json }],
        });
        if let Some(system) = &opts.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        let mut gen = serde_json::Map::new();
        if let Some(t) = opts.temperature {
            gen.insert("temperature".into(), json!(t));
        }
        if let Some(m) = opts.max_output_tokens {
            gen.insert("maxOutputTokens".into(), json!(m));
        }
        if !gen.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(gen);
        }
        (url, body)
    }

    fn openai_request(
        &self,
        parts: &[PromptPart],
        model: &str,
        opts: &InvokeOptions,
    ) -> (String, serde_json::Value) {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let url = format!("{base}/chat/completions");

        let content: Vec<serde_json::Value> = parts
            .iter()
            .map(|p| match p {
                PromptPart::Text(t) => json!({ "type": "text", "text": t }),
                PromptPart::Inline { mime, data_b64 } => json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{mime};base64,{data_b64}") }
                }),
            })
            .collect();

        let mut messages = Vec::new();
        if let Some(system) = &opts.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": content }));

        let mut body = json!({ "model": model, "messages": messages });
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(m) = opts.max_output_tokens {
            body["max_tokens"] = json!(m);
        }
        (url, body)
    }

    fn extract_text(&self, value: &serde_json::Value) -> Result<String> {
        let text = match self.config.provider {
            LlmProvider::Gemini => value
                .pointer("/candidates/0/content/parts/0/text")
                .and_then(|v| v.as_str()),
            LlmProvider::OpenAI => value
                .pointer("/choices/0/message/content")
                .and_then(|v| v.as_str()),
        };
        text.map(str::to_string)
            .context("model response contained no text")
    }
}

#[async_trait]
impl ModelInvoker for HttpModelClient {
    async fn invoke(
        &self,
        parts: &[PromptPart],
        model: &str,
        opts: &InvokeOptions,
    ) -> Result<String> {
        let model = if model.is_empty() {
            &self.config.model
        } else {
            model
        };
        let (url, body) = match self.config.provider {
            LlmProvider::Gemini => self.gemini_request(parts, model, opts),
            LlmProvider::OpenAI => self.openai_request(parts, model, opts),
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = self.http.post(&url).json(&body).send().await;
            match outcome {
                Ok(resp) if resp.status().is_success() => {
                    let value: serde_json::Value = resp
                        .json()
                        .await
                        .context("model response was not valid JSON")?;
                    return self.extract_text(&value);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let transient = status.as_u16() == 429 || status.is_server_error();
                    if transient && attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_for(attempt);
                        tracing::warn!(
                            %status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transient model error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let detail = resp.text().await.unwrap_or_default();
                    bail!("model call failed with {status}: {detail}");
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(error = %e, attempt, "model transport error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e).context("model call failed after retries"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_inline_part_encodes_base64() {
        let part = PromptPart::inline("image/png", &[1, 2, 3]);
        match part {
            PromptPart::Inline { mime, data_b64 } => {
                assert_eq!(mime, "image/png");
                assert_eq!(data_b64, "AQID");
            }
            _ => panic!("expected inline part"),
        }
    }
}
