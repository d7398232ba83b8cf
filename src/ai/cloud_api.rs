use crate::error::LlmError;
use crate::storage::response_cache::{cache_key, ResponseCache};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 8192,
        }
    }
}

/// A single prompt-in, text-out endpoint.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError>;

    /// Short label used in logs and cache keys.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    #[default]
    Gemini,
    Anthropic,
    OpenAI,
}

impl AIProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AIProvider::Gemini => "gemini",
            AIProvider::Anthropic => "anthropic",
            AIProvider::OpenAI => "openai",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AIProvider::Gemini => "Gemini",
            AIProvider::Anthropic => "Anthropic",
            AIProvider::OpenAI => "OpenAI",
        }
    }
}

impl fmt::Display for AIProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AIProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(AIProvider::Gemini),
            "anthropic" | "claude" => Ok(AIProvider::Anthropic),
            "openai" => Ok(AIProvider::OpenAI),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIConfig {
    pub provider: AIProvider,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            provider: AIProvider::Gemini,
            api_key: String::new(),
            model: "gemini-1.5-flash".into(),
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// HTTP client for the hosted model providers.
pub struct AIService {
    config: AIConfig,
    http_client: reqwest::Client,
}

impl AIService {
    pub fn new(config: AIConfig) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http_client })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    async fn send_once(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured(format!(
                "no API key for {}",
                self.config.provider
            )));
        }

        match self.config.provider {
            AIProvider::Gemini => self.call_gemini(prompt, params).await,
            AIProvider::Anthropic => self.call_anthropic(prompt, params).await,
            AIProvider::OpenAI => self.call_openai(prompt, params).await,
        }
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let resp = request
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(LlmError::Api {
                provider: self.config.provider.label(),
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| LlmError::Envelope(e.to_string()))
    }

    async fn call_gemini(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "contents": [
                {"parts": [{"text": prompt}]}
            ],
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_output_tokens
            }
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.config.model
        );
        let request = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key);

        let json = self.post_json(request, &body).await?;
        let parts = json["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| LlmError::Envelope("Gemini response has no candidate parts".into()))?;

        Ok(parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join(""))
    }

    async fn call_anthropic(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": params.max_output_tokens,
            "temperature": params.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let request = self
            .http_client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01");

        let json = self.post_json(request, &body).await?;
        json["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Envelope("Anthropic response has no text content".into()))
    }

    async fn call_openai(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": params.max_output_tokens,
            "temperature": params.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let request = self
            .http_client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.config.api_key));

        let json = self.post_json(request, &body).await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Envelope("OpenAI response has no message content".into()))
    }
}

#[async_trait]
impl CompletionBackend for AIService {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        with_retry(&self.describe(), self.config.max_retries, move || {
            self.send_once(prompt, params)
        })
        .await
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.config.provider, self.config.model)
    }
}

/// Retries transient failures with 1s, 2s, 4s … pauses. Anything else
/// (bad key, malformed envelope) is returned on the first failure.
pub async fn with_retry<F, Fut>(label: &str, max_retries: u32, mut call: F) -> Result<String, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, LlmError>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                attempt += 1;
                warn!(
                    "{} call failed (attempt {}/{}), retrying in {:?}: {}",
                    label,
                    attempt,
                    max_retries + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wraps a backend with the persistent response cache. Cache faults are
/// logged and bypassed.
pub struct CachedBackend<B> {
    inner: B,
    cache: ResponseCache,
}

impl<B: CompletionBackend> CachedBackend<B> {
    pub fn new(inner: B, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<B: CompletionBackend> CompletionBackend for CachedBackend<B> {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let label = self.inner.describe();
        let params_tag = format!(
            "temperature={};max_output_tokens={}",
            params.temperature, params.max_output_tokens
        );
        let key = cache_key(&label, &params_tag, prompt);

        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                debug!("Response cache hit for {}", &key[..12]);
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!("Response cache read failed: {}", e),
        }

        let text = self.inner.complete(prompt, params).await?;
        if let Err(e) = self.cache.put(&key, &label, &params_tag, &text).await {
            warn!("Response cache write failed: {}", e);
        } else {
            info!("Cached response from {}", label);
        }
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("{} (cached)", self.inner.describe())
    }
}
