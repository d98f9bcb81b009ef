//! HTTP client for the generation service
//!
//! One long-lived client per process, injected into the engine at
//! construction. Rate limits (429) honor retry-after with exponential
//! backoff; 5xx responses retry the same way. Anything else surfaces as a
//! transport error for the caller's fallback ladder to absorb.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strophe_core::{ModelConfig, Result, StropheError};

use crate::{GenRequest, Generator, Tier};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 300;

const JSON_SUFFIX: &str = "\nRespond with a single JSON object and nothing else.";

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    system: String,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireContent>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Generation client over the Anthropic messages API
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    models: ModelConfig,
    api_key: String,
}

impl HttpGenerator {
    /// Build a client, resolving the API key from the configured env var
    pub fn new(models: ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&models.api_key_env).map_err(|_| {
            StropheError::Config(format!("{} is not set", models.api_key_env))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            models,
            api_key,
        })
    }

    fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Small => &self.models.small,
            Tier::Medium => &self.models.medium,
            Tier::Large => &self.models.large,
        }
    }

    async fn call(&self, req: &GenRequest, system: String) -> Result<String> {
        let request = WireRequest {
            model: self.model_for(req.tier).to_string(),
            max_tokens: req.max_output_tokens,
            temperature: req.stochasticity,
            system,
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: req.user.clone(),
            }],
        };

        let mut retries = 0;
        let mut backoff_secs = INITIAL_BACKOFF_SECS;

        loop {
            tracing::debug!(
                "Generation call: tier={} model={} (attempt {})",
                req.tier,
                request.model,
                retries + 1
            );

            let response = self
                .client
                .post(API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| StropheError::Generation(format!("Failed to send request: {}", e)))?;

            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RETRIES {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown".to_string());
                    return Err(StropheError::GenerationLimit(format!(
                        "Rate limit exceeded after {} retries. Last error: {}",
                        MAX_RETRIES, error_text
                    )));
                }

                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs);

                tracing::warn!(
                    "Rate limited (429). Waiting {} seconds before retry {}/{}",
                    wait_secs,
                    retries,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());

                if status.is_server_error() && retries < MAX_RETRIES {
                    retries += 1;
                    tracing::warn!(
                        "Server error ({}). Waiting {} seconds before retry {}/{}",
                        status,
                        backoff_secs,
                        retries,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }

                return Err(StropheError::Generation(format!(
                    "Generation API error {}: {}",
                    status, error_text
                )));
            }

            let wire: WireResponse = response.json().await.map_err(|e| {
                StropheError::Generation(format!("Failed to parse response: {}", e))
            })?;

            let output = wire
                .content
                .first()
                .ok_or_else(|| StropheError::Generation("No content in response".to_string()))?
                .text
                .clone();

            if let Some(usage) = &wire.usage {
                tracing::debug!(
                    "Generation complete ({} chars, {} input tokens, {} output tokens)",
                    output.len(),
                    usage.input_tokens,
                    usage.output_tokens
                );
            }

            return Ok(output);
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn complete_text(&self, req: &GenRequest) -> Result<String> {
        self.call(req, req.system.clone()).await
    }

    async fn complete_json(&self, req: &GenRequest) -> Result<String> {
        let system = format!("{}{}", req.system, JSON_SUFFIX);
        self.call(req, system).await
    }
}
