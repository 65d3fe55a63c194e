//! Oracle backed by the Anthropic Messages API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::error::{OracleError, OracleResult};
use super::prompts;
use super::{Disambiguator, Estimator, SelectionAnswer};
use crate::config::OracleConfig;
use crate::error::{ErrorCode, FitpalError, Result};
use crate::storage::Candidate;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Disambiguation and estimation through a Claude model
pub struct ClaudeOracle {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
    timeout: Duration,
}

impl ClaudeOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            FitpalError::config_with_code(
                ErrorCode::CONFIG_MISSING_REQUIRED,
                "The claude oracle needs an API key (set ANTHROPIC_API_KEY or FITPAL_API_KEY)",
            )
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                FitpalError::config(format!("Failed to create HTTP client: {}", e)).with_source(e)
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            max_tokens: config.max_tokens,
            timeout: config.timeout,
        })
    }

    /// Send one message and return the concatenated text blocks
    async fn complete(&self, system: &str, prompt: String) -> OracleResult<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.timeout)
                } else {
                    OracleError::transport(e)
                }
            })?;

        match response.status() {
            StatusCode::OK => {
                let body: MessagesResponse = response
                    .json()
                    .await
                    .map_err(OracleError::invalid_response)?;
                let text: String = body.content.into_iter().filter_map(|c| c.text).collect();
                debug!("Oracle answered with {} characters", text.len());
                Ok(text)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(OracleError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(OracleError::Unauthorized),
            status if status.is_server_error() => {
                let error_text = response.text().await.unwrap_or_default();
                Err(OracleError::Transport(format!(
                    "API error {}: {}",
                    status, error_text
                )))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(OracleError::Unavailable(format!(
                    "API error {}: {}",
                    status, error_text
                )))
            }
        }
    }
}

/// Pull the first JSON object out of model text, tolerating code fences and prose
pub(crate) fn extract_json(text: &str) -> OracleResult<serde_json::Value> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&text[start..=end])
            .map_err(|e| OracleError::invalid_response(format!("{}: {}", e, text))),
        _ => Err(OracleError::invalid_response(format!(
            "no JSON object in answer: {}",
            text
        ))),
    }
}

#[async_trait]
impl Disambiguator for ClaudeOracle {
    async fn disambiguate(
        &self,
        context: &str,
        candidates: &[Candidate],
    ) -> OracleResult<SelectionAnswer> {
        let text = self
            .complete(
                prompts::SELECTION_SYSTEM,
                prompts::selection_prompt(context, candidates),
            )
            .await?;
        let value = extract_json(&text)?;
        serde_json::from_value(value).map_err(OracleError::invalid_response)
    }
}

#[async_trait]
impl Estimator for ClaudeOracle {
    async fn estimate(
        &self,
        name: &str,
        quantity: f64,
        unit: &str,
    ) -> OracleResult<serde_json::Value> {
        let text = self
            .complete(
                prompts::ESTIMATE_SYSTEM,
                prompts::estimate_prompt(name, quantity, unit),
            )
            .await?;
        extract_json(&text)
    }
}
