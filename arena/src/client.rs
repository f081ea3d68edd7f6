//! Uniform text-completion client over heterogeneous model backends.
//!
//! Every provider in the pool speaks an OpenAI-compatible chat-completions
//! dialect. The few that deviate are handled by a per-provider adapter rule
//! table remapping endpoint, credentials, and sampling — call sites stay
//! uniform.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::pool::ModelId;

/// Providers that honor `response_format: json_object`.
const STRUCTURED_OUTPUT_PROVIDERS: &[&str] = &["groq", "mistral", "openai"];

/// Whether a model's provider supports structured-output mode. Passing it
/// reduces how often the verdict parser has to fall back.
pub fn supports_structured_output(model: &str) -> bool {
    STRUCTURED_OUTPUT_PROVIDERS.iter().any(|p| model.contains(p))
}

/// Errors from completion calls. All of them are transient from the
/// orchestrator's point of view: callers retry and then degrade.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("api key env var {0} is not set")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("provider returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("empty completion from {0}")]
    EmptyResponse(ModelId),
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: ModelId,
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub structured_output: bool,
}

/// Abstracts calls to remotely hosted models behind one text-in/text-out
/// seam, so orchestration logic never sees provider plumbing.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, CallError>;
}

/// Per-provider request remapping rule; first substring match wins.
#[derive(Debug, Clone)]
struct ProviderOverride {
    match_substring: &'static str,
    base_url: &'static str,
    api_key_env: &'static str,
    temperature: f64,
    /// Send only the name after the last `/` instead of the full id.
    strip_provider_prefix: bool,
}

/// Minimax exposes an OpenAI-compatible API at its own endpoint with a
/// distinct key and a temperature override.
const PROVIDER_OVERRIDES: &[ProviderOverride] = &[ProviderOverride {
    match_substring: "minimax",
    base_url: "https://api.minimax.io/v1",
    api_key_env: "MINIMAX_API_KEY",
    temperature: 1.0,
    strip_provider_prefix: true,
}];

/// Resolved routing for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub base_url: String,
    pub api_key_env: String,
    pub temperature: Option<f64>,
    pub model: String,
}

/// HTTP completion client for OpenAI-compatible endpoints.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key_env: String,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str, api_key_env: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key_env: api_key_env.to_string(),
        }
    }

    /// Apply the adapter rule table, falling back to the default route.
    pub fn route(&self, model: &str) -> Route {
        let id = model.to_lowercase();
        for rule in PROVIDER_OVERRIDES {
            if id.contains(rule.match_substring) {
                let sent_model = if rule.strip_provider_prefix {
                    model.rsplit('/').next().unwrap_or(model).to_string()
                } else {
                    model.to_string()
                };
                return Route {
                    base_url: rule.base_url.trim_end_matches('/').to_string(),
                    api_key_env: rule.api_key_env.to_string(),
                    temperature: Some(rule.temperature),
                    model: sent_model,
                };
            }
        }
        Route {
            base_url: self.base_url.clone(),
            api_key_env: self.api_key_env.clone(),
            temperature: None,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, CallError> {
        let route = self.route(&req.model);
        let api_key = std::env::var(&route.api_key_env)
            .map_err(|_| CallError::MissingApiKey(route.api_key_env.clone()))?;

        let mut messages = Vec::new();
        if let Some(system) = &req.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": req.user_prompt}));

        let mut body = json!({
            "model": route.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
        });
        if let Some(temperature) = route.temperature {
            body["temperature"] = json!(temperature);
        }
        if req.structured_output {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", route.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .timeout(req.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::BadStatus { status, body });
        }

        let resp: Value = response
            .json()
            .await
            .map_err(|e| CallError::RequestFailed(e.to_string()))?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        if content.is_empty() {
            return Err(CallError::EmptyResponse(req.model.clone()));
        }
        Ok(content)
    }
}
