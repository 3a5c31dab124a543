// lexroute-core/src/api.rs

//! Client side of the LLM proxy's chat-completion interface.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::errors::FulfillmentError;
use crate::models::chat::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Usage};
use crate::utils::preview;

/// Longest slice of an upstream body kept in error details.
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

/// A single forwarded turn, before it is shaped into a provider payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRequest {
    pub system_prompt: Option<String>,
    pub utterance: String,
    pub session_id: Option<String>,
}

impl ProxyRequest {
    /// Role-tagged message list: optional system instruction, then the user's utterance.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.push(ChatMessage::user(self.utterance.clone()));
        messages
    }
}

/// Answer text plus pass-through metadata, which is only ever logged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub id: String,
    pub text: String,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    pub latency: Duration,
}

/// Capability the router uses to reach the LLM proxy.
#[async_trait]
pub trait ChatProxy: Send + Sync {
    /// Sends exactly one request; implementations must not retry.
    async fn complete(&self, request: ProxyRequest) -> Result<ProxyResponse, FulfillmentError>;
}

/// HTTP client for a LiteLLM (OpenAI-compatible) proxy.
///
/// Create once at cold start and share; the inner `reqwest::Client` keeps
/// connections alive between invocations.
#[derive(Debug, Clone)]
pub struct LiteLlmClient {
    http_client: Client,
    url: String,
    api_key: Option<SecretString>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    timeout: Duration,
}

impl LiteLlmClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, FulfillmentError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                FulfillmentError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            http_client,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request(&self, request: ProxyRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            user: request.session_id.filter(|s| !s.is_empty()),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> FulfillmentError {
        if e.is_timeout() {
            FulfillmentError::UpstreamTimeout(self.timeout)
        } else {
            FulfillmentError::UpstreamError {
                status: e.status().map(|s| s.as_u16()),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ChatProxy for LiteLlmClient {
    async fn complete(&self, request: ProxyRequest) -> Result<ProxyResponse, FulfillmentError> {
        let body = self.build_request(request);
        trace!(
            url = %self.url,
            payload = %serde_json::to_string(&body).unwrap_or_else(|e| format!("Serialization error: {}", e)),
            "Sending chat completion request."
        );

        let started = Instant::now();
        let mut builder = self.http_client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let latency = started.elapsed();

        if !status.is_success() {
            debug!(status = %status, body = %preview(&text, ERROR_BODY_PREVIEW_CHARS), "Proxy returned an error status.");
            return Err(FulfillmentError::UpstreamError {
                status: Some(status.as_u16()),
                detail: preview(&text, ERROR_BODY_PREVIEW_CHARS),
            });
        }

        parse_completion(status, &text, latency)
    }
}

/// Turns a 2xx body into a [`ProxyResponse`], rejecting anything without usable text.
pub fn parse_completion(
    status: StatusCode,
    body: &str,
    latency: Duration,
) -> Result<ProxyResponse, FulfillmentError> {
    if body.trim().is_empty() {
        return Err(FulfillmentError::malformed(format!(
            "empty body with status {}",
            status
        )));
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        FulfillmentError::malformed(format!(
            "{}: {}",
            e,
            preview(body, ERROR_BODY_PREVIEW_CHARS)
        ))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| FulfillmentError::malformed("response contained no choices"))?;

    let text = choice
        .message
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| FulfillmentError::malformed("first choice has no answer text"))?;

    Ok(ProxyResponse {
        id: parsed
            .id
            .unwrap_or_else(|| format!("chatcmpl-{}", Uuid::new_v4())),
        text,
        model: parsed.model,
        finish_reason: choice.finish_reason,
        usage: parsed.usage,
        latency,
    })
}

/// Stand-in used when configuration failed at cold start: every call fails
/// with [`FulfillmentError::Configuration`] so turns still get a reply.
#[derive(Debug, Clone)]
pub struct UnconfiguredProxy {
    reason: String,
}

impl UnconfiguredProxy {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ChatProxy for UnconfiguredProxy {
    async fn complete(&self, _request: ProxyRequest) -> Result<ProxyResponse, FulfillmentError> {
        Err(FulfillmentError::Configuration(self.reason.clone()))
    }
}
