// lexroute-core/src/errors.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fulfilling a forwarded turn.
///
/// None of these ever reach Lex: the router converts every variant into the
/// configured apology message and logs it.
#[derive(Error, Debug)]
pub enum FulfillmentError {
    /// The proxy did not answer within the configured timeout.
    #[error("LLM proxy did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// The proxy answered with a non-2xx status, or the request never reached it.
    #[error("LLM proxy error{}: {detail}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    UpstreamError { status: Option<u16>, detail: String },

    /// The proxy answered 2xx but the body could not be used.
    #[error("Malformed LLM proxy response: {0}")]
    UpstreamMalformedResponse(String),

    /// Configuration was invalid at cold start; every forwarded turn fails until fixed.
    #[error("Configuration Error: {0}")]
    Configuration(String),
}

impl FulfillmentError {
    /// Stable identifier used as the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::UpstreamTimeout(_) => "upstream_timeout",
            FulfillmentError::UpstreamError { .. } => "upstream_error",
            FulfillmentError::UpstreamMalformedResponse(_) => "upstream_malformed_response",
            FulfillmentError::Configuration(_) => "configuration_error",
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        FulfillmentError::UpstreamMalformedResponse(msg.into())
    }
}

/// Errors raised while loading or validating [`RouterConfig`](crate::config::RouterConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("proxy endpoint is not configured (set `proxy.endpoint` or LITELLM_ENDPOINT)")]
    MissingEndpoint,
    #[error("invalid proxy endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("proxy API key is not configured (set `{var}` or `proxy.allow_anonymous = true`)")]
    MissingApiKey { var: String },
    #[error("proxy timeout must be greater than zero")]
    InvalidTimeout,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("intent `{name}` is misconfigured: {reason}")]
    InvalidIntent { name: String, reason: String },
    #[error("`{key}` must not be empty")]
    EmptyMessage { key: String },
}
