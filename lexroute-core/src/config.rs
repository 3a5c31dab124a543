// lexroute-core/src/config.rs

//! Configuration for the router: proxy connection settings plus the intent
//! table and fixed reply texts.
//!
//! Configuration comes from an optional TOML file overlaid with environment
//! variables, and is validated once at cold start.

use serde::Deserialize;
use secrecy::SecretString;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;
use crate::models::turn::TurnAction;

pub const ENV_ENDPOINT: &str = "LITELLM_ENDPOINT";
pub const ENV_MODEL: &str = "MODEL_NAME";
pub const ENV_TIMEOUT_MS: &str = "PROXY_TIMEOUT_MS";
pub const ENV_MAX_TOKENS: &str = "PROXY_MAX_TOKENS";
pub const ENV_SYSTEM_PROMPT: &str = "SYSTEM_PROMPT";
pub const DEFAULT_API_KEY_ENV_VAR: &str = "LITELLM_API_KEY";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_EMPTY_UTTERANCE_MESSAGE: &str =
    "I didn't catch that. Could you please repeat your question?";
const DEFAULT_FAILURE_MESSAGE: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

// --- File format ---

#[derive(Deserialize, Debug, Clone, Default)]
struct FileConfig {
    system_prompt: Option<String>,
    #[serde(default)]
    proxy: FileProxyConfig,
    #[serde(default)]
    messages: FileMessages,
    #[serde(default)]
    intents: HashMap<String, FileIntent>,
}

#[derive(Deserialize, Debug, Clone)]
struct FileProxyConfig {
    endpoint: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    api_key_env_var: String,
    #[serde(default)]
    allow_anonymous: bool,
    model: Option<String>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_max_tokens")]
    max_tokens: Option<u32>,
    temperature: Option<f64>,
}

impl Default for FileProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env_var: default_api_key_env_var(),
            allow_anonymous: false,
            model: None,
            timeout_ms: default_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
struct FileMessages {
    #[serde(default = "default_empty_utterance")]
    empty_utterance: String,
    #[serde(default = "default_failure")]
    upstream_failure: String,
}

impl Default for FileMessages {
    fn default() -> Self {
        Self {
            empty_utterance: default_empty_utterance(),
            upstream_failure: default_failure(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
struct FileIntent {
    response: Option<String>,
    #[serde(default)]
    action: TurnAction,
    #[serde(default)]
    forward: bool,
}

fn default_api_key_env_var() -> String {
    DEFAULT_API_KEY_ENV_VAR.to_string()
}
fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_max_tokens() -> Option<u32> {
    Some(DEFAULT_MAX_TOKENS)
}
fn default_empty_utterance() -> String {
    DEFAULT_EMPTY_UTTERANCE_MESSAGE.to_string()
}
fn default_failure() -> String {
    DEFAULT_FAILURE_MESSAGE.to_string()
}

// --- Validated configuration ---

/// Fully validated router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub proxy: ProxyConfig,
    pub responses: ResponseConfig,
}

/// How to reach the LLM proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub endpoint: Url,
    pub api_key: Option<SecretString>,
    /// `None` lets the proxy's routing strategy choose.
    pub model: Option<String>,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl ProxyConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            api_key: None,
            model: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            temperature: None,
        }
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.endpoint.as_str().trim_end_matches('/')
        )
    }
}

/// A fixed reply for a recognised intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedResponse {
    pub message: String,
    pub action: TurnAction,
}

/// What the router does with a given intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentRoute {
    Canned(CannedResponse),
    Forward,
}

static FORWARD: IntentRoute = IntentRoute::Forward;

/// Intent table, system prompt and the fixed reply texts.
#[derive(Debug, Clone)]
pub struct ResponseConfig {
    pub system_prompt: Option<String>,
    pub intents: HashMap<String, IntentRoute>,
    pub empty_utterance_message: String,
    pub failure_message: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            intents: HashMap::new(),
            empty_utterance_message: DEFAULT_EMPTY_UTTERANCE_MESSAGE.to_string(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl ResponseConfig {
    /// Unlisted intents are forwarded.
    pub fn route_for(&self, intent_name: &str) -> &IntentRoute {
        self.intents.get(intent_name).unwrap_or(&FORWARD)
    }

    pub fn with_canned(
        mut self,
        intent_name: impl Into<String>,
        message: impl Into<String>,
        action: TurnAction,
    ) -> Self {
        self.intents.insert(
            intent_name.into(),
            IntentRoute::Canned(CannedResponse {
                message: message.into(),
                action,
            }),
        );
        self
    }

    pub fn with_forward(mut self, intent_name: impl Into<String>) -> Self {
        self.intents.insert(intent_name.into(), IntentRoute::Forward);
        self
    }
}

impl RouterConfig {
    /// Reads `path` (if given), overlays the process environment and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?,
            None => String::new(),
        };
        Self::from_toml_str(&content)
    }

    /// Parses TOML content, overlays the process environment and validates.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_sources(content, |key| std::env::var(key).ok())
    }

    /// Parses TOML content, overlays values from `env` and validates.
    pub fn from_sources<F>(content: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file: FileConfig = toml::from_str(content).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse configuration TOML");
            ConfigError::Parse(e)
        })?;
        apply_env(&mut file, &env)?;
        let config = validate(file, &env)?;

        tracing::info!(
            endpoint = %config.proxy.endpoint,
            model = config.proxy.model.as_deref().unwrap_or("<proxy default>"),
            timeout_ms = config.proxy.timeout.as_millis() as u64,
            intents = config.responses.intents.len(),
            "Loaded router configuration."
        );
        Ok(config)
    }
}

fn env_value<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key).filter(|v| !v.trim().is_empty())
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match env_value(env, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

fn apply_env<F>(file: &mut FileConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = env_value(env, ENV_ENDPOINT) {
        file.proxy.endpoint = Some(endpoint);
    }
    if let Some(model) = env_value(env, ENV_MODEL) {
        file.proxy.model = Some(model);
    }
    if let Some(timeout_ms) = parse_env(env, ENV_TIMEOUT_MS)? {
        file.proxy.timeout_ms = timeout_ms;
    }
    if let Some(max_tokens) = parse_env(env, ENV_MAX_TOKENS)? {
        file.proxy.max_tokens = Some(max_tokens);
    }
    if let Some(prompt) = env_value(env, ENV_SYSTEM_PROMPT) {
        file.system_prompt = Some(prompt);
    }
    Ok(())
}

fn validate<F>(file: FileConfig, env: &F) -> Result<RouterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let FileConfig {
        system_prompt,
        proxy,
        messages,
        intents,
    } = file;

    // --- Proxy ---
    let raw_endpoint = proxy
        .endpoint
        .filter(|e| !e.trim().is_empty())
        .ok_or(ConfigError::MissingEndpoint)?;
    let endpoint = Url::parse(raw_endpoint.trim()).map_err(|e| ConfigError::InvalidEndpoint {
        endpoint: raw_endpoint.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEndpoint {
            endpoint: raw_endpoint,
            reason: format!("unsupported scheme `{}`", endpoint.scheme()),
        });
    }

    if proxy.timeout_ms == 0 {
        return Err(ConfigError::InvalidTimeout);
    }

    let api_key = env_value(env, &proxy.api_key_env_var).map(SecretString::from);
    if api_key.is_none() && !proxy.allow_anonymous {
        return Err(ConfigError::MissingApiKey {
            var: proxy.api_key_env_var,
        });
    }

    // --- Intents ---
    let mut routes = HashMap::with_capacity(intents.len());
    for (name, intent) in intents {
        let route = match (intent.forward, intent.response) {
            (true, Some(_)) => {
                return Err(ConfigError::InvalidIntent {
                    name,
                    reason: "`forward = true` cannot be combined with `response`".to_string(),
                })
            }
            (true, None) => IntentRoute::Forward,
            (false, response) => {
                let message = response.unwrap_or_default();
                if message.trim().is_empty() && intent.action != TurnAction::Delegate {
                    return Err(ConfigError::InvalidIntent {
                        name,
                        reason: "`response` is required unless `forward = true` or `action = \"delegate\"`"
                            .to_string(),
                    });
                }
                IntentRoute::Canned(CannedResponse {
                    message,
                    action: intent.action,
                })
            }
        };
        routes.insert(name, route);
    }

    // --- Messages ---
    for (key, text) in [
        ("messages.empty_utterance", &messages.empty_utterance),
        ("messages.upstream_failure", &messages.upstream_failure),
    ] {
        if text.trim().is_empty() {
            return Err(ConfigError::EmptyMessage {
                key: key.to_string(),
            });
        }
    }

    Ok(RouterConfig {
        proxy: ProxyConfig {
            endpoint,
            api_key,
            model: proxy.model.filter(|m| !m.trim().is_empty()),
            timeout: Duration::from_millis(proxy.timeout_ms),
            max_tokens: proxy.max_tokens,
            temperature: proxy.temperature,
        },
        responses: ResponseConfig {
            system_prompt: system_prompt.filter(|p| !p.trim().is_empty()),
            intents: routes,
            empty_utterance_message: messages.empty_utterance,
            failure_message: messages.upstream_failure,
        },
    })
}
