// lexroute-core/src/lib.rs

//! Amazon Lex V2 fulfillment router.
//!
//! Recognised intents are answered from a canned response table. Fallback,
//! unrecognised and "always forward" intents are sent to an OpenAI-compatible
//! LLM proxy (LiteLLM) and the generated text is relayed back to Lex. Every
//! turn gets a well-formed reply, even when the proxy is down.
//!
//! ```no_run
//! use std::sync::Arc;
//! use lexroute_core::{FulfillmentRouter, LiteLlmClient, RouterConfig};
//!
//! # async fn run(event: lexroute_core::LexEvent) -> anyhow::Result<()> {
//! let config = RouterConfig::load(None)?;
//! let proxy = LiteLlmClient::new(&config.proxy)?;
//! let router = FulfillmentRouter::new(config.responses, Arc::new(proxy));
//! let reply = router.handle_lex(event).await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod errors;
pub mod router;
pub mod utils;

#[cfg(test)]
mod router_tests;

pub use api::{ChatProxy, LiteLlmClient, ProxyRequest, ProxyResponse, UnconfiguredProxy};
pub use config::{CannedResponse, IntentRoute, ProxyConfig, ResponseConfig, RouterConfig};
pub use errors::{ConfigError, FulfillmentError};
pub use models::lex::{LexEvent, LexResponse};
pub use models::turn::{IntentEvent, TurnAction, TurnOutcome, FALLBACK_INTENT};
pub use router::FulfillmentRouter;

pub use async_trait::async_trait;

// --- Modules ---
pub mod models {
    pub mod chat;
    pub mod lex;
    pub mod turn;
}
