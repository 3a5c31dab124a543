// lexroute-core/src/router.rs

//! The fulfillment router: canned replies for recognised intents, one proxy
//! call for everything else, and a fixed apology whenever that call fails.

use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::api::{ChatProxy, ProxyRequest};
use crate::config::{IntentRoute, ResponseConfig};
use crate::models::lex::{LexEvent, LexResponse};
use crate::models::turn::{IntentEvent, TurnOutcome};
use crate::utils::preview;

const LOG_PREVIEW_CHARS: usize = 120;

/// Routes one Lex turn at a time. Holds no per-session state, so a single
/// instance is shared by every concurrent invocation.
pub struct FulfillmentRouter {
    responses: ResponseConfig,
    proxy: Arc<dyn ChatProxy>,
}

impl FulfillmentRouter {
    pub fn new(responses: ResponseConfig, proxy: Arc<dyn ChatProxy>) -> Self {
        Self { responses, proxy }
    }

    pub fn responses(&self) -> &ResponseConfig {
        &self.responses
    }

    /// Produces the outcome for one turn. Never fails: upstream problems are
    /// logged and replaced with the configured failure message.
    #[instrument(
        skip(self, event),
        fields(intent = %event.intent_name(), session_id = %event.session_id)
    )]
    pub async fn handle(&self, event: &IntentEvent) -> TurnOutcome {
        if let IntentRoute::Canned(canned) = self.responses.route_for(event.intent_name()) {
            debug!(action = ?canned.action, "Answering from canned response table.");
            return TurnOutcome {
                action: canned.action,
                message: canned.message.clone(),
            };
        }

        if !event.has_utterance() {
            info!("Forwarded intent arrived without an utterance; asking the user to repeat.");
            return TurnOutcome::fulfilled(self.responses.empty_utterance_message.clone());
        }

        let request = ProxyRequest {
            system_prompt: self.responses.system_prompt.clone(),
            utterance: event.utterance.clone(),
            session_id: Some(event.session_id.clone()),
        };
        debug!(utterance = %preview(&event.utterance, LOG_PREVIEW_CHARS), "Forwarding utterance to LLM proxy.");

        match self.proxy.complete(request).await {
            Ok(response) => {
                info!(
                    response_id = %response.id,
                    model = response.model.as_deref().unwrap_or("unknown"),
                    finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
                    prompt_tokens = response.usage.as_ref().map(|u| u.prompt_tokens),
                    completion_tokens = response.usage.as_ref().map(|u| u.completion_tokens),
                    total_tokens = response.usage.as_ref().map(|u| u.total_tokens),
                    latency_ms = response.latency.as_millis() as u64,
                    "LLM proxy answered."
                );
                TurnOutcome::fulfilled(response.text)
            }
            Err(e) => {
                error!(
                    error_kind = e.kind(),
                    error = %e,
                    "LLM proxy call failed; replying with fallback message."
                );
                TurnOutcome::fulfilled(self.responses.failure_message.clone())
            }
        }
    }

    /// Lex V2 entry point: normalise the event, route it, render the reply.
    pub async fn handle_lex(&self, event: LexEvent) -> LexResponse {
        let event = IntentEvent::from(event);
        let outcome = self.handle(&event).await;
        outcome.into_lex_response(event)
    }
}
