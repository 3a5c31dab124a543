// lexroute-core/src/models/turn.rs

//! Per-turn domain types: the normalised inbound event and the outcome the
//! router produces for it. Both live for exactly one invocation.

use super::lex::{
    DialogActionType, IntentState, LexDialogAction, LexEvent, LexIntent, LexMessage, LexResponse,
    LexResponseSessionState,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Intent name Lex uses when no other intent matched.
pub const FALLBACK_INTENT: &str = "FallbackIntent";

/// A single conversational turn, normalised from the Lex event.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentEvent {
    intent_name: String,
    pub session_id: String,
    pub utterance: String,
    /// Filled slots only, keyed by slot name.
    pub slots: BTreeMap<String, String>,
    pub session_attributes: HashMap<String, String>,
    /// Lex slot state, echoed back unchanged on `Delegate`.
    raw_intent: LexIntent,
}

impl IntentEvent {
    /// Creates an event; a blank intent name is treated as [`FALLBACK_INTENT`].
    pub fn new(
        intent_name: impl Into<String>,
        session_id: impl Into<String>,
        utterance: impl Into<String>,
    ) -> Self {
        let intent_name = normalise_intent_name(intent_name.into());
        Self {
            raw_intent: LexIntent {
                name: intent_name.clone(),
                ..Default::default()
            },
            intent_name,
            session_id: session_id.into(),
            utterance: utterance.into(),
            slots: BTreeMap::new(),
            session_attributes: HashMap::new(),
        }
    }

    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }

    pub fn intent_name(&self) -> &str {
        &self.intent_name
    }

    pub fn has_utterance(&self) -> bool {
        !self.utterance.trim().is_empty()
    }
}

fn normalise_intent_name(name: String) -> String {
    match name.trim() {
        "" => FALLBACK_INTENT.to_string(),
        trimmed => trimmed.to_string(),
    }
}

impl From<LexEvent> for IntentEvent {
    fn from(event: LexEvent) -> Self {
        let LexEvent {
            session_id,
            input_transcript,
            session_state,
            ..
        } = event;
        let mut raw_intent = session_state.intent;
        raw_intent.name = normalise_intent_name(std::mem::take(&mut raw_intent.name));

        let slots = raw_intent
            .slots
            .iter()
            .filter_map(|(name, slot)| {
                let value = slot.as_ref()?.value.as_ref()?.best_value()?;
                Some((name.clone(), value.to_string()))
            })
            .collect();

        Self {
            intent_name: raw_intent.name.clone(),
            session_id,
            utterance: input_transcript,
            slots,
            session_attributes: session_state.session_attributes,
            raw_intent,
        }
    }
}

/// What the router decided for a turn.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    /// Intent fulfilled, session stays open.
    #[default]
    Fulfilled,
    /// Intent fulfilled and the session is closed (attributes cleared).
    Closed,
    /// Hand control back to Lex to pick the next dialogue step.
    Delegate,
}

/// The router's answer for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub action: TurnAction,
    pub message: String,
}

impl TurnOutcome {
    pub fn fulfilled(message: impl Into<String>) -> Self {
        Self {
            action: TurnAction::Fulfilled,
            message: message.into(),
        }
    }

    /// Renders the outcome in the Lex V2 reply shape for `event`.
    pub fn into_lex_response(self, event: IntentEvent) -> LexResponse {
        let IntentEvent {
            session_attributes,
            raw_intent,
            ..
        } = event;

        let (dialog_action, intent, session_attributes) = match self.action {
            TurnAction::Fulfilled => (
                DialogActionType::Close,
                closed_intent(raw_intent.name),
                session_attributes,
            ),
            TurnAction::Closed => (
                DialogActionType::Close,
                closed_intent(raw_intent.name),
                HashMap::new(),
            ),
            TurnAction::Delegate => (
                DialogActionType::Delegate,
                LexIntent {
                    state: Some(IntentState::InProgress),
                    ..raw_intent
                },
                session_attributes,
            ),
        };

        let messages = if self.message.is_empty() {
            Vec::new()
        } else {
            vec![LexMessage::plain_text(self.message)]
        };

        LexResponse {
            session_state: LexResponseSessionState {
                session_attributes,
                dialog_action: LexDialogAction {
                    action_type: dialog_action,
                },
                intent,
            },
            messages,
        }
    }
}

fn closed_intent(name: String) -> LexIntent {
    LexIntent {
        name,
        state: Some(IntentState::Fulfilled),
        ..Default::default()
    }
}
