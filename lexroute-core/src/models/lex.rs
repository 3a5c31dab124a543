// lexroute-core/src/models/lex.rs

//! Wire shapes of the Amazon Lex V2 code hook contract.
//!
//! Only the fields the router reads or echoes back are modelled; everything
//! else in the event is ignored on deserialization. Lex sends `null` for
//! absent maps and strings, which reads as empty.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Event Lex V2 sends to a fulfillment Lambda.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LexEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_transcript: String,
    #[serde(default)]
    pub invocation_source: Option<String>,
    #[serde(default)]
    pub bot: Option<LexBot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_state: LexSessionState,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LexBot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub locale_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LexSessionState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_attributes: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub intent: LexIntent,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexIntent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slots: HashMap<String, Option<LexSlot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<IntentState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_state: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexSlot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<LexSlotValue>,
    /// `shape`, list `values`, `subSlots` and anything else Lex sends,
    /// kept so a delegated slot goes back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexSlotValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreted_value: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub resolved_values: Vec<String>,
}

impl LexSlotValue {
    /// Interpreted value if Lex resolved one, otherwise what the user typed.
    pub fn best_value(&self) -> Option<&str> {
        self.interpreted_value
            .as_deref()
            .or(self.original_value.as_deref())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentState {
    Failed,
    Fulfilled,
    InProgress,
    ReadyForFulfillment,
    Waiting,
    FulfillmentInProgress,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogActionType {
    Close,
    ConfirmIntent,
    Delegate,
    ElicitIntent,
    ElicitSlot,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LexDialogAction {
    #[serde(rename = "type")]
    pub action_type: DialogActionType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexResponseSessionState {
    pub session_attributes: HashMap<String, String>,
    pub dialog_action: LexDialogAction,
    pub intent: LexIntent,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexMessage {
    pub content_type: String,
    pub content: String,
}

impl LexMessage {
    pub fn plain_text(content: impl Into<String>) -> Self {
        Self {
            content_type: "PlainText".to_string(),
            content: content.into(),
        }
    }
}

/// Reply returned to Lex V2.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexResponse {
    pub session_state: LexResponseSessionState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<LexMessage>,
}
