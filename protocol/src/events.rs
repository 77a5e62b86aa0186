//! Inbound turn-lifecycle events.
//!
//! The channel delivers newline-delimited JSON frames; each frame decodes to
//! one [`SessionEvent`]. The union is discriminated on `type` so event
//! handling is exhaustive at compile time, and the sub-message kinds on
//! `response_type` likewise.

use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, TurnNumber};
use crate::message::Sender;

/// Conventional `response_index` for the input echo sub-message.
pub const RESPONSE_INDEX_INPUT: u8 = 0;
/// Conventional `response_index` for streaming delta sub-messages.
pub const RESPONSE_INDEX_STREAMING: u8 = 1;
/// Conventional `response_index` for the final sub-message.
pub const RESPONSE_INDEX_FINAL: u8 = 2;

/// Kind of a sub-message within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Echo of the submission that initiated the turn.
    TurnInput,
    /// Incremental fragment of the response, delivered before completion.
    Streaming,
    /// The completed response payload.
    Final,
}

impl ResponseKind {
    /// The `response_index` this kind is conventionally delivered with.
    pub fn expected_index(self) -> u8 {
        match self {
            ResponseKind::TurnInput => RESPONSE_INDEX_INPUT,
            ResponseKind::Streaming => RESPONSE_INDEX_STREAMING,
            ResponseKind::Final => RESPONSE_INDEX_FINAL,
        }
    }
}

/// A new turn has been opened by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStartedEvent {
    pub session_id: SessionId,
    pub turn_number: TurnNumber,
}

/// A sub-message belonging to a turn.
///
/// Ordering within a turn is defined by `response_index`, not arrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMessageEvent {
    pub session_id: SessionId,
    pub turn_number: TurnNumber,
    pub response_index: u8,
    pub response_type: ResponseKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Sender>,
    /// Narration audio reference, carried on `final` sub-messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Backend presentation flags, carried on `final` sub-messages.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub flags: serde_json::Value,
}

impl TurnMessageEvent {
    /// A minimal sub-message with just a kind and content.
    pub fn new(
        session_id: SessionId,
        turn_number: TurnNumber,
        response_type: ResponseKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            turn_number,
            response_index: response_type.expected_index(),
            response_type,
            content: content.into(),
            message_id: None,
            role: None,
            audio_url: None,
            flags: serde_json::Value::Null,
        }
    }
}

/// The processing turn concluded successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnCompleteEvent {
    pub session_id: SessionId,
    pub turn_number: TurnNumber,
}

/// Error payload attached to a failed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl TurnErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

/// The processing turn failed terminally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnErrorEvent {
    pub session_id: SessionId,
    pub turn_number: TurnNumber,
    pub error: TurnErrorPayload,
}

/// One raw event from the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    TurnStarted(TurnStartedEvent),
    TurnMessage(TurnMessageEvent),
    TurnComplete(TurnCompleteEvent),
    TurnError(TurnErrorEvent),
}

impl SessionEvent {
    /// Session the event belongs to.
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::TurnStarted(ev) => ev.session_id,
            SessionEvent::TurnMessage(ev) => ev.session_id,
            SessionEvent::TurnComplete(ev) => ev.session_id,
            SessionEvent::TurnError(ev) => ev.session_id,
        }
    }

    /// Turn the event refers to.
    pub fn turn_number(&self) -> TurnNumber {
        match self {
            SessionEvent::TurnStarted(ev) => ev.turn_number,
            SessionEvent::TurnMessage(ev) => ev.turn_number,
            SessionEvent::TurnComplete(ev) => ev.turn_number,
            SessionEvent::TurnError(ev) => ev.turn_number,
        }
    }
}
