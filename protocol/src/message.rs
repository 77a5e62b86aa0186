//! Message records and completed-response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The player (or whoever submitted the turn input).
    User,
    /// The narrator.
    Dm,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Dm => write!(f, "dm"),
        }
    }
}

/// A flattened chat-style entry, as held locally and as returned by the
/// history store.
///
/// `message_id` is the stable backend identity; records created before the
/// backend assigned one match by timestamp instead. `is_local` stays true
/// until the record has been confirmed by a backend echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Stable backend identity, if assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// When the message was authored.
    pub timestamp: DateTime<Utc>,

    /// Who authored it.
    pub sender: Sender,

    /// Message text.
    pub text: String,

    /// True until the backend has echoed this record back.
    #[serde(default)]
    pub is_local: bool,
}

impl MessageRecord {
    /// Create an optimistic local record, timestamped now.
    pub fn local(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            message_id: None,
            timestamp: Utc::now(),
            sender,
            text: text.into(),
            is_local: true,
        }
    }

    /// Create a backend-confirmed record.
    pub fn confirmed(
        message_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        sender: Sender,
        text: impl Into<String>,
    ) -> Self {
        Self {
            message_id: Some(message_id.into()),
            timestamp,
            sender,
            text: text.into(),
            is_local: false,
        }
    }
}

/// The completed response payload for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalMessage {
    /// Full response text.
    pub text: String,

    /// Speaker role for the response.
    pub role: Sender,

    /// Backend identity of the response message, if assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Reference to generated narration audio, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Backend-defined presentation flags, passed through opaquely.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub flags: serde_json::Value,
}

impl FinalMessage {
    /// Create a plain narrator response with no audio or flags.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Sender::Dm,
            message_id: None,
            audio_url: None,
            flags: serde_json::Value::Null,
        }
    }
}
