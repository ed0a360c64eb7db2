//! Typed events produced by the streaming decoder.
//!
//! A decode pass yields any number of text and tool-call events followed by
//! exactly one terminal event (`MessageComplete` or `Error`). Events are
//! transient: nothing keeps them past the turn that produced them.

use serde::{Deserialize, Serialize};

use crate::provider::Usage;
use crate::tool::ToolCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text exactly as it arrived in one frame.
    TextDelta { text: String },

    /// The first fragment naming a tool call arrived.
    ToolCallStart { call_id: String, name: String },

    /// One argument chunk (not the accumulated whole).
    ToolCallDelta {
        call_id: String,
        name: String,
        arguments_delta: String,
    },

    /// A fully reassembled tool call, emitted once the stream ended.
    ToolCallComplete { tool_call: ToolCall },

    /// Terminal: the response finished.
    MessageComplete {
        finish_reason: Option<String>,
        usage: Option<Usage>,
    },

    /// Terminal: the call failed.
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MessageComplete { .. } | Self::Error { .. })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
