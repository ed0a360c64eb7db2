//! Agent-level events.
//!
//! `AgentEvent` is what a caller sees while a run progresses: text as it
//! streams, tool calls as they start and finish, and exactly one `AgentEnd`
//! closing every run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting tools.
    Completed,
    /// Two consecutive turns requested identical tool calls.
    LoopDetected,
    /// The turn budget ran out.
    MaxTurnsReached,
    /// The caller cancelled the run.
    Cancelled,
    /// The provider failed after retries.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentStart {
        message: String,
    },

    /// Partial text from the model.
    TextDelta {
        content: String,
    },

    /// All text the model produced in one turn.
    TextComplete {
        content: String,
    },

    ToolCallStart {
        call_id: String,
        name: String,
        arguments: Value,
    },

    ToolCallComplete {
        call_id: String,
        name: String,
        success: bool,
        output: String,
        error: Option<String>,
        metadata: Map<String, Value>,
        truncated: bool,
    },

    /// Repeated tool calls were suppressed; the run ends after this.
    LoopDetected {
        notice: String,
    },

    Error {
        message: String,
    },

    AgentEnd {
        /// Text of the last turn; may be empty.
        response: String,
        stop_reason: StopReason,
        turns: u32,
        tool_calls_made: usize,
    },
}

impl AgentEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AgentStart { .. } => "agent_start",
            Self::TextDelta { .. } => "text_delta",
            Self::TextComplete { .. } => "text_complete",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallComplete { .. } => "tool_call_complete",
            Self::LoopDetected { .. } => "loop_detected",
            Self::Error { .. } => "error",
            Self::AgentEnd { .. } => "agent_end",
        }
    }
}
