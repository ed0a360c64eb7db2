//! Provider trait: the abstraction over LLM endpoints.
//!
//! A Provider knows how to send a rendered conversation to an LLM and hand
//! back the raw incremental frames of its answer. It does not retry and does
//! not reassemble tool calls: both belong to the streaming decoder, which
//! drives any Provider.
//!
//! Implementations: OpenAI-compatible endpoints (OpenAI, OpenRouter, Ollama,
//! vLLM, ...), scripted providers in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "z-ai/glm-4.5-air:free", "gpt-4o")
    pub model: String,

    /// The rendered conversation, system message first
    pub messages: Vec<Message>,

    /// Sampling temperature, forwarded verbatim
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether to stream the response
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    1.0
}

fn default_stream() -> bool {
    true
}

impl ProviderRequest {
    /// A streaming request with default sampling parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
            stream: true,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (unique key into the registry)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u32>,
}

/// One piece of a tool call as delivered by the provider.
///
/// Fragments belonging to the same call share an `index`; `id` and `name`
/// usually arrive only on the first fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A single incremental frame of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Partial text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool call fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,

    /// Why generation stopped (typically only on the last frame)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Usage info (typically only on the last frame)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamFrame {
    /// A frame carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A frame carrying a single tool call fragment.
    pub fn tool_fragment(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Self::default()
        }
    }

    /// A closing frame carrying finish reason and usage.
    pub fn finish(reason: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            finish_reason: Some(reason.into()),
            usage,
            ..Self::default()
        }
    }
}

/// The frames of one response, in arrival order.
///
/// A mid-stream `Err` ends the response; the stream ending cleanly means
/// the provider finished.
pub type FrameStream = BoxStream<'static, std::result::Result<StreamFrame, ProviderError>>;

/// The core Provider trait.
///
/// The streaming decoder calls `open_stream()` once per attempt without
/// knowing which endpoint sits behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get the incremental frames of the response.
    ///
    /// Errors returned here happen before any frame arrives (connect,
    /// HTTP status, rate limit); errors inside the stream happen mid-read.
    async fn open_stream(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<FrameStream, ProviderError>;

    /// Release any held connection. Called on explicit shutdown.
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", vec![]);
        assert!((req.temperature - 1.0).abs() < f32::EPSILON);
        assert!(req.stream);
        assert!(req.tools.is_empty());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "shell".into(),
            description: "Execute a shell command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("shell"));
        assert!(json.contains("command"));
    }

    #[test]
    fn frame_constructors() {
        assert_eq!(StreamFrame::text("hi").content.as_deref(), Some("hi"));
        let fin = StreamFrame::finish("stop", None);
        assert_eq!(fin.finish_reason.as_deref(), Some("stop"));
        assert!(fin.content.is_none());
        let frag = StreamFrame::tool_fragment(ToolCallFragment {
            index: 2,
            ..Default::default()
        });
        assert_eq!(frag.tool_calls[0].index, 2);
    }
}
