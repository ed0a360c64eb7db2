//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/chat/completions`.
//!
//! The provider only turns HTTP into raw [`StreamFrame`]s. Retry and
//! tool-call reassembly live in the decoder.

use std::time::Duration;

use async_trait::async_trait;
use ferrule_core::error::ProviderError;
use ferrule_core::message::{Message, Role};
use ferrule_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider with the default 120s timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", OPENROUTER_BASE_URL, api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                // Assistant turns that only call tools carry null content.
                content: if m.role == Role::Assistant
                    && m.content.is_empty()
                    && !m.tool_calls.is_empty()
                {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": request.stream,
        });

        if request.stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }

    async fn send(&self, request: &ProviderRequest) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            stream = request.stream,
            "Sending completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);
        if request.stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.send().await.map_err(transport_error)?;
        check_status(response).await
    }

    async fn single_frame(response: reqwest::Response) -> Result<StreamFrame, ProviderError> {
        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::Api {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::Api {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, tc)| ToolCallFragment {
                index: index as u32,
                id: Some(tc.id),
                name: Some(tc.function.name),
                arguments: Some(tc.function.arguments),
            })
            .collect();

        Ok(StreamFrame {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            finish_reason: choice.finish_reason,
            usage: api_response.usage.map(ApiUsage::into_usage),
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open_stream(&self, request: &ProviderRequest) -> Result<FrameStream, ProviderError> {
        let response = self.send(request).await?;

        if !request.stream {
            let frame = Self::single_frame(response).await?;
            return Ok(futures::stream::iter(vec![Ok(frame)]).boxed());
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward frames until [DONE] or the
        // receiver goes away. Dropping the response closes the connection.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::default();

            loop {
                let chunk_result = tokio::select! {
                    _ = tx.closed() => {
                        debug!(provider = %provider_name, "Stream receiver dropped, closing connection");
                        return;
                    }
                    next = byte_stream.next() => match next {
                        Some(chunk) => chunk,
                        None => return,
                    },
                };

                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let err = if e.is_timeout() {
                            ProviderError::Timeout(e.to_string())
                        } else {
                            ProviderError::StreamInterrupted(e.to_string())
                        };
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match parse_sse_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Done => return,
                        SseLine::Frame(frame) => {
                            if tx.send(Ok(frame)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseLine::Failed(err) => {
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                        SseLine::Unparseable(data) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Connection(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let reset_at_ms = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_reset_header);
        let message = response.text().await.unwrap_or_default();
        warn!(status, reset_at_ms = ?reset_at_ms, "Provider rate limited the request");
        return Err(ProviderError::RateLimited {
            message: error_message(&message, "Too many requests"),
            reset_at_ms,
        });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Provider returned error");
        return Err(ProviderError::Api {
            status_code: status,
            message: error_message(&error_body, "Request failed"),
        });
    }

    Ok(response)
}

/// The reset header is epoch milliseconds; values small enough to be
/// epoch seconds are scaled up.
fn parse_reset_header(value: &str) -> Option<u64> {
    let raw: u64 = value.trim().parse().ok()?;
    if raw < 100_000_000_000 {
        Some(raw.saturating_mul(1000))
    } else {
        Some(raw)
    }
}

/// Pull `error.message` out of a JSON error body, falling back to the raw
/// body (or `fallback` when the body is empty).
fn error_message(body: &str, fallback: &str) -> String {
    if body.trim().is_empty() {
        return fallback.to_string();
    }
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

enum SseLine {
    Skip,
    Done,
    Frame(StreamFrame),
    Failed(ProviderError),
    Unparseable(String),
}

/// Raw SSE bytes waiting for a line break. Lines are decoded only once
/// complete, so a multibyte character split across network chunks survives.
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Append a chunk and return every line it completed, without the
    /// trailing `\r\n`.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let raw = &raw[..raw.len() - 1];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            match String::from_utf8(raw.to_vec()) {
                Ok(line) => lines.push(line),
                Err(e) => warn!(error = %e, "Dropping SSE line with invalid UTF-8"),
            }
        }
        lines
    }
}

fn parse_sse_line(line: &str) -> SseLine {
    // Skip empty lines, SSE comments, and non-data fields
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return SseLine::Skip;
    }
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(StreamResponse {
            error: Some(error), ..
        }) => SseLine::Failed(error.into_provider_error()),
        Ok(chunk) => {
            let frame = chunk.into_frame();
            if frame == StreamFrame::default() {
                SseLine::Skip
            } else {
                SseLine::Frame(frame)
            }
        }
        Err(_) => SseLine::Unparseable(data.to_string()),
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<ApiPromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct ApiPromptTokensDetails {
    #[serde(default)]
    cached_tokens: Option<u32>,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            cached_tokens: self.prompt_tokens_details.and_then(|d| d.cached_tokens),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiErrorDetail {
    fn into_provider_error(self) -> ProviderError {
        let code = self.code.as_ref().and_then(|c| match c {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        });
        match code {
            Some(429) => ProviderError::RateLimited {
                message: self.message,
                reset_at_ms: None,
            },
            Some(status) => ProviderError::Api {
                status_code: u16::try_from(status).unwrap_or(500),
                message: self.message,
            },
            None => ProviderError::Api {
                status_code: 500,
                message: self.message,
            },
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

impl StreamResponse {
    fn into_frame(self) -> StreamFrame {
        let mut frame = StreamFrame {
            usage: self.usage.map(ApiUsage::into_usage),
            ..StreamFrame::default()
        };
        if let Some(choice) = self.choices.into_iter().next() {
            frame.content = choice.delta.content.filter(|c| !c.is_empty());
            frame.finish_reason = choice.finish_reason;
            frame.tool_calls = choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = match tc.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    ToolCallFragment {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments,
                    }
                })
                .collect();
        }
        frame
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta, arriving incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_core::message::MessageToolCall;

    fn frame_of(line: &str) -> StreamFrame {
        match parse_sse_line(line) {
            SseLine::Frame(frame) => frame,
            _ => panic!("expected a frame for {line}"),
        }
    }

    #[test]
    fn openrouter_constructor() {
        let provider = OpenAiCompatProvider::openrouter("sk-test");
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.base_url().contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url().contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("x", "http://host/v1/", "k");
        assert_eq!(provider.base_url(), "http://host/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant("").with_tool_calls(vec![MessageToolCall {
            id: "call_1".into(),
            name: "shell".into(),
            arguments: r#"{"command":"ls"}"#.into(),
        }]);
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "shell");
        assert!(api_msgs[0].content.is_none());
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_declares_tools_and_usage() {
        let request = ProviderRequest::new("m", vec![Message::user("hi")]).with_tools(vec![
            ToolDefinition {
                name: "shell".into(),
                description: "Run a shell command".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
        ]);
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "shell");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn request_body_without_tools_omits_tool_choice() {
        let mut request = ProviderRequest::new("m", vec![Message::user("hi")]);
        request.stream = false;
        request.max_tokens = Some(256);
        let body = OpenAiCompatProvider::request_body(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("stream_options").is_none());
        assert_eq!(body["max_tokens"], 256);
    }

    // --- SSE parsing tests ---

    #[test]
    fn content_delta_becomes_text_frame() {
        let frame = frame_of(r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#);
        assert_eq!(frame, StreamFrame::text("Hello"));
    }

    #[test]
    fn finish_chunk() {
        let frame = frame_of(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert_eq!(frame.finish_reason.as_deref(), Some("stop"));
        assert!(frame.content.is_none());
    }

    #[test]
    fn tool_call_fragments() {
        let frame = frame_of(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"glob","arguments":""}},{"index":1,"id":"call_b","function":{"name":"grep","arguments":""}}]},"finish_reason":null}]}"#,
        );
        assert_eq!(frame.tool_calls.len(), 2);
        assert_eq!(frame.tool_calls[0].name.as_deref(), Some("glob"));
        assert_eq!(frame.tool_calls[1].index, 1);

        let frame = frame_of(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"pattern\""}}]}}]}"#,
        );
        assert!(frame.tool_calls[0].id.is_none());
        assert_eq!(frame.tool_calls[0].arguments.as_deref(), Some("{\"pattern\""));
    }

    #[test]
    fn usage_chunk_with_cached_tokens() {
        let frame = frame_of(
            r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15,"prompt_tokens_details":{"cached_tokens":4}}}"#,
        );
        let usage = frame.usage.unwrap();
        assert_eq!(usage.total_tokens, 15);
        assert_eq!(usage.cached_tokens, Some(4));
    }

    #[test]
    fn done_comments_and_blanks() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line(": OPENROUTER PROCESSING"), SseLine::Skip));
        assert!(matches!(parse_sse_line(""), SseLine::Skip));
        assert!(matches!(
            parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":null}]}"#),
            SseLine::Skip
        ));
        assert!(matches!(parse_sse_line("data: {oops"), SseLine::Unparseable(_)));
    }

    #[test]
    fn mid_stream_error_is_classified() {
        match parse_sse_line(r#"data: {"error":{"message":"slow down","code":429}}"#) {
            SseLine::Failed(ProviderError::RateLimited { message, .. }) => {
                assert_eq!(message, "slow down")
            }
            _ => panic!("expected rate limit"),
        }
        match parse_sse_line(r#"data: {"error":{"message":"bad","code":"400"}}"#) {
            SseLine::Failed(ProviderError::Api { status_code, .. }) => {
                assert_eq!(status_code, 400)
            }
            _ => panic!("expected api error"),
        }
    }

    #[test]
    fn reset_header_units() {
        assert_eq!(parse_reset_header("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(parse_reset_header("1700000000"), Some(1_700_000_000_000));
        assert_eq!(parse_reset_header("soon"), None);
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":{"message":"quota"}}"#, "x"),
            "quota"
        );
        assert_eq!(error_message("plain", "x"), "plain");
        assert_eq!(error_message("", "x"), "x");
    }

    #[test]
    fn non_streaming_response_types() {
        let data = r#"{
            "model": "m",
            "choices": [{
                "message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "c1", "type": "function", "function": {"name": "glob", "arguments": "{}"}}
                ]},
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("tool_calls"));
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn line_buffer_keeps_split_characters_intact() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"é\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut lines = SseLineBuffer::default();
        assert!(lines.push(&line[..split]).is_empty());
        let completed = lines.push(&line[split..]);

        assert_eq!(completed.len(), 1);
        assert_eq!(frame_of(&completed[0]).content.as_deref(), Some("é"));
    }

    #[test]
    fn line_buffer_strips_crlf_and_holds_partial_lines() {
        let mut lines = SseLineBuffer::default();
        assert_eq!(lines.push(b"data: a\r\ndata: b"), vec!["data: a"]);
        assert_eq!(lines.push(b"\r\n\r\n"), vec!["data: b", ""]);
    }

    #[test]
    fn line_buffer_drops_invalid_utf8_lines() {
        let mut lines = SseLineBuffer::default();
        assert_eq!(lines.push(b"data: \xFF\xFE\ndata: ok\n"), vec!["data: ok"]);
    }

    /// Serve one SSE response, writing `chunks` as separate TCP writes.
    /// With `hold_open`, the connection stays up after the last chunk and the
    /// returned receiver fires once the client closes it.
    async fn serve_sse(
        chunks: Vec<Vec<u8>>,
        hold_open: bool,
    ) -> (String, tokio::sync::oneshot::Receiver<()>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the whole request before answering.
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for chunk in chunks {
                socket.write_all(&chunk).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            if hold_open {
                while socket.read(&mut buf).await.is_ok_and(|n| n > 0) {}
                let _ = closed_tx.send(());
            } else {
                socket.shutdown().await.ok();
            }
        });
        (format!("http://{addr}"), closed_rx)
    }

    #[tokio::test]
    async fn stream_decodes_character_split_across_chunks() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"é\"}}]}\n\ndata: [DONE]\n\n";
        let bytes = body.as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let (url, _) = serve_sse(vec![bytes[..split].to_vec(), bytes[split..].to_vec()], false).await;

        let provider = OpenAiCompatProvider::new("local", url, "key");
        let request = ProviderRequest::new("m", vec![Message::user("hi")]);
        let frames: Vec<StreamFrame> = provider
            .open_stream(&request)
            .await
            .unwrap()
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        let text: String = frames.iter().filter_map(|f| f.content.clone()).collect();
        assert_eq!(text, "é");
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_connection() {
        let first = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n".to_vec();
        let (url, closed) = serve_sse(vec![first], true).await;

        let provider = OpenAiCompatProvider::new("local", url, "key");
        let request = ProviderRequest::new("m", vec![Message::user("hi")]);
        let mut frames = provider.open_stream(&request).await.unwrap();
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.content.as_deref(), Some("a"));

        drop(frames);
        tokio::time::timeout(Duration::from_secs(5), closed)
            .await
            .expect("connection was not closed after the stream was dropped")
            .unwrap();
    }
}
