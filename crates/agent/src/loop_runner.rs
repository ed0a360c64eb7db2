//! The agent reasoning loop implementation.

use std::sync::Arc;

use async_stream::stream;
use ferrule_core::event::StreamEvent;
use ferrule_core::provider::{Provider, ProviderRequest};
use ferrule_core::registry::ToolRegistry;
use ferrule_core::tool::{ToolCall, ToolResult};
use ferrule_providers::StreamDecoder;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::context::{ContextManager, Tokenizer};
use crate::loop_detection::{LoopDetector, loop_notice};
use crate::session::Session;
use crate::settings::AgentSettings;
use crate::stream_event::{AgentEvent, StopReason};

/// The core agent loop that orchestrates LLM calls and tool execution.
///
/// The loop owns its conversation: successive `run` calls on the same
/// instance continue one session.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    settings: AgentSettings,

    context: ContextManager,

    session: Session,

    /// Aborts decoding and pending tool calls when cancelled
    cancel: CancellationToken,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        let context = ContextManager::new(settings.system_prompt.clone());
        Self {
            provider,
            tools,
            settings,
            context,
            session: Session::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Count message tokens with a model-specific tokenizer.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.context = self.context.with_tokenizer(tokenizer);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.set_cancellation(cancel);
        self
    }

    /// Replace the cancellation token. A cancelled token stays cancelled, so
    /// interactive callers install a fresh one before each run.
    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Release the provider's transport.
    pub async fn shutdown(&self) {
        self.provider.shutdown().await;
    }

    /// Process one user message.
    ///
    /// Each turn sends the whole conversation to the model, streams its text
    /// back, then executes the requested tools one at a time and appends
    /// their results. The run ends when the model answers without tools,
    /// repeats the previous turn's calls, exhausts the turn budget, fails, or
    /// is cancelled. The stream always finishes with one `AgentEnd`.
    pub fn run(&mut self, message: &str) -> BoxStream<'_, AgentEvent> {
        let message = message.to_string();
        let decoder = StreamDecoder::new(Arc::clone(&self.provider))
            .with_max_retries(self.settings.max_retries)
            .with_cancellation(self.cancel.clone());
        let cancel = self.cancel.clone();
        let this = self;

        Box::pin(stream! {
            yield AgentEvent::AgentStart { message: message.clone() };
            this.context.add_user_message(&message);

            info!(
                session_id = %this.session.id,
                history = this.context.len(),
                max_turns = this.settings.max_turns,
                "Agent run started"
            );

            let definitions = this.tools.definitions();
            let mut detector = LoopDetector::new();
            let mut response = String::new();
            let mut turns: u32 = 0;
            let mut tool_calls_made = 0usize;

            let stop_reason = loop {
                if cancel.is_cancelled() {
                    break StopReason::Cancelled;
                }
                if turns >= this.settings.max_turns {
                    warn!(
                        session_id = %this.session.id,
                        turns,
                        "Max turns reached, ending run"
                    );
                    break StopReason::MaxTurnsReached;
                }
                turns += 1;
                let session_turn = this.session.increment_turn();
                debug!(turn = turns, session_turn, "Agent loop turn");

                let request = ProviderRequest {
                    model: this.settings.model.clone(),
                    messages: this.context.messages(),
                    temperature: this.settings.temperature,
                    max_tokens: this.settings.max_tokens,
                    tools: definitions.clone(),
                    stream: true,
                };

                let mut events = decoder.decode(request);
                let mut text = String::new();
                let mut calls: Vec<ToolCall> = Vec::new();
                let mut failed = false;

                while let Some(event) = events.next().await {
                    match event {
                        StreamEvent::TextDelta { text: delta } => {
                            text.push_str(&delta);
                            yield AgentEvent::TextDelta { content: delta };
                        }
                        StreamEvent::ToolCallStart { call_id, name } => {
                            trace!(call_id = %call_id, tool = %name, "Tool call streaming");
                        }
                        StreamEvent::ToolCallDelta { .. } => {}
                        StreamEvent::ToolCallComplete { tool_call } => calls.push(tool_call),
                        StreamEvent::MessageComplete { finish_reason, usage } => {
                            debug!(
                                finish_reason = ?finish_reason,
                                total_tokens = usage.as_ref().map(|u| u.total_tokens),
                                "Model response complete"
                            );
                        }
                        StreamEvent::Error { message } => {
                            failed = true;
                            warn!(turn = turns, error = %message, "Model call failed");
                            yield AgentEvent::Error { message };
                        }
                    }
                }
                drop(events);

                this.context.add_assistant_message(
                    &text,
                    calls.iter().map(ToolCall::to_message_call).collect(),
                );
                if !text.is_empty() {
                    yield AgentEvent::TextComplete { content: text.clone() };
                }
                response = text;

                if calls.is_empty() {
                    break if cancel.is_cancelled() {
                        StopReason::Cancelled
                    } else if failed {
                        StopReason::Error
                    } else {
                        StopReason::Completed
                    };
                }

                if detector.observe(&calls) {
                    let notice = loop_notice(&calls);
                    warn!(turn = turns, calls = calls.len(), "Repeated tool calls, stopping");
                    // Every requested call still gets a reply in the history.
                    for call in &calls {
                        this.context.add_tool_result(&call.call_id, &notice);
                    }
                    yield AgentEvent::LoopDetected { notice };
                    break StopReason::LoopDetected;
                }

                debug!(tool_count = calls.len(), "Executing tool calls");
                let mut replies = Vec::with_capacity(calls.len());
                for call in calls {
                    yield AgentEvent::ToolCallStart {
                        call_id: call.call_id.clone(),
                        name: call.name.clone(),
                        arguments: Value::Object(call.arguments.clone()),
                    };

                    let invoked = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        result = this.tools.invoke(&call.name, call.arguments, &this.settings.cwd) => Some(result),
                    };
                    let result = match invoked {
                        Some(result) => {
                            tool_calls_made += 1;
                            result
                        }
                        None => ToolResult::error("Tool call cancelled")
                            .with_metadata("tool_name", call.name.as_str()),
                    };

                    replies.push((call.call_id.clone(), result.to_model_output()));
                    yield AgentEvent::ToolCallComplete {
                        call_id: call.call_id,
                        name: call.name,
                        success: result.success,
                        output: result.output,
                        error: result.error,
                        metadata: result.metadata,
                        truncated: result.truncated,
                    };
                }

                for (call_id, content) in &replies {
                    this.context.add_tool_result(call_id, content);
                }
            };

            info!(
                session_id = %this.session.id,
                stop_reason = ?stop_reason,
                turns,
                tool_calls_made,
                "Agent run finished"
            );
            yield AgentEvent::AgentEnd {
                response,
                stop_reason,
                turns,
                tool_calls_made,
            };
        })
    }
}
