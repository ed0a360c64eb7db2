//! Streaming decoder.
//!
//! Drives a [`Provider`], turning its raw frames into typed [`StreamEvent`]s:
//! text is forwarded as it arrives, tool calls are reassembled by index and
//! emitted once the stream ends, and failures are retried according to the
//! [`RetryPolicy`]. Every decode pass ends with exactly one terminal event.
//!
//! An attempt that already forwarded events downstream is never retried: a
//! retry would replay them. Its failure becomes the terminal `Error`.

use std::sync::Arc;

use async_stream::stream;
use ferrule_core::error::ProviderError;
use ferrule_core::event::StreamEvent;
use ferrule_core::provider::{Provider, ProviderRequest};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::reassembly::ToolCallAssembler;
use crate::retry::{RetryPolicy, classify, terminal_message};

/// Typed event stream produced by one decode pass.
pub type EventStream = BoxStream<'static, StreamEvent>;

pub struct StreamDecoder {
    provider: Arc<dyn Provider>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl StreamDecoder {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.policy = RetryPolicy::new(max_retries);
        self
    }

    /// Share a cancellation token with the caller. Cancelling it aborts the
    /// in-flight attempt or backoff wait with a terminal `Error`.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Release the provider's transport.
    pub async fn shutdown(&self) {
        self.provider.shutdown().await;
    }

    /// Decode one model response. The returned stream is lazy: nothing is
    /// sent to the provider until it is first polled.
    pub fn decode(&self, request: ProviderRequest) -> EventStream {
        let provider = Arc::clone(&self.provider);
        let policy = self.policy;
        let cancel = self.cancel.clone();

        Box::pin(stream! {
            for attempt in 0..policy.max_attempts() {
                let mut forwarded = false;

                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                    opened = provider.open_stream(&request) => opened,
                };

                let failure = match opened {
                    Err(e) => e,
                    Ok(mut frames) => {
                        let mut assembler = ToolCallAssembler::new();
                        let mut finish_reason = None;
                        let mut usage = None;

                        let interrupted = loop {
                            let next = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => Some(Err(ProviderError::Cancelled)),
                                next = frames.next() => next,
                            };

                            match next {
                                None => break None,
                                Some(Err(e)) => break Some(e),
                                Some(Ok(frame)) => {
                                    if frame.finish_reason.is_some() {
                                        finish_reason = frame.finish_reason;
                                    }
                                    if frame.usage.is_some() {
                                        usage = frame.usage;
                                    }
                                    if let Some(text) = frame.content.filter(|t| !t.is_empty()) {
                                        forwarded = true;
                                        yield StreamEvent::TextDelta { text };
                                    }
                                    for fragment in frame.tool_calls {
                                        for event in assembler.push(fragment) {
                                            forwarded = true;
                                            yield event;
                                        }
                                    }
                                }
                            }
                        };

                        match interrupted {
                            Some(e) => e,
                            None => {
                                let calls = assembler.finish();
                                debug!(
                                    provider = %provider.name(),
                                    attempt,
                                    tool_calls = calls.len(),
                                    finish_reason = ?finish_reason,
                                    "Response complete"
                                );
                                for tool_call in calls {
                                    yield StreamEvent::ToolCallComplete { tool_call };
                                }
                                yield StreamEvent::MessageComplete { finish_reason, usage };
                                return;
                            }
                        }
                    }
                };

                let class = classify(&failure);
                let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
                let delay = if forwarded {
                    None
                } else {
                    policy.next_delay(class, attempt, now_ms)
                };

                let Some(delay) = delay else {
                    warn!(
                        provider = %provider.name(),
                        attempt,
                        forwarded,
                        error = %failure,
                        "Model call failed"
                    );
                    yield StreamEvent::error(terminal_message(&failure));
                    return;
                };

                warn!(
                    provider = %provider.name(),
                    attempt,
                    class = ?class,
                    wait_ms = delay.as_millis() as u64,
                    error = %failure,
                    "Model call failed, retrying"
                );

                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    yield StreamEvent::error(terminal_message(&ProviderError::Cancelled));
                    return;
                }
            }

            // Only reachable with zero attempts, which RetryPolicy never yields.
            yield StreamEvent::error("API error: no attempts made");
        })
    }
}
