//! A provider that replays canned replies.
//!
//! Used to drive the decoder and agent loop without a network: each call to
//! `open_stream` consumes the next scripted reply. Requests are recorded so
//! callers can inspect what the model would have been sent.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ferrule_core::error::ProviderError;
use ferrule_core::provider::{
    FrameStream, Provider, ProviderRequest, StreamFrame, ToolCallFragment,
};
use futures::StreamExt;

/// One scripted model response.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Stream these frames, then end cleanly.
    Frames(Vec<StreamFrame>),
    /// Fail before any frame is produced.
    Fail(ProviderError),
    /// Stream these frames, then fail mid-stream.
    FramesThenFail(Vec<StreamFrame>, ProviderError),
    /// Stream these frames, then stall as if the connection hung.
    FramesThenPending(Vec<StreamFrame>),
}

impl ScriptedReply {
    pub fn frames(frames: Vec<StreamFrame>) -> Self {
        Self::Frames(frames)
    }

    pub fn fail(error: ProviderError) -> Self {
        Self::Fail(error)
    }

    pub fn frames_then_fail(frames: Vec<StreamFrame>, error: ProviderError) -> Self {
        Self::FramesThenFail(frames, error)
    }

    pub fn frames_then_pending(frames: Vec<StreamFrame>) -> Self {
        Self::FramesThenPending(frames)
    }

    /// A plain text answer, streamed word by word.
    pub fn text(text: &str) -> Self {
        let mut frames: Vec<StreamFrame> = text
            .split_inclusive(' ')
            .map(StreamFrame::text)
            .collect();
        frames.push(StreamFrame::finish("stop", None));
        Self::Frames(frames)
    }

    /// One tool call, its arguments split across two fragments.
    pub fn tool_call(call_id: &str, name: &str, arguments: &str) -> Self {
        Self::tool_calls(&[(call_id, name, arguments)])
    }

    /// Several tool calls in one response, indexed in the given order.
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Self {
        let mut frames = Vec::new();
        for (index, (call_id, name, arguments)) in calls.iter().enumerate() {
            let index = index as u32;
            let split = arguments
                .char_indices()
                .map(|(i, _)| i)
                .nth(arguments.chars().count() / 2)
                .unwrap_or(arguments.len());
            let (head, tail) = arguments.split_at(split);
            frames.push(StreamFrame::tool_fragment(ToolCallFragment {
                index,
                id: Some(call_id.to_string()),
                name: Some(name.to_string()),
                arguments: Some(head.to_string()),
            }));
            frames.push(StreamFrame::tool_fragment(ToolCallFragment {
                index,
                id: None,
                name: None,
                arguments: Some(tail.to_string()),
            }));
        }
        frames.push(StreamFrame::finish("tool_calls", None));
        Self::Frames(frames)
    }
}

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    repeat_last: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeat_last: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Keep replaying the final reply once the script runs out.
    pub fn repeating(replies: Vec<ScriptedReply>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(replies)
        }
    }

    /// Number of `open_stream` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        if self.repeat_last && replies.len() == 1 {
            return replies.front().cloned();
        }
        replies.pop_front()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_stream(&self, request: &ProviderRequest) -> Result<FrameStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match self.next_reply() {
            Some(ScriptedReply::Frames(frames)) => {
                Ok(futures::stream::iter(frames.into_iter().map(Ok)).boxed())
            }
            Some(ScriptedReply::Fail(error)) => Err(error),
            Some(ScriptedReply::FramesThenFail(frames, error)) => Ok(futures::stream::iter(
                frames
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error))),
            )
            .boxed()),
            Some(ScriptedReply::FramesThenPending(frames)) => Ok(futures::stream::iter(
                frames.into_iter().map(Ok),
            )
            .chain(futures::stream::pending())
            .boxed()),
            None => Err(ProviderError::Api {
                status_code: 500,
                message: "scripted provider has no replies left".into(),
            }),
        }
    }
}
