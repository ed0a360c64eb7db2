//! Conversation history for one agent.
//!
//! The manager is append-only. It renders the fixed system prompt first,
//! followed by every stored message in insertion order, and records a token
//! count on each message as it is appended.

use std::sync::Arc;

use ferrule_core::message::{Message, MessageToolCall};

use crate::context::token::{HeuristicTokenizer, Tokenizer, total_tokens};

pub struct ContextManager {
    system_prompt: Option<String>,
    messages: Vec<Message>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ContextManager {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt: system_prompt.filter(|p| !p.is_empty()),
            messages: Vec::new(),
            tokenizer: Arc::new(HeuristicTokenizer),
        }
    }

    /// Use a model-specific tokenizer for message counts.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn add_user_message(&mut self, content: &str) {
        self.push(Message::user(content));
    }

    pub fn add_assistant_message(&mut self, content: &str, tool_calls: Vec<MessageToolCall>) {
        self.push(Message::assistant(content).with_tool_calls(tool_calls));
    }

    pub fn add_tool_result(&mut self, tool_call_id: &str, content: &str) {
        self.push(Message::tool_result(tool_call_id, content));
    }

    fn push(&mut self, message: Message) {
        let count = self.tokenizer.count(&message.content);
        self.messages.push(message.with_token_count(count));
    }

    /// The conversation as sent to the model: system prompt first.
    pub fn messages(&self) -> Vec<Message> {
        let mut rendered = Vec::with_capacity(self.messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            rendered.push(Message::system(prompt.as_str()));
        }
        rendered.extend(self.messages.iter().cloned());
        rendered
    }

    /// Stored messages, without the system prompt.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn token_count(&self) -> usize {
        total_tokens(&self.messages)
    }
}
