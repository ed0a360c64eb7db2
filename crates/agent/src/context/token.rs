//! Token counting.
//!
//! Counts are informational: they are stored on each message but never used
//! to trim the conversation.

use ferrule_core::message::Message;

/// Counts tokens for one piece of text.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters, never less than 1.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}

/// The fallback tokenizer used when no model-specific one is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Sum of the stored counts, estimating any message that has none.
pub fn total_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| m.token_count.unwrap_or_else(|| estimate_tokens(&m.content)))
        .sum()
}
