//! Conversation context: ordered history plus token accounting.

pub mod manager;
pub mod token;

pub use manager::ContextManager;
pub use token::{HeuristicTokenizer, Tokenizer, estimate_tokens};
