//! # ferrule core
//!
//! Domain types, traits, and error definitions for the ferrule agent core.
//! This crate has no transport or runtime dependencies: it defines the model
//! that the provider, tool and agent crates implement against.
//!
//! ## Design
//!
//! Every seam is a trait here (`Provider`, `Tool`). Implementations live in
//! their respective crates, which keeps:
//! - endpoints swappable via configuration
//! - tests free to use scripted providers and stub tools
//! - the dependency graph pointing inward on core

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod registry;
pub mod tool;
pub mod validation;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::StreamEvent;
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    FrameStream, Provider, ProviderRequest, StreamFrame, ToolCallFragment, ToolDefinition, Usage,
};
pub use registry::ToolRegistry;
pub use tool::{Arguments, Tool, ToolCall, ToolInvocation, ToolKind, ToolResult};
pub use validation::Violation;
