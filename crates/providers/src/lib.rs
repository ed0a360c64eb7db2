//! Model access for ferrule.
//!
//! Providers implement `ferrule_core::Provider` and yield raw frames. The
//! [`StreamDecoder`] sits on top of any provider and is what the agent loop
//! talks to: it reassembles tool calls, retries transient failures, and
//! guarantees a single terminal event per call.

pub mod decoder;
pub mod openai_compat;
pub mod reassembly;
pub mod retry;
pub mod scripted;

pub use decoder::{EventStream, StreamDecoder};
pub use openai_compat::OpenAiCompatProvider;
pub use reassembly::ToolCallAssembler;
pub use retry::{FailureClass, RetryPolicy};
pub use scripted::{ScriptedProvider, ScriptedReply};
