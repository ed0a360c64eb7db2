//! The core agent loop for ferrule.
//!
//! The agent follows a **request → act → observe** cycle:
//!
//! 1. **Receive** a user message and append it to the conversation
//! 2. **Send** the system prompt, history, and tool schemas to the model
//! 3. **Stream** the response back as events
//! 4. **If tool calls**: execute them in order, append results, loop to step 2
//! 5. **If text only**: the text is the answer
//!
//! The loop also stops when two consecutive turns request identical tool
//! calls, or when the configured turn budget runs out.

pub mod context;
pub mod loop_detection;
pub mod loop_runner;
pub mod prompt;
pub mod session;
pub mod settings;
pub mod stream_event;

pub use context::{ContextManager, HeuristicTokenizer, Tokenizer};
pub use loop_detection::LoopDetector;
pub use loop_runner::AgentLoop;
pub use prompt::{build_system_prompt, system_prompt_for};
pub use session::Session;
pub use settings::AgentSettings;
pub use stream_event::{AgentEvent, StopReason};
