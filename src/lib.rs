//! Core of an LLM-orchestration runtime: streaming response aggregation and
//! conversation-memory compression for agents driving a fixed-context
//! language model. Tool execution, model transport, persistence beyond an
//! in-memory conversation store, rate-limiting, authentication, and
//! user-facing presentation all live outside this crate.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output must go through the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod dialog_round;
pub mod error;
pub mod event_bus;
pub mod logging;
pub mod memory_compressor;
pub mod message;
pub mod model_provider;
pub mod per_cid_lock;
pub mod store;
pub mod stream_aggregator;
pub mod token_accountant;
pub mod trace_recorder;

pub use config::Config;
pub use error::CoreError;
pub use error::Result;
pub use message::Message;
pub use message::ToolCall;
pub use per_cid_lock::PerCidLock;
