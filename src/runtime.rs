//! Runtime for executing turns
//!
//! Drives the state machine against a message store, a model and a tool
//! executor. One turn runs per user message.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{RunnerSettings, TurnRunner};
pub use traits::*;

use crate::db::StoreError;
use crate::llm::LlmErrorKind;
use crate::state_machine::TransitionError;
use thiserror::Error;

/// Result text recorded for a call whose execution never finished
pub const INTERRUPTED_TOOL_RESULT: &str = "[Tool execution interrupted before completion]";

/// Result text recorded for calls abandoned by a cancelled turn
pub const CANCELLED_TOOL_RESULT: &str = "[Tool execution cancelled]";

/// Why a turn ended without an answer
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Protocol(#[from] TransitionError),

    #[error("Model request failed: {message}")]
    Model { kind: LlmErrorKind, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Thread {0} already has a turn in progress")]
    SessionBusy(String),

    #[error("Turn cancelled")]
    Cancelled,
}

/// A finished turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub answer: String,
    /// Model requests issued, retries included
    pub model_calls: u32,
    pub tool_calls: u32,
}
