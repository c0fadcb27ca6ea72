//! Turn state types

use crate::llm::{LlmErrorKind, ToolCall};
use serde::Serialize;

/// Where a turn is in the model/tool cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Waiting on the model. `iteration` counts completed tool rounds.
    AwaitingModel { iteration: u32, attempt: u32 },

    /// Running the calls of one assistant message, in request order
    ExecutingTools {
        current: ToolCall,
        remaining: Vec<ToolCall>,
        iteration: u32,
    },

    /// The model answered without requesting tools
    Done { answer: String },

    /// Model failure that ended the turn
    Failed {
        message: String,
        #[serde(skip)]
        kind: LlmErrorKind,
    },
}

impl TurnState {
    pub fn initial() -> Self {
        TurnState::AwaitingModel {
            iteration: 0,
            attempt: 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::AwaitingModel { .. } => "awaiting_model",
            TurnState::ExecutingTools { .. } => "executing_tools",
            TurnState::Done { .. } => "done",
            TurnState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done { .. } | TurnState::Failed { .. })
    }
}

/// Immutable per-turn settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    pub thread_id: String,
    /// Tool rounds allowed before the turn is aborted. `None` disables the guard.
    pub max_iterations: Option<u32>,
}

impl TurnContext {
    pub fn new(thread_id: impl Into<String>, max_iterations: Option<u32>) -> Self {
        Self {
            thread_id: thread_id.into(),
            max_iterations,
        }
    }
}
