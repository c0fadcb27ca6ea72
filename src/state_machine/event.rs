//! Events that drive a turn

use crate::llm::{LlmErrorKind, Message};
use crate::tools::ToolOutput;
use std::time::Duration;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Model events
    ModelResponse {
        message: Message,
    },
    ModelError {
        kind: LlmErrorKind,
        message: String,
        /// Provider-requested wait before the next attempt
        retry_after: Option<Duration>,
    },
    RetryElapsed {
        attempt: u32,
    },

    // Tool events
    ToolComplete {
        tool_call_id: String,
        output: ToolOutput,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ModelResponse { .. } => "model_response",
            Event::ModelError { .. } => "model_error",
            Event::RetryElapsed { .. } => "retry_elapsed",
            Event::ToolComplete { .. } => "tool_complete",
        }
    }
}
