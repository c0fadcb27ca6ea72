//! Effects produced by state transitions

use crate::llm::{Message, ToolCall};
use std::time::Duration;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the thread's history
    AppendMessage(Message),

    /// Send the current history to the model
    RequestModel,

    /// Wait, then deliver `Event::RetryElapsed { attempt }`
    ScheduleRetry { delay: Duration, attempt: u32 },

    /// Run one tool call and deliver `Event::ToolComplete`
    ExecuteTool(ToolCall),
}
