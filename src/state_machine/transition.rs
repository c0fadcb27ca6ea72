//! Pure state transition function

use super::linkage::{validate_tool_calls, LinkageError};
use super::{Effect, Event, TurnContext, TurnState};
use crate::llm::{Message, ToolCall};
use std::time::Duration;
use thiserror::Error;

/// Model attempts per request, including the first
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Structural violations of the dispatch protocol. All are fatal for the turn.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] LinkageError),

    #[error("Protocol error: tool result for '{got}' while waiting on '{expected}'")]
    UnexpectedToolResult { expected: String, got: String },

    #[error("Protocol error: exceeded {limit} tool iterations in one turn")]
    IterationLimit { limit: u32 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
/// Each transition that records history emits exactly one `AppendMessage`.
pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Model responses
        // ============================================================

        // AwaitingModel + plain answer -> Done
        (TurnState::AwaitingModel { .. }, Event::ModelResponse { message })
            if !message.has_tool_calls() =>
        {
            Ok(TransitionResult::new(TurnState::Done {
                answer: message.content.clone(),
            })
            .with_effect(Effect::AppendMessage(message)))
        }

        // AwaitingModel + tool calls -> ExecutingTools
        (TurnState::AwaitingModel { iteration, .. }, Event::ModelResponse { message }) => {
            if let Some(limit) = context.max_iterations {
                if *iteration >= limit {
                    // Nothing is appended, so no call is left without a result
                    return Err(TransitionError::IterationLimit { limit });
                }
            }
            validate_tool_calls(&message.tool_calls)?;

            let mut calls = message.tool_calls.clone().into_iter();
            let Some(current) = calls.next() else {
                return Err(TransitionError::InvalidTransition(
                    "tool response without tool calls".to_string(),
                ));
            };
            let first = current.clone();

            Ok(TransitionResult::new(TurnState::ExecutingTools {
                current,
                remaining: calls.collect(),
                iteration: *iteration,
            })
            .with_effect(Effect::AppendMessage(message))
            .with_effect(Effect::ExecuteTool(first)))
        }

        // ============================================================
        // Error Handling and Retry
        // ============================================================

        // AwaitingModel + ModelError (retryable) -> AwaitingModel with incremented attempt
        (
            TurnState::AwaitingModel { iteration, attempt },
            Event::ModelError {
                kind, retry_after, ..
            },
        ) if kind.is_retryable() && *attempt < MAX_RETRY_ATTEMPTS => {
            let new_attempt = attempt + 1;
            Ok(TransitionResult::new(TurnState::AwaitingModel {
                iteration: *iteration,
                attempt: new_attempt,
            })
            .with_effect(Effect::ScheduleRetry {
                delay: retry_delay(new_attempt, retry_after),
                attempt: new_attempt,
            }))
        }

        // AwaitingModel + ModelError (non-retryable or exhausted) -> Failed
        (TurnState::AwaitingModel { attempt, .. }, Event::ModelError { kind, message, .. }) => {
            let message = if kind.is_retryable() {
                format!("Failed after {attempt} attempts: {message}")
            } else {
                message
            };
            Ok(TransitionResult::new(TurnState::Failed { message, kind }))
        }

        // RetryElapsed -> request again
        (TurnState::AwaitingModel { iteration, attempt }, Event::RetryElapsed { attempt: retry })
            if *attempt == retry =>
        {
            Ok(TransitionResult::new(TurnState::AwaitingModel {
                iteration: *iteration,
                attempt: *attempt,
            })
            .with_effect(Effect::RequestModel))
        }

        // ============================================================
        // Tool Execution
        // ============================================================

        (
            TurnState::ExecutingTools {
                current,
                remaining,
                iteration,
            },
            Event::ToolComplete {
                tool_call_id,
                output,
            },
        ) => {
            if tool_call_id != current.id {
                return Err(TransitionError::UnexpectedToolResult {
                    expected: current.id.clone(),
                    got: tool_call_id,
                });
            }
            let result = Message::tool(tool_call_id, output.to_message_content());

            match remaining.split_first() {
                // More tools -> ExecutingTools (next tool)
                Some((next, rest)) => Ok(TransitionResult::new(TurnState::ExecutingTools {
                    current: next.clone(),
                    remaining: rest.to_vec(),
                    iteration: *iteration,
                })
                .with_effect(Effect::AppendMessage(result))
                .with_effect(Effect::ExecuteTool(next.clone()))),

                // Last tool -> AwaitingModel
                None => Ok(TransitionResult::new(TurnState::AwaitingModel {
                    iteration: iteration + 1,
                    attempt: 1,
                })
                .with_effect(Effect::AppendMessage(result))
                .with_effect(Effect::RequestModel)),
            }
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {}",
            state.name(),
            event.name()
        ))),
    }
}

/// Longest provider-requested wait that is honoured
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

fn retry_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    // Exponential backoff: 2s, 4s
    let backoff = Duration::from_secs(1 << (attempt - 1));
    match retry_after {
        Some(requested) => backoff.max(requested.min(MAX_RETRY_AFTER)),
        None => backoff,
    }
}

/// Calls still owed a result when a turn stops in `state`
pub fn pending_calls(state: &TurnState) -> Vec<ToolCall> {
    match state {
        TurnState::ExecutingTools {
            current, remaining, ..
        } => std::iter::once(current.clone())
            .chain(remaining.iter().cloned())
            .collect(),
        _ => Vec::new(),
    }
}
