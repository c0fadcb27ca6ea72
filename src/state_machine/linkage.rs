//! Tool-call linkage rules
//!
//! Every tool message answers a call of the assistant message immediately
//! before its run of tool messages, and every call is answered exactly once.

use crate::llm::{Message, Role, ToolCall};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkageError {
    #[error("tool call has an empty id")]
    EmptyCallId,

    #[error("tool call '{0}' has an empty tool name")]
    EmptyToolName(String),

    #[error("tool call id '{0}' appears more than once")]
    DuplicateCallId(String),

    #[error("message {index}: tool result without a preceding assistant tool call")]
    OrphanResult { index: usize },

    #[error("message {index}: tool result '{tool_call_id}' does not answer a pending call")]
    UnmatchedResult { index: usize, tool_call_id: String },

    #[error("tool call '{tool_call_id}' of message {index} has no result")]
    MissingResult { index: usize, tool_call_id: String },
}

/// Check the calls of one assistant message before they are accepted
pub fn validate_tool_calls(calls: &[ToolCall]) -> Result<(), LinkageError> {
    let mut seen = HashSet::new();
    for call in calls {
        if call.id.is_empty() {
            return Err(LinkageError::EmptyCallId);
        }
        if call.name.is_empty() {
            return Err(LinkageError::EmptyToolName(call.id.clone()));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(LinkageError::DuplicateCallId(call.id.clone()));
        }
    }
    Ok(())
}

/// Check a complete history
///
/// A trailing assistant message with unanswered calls is a violation here;
/// `unanswered_tool_calls` finds those so they can be repaired first.
pub fn validate_history(messages: &[Message]) -> Result<(), LinkageError> {
    // (index of the assistant message, ids still awaiting a result)
    let mut pending: Option<(usize, Vec<&str>)> = None;

    for (index, message) in messages.iter().enumerate() {
        if message.role == Role::Tool {
            let Some((_, ids)) = pending.as_mut() else {
                return Err(LinkageError::OrphanResult { index });
            };
            let id = message.tool_call_id.as_deref().unwrap_or_default();
            let Some(position) = ids.iter().position(|pending_id| *pending_id == id) else {
                return Err(LinkageError::UnmatchedResult {
                    index,
                    tool_call_id: id.to_string(),
                });
            };
            ids.remove(position);
            continue;
        }

        if let Some((assistant_index, ids)) = pending.take() {
            if let Some(first) = ids.first() {
                return Err(LinkageError::MissingResult {
                    index: assistant_index,
                    tool_call_id: (*first).to_string(),
                });
            }
        }

        if message.role == Role::Assistant && message.has_tool_calls() {
            validate_tool_calls(&message.tool_calls)?;
            pending = Some((
                index,
                message.tool_calls.iter().map(|c| c.id.as_str()).collect(),
            ));
        }
    }

    if let Some((index, ids)) = pending {
        if let Some(first) = ids.first() {
            return Err(LinkageError::MissingResult {
                index,
                tool_call_id: (*first).to_string(),
            });
        }
    }
    Ok(())
}

/// Calls of the final assistant message run that never received a result
///
/// This is what a turn abandoned mid-tool leaves behind.
pub fn unanswered_tool_calls(messages: &[Message]) -> Vec<ToolCall> {
    let Some(assistant_index) = messages
        .iter()
        .rposition(|m| m.role != Role::Tool)
        .filter(|&i| messages[i].role == Role::Assistant && messages[i].has_tool_calls())
    else {
        return Vec::new();
    };

    let answered: HashSet<&str> = messages[assistant_index + 1..]
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    messages[assistant_index]
        .tool_calls
        .iter()
        .filter(|c| !answered.contains(c.id.as_str()))
        .cloned()
        .collect()
}
