//! Turn executor

use super::traits::{LlmService, MessageStore, ToolExecutor};
use super::{TurnError, TurnOutcome, CANCELLED_TOOL_RESULT, INTERRUPTED_TOOL_RESULT};

use crate::llm::{ChatRequest, LlmErrorKind, Message, ToolCall};
use crate::state_machine::linkage::{unanswered_tool_calls, validate_history};
use crate::state_machine::{
    pending_calls, transition, Effect, Event, TransitionError, TurnContext, TurnState,
};
use crate::tools::ToolOutput;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Limits applied to every turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Tool rounds allowed per turn; `None` disables the guard
    pub max_iterations: Option<u32>,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_iterations: Some(10),
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// Generic turn runner that can work with any store, model and tool implementations
pub struct TurnRunner<S, L, T>
where
    S: MessageStore,
    L: LlmService,
    T: ToolExecutor,
{
    store: S,
    llm: L,
    tools: T,
    settings: RunnerSettings,
    /// Threads with a turn in flight
    active: Mutex<HashSet<String>>,
}

/// Releases the thread claim when the turn ends, however it ends
struct ActiveTurn<'a> {
    active: &'a Mutex<HashSet<String>>,
    thread_id: String,
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread_id);
    }
}

#[derive(Default)]
struct Counters {
    model_calls: u32,
    tool_calls: u32,
}

impl<S, L, T> TurnRunner<S, L, T>
where
    S: MessageStore,
    L: LlmService,
    T: ToolExecutor,
{
    pub fn new(store: S, llm: L, tools: T, settings: RunnerSettings) -> Self {
        Self {
            store,
            llm,
            tools,
            settings,
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one user turn to completion
    ///
    /// The user message is persisted before the model is called. Every
    /// assistant message and tool result produced along the way is persisted
    /// as it happens, so an aborted turn leaves a replayable history.
    pub async fn run_turn(
        &self,
        thread_id: &str,
        system_prompt: &str,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let _claim = self.claim(thread_id)?;
        tracing::info!(thread_id, "Starting turn");

        self.prepare_history(thread_id).await?;
        self.store.append(thread_id, &Message::user(user_text)).await?;

        let context = TurnContext::new(thread_id, self.settings.max_iterations);
        let mut state = TurnState::initial();
        let mut counters = Counters::default();
        let mut events = VecDeque::new();

        let first = self
            .request_model(thread_id, system_prompt, cancel, &mut counters)
            .await?;
        events.push_back(first);

        while let Some(event) = events.pop_front() {
            let event_name = event.name();
            let result = transition(&state, &context, event).map_err(|e| {
                tracing::warn!(thread_id, state = state.name(), event = event_name, error = %e, "Turn aborted");
                e
            })?;
            tracing::debug!(
                thread_id,
                from = state.name(),
                to = result.new_state.name(),
                event = event_name,
                "Transition"
            );
            state = result.new_state;

            for effect in result.effects {
                match self
                    .execute_effect(thread_id, system_prompt, effect, cancel, &mut counters)
                    .await
                {
                    Ok(Some(next)) => events.push_back(next),
                    Ok(None) => {}
                    Err(TurnError::Cancelled) => {
                        self.close_cancelled(thread_id, &state).await?;
                        return Err(TurnError::Cancelled);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        match state {
            TurnState::Done { answer } => {
                tracing::info!(
                    thread_id,
                    model_calls = counters.model_calls,
                    tool_calls = counters.tool_calls,
                    "Turn complete"
                );
                Ok(TurnOutcome {
                    answer,
                    model_calls: counters.model_calls,
                    tool_calls: counters.tool_calls,
                })
            }
            TurnState::Failed { message, kind } => {
                tracing::warn!(thread_id, ?kind, error = %message, "Turn failed");
                Err(TurnError::Model { kind, message })
            }
            other => Err(TransitionError::InvalidTransition(format!(
                "turn stopped in {}",
                other.name()
            ))
            .into()),
        }
    }

    fn claim(&self, thread_id: &str) -> Result<ActiveTurn<'_>, TurnError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(thread_id.to_string()) {
            return Err(TurnError::SessionBusy(thread_id.to_string()));
        }
        Ok(ActiveTurn {
            active: &self.active,
            thread_id: thread_id.to_string(),
        })
    }

    /// Answer calls left open by an interrupted turn, then check the log
    async fn prepare_history(&self, thread_id: &str) -> Result<(), TurnError> {
        let mut history = self.store.load(thread_id).await?;

        let open = unanswered_tool_calls(&history);
        if !open.is_empty() {
            tracing::warn!(thread_id, count = open.len(), "Closing interrupted tool calls");
            for call in open {
                let result = Message::tool(call.id, INTERRUPTED_TOOL_RESULT);
                self.store.append(thread_id, &result).await?;
                history.push(result);
            }
        }

        validate_history(&history).map_err(TransitionError::from)?;
        Ok(())
    }

    async fn close_cancelled(&self, thread_id: &str, state: &TurnState) -> Result<(), TurnError> {
        let open = pending_calls(state);
        tracing::info!(thread_id, open_calls = open.len(), "Turn cancelled");
        for call in open {
            self.store
                .append(thread_id, &Message::tool(call.id, CANCELLED_TOOL_RESULT))
                .await?;
        }
        Ok(())
    }

    async fn execute_effect(
        &self,
        thread_id: &str,
        system_prompt: &str,
        effect: Effect,
        cancel: &CancellationToken,
        counters: &mut Counters,
    ) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::AppendMessage(message) => {
                self.store.append(thread_id, &message).await?;
                Ok(None)
            }
            Effect::RequestModel => self
                .request_model(thread_id, system_prompt, cancel, counters)
                .await
                .map(Some),
            Effect::ScheduleRetry { delay, attempt } => {
                tracing::info!(thread_id, attempt, delay_secs = delay.as_secs(), "Retrying model request");
                tokio::select! {
                    () = cancel.cancelled() => Err(TurnError::Cancelled),
                    () = tokio::time::sleep(delay) => Ok(Some(Event::RetryElapsed { attempt })),
                }
            }
            Effect::ExecuteTool(call) => {
                counters.tool_calls += 1;
                self.execute_tool(thread_id, call, cancel).await.map(Some)
            }
        }
    }

    /// One model round trip over the full stored history
    async fn request_model(
        &self,
        thread_id: &str,
        system_prompt: &str,
        cancel: &CancellationToken,
        counters: &mut Counters,
    ) -> Result<Event, TurnError> {
        let history = self.store.load(thread_id).await?;
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend(history);

        let request = ChatRequest {
            messages,
            tools: self.tools.definitions(),
        };
        counters.model_calls += 1;

        let result = tokio::select! {
            () = cancel.cancelled() => return Err(TurnError::Cancelled),
            result = tokio::time::timeout(self.settings.model_timeout, self.llm.complete(&request)) => result,
        };

        Ok(match result {
            Ok(Ok(response)) => Event::ModelResponse {
                message: response.message,
            },
            Ok(Err(e)) => Event::ModelError {
                kind: e.kind,
                message: e.message,
                retry_after: e.retry_after,
            },
            Err(_) => Event::ModelError {
                kind: LlmErrorKind::Timeout,
                message: format!(
                    "Model did not respond within {}s",
                    self.settings.model_timeout.as_secs()
                ),
                retry_after: None,
            },
        })
    }

    async fn execute_tool(
        &self,
        thread_id: &str,
        call: ToolCall,
        cancel: &CancellationToken,
    ) -> Result<Event, TurnError> {
        let started = Instant::now();
        let run = self.tools.execute(&call.name, call.arguments.clone());

        let output = tokio::select! {
            () = cancel.cancelled() => return Err(TurnError::Cancelled),
            result = tokio::time::timeout(self.settings.tool_timeout, run) => {
                result.unwrap_or_else(|_| {
                    ToolOutput::error(format!(
                        "Tool '{}' timed out after {}s",
                        call.name,
                        self.settings.tool_timeout.as_secs()
                    ))
                })
            }
        };

        tracing::debug!(
            thread_id,
            tool = %call.name,
            tool_call_id = %call.id,
            success = output.success,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tool call finished"
        );

        Ok(Event::ToolComplete {
            tool_call_id: call.id,
            output,
        })
    }
}
