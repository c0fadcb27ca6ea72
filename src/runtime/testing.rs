//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::calendar::{
    CalendarEvent, CalendarProvider, EventPatch, ListQuery, NewEvent, SendUpdates,
};
use crate::llm::{ChatRequest, ChatResponse, LlmError, Message, ToolDefinition, Usage};
use crate::provider::ProviderError;
use crate::search::{SearchProvider, SearchResult};
use crate::tools::ToolOutput;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
#[allow(dead_code)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    model_id: String,
    /// Applied before every response (for timeout testing)
    delay: Option<Duration>,
    /// Record of all requests made
    pub requests: Mutex<Vec<ChatRequest>>,
}

#[allow(dead_code)]
impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: ChatResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a response carrying `message`
    pub fn queue_message(&self, message: Message) {
        self.queue_response(ChatResponse {
            message,
            usage: Usage::default(),
        });
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Mock tool executor with predefined outputs
#[allow(dead_code)]
pub struct MockToolExecutor {
    outputs: HashMap<String, ToolOutput>,
    definitions: Vec<ToolDefinition>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(String, Value)>>,
}

#[allow(dead_code)]
impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            definitions: Vec::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Add a tool with a predefined output
    pub fn with_tool(mut self, name: impl Into<String>, output: ToolOutput) -> Self {
        let name = name.into();
        self.definitions.push(mock_definition(&name));
        self.outputs.insert(name, output);
        self
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<(String, Value)> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, name: &str, input: Value) -> ToolOutput {
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), input));
        self.outputs
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolOutput::error(format!("Unknown tool '{name}'")))
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

fn mock_definition(name: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: format!("Mock {name}"),
        input_schema: serde_json::json!({ "type": "object", "properties": {} }),
    }
}

// ============================================================================
// Blocking Tool Executor (for cancellation and busy testing)
// ============================================================================

/// Tool executor that parks every call until released
#[derive(Default)]
pub struct BlockingToolExecutor {
    /// Notified when a call starts (for test synchronization)
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl BlockingToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolExecutor for BlockingToolExecutor {
    async fn execute(&self, _name: &str, _input: Value) -> ToolOutput {
        self.started.notify_one();
        self.release.notified().await;
        ToolOutput::success("released")
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![mock_definition("search")]
    }
}

// ============================================================================
// Mock Calendar Provider
// ============================================================================

/// Provider operation as received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    List(ListQuery),
    Insert(NewEvent, SendUpdates),
    Patch(String, EventPatch),
    Delete(String, SendUpdates),
}

/// In-memory calendar provider that records every call
///
/// Listings return queued event sets (empty once the queue runs dry). Inserts
/// and patches echo the request back with a generated meeting link.
#[derive(Default)]
pub struct MockCalendarProvider {
    listings: Mutex<VecDeque<Vec<CalendarEvent>>>,
    failures: Mutex<VecDeque<ProviderError>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl MockCalendarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_list(&self, events: Vec<CalendarEvent>) {
        self.listings.lock().unwrap().push_back(events);
    }

    /// Fail the next provider operation, whichever it is
    pub fn fail_next(&self, error: ProviderError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ProviderCall) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarProvider for MockCalendarProvider {
    async fn list(&self, query: &ListQuery) -> Result<Vec<CalendarEvent>, ProviderError> {
        self.record(ProviderCall::List(query.clone()))?;
        Ok(self.listings.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn insert(
        &self,
        event: &NewEvent,
        send_updates: SendUpdates,
    ) -> Result<CalendarEvent, ProviderError> {
        self.record(ProviderCall::Insert(event.clone(), send_updates))?;
        let id = format!("evt{}", self.calls.lock().unwrap().len());
        Ok(CalendarEvent {
            hangout_link: Some(format!("https://meet.google.com/{id}")),
            id,
            summary: Some(event.summary.clone()),
            status: Some("confirmed".to_string()),
            start: Some(event.start.clone()),
            end: Some(event.end.clone()),
            attendees: event.attendees.clone(),
            ..CalendarEvent::default()
        })
    }

    async fn patch(
        &self,
        event_id: &str,
        patch: &EventPatch,
        _send_updates: SendUpdates,
    ) -> Result<CalendarEvent, ProviderError> {
        self.record(ProviderCall::Patch(event_id.to_string(), patch.clone()))?;
        Ok(CalendarEvent {
            id: event_id.to_string(),
            summary: patch.summary.clone(),
            start: patch.start.clone(),
            end: patch.end.clone(),
            attendees: patch.attendees.clone().unwrap_or_default(),
            ..CalendarEvent::default()
        })
    }

    async fn delete(&self, event_id: &str, send_updates: SendUpdates) -> Result<(), ProviderError> {
        self.record(ProviderCall::Delete(event_id.to_string(), send_updates))
    }
}

// ============================================================================
// Mock Search Provider
// ============================================================================

/// Search provider returning queued result sets (empty once the queue runs dry)
#[derive(Default)]
pub struct MockSearchProvider {
    results: Mutex<VecDeque<Result<Vec<SearchResult>, ProviderError>>>,
    queries: Mutex<Vec<(String, u32, String)>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, result: Result<Vec<SearchResult>, ProviderError>) {
        self.results.lock().unwrap().push_back(result);
    }

    /// `(query, max_results, topic)` per call
    pub fn recorded_queries(&self) -> Vec<(String, u32, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        topic: &str,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), max_results, topic.to_string()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarAdapter, EventDateTime};
    use crate::db::MemoryStore;
    use crate::llm::{LlmErrorKind, Role, ToolCall};
    use crate::runtime::{
        RunnerSettings, TurnError, TurnRunner, CANCELLED_TOOL_RESULT, INTERRUPTED_TOOL_RESULT,
    };
    use crate::state_machine::linkage::{validate_history, LinkageError};
    use crate::state_machine::TransitionError;
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    const PROMPT: &str = "You are Jarvis.";

    type Runner<T> = TurnRunner<Arc<MemoryStore>, Arc<MockLlmClient>, T>;

    fn runner<T: ToolExecutor>(
        llm: &Arc<MockLlmClient>,
        tools: T,
        settings: RunnerSettings,
    ) -> Runner<T> {
        TurnRunner::new(Arc::new(MemoryStore::new()), llm.clone(), tools, settings)
    }

    /// Registry with the real tools over mock collaborators
    fn registry(
        calendar: &Arc<MockCalendarProvider>,
        search: &Arc<MockSearchProvider>,
    ) -> ToolRegistry {
        let adapter = Arc::new(CalendarAdapter::new(calendar.clone(), chrono_tz::Tz::UTC));
        ToolRegistry::standard(adapter, search.clone()).unwrap()
    }

    fn tool_call(id: &str, name: &str, arguments: Value) -> Message {
        Message::assistant_with_tools("", vec![ToolCall::new(id, name, arguments)])
    }

    fn event(id: &str, summary: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            summary: Some(summary.to_string()),
            start: Some(EventDateTime::at("2026-10-17T10:00:00+00:00", "UTC")),
            ..CalendarEvent::default()
        }
    }

    async fn history<T: ToolExecutor>(runner: &Runner<T>, thread_id: &str) -> Vec<Message> {
        runner.store().load(thread_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(Message::assistant("Hello, sir."));
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());

        let outcome = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Hello, sir.");
        assert_eq!(outcome.model_calls, 1);
        assert_eq!(outcome.tool_calls, 0);
        assert_eq!(
            history(&runner, "1").await,
            vec![Message::user("Hi"), Message::assistant("Hello, sir.")]
        );

        // The system prompt leads every request but is never stored
        let requests = llm.recorded_requests();
        assert_eq!(requests[0].messages[0], Message::system(PROMPT));
        assert_eq!(requests[0].messages[1], Message::user("Hi"));
    }

    #[tokio::test]
    async fn test_calendar_question_turn() {
        let calendar = Arc::new(MockCalendarProvider::new());
        let search = Arc::new(MockSearchProvider::new());
        calendar.queue_list(vec![event("a", "Standup")]);

        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(tool_call(
            "call_1",
            "get-events",
            json!({ "timeMin": "2026-10-17T00:00:00", "timeMax": "2026-10-18T00:00:00" }),
        ));
        llm.queue_message(Message::assistant("You have Standup at 10:00 tomorrow."));
        let runner = runner(&llm, registry(&calendar, &search), RunnerSettings::default());

        let outcome = runner
            .run_turn("1", PROMPT, "What meetings do I have tomorrow?", &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.answer.contains("Standup"));
        assert_eq!(outcome.tool_calls, 1);

        let messages = history(&runner, "1").await;
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(messages[2].content.contains("\"summary\":\"Standup\""));

        // The second request carries the tool result and all five tool declarations
        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[1].tools.len(), 5);
    }

    #[tokio::test]
    async fn test_create_event_turn() {
        let calendar = Arc::new(MockCalendarProvider::new());
        let search = Arc::new(MockSearchProvider::new());

        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(tool_call(
            "call_1",
            "create-event",
            json!({
                "summary": "Backend discussion",
                "start": "2026-10-16T16:00:00",
                "end": "2026-10-16T17:00:00",
                "attendees": ["msd@gmail.com"]
            }),
        ));
        llm.queue_message(Message::assistant("Scheduled, with a Meet link."));
        let runner = runner(&llm, registry(&calendar, &search), RunnerSettings::default());

        runner
            .run_turn("1", PROMPT, "Book a meeting with msd@gmail.com at 4pm", &CancellationToken::new())
            .await
            .unwrap();

        let messages = history(&runner, "1").await;
        assert!(messages[2].content.contains("meetingLink"));
        assert!(matches!(
            calendar.calls().as_slice(),
            [ProviderCall::Insert(_, SendUpdates::All)]
        ));
    }

    #[tokio::test]
    async fn test_ambiguous_delete_asks_user() {
        let calendar = Arc::new(MockCalendarProvider::new());
        let search = Arc::new(MockSearchProvider::new());
        calendar.queue_list(vec![event("a", "Sync"), event("b", "Sync"), event("c", "Sync")]);

        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(tool_call("call_1", "delete-event", json!({ "q": "sync" })));
        llm.queue_message(Message::assistant("Which of the three syncs should I delete?"));
        let runner = runner(&llm, registry(&calendar, &search), RunnerSettings::default());

        runner
            .run_turn("1", PROMPT, "Delete the sync", &CancellationToken::new())
            .await
            .unwrap();

        let messages = history(&runner, "1").await;
        assert!(messages[2].content.contains("\"multipleMatches\":true"));
        assert!(!calendar
            .calls()
            .iter()
            .any(|c| matches!(c, ProviderCall::Delete(..))));
    }

    #[tokio::test]
    async fn test_multiple_calls_answered_in_order() {
        let tools = MockToolExecutor::new()
            .with_tool("search", ToolOutput::success("sunny"))
            .with_tool("get-events", ToolOutput::error("Calendar unavailable"));

        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(Message::assistant_with_tools(
            "",
            vec![
                ToolCall::new("c1", "search", json!({ "query": "weather" })),
                ToolCall::new("c2", "get-events", json!({})),
            ],
        ));
        llm.queue_message(Message::assistant("Sunny, and I could not read your calendar."));
        let runner = runner(&llm, tools, RunnerSettings::default());

        let outcome = runner
            .run_turn("1", PROMPT, "Weather and plans?", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.tool_calls, 2);

        let messages = history(&runner, "1").await;
        assert_eq!(messages[2], Message::tool("c1", "sunny"));
        assert_eq!(messages[3], Message::tool("c2", "Error: Calendar unavailable"));
        assert_eq!(validate_history(&messages), Ok(()));
    }

    #[tokio::test]
    async fn test_iteration_limit_aborts_turn() {
        let tools = MockToolExecutor::new().with_tool("search", ToolOutput::success("more"));
        let llm = Arc::new(MockLlmClient::new("mock"));
        for i in 0..5 {
            llm.queue_message(tool_call(&format!("c{i}"), "search", json!({ "query": "x" })));
        }
        let settings = RunnerSettings {
            max_iterations: Some(2),
            ..RunnerSettings::default()
        };
        let runner = runner(&llm, tools, settings);

        let err = runner
            .run_turn("1", PROMPT, "Loop forever", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TurnError::Protocol(TransitionError::IterationLimit { limit: 2 })
        ));

        // Two rounds ran and the history is still replayable
        let messages = history(&runner, "1").await;
        assert_eq!(messages.iter().filter(|m| m.role == Role::Tool).count(), 2);
        assert_eq!(validate_history(&messages), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_error_is_retried() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_error(LlmError::server_error("overloaded"));
        llm.queue_message(Message::assistant("Back online."));
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());

        let outcome = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.answer, "Back online.");
        assert_eq!(outcome.model_calls, 2);
        assert_eq!(history(&runner, "1").await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_for_retry_after() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_error(
            LlmError::rate_limit("Rate limit exceeded").with_retry_after(Duration::from_secs(7)),
        );
        llm.queue_message(Message::assistant("Here you go."));
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());

        let started = tokio::time::Instant::now();
        let outcome = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.answer, "Here you go.");
        assert!(started.elapsed() >= Duration::from_secs(7));
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_exhausted() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        for _ in 0..3 {
            llm.queue_error(LlmError::network("connection reset"));
        }
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());

        let err = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap_err();
        let TurnError::Model { kind, message } = err else {
            panic!("expected model error, got {err:?}");
        };
        assert_eq!(kind, LlmErrorKind::Network);
        assert_eq!(message, "Failed after 3 attempts: connection reset");
        assert_eq!(llm.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_fails_without_retry() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_error(LlmError::auth("Incorrect API key provided"));
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());

        let err = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Model { kind: LlmErrorKind::Auth, .. }));
        assert_eq!(llm.recorded_requests().len(), 1);
        // The user message stays recorded
        assert_eq!(history(&runner, "1").await, vec![Message::user("Hi")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_timeout_fails_turn() {
        let llm = Arc::new(MockLlmClient::new("mock").with_delay(Duration::from_secs(600)));
        llm.queue_message(Message::assistant("too late"));
        let settings = RunnerSettings {
            model_timeout: Duration::from_secs(5),
            ..RunnerSettings::default()
        };
        let runner = runner(&llm, MockToolExecutor::new(), settings);

        let err = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Model { kind: LlmErrorKind::Timeout, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout_becomes_error_result() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(tool_call("c1", "search", json!({ "query": "x" })));
        llm.queue_message(Message::assistant("The search timed out."));
        let settings = RunnerSettings {
            tool_timeout: Duration::from_secs(1),
            ..RunnerSettings::default()
        };
        let runner = runner(&llm, BlockingToolExecutor::new(), settings);

        let outcome = runner
            .run_turn("1", PROMPT, "Search", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.answer, "The search timed out.");

        let messages = history(&runner, "1").await;
        assert_eq!(
            messages[2].content,
            "Error: Tool 'search' timed out after 1s"
        );
    }

    #[tokio::test]
    async fn test_interrupted_tool_calls_are_closed() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(Message::assistant("Done."));
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());

        // A previous turn died between requesting and running its tools
        let store = runner.store();
        store.append("1", &Message::user("Delete standup")).await.unwrap();
        store
            .append("1", &tool_call("c1", "delete-event", json!({ "q": "standup" })))
            .await
            .unwrap();

        runner
            .run_turn("1", PROMPT, "Hello?", &CancellationToken::new())
            .await
            .unwrap();

        let messages = history(&runner, "1").await;
        assert_eq!(messages[2], Message::tool("c1", INTERRUPTED_TOOL_RESULT));
        assert_eq!(messages[3], Message::user("Hello?"));
        assert_eq!(validate_history(&messages), Ok(()));
    }

    #[tokio::test]
    async fn test_corrupt_history_is_rejected() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());
        runner
            .store()
            .append("1", &Message::tool("ghost", "orphan"))
            .await
            .unwrap();

        let err = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Protocol(TransitionError::Protocol(_))));
        assert!(llm.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_nameless_tool_call_is_protocol_error() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(tool_call("c1", "", json!({})));
        let runner = runner(&llm, MockToolExecutor::new(), RunnerSettings::default());

        let err = runner
            .run_turn("1", PROMPT, "Hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TurnError::Protocol(TransitionError::Protocol(LinkageError::EmptyToolName(ref id)))
                if id == "c1"
        ));
        assert_eq!(llm.recorded_requests().len(), 1);
        assert_eq!(history(&runner, "1").await, vec![Message::user("Hi")]);
    }

    #[tokio::test]
    async fn test_busy_thread_rejects_second_turn() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(tool_call("c1", "search", json!({ "query": "x" })));
        llm.queue_message(Message::assistant("first"));
        let tools = BlockingToolExecutor::new();
        let (started, release) = (tools.started.clone(), tools.release.clone());
        let runner = Arc::new(runner(&llm, tools, RunnerSettings::default()));

        let first = tokio::spawn({
            let runner = runner.clone();
            async move {
                runner
                    .run_turn("1", PROMPT, "one", &CancellationToken::new())
                    .await
            }
        });
        started.notified().await;

        let err = runner
            .run_turn("1", PROMPT, "two", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::SessionBusy(ref id) if id == "1"));

        release.notify_one();
        assert_eq!(first.await.unwrap().unwrap().answer, "first");

        // The claim is released with the turn
        llm.queue_message(Message::assistant("second"));
        let outcome = runner
            .run_turn("1", PROMPT, "two", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.answer, "second");
    }

    #[tokio::test]
    async fn test_cancel_during_tool_closes_calls() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_message(Message::assistant_with_tools(
            "",
            vec![
                ToolCall::new("c1", "search", json!({ "query": "a" })),
                ToolCall::new("c2", "search", json!({ "query": "b" })),
            ],
        ));
        let tools = BlockingToolExecutor::new();
        let started = tools.started.clone();
        let runner = Arc::new(runner(&llm, tools, RunnerSettings::default()));
        let cancel = CancellationToken::new();

        let turn = tokio::spawn({
            let runner = runner.clone();
            let cancel = cancel.clone();
            async move { runner.run_turn("1", PROMPT, "Search twice", &cancel).await }
        });
        started.notified().await;
        cancel.cancel();

        assert!(matches!(turn.await.unwrap(), Err(TurnError::Cancelled)));

        let messages = history(&runner, "1").await;
        assert_eq!(messages[2], Message::tool("c1", CANCELLED_TOOL_RESULT));
        assert_eq!(messages[3], Message::tool("c2", CANCELLED_TOOL_RESULT));
        assert_eq!(validate_history(&messages), Ok(()));
    }
}
