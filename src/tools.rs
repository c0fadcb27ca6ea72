//! Tools the assistant can call
//!
//! Tools are constructed once per process with their collaborators injected,
//! then frozen into a `ToolRegistry`.

mod calendar_tools;
pub mod schema;
mod web_search;

pub use calendar_tools::{CreateEventTool, DeleteEventTool, GetEventsTool, UpdateEventTool};
pub use schema::{ArgSchema, FieldKind, FieldSpec};
pub use web_search::WebSearchTool;

use crate::calendar::CalendarAdapter;
use crate::llm::ToolDefinition;
use crate::search::SearchProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }

    /// Successful output carrying a structured payload as JSON text
    pub fn json<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(text) => Self::success(text),
            Err(e) => Self::error(format!("Failed to serialize result: {e}")),
        }
    }

    /// Text placed in the tool-role message the model reads
    pub fn to_message_content(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.output)
        }
    }
}

/// Dispatch failures. These never crash a turn; `execute` renders them as output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool name '{0}' is registered more than once")]
    DuplicateTool(String),
}

/// Trait for tools that can be executed by the assistant
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a registry
    fn name(&self) -> &'static str;

    /// Tool description for LLM
    fn description(&self) -> String;

    fn schema(&self) -> ArgSchema;

    /// Execute with arguments that already passed `schema()`
    async fn run(&self, input: Value) -> ToolOutput;
}

struct Registered {
    tool: Arc<dyn Tool>,
    schema: ArgSchema,
}

/// Immutable set of tools available to a session
pub struct ToolRegistry {
    tools: Vec<Registered>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|r| r.tool.name()))
            .finish()
    }
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, ToolError> {
        let mut seen = HashSet::new();
        let mut registered = Vec::with_capacity(tools.len());
        for tool in tools {
            if !seen.insert(tool.name()) {
                return Err(ToolError::DuplicateTool(tool.name().to_string()));
            }
            registered.push(Registered {
                schema: tool.schema(),
                tool,
            });
        }
        Ok(Self { tools: registered })
    }

    /// The assistant's tool set: web search and the four calendar operations
    pub fn standard(
        calendar: Arc<CalendarAdapter>,
        search: Arc<dyn SearchProvider>,
    ) -> Result<Self, ToolError> {
        Self::new(vec![
            Arc::new(WebSearchTool::new(search)),
            Arc::new(GetEventsTool::new(calendar.clone())),
            Arc::new(CreateEventTool::new(calendar.clone())),
            Arc::new(UpdateEventTool::new(calendar.clone())),
            Arc::new(DeleteEventTool::new(calendar)),
        ])
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|r| ToolDefinition {
                name: r.tool.name().to_string(),
                description: r.tool.description(),
                input_schema: r.schema.to_json_schema(),
            })
            .collect()
    }

    /// Look up, validate, and run a tool
    pub async fn invoke(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let entry = self
            .tools
            .iter()
            .find(|r| r.tool.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        entry
            .schema
            .validate(&args)
            .map_err(|reason| ToolError::InvalidArguments {
                tool: name.to_string(),
                reason,
            })?;

        let args = match args {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Ok(entry.tool.run(args).await)
    }

    /// `invoke` with dispatch failures converted into error output for the model
    pub async fn execute(&self, name: &str, args: Value) -> ToolOutput {
        let started = Instant::now();
        let output = match self.invoke(name, args).await {
            Ok(output) => output,
            Err(e) => ToolOutput::error(e.to_string()),
        };

        tracing::info!(
            tool = name,
            success = output.success,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tool executed"
        );
        output
    }
}

/// Deserialize already-validated arguments into a tool's input type
fn parse_input<T: serde::de::DeserializeOwned>(input: Value) -> Result<T, ToolOutput> {
    serde_json::from_value(input).map_err(|e| ToolOutput::error(format!("Invalid input: {e}")))
}
