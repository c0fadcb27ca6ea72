//! search tool: general web search

use super::schema::{ArgSchema, FieldKind, FieldSpec};
use super::{parse_input, Tool, ToolOutput};
use crate::search::{SearchProvider, MAX_RESULTS, TOPIC_GENERAL};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "search"
    }

    fn description(&self) -> String {
        "Search the web for current information. Returns the top 3 results with title, url and content."
            .to_string()
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new(vec![FieldSpec::required(
            "query",
            FieldKind::Text,
            "Search query",
        )])
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: SearchInput = match parse_input(input) {
            Ok(input) => input,
            Err(output) => return output,
        };

        match self
            .provider
            .search(&input.query, MAX_RESULTS, TOPIC_GENERAL)
            .await
        {
            Ok(results) if results.is_empty() => ToolOutput::success("No results found."),
            Ok(mut results) => {
                // The provider's max_results is a request, not a guarantee
                results.truncate(MAX_RESULTS as usize);
                ToolOutput::json(&results)
            }
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }
}
