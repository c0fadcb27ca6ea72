//! Web search collaborator

mod tavily;

pub use tavily::TavilyClient;

use crate::provider::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Results returned per query
pub const MAX_RESULTS: u32 = 3;

/// Search category understood by the provider
pub const TOPIC_GENERAL: &str = "general";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        topic: &str,
    ) -> Result<Vec<SearchResult>, ProviderError>;
}
