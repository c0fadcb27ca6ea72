//! Tavily search API client

use super::{SearchProvider, SearchResult};
use crate::provider::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "Tavily";

pub struct TavilyClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::from_reqwest(SERVICE, &e))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
        })
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    topic: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        topic: &str,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results,
                topic,
            })
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ProviderError::from_status(SERVICE, status, &body);
            tracing::warn!(status = %status, error = %error, "Search request failed");
            return Err(error);
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            ProviderError::invalid_response(format!("Failed to parse {SERVICE} response: {e}"))
        })?;
        Ok(parsed.results)
    }
}
