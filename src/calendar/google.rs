//! Google Calendar v3 REST client

use super::types::{CalendarEvent, EventPatch, NewEvent, SendUpdates};
use super::{CalendarProvider, ListQuery};
use crate::provider::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "Google Calendar";

/// Client bound to one calendar and one pre-issued access token
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: impl Into<String>,
        calendar_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::from_reqwest(SERVICE, &e))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            calendar_id: calendar_id.into(),
            access_token: access_token.into(),
        })
    }

    /// `{base}/calendars/{calendarId}/events[/{eventId}]` with each segment escaped
    fn events_url(&self, event_id: Option<&str>) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ProviderError::invalid_response(format!("Invalid calendar API base URL: {e}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ProviderError::invalid_response("Calendar API base URL cannot have a path")
            })?;
            segments
                .pop_if_empty()
                .extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ProviderError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ProviderError::from_status(SERVICE, status, &body);
        tracing::warn!(status = %status, error = %error, "Calendar request failed");
        Err(error)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        response.json::<T>().await.map_err(|e| {
            ProviderError::invalid_response(format!("Failed to parse {SERVICE} response: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn list(&self, query: &ListQuery) -> Result<Vec<CalendarEvent>, ProviderError> {
        let url = self.events_url(None)?;
        let response = self.send(self.client.get(url).query(&query.to_params())).await?;
        let page: EventsPage = Self::parse(response).await?;
        tracing::debug!(count = page.items.len(), "Listed calendar events");
        Ok(page.items)
    }

    async fn insert(
        &self,
        event: &NewEvent,
        send_updates: SendUpdates,
    ) -> Result<CalendarEvent, ProviderError> {
        let url = self.events_url(None)?;
        let request = self
            .client
            .post(url)
            .query(&[
                ("sendUpdates", send_updates.as_str()),
                ("conferenceDataVersion", "1"),
            ])
            .json(event);
        Self::parse(self.send(request).await?).await
    }

    async fn patch(
        &self,
        event_id: &str,
        patch: &EventPatch,
        send_updates: SendUpdates,
    ) -> Result<CalendarEvent, ProviderError> {
        let url = self.events_url(Some(event_id))?;
        let request = self
            .client
            .patch(url)
            .query(&[
                ("sendUpdates", send_updates.as_str()),
                ("conferenceDataVersion", "1"),
            ])
            .json(patch);
        Self::parse(self.send(request).await?).await
    }

    async fn delete(&self, event_id: &str, send_updates: SendUpdates) -> Result<(), ProviderError> {
        let url = self.events_url(Some(event_id))?;
        let request = self
            .client
            .delete(url)
            .query(&[("sendUpdates", send_updates.as_str())]);
        self.send(request).await?;
        Ok(())
    }
}
