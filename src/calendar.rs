//! Calendar adapter over an external provider
//!
//! The provider owns all events; nothing here caches them and every lookup
//! re-queries.

mod adapter;
mod google;
mod time;
mod types;

pub use adapter::{
    CalendarAdapter, CalendarError, EventChanges, EventQuery, LookupCriteria, NewEventRequest,
    Outcome,
};
pub use google::GoogleCalendarClient;
pub use time::parse_instant;
pub use types::*;

use crate::provider::ProviderError;
use async_trait::async_trait;

/// Upper bound on events returned by any lookup
pub const MAX_RESULTS: u32 = 10;

/// Parameters of an event listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub q: Option<String>,
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub max_results: u32,
    /// Expand recurring events into instances
    pub single_events: bool,
    /// Order by start time (requires `single_events`)
    pub order_by_start: bool,
}

impl ListQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("maxResults", self.max_results.to_string())];
        if let Some(q) = &self.q {
            params.push(("q", q.clone()));
        }
        if let Some(time_min) = &self.time_min {
            params.push(("timeMin", time_min.clone()));
        }
        if let Some(time_max) = &self.time_max {
            params.push(("timeMax", time_max.clone()));
        }
        if self.single_events {
            params.push(("singleEvents", "true".to_string()));
        }
        if self.order_by_start {
            params.push(("orderBy", "startTime".to_string()));
        }
        params
    }
}

/// External calendar provider, pre-authorized for a single calendar
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<Vec<CalendarEvent>, ProviderError>;

    /// Create an event, generating conferencing metadata
    async fn insert(
        &self,
        event: &NewEvent,
        send_updates: SendUpdates,
    ) -> Result<CalendarEvent, ProviderError>;

    /// Merge the supplied fields into an existing event
    async fn patch(
        &self,
        event_id: &str,
        patch: &EventPatch,
        send_updates: SendUpdates,
    ) -> Result<CalendarEvent, ProviderError>;

    async fn delete(&self, event_id: &str, send_updates: SendUpdates) -> Result<(), ProviderError>;
}
