//! Lookup-or-resolve protocol and the four calendar operations
//!
//! Every failure here is guidance for the model. The tool layer renders
//! `CalendarError` as text instead of failing the turn.

use super::time::{parse_instant, to_wire};
use super::types::{
    CalendarEvent, ConferenceData, DeleteConfirmation, Disambiguation, EventConfirmation,
    EventDateTime, EventPatch, EventSummary, NewEvent, Person, SendUpdates,
};
use super::{CalendarProvider, ListQuery, MAX_RESULTS};
use crate::provider::{ProviderError, ProviderErrorKind};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;

/// Tool-level calendar failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(
        "Not enough information to find the event. Provide an eventId, or a search \
         query (q) and/or a time window (timeMin, timeMax)."
    )]
    InsufficientCriteria,

    #[error("No matching event found{0}. Try a broader query or a wider time window.")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result of an operation that may stop at disambiguation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Ambiguous(Disambiguation),
}

/// Free-text and time-window filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub q: Option<String>,
    pub time_min: Option<String>,
    pub time_max: Option<String>,
}

impl EventQuery {
    /// Blank strings count as absent
    fn normalized(&self) -> Self {
        fn keep(value: Option<&str>) -> Option<String> {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }
        Self {
            q: keep(self.q.as_deref()),
            time_min: keep(self.time_min.as_deref()),
            time_max: keep(self.time_max.as_deref()),
        }
    }

    fn is_empty(&self) -> bool {
        self.q.is_none() && self.time_min.is_none() && self.time_max.is_none()
    }
}

/// Target of an update or delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupCriteria {
    pub event_id: Option<String>,
    pub query: EventQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEventRequest {
    pub summary: String,
    pub start: String,
    pub end: String,
    pub attendees: Vec<String>,
}

/// Fields to merge into an existing event. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventChanges {
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub attendees: Option<Vec<String>>,
}

pub struct CalendarAdapter {
    provider: Arc<dyn CalendarProvider>,
    tz: Tz,
}

impl CalendarAdapter {
    pub fn new(provider: Arc<dyn CalendarProvider>, tz: Tz) -> Self {
        Self { provider, tz }
    }

    /// Events matching the query, projected for the model
    ///
    /// Without any time bound the window starts now, so an empty query
    /// lists upcoming events.
    pub async fn search(&self, query: &EventQuery) -> Result<Vec<EventSummary>, CalendarError> {
        let query = query.normalized();
        let (mut time_min, time_max) = self.window(&query)?;
        if time_min.is_none() && time_max.is_none() {
            time_min = Some(to_wire(&Utc::now().fixed_offset()));
        }

        let events = self
            .provider
            .list(&ListQuery {
                q: query.q,
                time_min,
                time_max,
                max_results: MAX_RESULTS,
                single_events: true,
                order_by_start: true,
            })
            .await?;

        tracing::debug!(count = events.len(), "Calendar search complete");
        Ok(events.into_iter().map(EventSummary::from).collect())
    }

    /// Resolve criteria to exactly one event id
    ///
    /// A supplied id is trusted as-is and no listing is issued.
    pub async fn resolve(&self, criteria: &LookupCriteria) -> Result<Outcome<String>, CalendarError> {
        if let Some(id) = criteria
            .event_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Ok(Outcome::Done(id.to_string()));
        }

        let query = criteria.query.normalized();
        if query.is_empty() {
            return Err(CalendarError::InsufficientCriteria);
        }
        let (time_min, time_max) = self.window(&query)?;

        let mut events = self
            .provider
            .list(&ListQuery {
                q: query.q.clone(),
                time_min,
                time_max,
                max_results: MAX_RESULTS,
                single_events: true,
                order_by_start: true,
            })
            .await?;

        match events.len() {
            0 => Err(CalendarError::NotFound(describe(&query))),
            1 => Ok(Outcome::Done(events.swap_remove(0).id)),
            n => {
                tracing::debug!(matches = n, "Lookup is ambiguous");
                Ok(Outcome::Ambiguous(Disambiguation::new(&events)))
            }
        }
    }

    /// Create an event with a generated video meeting, notifying all attendees
    pub async fn create(&self, request: &NewEventRequest) -> Result<EventConfirmation, CalendarError> {
        let summary = request.summary.trim();
        if summary.is_empty() {
            return Err(CalendarError::InvalidArguments("summary must not be empty".to_string()));
        }
        let start = self.instant("start", &request.start)?;
        let end = self.instant("end", &request.end)?;
        if end <= start {
            return Err(CalendarError::InvalidArguments(format!(
                "end ({}) must be after start ({})",
                to_wire(&end),
                to_wire(&start)
            )));
        }

        let body = NewEvent {
            summary: summary.to_string(),
            start: self.event_time(&start),
            end: self.event_time(&end),
            attendees: people(&request.attendees),
            conference_data: ConferenceData::meet(uuid::Uuid::new_v4().to_string()),
        };
        let created = self.provider.insert(&body, SendUpdates::All).await?;
        tracing::info!(event_id = %created.id, "Created calendar event");
        Ok(EventConfirmation::from(created))
    }

    /// Merge only the supplied fields into the resolved event
    pub async fn update(
        &self,
        criteria: &LookupCriteria,
        changes: &EventChanges,
    ) -> Result<Outcome<EventConfirmation>, CalendarError> {
        let patch = self.patch_for(changes)?;
        if patch.is_empty() {
            return Err(CalendarError::InvalidArguments(
                "nothing to update; supply at least one of summary, start, end, attendees"
                    .to_string(),
            ));
        }

        let event_id = match self.resolve(criteria).await? {
            Outcome::Done(id) => id,
            Outcome::Ambiguous(candidates) => return Ok(Outcome::Ambiguous(candidates)),
        };

        let updated: CalendarEvent = self
            .provider
            .patch(&event_id, &patch, SendUpdates::All)
            .await
            .map_err(|e| missing_event(&event_id, e))?;
        tracing::info!(event_id = %updated.id, "Updated calendar event");
        Ok(Outcome::Done(EventConfirmation::from(updated)))
    }

    pub async fn delete(
        &self,
        criteria: &LookupCriteria,
        send_updates: SendUpdates,
    ) -> Result<Outcome<DeleteConfirmation>, CalendarError> {
        let event_id = match self.resolve(criteria).await? {
            Outcome::Done(id) => id,
            Outcome::Ambiguous(candidates) => return Ok(Outcome::Ambiguous(candidates)),
        };

        self.provider
            .delete(&event_id, send_updates)
            .await
            .map_err(|e| missing_event(&event_id, e))?;
        tracing::info!(event_id = %event_id, send_updates = send_updates.as_str(), "Deleted calendar event");
        Ok(Outcome::Done(DeleteConfirmation {
            deleted: true,
            id: event_id,
        }))
    }

    fn patch_for(&self, changes: &EventChanges) -> Result<EventPatch, CalendarError> {
        let start = changes
            .start
            .as_deref()
            .map(|raw| self.instant("start", raw))
            .transpose()?;
        let end = changes
            .end
            .as_deref()
            .map(|raw| self.instant("end", raw))
            .transpose()?;
        if let (Some(start), Some(end)) = (&start, &end) {
            if end <= start {
                return Err(CalendarError::InvalidArguments(format!(
                    "end ({}) must be after start ({})",
                    to_wire(end),
                    to_wire(start)
                )));
            }
        }

        // A blank title is no change, never an erased one
        let summary = changes
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(EventPatch {
            summary,
            start: start.as_ref().map(|s| self.event_time(s)),
            end: end.as_ref().map(|e| self.event_time(e)),
            attendees: changes.attendees.as_deref().map(people),
        })
    }

    /// Parse and order-check the window bounds
    fn window(&self, query: &EventQuery) -> Result<(Option<String>, Option<String>), CalendarError> {
        let min = query
            .time_min
            .as_deref()
            .map(|raw| self.instant("timeMin", raw))
            .transpose()?;
        let max = query
            .time_max
            .as_deref()
            .map(|raw| self.instant("timeMax", raw))
            .transpose()?;

        if let (Some(min), Some(max)) = (&min, &max) {
            if min > max {
                return Err(CalendarError::InvalidArguments(format!(
                    "timeMin ({}) is after timeMax ({})",
                    to_wire(min),
                    to_wire(max)
                )));
            }
        }
        Ok((min.as_ref().map(to_wire), max.as_ref().map(to_wire)))
    }

    fn instant(&self, field: &str, raw: &str) -> Result<DateTime<FixedOffset>, CalendarError> {
        parse_instant(raw, self.tz).map_err(|e| CalendarError::InvalidArguments(format!("{field}: {e}")))
    }

    fn event_time(&self, instant: &DateTime<FixedOffset>) -> EventDateTime {
        EventDateTime::at(to_wire(instant), self.tz.name())
    }
}

/// A stale or invented id is lookup guidance, not a backend failure
fn missing_event(event_id: &str, err: ProviderError) -> CalendarError {
    match err.kind {
        ProviderErrorKind::NotFound => CalendarError::NotFound(format!(" with id '{event_id}'")),
        _ => CalendarError::Provider(err),
    }
}

fn people(emails: &[String]) -> Vec<Person> {
    emails.iter().map(|e| Person::email(e.trim())).collect()
}

fn describe(query: &EventQuery) -> String {
    let mut parts = Vec::new();
    if let Some(q) = &query.q {
        parts.push(format!("matching '{q}'"));
    }
    if let Some(min) = &query.time_min {
        parts.push(format!("from {min}"));
    }
    if let Some(max) = &query.time_max {
        parts.push(format!("until {max}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" {}", parts.join(" "))
    }
}
