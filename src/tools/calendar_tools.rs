//! Calendar tools: get-events, create-event, update-event, delete-event
//!
//! Thin argument mapping over `CalendarAdapter`. Adapter failures and
//! disambiguation both come back as tool output for the model to act on.

use super::schema::{ArgSchema, FieldKind, FieldSpec};
use super::{parse_input, Tool, ToolOutput};
use crate::calendar::{
    CalendarAdapter, CalendarError, EventChanges, EventQuery, LookupCriteria, NewEventRequest,
    Outcome, SendUpdates,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const NO_EVENTS: &str = "No upcoming events found.";

const Q_DESCRIPTION: &str = "Free-text query matched against summary, description, location, \
     attendee names and emails, and organizer name and email";
const TIME_MIN_DESCRIPTION: &str =
    "Lower bound (inclusive) of event end time, ISO 8601. Without an offset the user's timezone is used.";
const TIME_MAX_DESCRIPTION: &str =
    "Upper bound (exclusive) of event start time, ISO 8601. Without an offset the user's timezone is used.";
const EVENT_ID_DESCRIPTION: &str =
    "Exact event id from get-events or a previous disambiguation. Skips the lookup when given.";

fn lookup_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::optional("eventId", FieldKind::Text, EVENT_ID_DESCRIPTION),
        FieldSpec::optional("q", FieldKind::Text, Q_DESCRIPTION),
        FieldSpec::optional("timeMin", FieldKind::DateTime, TIME_MIN_DESCRIPTION),
        FieldSpec::optional("timeMax", FieldKind::DateTime, TIME_MAX_DESCRIPTION),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupInput {
    event_id: Option<String>,
    q: Option<String>,
    time_min: Option<String>,
    time_max: Option<String>,
}

impl From<LookupInput> for LookupCriteria {
    fn from(input: LookupInput) -> Self {
        Self {
            event_id: input.event_id,
            query: EventQuery {
                q: input.q,
                time_min: input.time_min,
                time_max: input.time_max,
            },
        }
    }
}

fn render<T: Serialize>(result: Result<Outcome<T>, CalendarError>) -> ToolOutput {
    match result {
        Ok(Outcome::Done(value)) => ToolOutput::json(&value),
        Ok(Outcome::Ambiguous(candidates)) => ToolOutput::json(&candidates),
        Err(e) => ToolOutput::error(e.to_string()),
    }
}

// ============================================================================
// get-events
// ============================================================================

pub struct GetEventsTool {
    calendar: Arc<CalendarAdapter>,
}

impl GetEventsTool {
    pub fn new(calendar: Arc<CalendarAdapter>) -> Self {
        Self { calendar }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetEventsInput {
    q: Option<String>,
    time_min: Option<String>,
    time_max: Option<String>,
}

#[async_trait]
impl Tool for GetEventsTool {
    fn name(&self) -> &'static str {
        "get-events"
    }

    fn description(&self) -> String {
        "Get events from the user's calendar, ordered by start time (at most 10). \
         Filter with a free-text query and/or a time window; with no window, upcoming events are listed."
            .to_string()
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new(vec![
            FieldSpec::optional("q", FieldKind::Text, Q_DESCRIPTION),
            FieldSpec::optional("timeMin", FieldKind::DateTime, TIME_MIN_DESCRIPTION),
            FieldSpec::optional("timeMax", FieldKind::DateTime, TIME_MAX_DESCRIPTION),
        ])
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: GetEventsInput = match parse_input(input) {
            Ok(input) => input,
            Err(output) => return output,
        };
        let query = EventQuery {
            q: input.q,
            time_min: input.time_min,
            time_max: input.time_max,
        };

        match self.calendar.search(&query).await {
            Ok(events) if events.is_empty() => ToolOutput::success(NO_EVENTS),
            Ok(events) => ToolOutput::json(&events),
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }
}

// ============================================================================
// create-event
// ============================================================================

pub struct CreateEventTool {
    calendar: Arc<CalendarAdapter>,
}

impl CreateEventTool {
    pub fn new(calendar: Arc<CalendarAdapter>) -> Self {
        Self { calendar }
    }
}

#[derive(Debug, Deserialize)]
struct CreateEventInput {
    summary: String,
    start: String,
    end: String,
    attendees: Vec<String>,
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &'static str {
        "create-event"
    }

    fn description(&self) -> String {
        "Create a calendar event with a Google Meet link and invite the attendees. \
         Returns the new event's id, summary, start, end and meetingLink."
            .to_string()
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new(vec![
            FieldSpec::required("summary", FieldKind::Text, "Title of the event"),
            FieldSpec::required("start", FieldKind::DateTime, "Start datetime, ISO 8601"),
            FieldSpec::required("end", FieldKind::DateTime, "End datetime, ISO 8601"),
            FieldSpec::required(
                "attendees",
                FieldKind::EmailList,
                "Email addresses of the people to invite",
            ),
        ])
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: CreateEventInput = match parse_input(input) {
            Ok(input) => input,
            Err(output) => return output,
        };
        let request = NewEventRequest {
            summary: input.summary,
            start: input.start,
            end: input.end,
            attendees: input.attendees,
        };

        render(self.calendar.create(&request).await.map(Outcome::Done))
    }
}

// ============================================================================
// update-event
// ============================================================================

pub struct UpdateEventTool {
    calendar: Arc<CalendarAdapter>,
}

impl UpdateEventTool {
    pub fn new(calendar: Arc<CalendarAdapter>) -> Self {
        Self { calendar }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateEventInput {
    #[serde(flatten)]
    lookup: LookupInput,
    summary: Option<String>,
    start: Option<String>,
    end: Option<String>,
    attendees: Option<Vec<String>>,
}

#[async_trait]
impl Tool for UpdateEventTool {
    fn name(&self) -> &'static str {
        "update-event"
    }

    fn description(&self) -> String {
        "Change an existing calendar event. Identify it by eventId, or by q/timeMin/timeMax; \
         if several events match, candidates are returned instead and you must ask which one. \
         Only the fields you pass are changed. Passing attendees replaces the whole guest list."
            .to_string()
    }

    fn schema(&self) -> ArgSchema {
        let mut fields = lookup_fields();
        fields.extend([
            FieldSpec::optional("summary", FieldKind::Text, "New title"),
            FieldSpec::optional("start", FieldKind::DateTime, "New start datetime, ISO 8601"),
            FieldSpec::optional("end", FieldKind::DateTime, "New end datetime, ISO 8601"),
            FieldSpec::optional(
                "attendees",
                FieldKind::EmailList,
                "Complete new list of attendee email addresses",
            ),
        ]);
        ArgSchema::new(fields)
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: UpdateEventInput = match parse_input(input) {
            Ok(input) => input,
            Err(output) => return output,
        };
        let changes = EventChanges {
            summary: input.summary,
            start: input.start,
            end: input.end,
            attendees: input.attendees,
        };

        render(self.calendar.update(&input.lookup.into(), &changes).await)
    }
}

// ============================================================================
// delete-event
// ============================================================================

pub struct DeleteEventTool {
    calendar: Arc<CalendarAdapter>,
}

impl DeleteEventTool {
    pub fn new(calendar: Arc<CalendarAdapter>) -> Self {
        Self { calendar }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteEventInput {
    #[serde(flatten)]
    lookup: LookupInput,
    #[serde(default)]
    send_updates: Option<SendUpdates>,
}

#[async_trait]
impl Tool for DeleteEventTool {
    fn name(&self) -> &'static str {
        "delete-event"
    }

    fn description(&self) -> String {
        "Cancel a calendar event. Identify it by eventId, or by q/timeMin/timeMax; \
         if several events match, candidates are returned and nothing is deleted."
            .to_string()
    }

    fn schema(&self) -> ArgSchema {
        let mut fields = lookup_fields();
        fields.push(FieldSpec::optional(
            "sendUpdates",
            FieldKind::Enum(SendUpdates::VALUES),
            "Who to notify about the cancellation (default all)",
        ));
        ArgSchema::new(fields)
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: DeleteEventInput = match parse_input(input) {
            Ok(input) => input,
            Err(output) => return output,
        };
        let send_updates = input.send_updates.unwrap_or_default();

        render(self.calendar.delete(&input.lookup.into(), send_updates).await)
    }
}
