//! Calendar event shapes as exchanged with the provider and returned to the model

use serde::{Deserialize, Serialize};

/// Event as returned by the provider (Google Calendar v3 resource)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub organizer: Option<Person>,
    #[serde(default)]
    pub start: Option<EventDateTime>,
    #[serde(default)]
    pub end: Option<EventDateTime>,
    #[serde(default)]
    pub attendees: Vec<Person>,
    #[serde(default)]
    pub hangout_link: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
}

/// Organizer or attendee
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Person {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            display_name: None,
        }
    }
}

/// Start or end of an event. All-day events carry `date` instead of `dateTime`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn at(date_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: Some(time_zone.into()),
        }
    }

    /// The timed or all-day value, whichever is set
    pub fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

/// Reduced projection handed back to the model by `get-events`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub organizer: Option<Person>,
    pub start: Option<EventDateTime>,
    pub end: Option<EventDateTime>,
    pub attendees: Vec<Person>,
    pub meeting_link: Option<String>,
    pub event_type: Option<String>,
}

impl From<CalendarEvent> for EventSummary {
    fn from(event: CalendarEvent) -> Self {
        Self {
            id: event.id,
            summary: event.summary,
            status: event.status,
            organizer: event.organizer,
            start: event.start,
            end: event.end,
            attendees: event.attendees,
            meeting_link: event.hangout_link,
            event_type: event.event_type,
        }
    }
}

/// Lightweight candidate listed when a lookup is ambiguous
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub summary: Option<String>,
    pub start: Option<String>,
    pub organizer: Option<String>,
}

impl From<&CalendarEvent> for Candidate {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            id: event.id.clone(),
            summary: event.summary.clone(),
            start: event.start.as_ref().and_then(EventDateTime::value).map(str::to_string),
            organizer: event
                .organizer
                .as_ref()
                .and_then(|o| o.email.clone().or_else(|| o.display_name.clone())),
        }
    }
}

/// Terminal result of a lookup that matched more than one event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Disambiguation {
    pub multiple_matches: bool,
    pub message: String,
    pub candidates: Vec<Candidate>,
}

impl Disambiguation {
    pub fn new(events: &[CalendarEvent]) -> Self {
        Self {
            multiple_matches: true,
            message: format!(
                "{} events match. Ask which one is meant and call again with its eventId.",
                events.len()
            ),
            candidates: events.iter().map(Candidate::from).collect(),
        }
    }
}

/// Normalized result of a successful create or update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConfirmation {
    pub id: String,
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub meeting_link: Option<String>,
}

impl From<CalendarEvent> for EventConfirmation {
    fn from(event: CalendarEvent) -> Self {
        Self {
            start: event.start.as_ref().and_then(EventDateTime::value).map(str::to_string),
            end: event.end.as_ref().and_then(EventDateTime::value).map(str::to_string),
            id: event.id,
            summary: event.summary,
            meeting_link: event.hangout_link,
        }
    }
}

/// Result of a successful delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteConfirmation {
    pub deleted: bool,
    pub id: String,
}

/// Request body for creating an event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub attendees: Vec<Person>,
    pub conference_data: ConferenceData,
}

/// Asks the provider to generate a video meeting for the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    pub create_request: ConferenceCreateRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceCreateRequest {
    pub request_id: String,
    pub conference_solution_key: ConferenceSolutionKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConferenceSolutionKey {
    pub r#type: String,
}

impl ConferenceData {
    /// Request a Google Meet link; `request_id` must be unique per creation
    pub fn meet(request_id: impl Into<String>) -> Self {
        Self {
            create_request: ConferenceCreateRequest {
                request_id: request_id.into(),
                conference_solution_key: ConferenceSolutionKey {
                    r#type: "hangoutsMeet".to_string(),
                },
            },
        }
    }
}

/// Partial update body. Absent fields are omitted so the provider leaves them untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Person>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.attendees.is_none()
    }
}

/// Who the provider notifies about a change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendUpdates {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "externalOnly")]
    ExternalOnly,
    #[serde(rename = "none")]
    None,
}

impl SendUpdates {
    pub const VALUES: &'static [&'static str] = &["all", "externalOnly", "none"];

    pub fn as_str(self) -> &'static str {
        match self {
            SendUpdates::All => "all",
            SendUpdates::ExternalOnly => "externalOnly",
            SendUpdates::None => "none",
        }
    }
}
