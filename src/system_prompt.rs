//! System prompt construction
//!
//! The prompt is rebuilt for every turn so the model always sees the current
//! local time. It is sent as the leading message and never stored.

use chrono::DateTime;
use chrono_tz::Tz;
use std::fmt::Write;

/// Who the assistant works for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub user_name: String,
    /// Free-form description appended to the name, e.g. a role
    pub user_description: Option<String>,
}

impl Persona {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            user_description: None,
        }
    }
}

/// Local datetime in the `YYYY-MM-DDTHH:MM:SS` form the model is told about
pub fn format_local(now: &DateTime<Tz>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Build the persona prompt for `now`, expressed in the user's timezone
pub fn build_system_prompt(persona: &Persona, now: &DateTime<Tz>) -> String {
    let name = &persona.user_name;
    let who = match &persona.user_description {
        Some(description) => format!("{name} ({description})"),
        None => name.clone(),
    };

    let mut prompt = format!(
        "You are Jarvis, a smart and proactive personal assistant working for {who}. \
         Introduce yourself only when asked.\n\n"
    );

    prompt.push_str("Your core responsibilities:\n");
    let _ = writeln!(
        prompt,
        "- Schedule management: create, view, modify and remind about calendar events."
    );
    let _ = writeln!(
        prompt,
        "- Task tracking: capture, prioritize and update {name}'s to-do items."
    );
    let _ = writeln!(
        prompt,
        "- Context-aware assistance: understand {name}'s work and anticipate what is needed next."
    );

    prompt.push_str("\nBehaviour guidelines:\n");
    let _ = writeln!(
        prompt,
        "1. When {name} or anyone else asks who you are, introduce yourself in a friendly, professional tone."
    );
    prompt.push_str("2. Be concise and actionable. Give clear next steps or confirmations.\n");
    prompt.push_str(
        "3. Use the available tools (get-events, create-event, update-event, delete-event, search) \
         to handle calendar operations and look things up on the web when needed.\n",
    );
    prompt.push_str(
        "4. When a lookup reports multiple matches, ask which event is meant before changing anything.\n",
    );
    prompt.push_str("5. Keep personal data private unless it is explicitly requested.\n");

    let _ = write!(
        prompt,
        "\nCurrent datetime: {}\nCurrent timezone string: {}",
        format_local(now),
        now.timezone().name()
    );

    prompt
}
