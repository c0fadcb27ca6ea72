//! Environment-driven configuration

use crate::runtime::RunnerSettings;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-oss-120b";
pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_TAVILY_API_BASE: &str = "https://api.tavily.com";
const DEFAULT_TOKENS_PATH: &str = "tokens.json";
const MEMORY_DB: &str = ":memory:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Cannot read Google token from {path}: {reason}")]
    TokenFile { path: String, reason: String },
}

/// OpenAI-compatible chat endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Where the pre-issued Google access token comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Inline(String),
    /// JSON file with an `access_token` field
    File(PathBuf),
}

#[derive(Deserialize)]
struct StoredTokens {
    access_token: Option<String>,
}

impl TokenSource {
    pub fn resolve(&self) -> Result<String, ConfigError> {
        match self {
            TokenSource::Inline(token) => Ok(token.clone()),
            TokenSource::File(path) => read_token_file(path),
        }
    }
}

fn read_token_file(path: &Path) -> Result<String, ConfigError> {
    let failed = |reason: String| ConfigError::TokenFile {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;
    let tokens: StoredTokens = serde_json::from_str(&raw).map_err(|e| failed(e.to_string()))?;
    tokens
        .access_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| failed("no access_token field".to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSettings {
    pub token: TokenSource,
    pub calendar_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TavilySettings {
    pub api_key: Option<String>,
    pub api_base: String,
}

/// Backing for the conversation store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub google: GoogleSettings,
    pub tavily: TavilySettings,
    pub store: StoreLocation,
    pub thread_id: String,
    pub user_name: String,
    pub user_description: Option<String>,
    pub timezone: Tz,
    pub runner: RunnerSettings,
}

impl AppConfig {
    /// Load from process environment and the host's timezone setting
    pub fn from_env() -> Result<Self, ConfigError> {
        let system_zone = match iana_time_zone::get_timezone() {
            Ok(zone) => Some(zone),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot determine the system timezone");
                None
            }
        };
        Self::from_lookup(|name| std::env::var(name).ok(), system_zone.as_deref())
    }

    /// Load from an arbitrary variable source. Blank values count as unset.
    ///
    /// `system_zone` is the host's IANA zone, used when neither
    /// `ASSISTANT_TIMEZONE` nor `TZ` is set.
    pub fn from_lookup<F>(lookup: F, system_zone: Option<&str>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let api_key = var("LLM_API_KEY")
            .or_else(|| var("GROQ_API_KEY"))
            .ok_or(ConfigError::Missing("LLM_API_KEY or GROQ_API_KEY"))?;

        let token = match var("GOOGLE_ACCESS_TOKEN") {
            Some(token) => TokenSource::Inline(token),
            None => TokenSource::File(PathBuf::from(or("GOOGLE_TOKENS_PATH", DEFAULT_TOKENS_PATH))),
        };

        let store = match var("ASSISTANT_DB_PATH") {
            Some(path) if path == MEMORY_DB => StoreLocation::Memory,
            Some(path) => StoreLocation::File(PathBuf::from(path)),
            None => {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                StoreLocation::File(PathBuf::from(format!("{home}/.jarvis/history.db")))
            }
        };

        let timezone = match var("ASSISTANT_TIMEZONE").or_else(|| var("TZ")) {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| ConfigError::UnknownTimezone(name.clone()))?,
            None => system_timezone(system_zone),
        };

        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match var(name) {
                Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    value,
                }),
                None => Ok(default),
            }
        };
        let max_iterations = number("ASSISTANT_MAX_TOOL_ITERATIONS", 10)?;
        let max_iterations = if max_iterations == 0 {
            None
        } else {
            Some(u32::try_from(max_iterations).map_err(|_| ConfigError::InvalidNumber {
                var: "ASSISTANT_MAX_TOOL_ITERATIONS",
                value: max_iterations.to_string(),
            })?)
        };

        Ok(Self {
            llm: LlmSettings {
                api_key,
                base_url: or("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
                model: or("LLM_MODEL", DEFAULT_LLM_MODEL),
            },
            google: GoogleSettings {
                token,
                calendar_id: or("GOOGLE_CALENDAR_ID", "primary"),
                api_base: or("GOOGLE_CALENDAR_API_BASE", DEFAULT_CALENDAR_API_BASE),
            },
            tavily: TavilySettings {
                api_key: var("TAVILY_API_KEY"),
                api_base: or("TAVILY_API_BASE", DEFAULT_TAVILY_API_BASE),
            },
            store,
            thread_id: or("ASSISTANT_THREAD_ID", "1"),
            user_name: or("ASSISTANT_USER_NAME", "Shiva"),
            user_description: var("ASSISTANT_USER_DESCRIPTION"),
            timezone,
            runner: RunnerSettings {
                max_iterations,
                model_timeout: Duration::from_secs(number("ASSISTANT_MODEL_TIMEOUT_SECS", 120)?),
                tool_timeout: Duration::from_secs(number("ASSISTANT_TOOL_TIMEOUT_SECS", 30)?),
            },
        })
    }
}

/// Host zone, or UTC when it is unknown or not an IANA name
fn system_timezone(zone: Option<&str>) -> Tz {
    match zone.map(str::trim).filter(|z| !z.is_empty()) {
        Some(name) => name.parse().unwrap_or_else(|_| {
            tracing::warn!(zone = name, "Unrecognized system timezone, using UTC");
            Tz::UTC
        }),
        None => Tz::UTC,
    }
}
