//! Jarvis - personal assistant chat agent
//!
//! A terminal session that answers each user line by letting a chat model
//! call calendar and web-search tools until it can reply.

mod calendar;
mod config;
mod db;
mod llm;
mod provider;
mod runtime;
mod search;
mod session;
mod state_machine;
mod system_prompt;
mod tools;

use calendar::{CalendarAdapter, GoogleCalendarClient};
use config::{AppConfig, StoreLocation};
use db::{Database, MemoryStore, MessageStore};
use llm::{LoggingService, OpenAIService};
use runtime::TurnRunner;
use search::TavilyClient;
use session::SessionDriver;
use std::sync::Arc;
use system_prompt::Persona;
use tokio_util::sync::CancellationToken;
use tools::ToolRegistry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries only the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jarvis_assistant=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;
    let http_timeout = config.runner.tool_timeout;

    let llm = OpenAIService::new(
        &config.llm.api_key,
        &config.llm.model,
        &config.llm.base_url,
        config.runner.model_timeout,
    )?;
    let llm = LoggingService::new(Arc::new(llm));
    tracing::info!(model = %config.llm.model, base_url = %config.llm.base_url, "Chat model configured");

    let access_token = config.google.token.resolve()?;
    let calendar = GoogleCalendarClient::new(
        &config.google.api_base,
        &config.google.calendar_id,
        access_token,
        http_timeout,
    )?;
    let calendar = Arc::new(CalendarAdapter::new(Arc::new(calendar), config.timezone));

    if config.tavily.api_key.is_none() {
        tracing::warn!("TAVILY_API_KEY is not set; web search calls will fail");
    }
    let search = TavilyClient::new(
        config.tavily.api_key.clone().unwrap_or_default(),
        &config.tavily.api_base,
        http_timeout,
    )?;
    let tools = ToolRegistry::standard(calendar, Arc::new(search))?;

    let store: Arc<dyn MessageStore> = match &config.store {
        StoreLocation::Memory => Arc::new(MemoryStore::new()),
        StoreLocation::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "Opening database");
            Arc::new(Database::open(path)?)
        }
    };

    let runner = TurnRunner::new(store, llm, tools, config.runner.clone());
    let persona = Persona {
        user_name: config.user_name.clone(),
        user_description: config.user_description.clone(),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received");
                shutdown.cancel();
            }
        }
    });

    let driver = SessionDriver::new(
        runner,
        config.thread_id.clone(),
        persona,
        config.timezone,
        shutdown.clone(),
    );
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    driver.run(stdin, &mut stdout).await?;

    if shutdown.is_cancelled() {
        // A blocked stdin read would otherwise hold the runtime open
        std::process::exit(130);
    }
    Ok(())
}
