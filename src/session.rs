//! Session driver
//!
//! Reads one user line at a time, runs a turn for it and prints the answer.
//! All turns of a session share one thread id.

use crate::runtime::{LlmService, MessageStore, ToolExecutor, TurnError, TurnRunner};
use crate::system_prompt::{build_system_prompt, Persona};
use chrono::Utc;
use chrono_tz::Tz;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Line that ends the session
pub const EXIT_COMMAND: &str = "/bye";
const USER_PROMPT: &str = "You: ";
const ANSWER_PREFIX: &str = "AI: ";

pub struct SessionDriver<S, L, T>
where
    S: MessageStore,
    L: LlmService,
    T: ToolExecutor,
{
    runner: TurnRunner<S, L, T>,
    thread_id: String,
    persona: Persona,
    timezone: Tz,
    /// Cancelling ends the session and any turn in flight
    shutdown: CancellationToken,
}

impl<S, L, T> SessionDriver<S, L, T>
where
    S: MessageStore,
    L: LlmService,
    T: ToolExecutor,
{
    pub fn new(
        runner: TurnRunner<S, L, T>,
        thread_id: impl Into<String>,
        persona: Persona,
        timezone: Tz,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            runner,
            thread_id: thread_id.into(),
            persona,
            timezone,
            shutdown,
        }
    }

    /// Run until `/bye`, end of input or shutdown
    ///
    /// A failed turn is reported on `output` and the session continues.
    pub async fn run<R, W>(&self, mut input: R, output: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        tracing::info!(thread_id = %self.thread_id, "Session started");

        loop {
            output.write_all(USER_PROMPT.as_bytes()).await?;
            output.flush().await?;

            buf.clear();
            let read = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                read = input.read_until(b'\n', &mut buf) => read?,
            };
            if read == 0 {
                break;
            }

            // Undecodable bytes become U+FFFD rather than ending the session
            let line = String::from_utf8_lossy(&buf);
            let text = line.trim();
            if text == EXIT_COMMAND {
                break;
            }
            if text.is_empty() {
                continue;
            }

            let now = Utc::now().with_timezone(&self.timezone);
            let prompt = build_system_prompt(&self.persona, &now);
            let turn = self.shutdown.child_token();

            match self.runner.run_turn(&self.thread_id, &prompt, text, &turn).await {
                Ok(outcome) => {
                    let reply = format!("{ANSWER_PREFIX}{}\n", outcome.answer);
                    output.write_all(reply.as_bytes()).await?;
                }
                Err(TurnError::Cancelled) => {
                    output.write_all(b"\n").await?;
                    break;
                }
                Err(e) => {
                    tracing::error!(thread_id = %self.thread_id, error = %e, "Turn failed");
                    let reply = format!("{ANSWER_PREFIX}[error] {e}\n");
                    output.write_all(reply.as_bytes()).await?;
                }
            }
        }

        output.flush().await?;
        tracing::info!(thread_id = %self.thread_id, "Session ended");
        Ok(())
    }
}
