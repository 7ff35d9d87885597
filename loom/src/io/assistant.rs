//! Assistant abstraction and structured requests.
//!
//! The [`Assistant`] trait decouples the pipeline from the actual backend
//! (currently the `claude` CLI). Tests use scripted assistants that return
//! queued replies without spawning processes.

use std::io::ErrorKind;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::core::extract::extract;
use crate::core::retry::{ErrorClass, RetryConfig, Sleeper, classify, retry_classified};
use crate::error::LoomError;
use crate::io::config::AssistantSettings;
use crate::io::process::run_captured;

const CORRECTIVE_PROMPT: &str =
    "Convert this to valid JSON. Output ONLY the JSON, no explanation:";

/// A blocking text-in, text-out assistant.
pub trait Assistant {
    /// Send `prompt`, optionally continuing `session_id`, and return the reply.
    fn invoke(&self, prompt: &str, session_id: Option<&str>) -> Result<String>;
}

/// Assistant backed by `claude -p <prompt> --output-format text`.
pub struct ClaudeAssistant {
    settings: AssistantSettings,
}

impl ClaudeAssistant {
    pub fn new(settings: AssistantSettings) -> Self {
        Self { settings }
    }
}

impl Assistant for ClaudeAssistant {
    #[instrument(skip_all, fields(program = %self.settings.program, prompt_bytes = prompt.len(), resume = session_id.is_some()))]
    fn invoke(&self, prompt: &str, session_id: Option<&str>) -> Result<String> {
        let program = &self.settings.program;
        let mut cmd = Command::new(program);
        cmd.args(&self.settings.extra_args)
            .arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("text");
        if let Some(id) = session_id {
            cmd.arg("--resume").arg(id);
        }
        cmd.env(
            "CLAUDE_CODE_MAX_OUTPUT_TOKENS",
            self.settings.max_output_tokens.to_string(),
        );

        info!("invoking assistant");
        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let output = match run_captured(cmd, timeout, self.settings.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                let missing = err
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == ErrorKind::NotFound);
                if missing {
                    bail!("assistant program {program} not found on PATH");
                }
                return Err(err).with_context(|| format!("run {program}"));
            }
        };

        if output.timed_out {
            warn!(timeout_secs = timeout.as_secs(), "assistant timed out");
            bail!("{program} timeout after {}s", timeout.as_secs());
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "assistant failed");
            return Err(anyhow!(
                "{program} failed with status {:?}: {}",
                output.status.code(),
                output.stderr_text()
            ));
        }
        debug!(reply_bytes = output.stdout.len(), "assistant replied");
        Ok(output.stdout_text())
    }
}

/// Ask for a value of type `T`, retrying the whole exchange under `retry`.
///
/// Each attempt invokes the assistant and extracts `T`; if extraction fails,
/// one corrective request asks the assistant to re-emit its reply as bare
/// JSON before the attempt counts as failed.
#[instrument(skip_all, fields(shape = std::any::type_name::<T>()))]
pub fn request_structured<T, A, S>(
    assistant: &A,
    sleeper: &S,
    retry: &RetryConfig,
    prompt: &str,
    session_id: Option<&str>,
) -> Result<T>
where
    T: DeserializeOwned,
    A: Assistant + ?Sized,
    S: Sleeper + ?Sized,
{
    retry_classified(retry, sleeper, classify_failure, || {
        invoke_and_extract(assistant, prompt, session_id)
    })
    .result
}

/// Extraction failures are always worth another attempt; their text quotes
/// the reply, which must not be read as an error vocabulary.
fn classify_failure(err: &anyhow::Error) -> ErrorClass {
    match err.downcast_ref::<LoomError>() {
        Some(LoomError::Extraction { .. }) => ErrorClass::Retryable,
        _ => classify(&format!("{err:#}")),
    }
}

fn invoke_and_extract<T, A>(assistant: &A, prompt: &str, session_id: Option<&str>) -> Result<T>
where
    T: DeserializeOwned,
    A: Assistant + ?Sized,
{
    let reply = assistant.invoke(prompt, session_id)?;
    match extract::<T>(&reply) {
        Ok(value) => return Ok(value),
        Err(err) => warn!(err = %err, "reply not parseable, requesting corrective reply"),
    }

    let corrective = format!("{CORRECTIVE_PROMPT}\n\n{reply}");
    let second = assistant.invoke(&corrective, session_id)?;
    extract::<T>(&second).map_err(|err| {
        if let LoomError::Extraction { preview, .. } = &err {
            debug!(%preview, "corrective reply not parseable");
        }
        err.into()
    })
}
