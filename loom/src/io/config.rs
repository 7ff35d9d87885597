//! Loom configuration stored under `<output>/.loom/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::retry::RetryConfig;

/// Loom configuration (TOML). Missing fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoomConfig {
    pub retry: RetrySettings,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per assistant request, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssistantSettings {
    /// Executable invoked as `<program> -p <prompt> --output-format text`.
    pub program: String,
    /// Extra arguments placed before the prompt flags.
    pub extra_args: Vec<String>,
    pub timeout_secs: u64,
    /// Truncate assistant stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Exported as `CLAUDE_CODE_MAX_OUTPUT_TOKENS`.
    pub max_output_tokens: u32,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            extra_args: Vec::new(),
            timeout_secs: 30 * 60,
            output_limit_bytes: 4 * 1024 * 1024,
            max_output_tokens: 100_000,
        }
    }
}

impl LoomConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be > 0");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            bail!("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }
        if self.assistant.program.trim().is_empty() {
            bail!("assistant.program must be non-empty");
        }
        if self.assistant.timeout_secs == 0 {
            bail!("assistant.timeout_secs must be > 0");
        }
        if self.assistant.output_limit_bytes == 0 {
            bail!("assistant.output_limit_bytes must be > 0");
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoomConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoomConfig> {
    let cfg = if path.exists() {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    } else {
        LoomConfig::default()
    };
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
