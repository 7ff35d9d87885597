//! Phase bookkeeping for the resumable pipeline.
//!
//! [`PipelineState`] is a pure value: transitions take the timestamp as an
//! argument and persistence happens in [`crate::io::state_store`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const STATE_VERSION: &str = "1.0";

/// Pipeline phases in execution order. `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseName {
    Discover,
    Clarify,
    DeriveL1,
    DeriveL2,
    DeriveL3,
}

impl PhaseName {
    pub const ALL: [PhaseName; 5] = [
        PhaseName::Discover,
        PhaseName::Clarify,
        PhaseName::DeriveL1,
        PhaseName::DeriveL2,
        PhaseName::DeriveL3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseName::Discover => "discover",
            PhaseName::Clarify => "clarify",
            PhaseName::DeriveL1 => "derive-l1",
            PhaseName::DeriveL2 => "derive-l2",
            PhaseName::DeriveL3 => "derive-l3",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseName {
    type Err = anyhow::Error;

    /// Accepts the full name or the `l1`/`l2`/`l3` shorthand.
    fn from_str(s: &str) -> Result<Self> {
        let phase = match s.trim().to_ascii_lowercase().as_str() {
            "discover" | "analyze" => PhaseName::Discover,
            "clarify" | "interview" => PhaseName::Clarify,
            "derive-l1" | "l1" => PhaseName::DeriveL1,
            "derive-l2" | "l2" => PhaseName::DeriveL2,
            "derive-l3" | "l3" => PhaseName::DeriveL3,
            other => bail!(
                "unknown phase {other:?} (expected discover, clarify, derive-l1, derive-l2 or derive-l3)"
            ),
        };
        Ok(phase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
        }
    }
}

/// Status of one phase. The phase name is the key in [`PipelineState::phases`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub status: PhaseStatus,
    /// Last transition; `None` while the phase has never run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseState {
    fn pending() -> Self {
        Self {
            status: PhaseStatus::Pending,
            updated_at: None,
            error: None,
        }
    }
}

/// Configuration captured when the pipeline was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub skip_clarify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTimestamps {
    pub started: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
}

/// Persisted pipeline checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub version: String,
    /// Fingerprint of the combined input; fixed at creation.
    pub input_fingerprint: String,
    pub phases: BTreeMap<PhaseName, PhaseState>,
    pub config: PipelineConfig,
    pub timestamps: PipelineTimestamps,
}

impl PipelineState {
    pub fn new(input_fingerprint: String, config: PipelineConfig, now: DateTime<Utc>) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            input_fingerprint,
            phases: PhaseName::ALL
                .iter()
                .map(|phase| (*phase, PhaseState::pending()))
                .collect(),
            config,
            timestamps: PipelineTimestamps {
                started: now,
                completed: None,
            },
        }
    }

    /// Fill in phases missing from an older document and check the version.
    pub fn normalize(&mut self) -> Result<()> {
        if self.version != STATE_VERSION {
            bail!(
                "unsupported pipeline state version {} (expected {STATE_VERSION})",
                self.version
            );
        }
        for phase in PhaseName::ALL {
            self.phases.entry(phase).or_insert_with(PhaseState::pending);
        }
        Ok(())
    }

    pub fn status(&self, phase: PhaseName) -> PhaseStatus {
        self.phases
            .get(&phase)
            .map_or(PhaseStatus::Pending, |state| state.status)
    }

    /// First phase not completed. Running and failed phases are re-run.
    pub fn next_phase(&self) -> Option<PhaseName> {
        PhaseName::ALL
            .into_iter()
            .find(|phase| self.status(*phase) != PhaseStatus::Completed)
    }

    pub fn is_complete(&self) -> bool {
        self.next_phase().is_none()
    }

    /// Force `from` and every later phase back to pending.
    pub fn reset_from(&mut self, from: PhaseName, now: DateTime<Utc>) {
        for (phase, state) in self.phases.range_mut(from..) {
            tracing::debug!(%phase, "reset to pending");
            state.status = PhaseStatus::Pending;
            state.error = None;
            state.updated_at = Some(now);
        }
        self.timestamps.completed = None;
    }

    pub fn mark_running(&mut self, phase: PhaseName, now: DateTime<Utc>) {
        self.transition(phase, PhaseStatus::Running, None, now);
    }

    pub fn mark_completed(&mut self, phase: PhaseName, now: DateTime<Utc>) {
        self.transition(phase, PhaseStatus::Completed, None, now);
        if self.is_complete() {
            self.timestamps.completed = Some(now);
        }
    }

    pub fn mark_failed(&mut self, phase: PhaseName, error: String, now: DateTime<Utc>) {
        self.transition(phase, PhaseStatus::Failed, Some(error), now);
    }

    /// Return a phase to pending without an error (waiting on answers).
    pub fn mark_pending(&mut self, phase: PhaseName, now: DateTime<Utc>) {
        self.transition(phase, PhaseStatus::Pending, None, now);
    }

    fn transition(
        &mut self,
        phase: PhaseName,
        status: PhaseStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) {
        let state = self.phases.entry(phase).or_insert_with(PhaseState::pending);
        state.status = status;
        state.error = error;
        state.updated_at = Some(now);
    }
}

/// First 8 bytes of the SHA-256 digest, hex encoded.
pub fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..8])
}
