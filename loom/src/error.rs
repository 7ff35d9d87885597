//! Typed failures that callers branch on.
//!
//! Everything else travels as `anyhow::Error`; these variants are recovered at
//! the CLI boundary with `downcast_ref::<LoomError>()`.

use thiserror::Error;

use crate::core::phase::PhaseName;

#[derive(Error, Debug)]
pub enum LoomError {
    /// No strategy (including the corrective round-trip) produced a value of
    /// the requested shape. Always retryable, whatever `reason` quotes.
    #[error("no structured data recoverable from assistant reply: {reason}")]
    Extraction {
        reason: String,
        /// Leading slice of the last reply, kept out of the message.
        preview: String,
    },

    /// An answer referenced a question id the interview does not contain.
    #[error("unknown question id {id}")]
    QuestionNotFound { id: String },

    /// A persisted document does not match its expected shape.
    #[error("invalid state document {path}: {reason}")]
    StateLoad { path: String, reason: String },

    /// Resume attempted against input that differs from the original run.
    #[error("input fingerprint {actual} does not match checkpoint fingerprint {expected}")]
    FingerprintMismatch { expected: String, actual: String },

    /// Skip conditions form a cycle; the listed questions could never resolve.
    #[error("skip conditions form a cycle: {}", ids.join(" -> "))]
    SkipCycle { ids: Vec<String> },

    #[error("duplicate question id {id}")]
    DuplicateQuestion { id: String },

    /// A phase failed; the pipeline state on disk records the failure.
    #[error("phase {phase} failed: {message}")]
    PhaseFailed { phase: PhaseName, message: String },

    #[error("no checkpoint at {path}; run without --resume to start")]
    NothingToResume { path: String },
}
