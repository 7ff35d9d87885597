//! Pure, deterministic logic. No I/O.

pub mod documents;
pub mod extract;
pub mod phase;
pub mod questionnaire;
pub mod retry;
pub mod traceability;
pub mod types;
