//! Resumable document-derivation pipeline driven by an external assistant.
//!
//! The crate turns free-form assistant replies into typed documents and walks a
//! fixed sequence of phases that can be interrupted and resumed. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (extraction, retry policy,
//!   questionnaire engine, phase state). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, process execution,
//!   prompt rendering). Isolated behind traits so tests can script them.
//!
//! Orchestration modules ([`pipeline`], [`interview`], [`status`], [`validate`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod interview;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod status;
pub mod validate;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
