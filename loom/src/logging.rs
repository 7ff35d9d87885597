//! Diagnostic tracing for loom.
//!
//! Events go to stderr so stdout stays reserved for product output
//! (interview JSON, status listings).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Falls back to `loom=debug` when `verbose` is set and
/// `warn` otherwise. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=loom::core::retry=debug loom cascade --input-file spec.md --output-dir out
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "loom=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
