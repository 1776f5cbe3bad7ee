//! Diagnostic tracing for the triad binary.
//!
//! Tracing is for debugging the engine and goes to stderr. User-facing
//! progress goes through [`crate::ui::Reporter`] instead, and per-invocation
//! prompts and outputs are written under `.triad/logs/` regardless of the
//! filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default directive when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "info" } else { "warn" }
}

/// Initialize the global subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`, or `info` with `--verbose`.
///
/// ```bash
/// RUST_LOG=triad=debug triad run 3
/// ```
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "info");
    }
}
