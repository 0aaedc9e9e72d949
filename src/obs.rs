//! Observability and logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber. `RUST_LOG` wins over
/// `default_directive` when set.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());

    // A second init (tests, repeated CLI setup) is not an error
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Directive used by the CLIs: `info`, or `debug` with `-v`.
pub fn cli_directive(verbose: bool) -> &'static str {
    if verbose {
        "lead_scoring=debug,info"
    } else {
        "lead_scoring=info,warn"
    }
}
