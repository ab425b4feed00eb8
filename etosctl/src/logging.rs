//! Log subscriber for the command line
//!
//! Logs go to stderr so command output on stdout stays parseable.

use tracing::Dispatch;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Pick the filter directive: `--debug` beats `--verbose`, which beats the configured level
pub fn filter_directive(verbose: bool, debug: bool, configured: &str) -> String {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };
    format!("etosctl={level},etos_core={level},etos_client={level}")
}

/// Build the subscriber, letting `RUST_LOG` override the flags
pub fn build_dispatch(verbose: bool, debug: bool, configured: &str) -> Dispatch {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_directive(verbose, debug, configured).into());
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    Dispatch::new(subscriber)
}
