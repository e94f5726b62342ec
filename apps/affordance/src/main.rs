//! # Affordance CLI
//!
//! The main binary for the Affordance hypermedia resource engine.
//!
//! ## Usage
//!
//! ```bash
//! # Create and read resources
//! affordance create /task --data '{"title": "Write docs"}'
//! affordance explore /task?status=pending
//!
//! # Invoke an action
//! affordance act /task/t1 start
//!
//! # Link resources and walk the graph
//! affordance link /project/p1 /task/t1 --rel tasks --back-rel project
//! affordance graph /project/p1 --depth 3
//! ```
//!
//! Transfer JSON goes to stdout. Logs go to stderr.

use affordance::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // AFFORDANCE_LOG_FORMAT=json enables machine-parseable logs.
    let log_format =
        std::env::var("AFFORDANCE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "affordance=debug"
    } else {
        "affordance=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!(kind = ?e.kind(), "{}", e);
        std::process::exit(1);
    }
}
