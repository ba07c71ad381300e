//! # Entigraph
//!
//! The command-line binary for the entigraph runtime.
//!
//! ## Usage
//!
//! ```bash
//! # Inspect the bundled domain
//! entigraph schema
//!
//! # Inspect a snapshot
//! entigraph entities -s company.json
//! entigraph triples -s company.json
//!
//! # Try an operation
//! entigraph invoke -s company.json -o Company.fire --on e1 e3
//!
//! # Compare two snapshots
//! entigraph equiv company.json expected.json
//! ```

use clap::Parser;
use entigraph::cli;
use entigraph::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // ENTIGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ENTIGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "entigraph=info,entigraph_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    let result = AppConfig::load(&cli.config).and_then(|config| cli::execute(cli, &config));
    if let Err(e) = result {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
