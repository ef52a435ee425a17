//! MG CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.

use clap::Parser;
use mg_cli::{handler, Cli};
use mg_core::logging::{init_tracing, LogFormat, LogLevel};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    if let Err(e) = init_tracing(level, format, cli.log.as_deref()) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
