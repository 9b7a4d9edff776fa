//! Command-line entry point for hoptrace.

mod runner;

use clap::Parser;
use std::process::ExitCode;

/// hoptrace - network path discovery tool.
#[derive(Parser, Debug)]
#[command(name = "hoptrace")]
#[command(version)]
#[command(about = "Traces the route to a destination host")]
struct Args {
    /// Target hostname or IP address.
    #[arg(required = true)]
    target: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr so the report stream on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    runner::run(&args.target).await
}
