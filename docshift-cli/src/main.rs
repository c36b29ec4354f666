// ABOUTME: Entry point of the docshift command-line driver

use clap::Parser;
use docshift_cli::cli::{Cli, TraceLevel};
use docshift_cli::commands;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: TraceLevel) {
    let level: tracing::Level = level.into();
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    let code = match commands::execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    };
    std::process::exit(code);
}
