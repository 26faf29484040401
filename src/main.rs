mod cascade;
mod cli;
mod commands;
mod compose;
mod config;
mod debug;
mod error;
mod publisher;
mod record;
mod schedule;
mod session;
mod surface;
mod ui;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "herald=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    if let Err(err) = commands::dispatch(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
