mod alerts;
mod cli;
mod commands;
mod config;
mod gis;
mod http;
mod legistar;
mod model;
mod pdf;
mod pins;
mod storage;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape(args) => commands::scrape::run(&args),
        Commands::Sources(args) => commands::sources::run(&args),
        Commands::Stats(args) => commands::stats::run(&args),
        Commands::Export(args) => commands::export::run(&args),
        Commands::Alerts(args) => commands::alerts::run(&args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
