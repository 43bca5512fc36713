use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Scrapes municipal Legistar portals for rezoning petitions, resolves
/// parcel geometry, and publishes JSON artifacts.
#[derive(Debug, Parser)]
#[command(name = "townhall", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scrape pipeline for one source or all enabled sources
    Scrape(ScrapeArgs),
    /// List the configured municipal sources
    Sources(SourcesArgs),
    /// Summarize the artifacts of previous runs
    Stats(StatsArgs),
    /// Export artifacts for downstream consumers
    Export(ExportArgs),
    /// Parse an alert agent's reply into a notification batch
    Alerts(AlertsArgs),
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Source id to scrape; all enabled sources when omitted
    #[arg(long)]
    pub source: Option<String>,

    /// Root directory for per-source data artifacts
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Keep only meetings on this exact date (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["start_date", "end_date"])]
    pub date: Option<String>,

    /// Keep only meetings on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Keep only meetings on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Process every meeting type, not just zoning-related ones
    #[arg(long)]
    pub all_meetings: bool,

    /// Skip attachment downloads and parcel identifier extraction
    #[arg(long)]
    pub skip_attachments: bool,

    /// Skip parcel geometry resolution
    #[arg(long)]
    pub skip_geometry: bool,

    /// Override the delay between page fetches, in milliseconds
    #[arg(long)]
    pub page_delay_ms: Option<u64>,

    /// Override the delay between attachment downloads, in milliseconds
    #[arg(long)]
    pub download_delay_ms: Option<u64>,

    /// Override the delay between GIS lookups, in milliseconds
    #[arg(long)]
    pub gis_delay_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Include disabled sources in the listing
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Source id to summarize; all enabled sources when omitted
    #[arg(long)]
    pub source: Option<String>,

    /// Root directory for per-source data artifacts
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportKind {
    /// Source registry with per-source artifact status
    Sources,
    /// Aggregate counts across all sources
    Stats,
    /// Merged parcel features with computed areas
    Parcels,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// What to export
    #[arg(long, value_enum)]
    pub kind: ExportKind,

    /// Root directory for per-source data artifacts
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Write to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AlertsArgs {
    /// File holding the agent's reply; stdin when omitted
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Write the parsed batch to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}
