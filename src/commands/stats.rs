use anyhow::Result;
use tracing::warn;

use crate::cli::StatsArgs;
use crate::config::{SourceConfig, enabled_sources, get_source};
use crate::storage::{Storage, has_artifacts};

pub fn run(args: &StatsArgs) -> Result<()> {
    let targets: Vec<&'static SourceConfig> = match &args.source {
        Some(id) => vec![get_source(id)?],
        None => enabled_sources(),
    };

    for source in targets {
        let data_dir = source.data_dir(&args.data_root);
        println!("{} ({})", source.name, source.state);

        if !has_artifacts(&data_dir) {
            println!("  no artifacts yet, run `townhall scrape --source {}`", source.id);
            continue;
        }

        let storage = Storage::new(data_dir)?;
        match storage.load_stats() {
            Ok(Some(stats)) => {
                println!("  meetings:            {}", stats.total_meetings);
                println!("  zoning meetings:     {}", stats.zoning_meetings);
                println!("  petitions:           {}", stats.total_petitions);
                println!("  petitions with PINs: {}", stats.petitions_with_pins);
                println!("  total PINs:          {}", stats.total_pins);
                if let Some(when) = stats.last_scrape_time {
                    println!("  last scrape:         {}", when.format("%Y-%m-%d %H:%M UTC"));
                }
            }
            Ok(None) => println!("  stats artifact missing"),
            Err(err) => {
                warn!(source = source.id, error = %err, "stats artifact unreadable");
                println!("  stats artifact unreadable");
            }
        }

        match storage.load_parcels() {
            Ok(parcels) => println!("  parcel features:     {}", parcels.len()),
            Err(err) => {
                warn!(source = source.id, error = %err, "parcels artifact unreadable");
                println!("  parcel features:     unreadable");
            }
        }
    }

    Ok(())
}
