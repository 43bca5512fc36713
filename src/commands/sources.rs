use anyhow::Result;

use crate::cli::SourcesArgs;
use crate::config::sources;

pub fn run(args: &SourcesArgs) -> Result<()> {
    let mut shown = 0;
    println!("Configured sources:");
    for source in sources() {
        if !source.enabled && !args.all {
            continue;
        }
        shown += 1;

        let status = if source.enabled { "enabled" } else { "disabled" };
        let gis = if source.gis_url.is_some() {
            "gis"
        } else {
            "no gis"
        };
        println!(
            "  {:<14} {} ({})  [{status}, {gis}]",
            source.id, source.name, source.state
        );
        println!("    calendar: {}", source.calendar_url());
    }

    if shown == 0 {
        println!("  (none enabled; use --all to include disabled sources)");
    }
    Ok(())
}
