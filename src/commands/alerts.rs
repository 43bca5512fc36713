use std::io::Read;

use anyhow::{Context, Result};
use tracing::info;

use crate::alerts::parse_agent_message;
use crate::cli::AlertsArgs;

pub fn run(args: &AlertsArgs) -> Result<()> {
    let message = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read agent reply from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read agent reply from stdin")?;
            buffer
        }
    };

    let batch = parse_agent_message(&message);
    info!(notifications = batch.notifications.len(), "parsed agent reply");

    let payload = serde_json::to_string_pretty(&batch)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, payload + "\n")
                .with_context(|| format!("failed to write batch to {}", path.display()))?;
            info!(path = %path.display(), "wrote notification batch");
        }
        None => println!("{payload}"),
    }
    Ok(())
}
