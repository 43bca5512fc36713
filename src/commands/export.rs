use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::cli::{ExportArgs, ExportKind};
use crate::config::{SourceConfig, enabled_sources};
use crate::gis::extract_area_sqft;
use crate::model::{FeatureCollection, RunStats};
use crate::storage::{Storage, has_artifacts};

pub fn run(args: &ExportArgs) -> Result<()> {
    let payload = match args.kind {
        ExportKind::Sources => serde_json::to_string_pretty(&export_sources(&args.data_root))?,
        ExportKind::Stats => serde_json::to_string_pretty(&export_stats(&args.data_root)?)?,
        ExportKind::Parcels => serde_json::to_string_pretty(&export_parcels(&args.data_root)?)?,
    };

    match &args.out {
        Some(path) => {
            std::fs::write(path, payload + "\n")
                .with_context(|| format!("failed to write export to {}", path.display()))?;
            info!(path = %path.display(), "wrote export");
        }
        None => println!("{payload}"),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SourceInfo {
    id: &'static str,
    name: &'static str,
    state: &'static str,
    calendar_url: String,
    has_gis: bool,
    has_artifacts: bool,
    meeting_count: usize,
    petition_count: usize,
    last_scrape_time: Option<chrono::DateTime<chrono::Utc>>,
}

fn export_sources(data_root: &Path) -> Vec<SourceInfo> {
    enabled_sources()
        .into_iter()
        .map(|source| {
            let data_dir = source.data_dir(data_root);
            let stats = load_stats_quiet(source, data_root);
            SourceInfo {
                id: source.id,
                name: source.name,
                state: source.state,
                calendar_url: source.calendar_url(),
                has_gis: source.gis_url.is_some(),
                has_artifacts: has_artifacts(&data_dir),
                meeting_count: stats.as_ref().map_or(0, |s| s.total_meetings),
                petition_count: stats.as_ref().map_or(0, |s| s.total_petitions),
                last_scrape_time: stats.and_then(|s| s.last_scrape_time),
            }
        })
        .collect()
}

fn load_stats_quiet(source: &SourceConfig, data_root: &Path) -> Option<RunStats> {
    let storage = Storage::new(source.data_dir(data_root)).ok()?;
    match storage.load_stats() {
        Ok(stats) => stats,
        Err(err) => {
            warn!(source = source.id, error = %err, "stats artifact unreadable");
            None
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct AggregateStats {
    sources: usize,
    sources_with_data: usize,
    total_meetings: usize,
    total_petitions: usize,
    petitions_with_pins: usize,
    total_pins: usize,
}

/// Sum per-source stats artifacts; a source that never ran contributes
/// nothing rather than failing the export.
fn export_stats(data_root: &Path) -> Result<AggregateStats> {
    let mut aggregate = AggregateStats::default();

    for source in enabled_sources() {
        aggregate.sources += 1;
        let storage = Storage::new(source.data_dir(data_root))?;
        let stats: RunStats = match storage.load_stats() {
            Ok(Some(stats)) => stats,
            Ok(None) => continue,
            Err(err) => {
                warn!(source = source.id, error = %err, "skipping unreadable stats artifact");
                continue;
            }
        };

        aggregate.sources_with_data += 1;
        aggregate.total_meetings += stats.total_meetings;
        aggregate.total_petitions += stats.total_petitions;
        aggregate.petitions_with_pins += stats.petitions_with_pins;
        aggregate.total_pins += stats.total_pins;
    }

    Ok(aggregate)
}

/// Merge every source's parcel features into one collection, tagging each
/// feature with its source id and a computed area.
fn export_parcels(data_root: &Path) -> Result<FeatureCollection> {
    let mut merged = FeatureCollection::empty();

    for source in enabled_sources() {
        let storage = Storage::new(source.data_dir(data_root))?;
        let parcels = match storage.load_parcels() {
            Ok(parcels) => parcels,
            Err(err) => {
                warn!(source = source.id, error = %err, "skipping unreadable parcels artifact");
                continue;
            }
        };

        for mut feature in parcels.features {
            let area = extract_area_sqft(&feature);
            if let Some(properties) = feature
                .get_mut("properties")
                .and_then(serde_json::Value::as_object_mut)
            {
                properties.insert("source".into(), json!(source.id));
                properties.insert("area_sqft".into(), json!(area));
            }
            merged.features.push(feature);
        }
    }

    info!(features = merged.len(), "merged parcel export");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::get_source;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn parcel_export_tags_source_and_area() {
        let root = tempdir().unwrap();
        let source = get_source("charlotte_nc").unwrap();
        let storage = Storage::new(source.data_dir(root.path())).unwrap();

        let mut parcels = FeatureCollection::empty();
        parcels.features.push(json!({
            "type": "Feature",
            "properties": { "pin": "22310197", "AREA_SQ_FT": 8712.0 },
            "geometry": null
        }));
        storage.save_parcels(&parcels).unwrap();

        let merged = export_parcels(root.path()).unwrap();
        assert_eq!(merged.len(), 1);
        let properties = merged.features[0]["properties"].as_object().unwrap();
        assert_eq!(properties["source"], json!("charlotte_nc"));
        assert_eq!(properties["area_sqft"], json!(8712.0));
    }

    #[test]
    fn stats_export_sums_across_sources_and_tolerates_absence() {
        let root = tempdir().unwrap();
        let aggregate = export_stats(root.path()).unwrap();
        assert_eq!(aggregate.sources, enabled_sources().len());
        assert_eq!(aggregate.sources_with_data, 0);
        assert_eq!(aggregate.total_petitions, 0);
    }

    #[test]
    fn source_export_reflects_artifact_presence() {
        let root = tempdir().unwrap();
        let infos = export_sources(root.path());
        assert!(!infos.is_empty());
        assert!(infos.iter().all(|info| !info.has_artifacts));
        assert!(infos.iter().any(|info| info.id == "charlotte_nc"));
    }
}
