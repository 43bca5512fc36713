use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::{
    FeatureCollection, Meeting, MeetingsArtifact, PetitionRecord, PetitionsArtifact, RunStats,
};
use crate::util::{ensure_directory, now_utc_string, read_json, write_json_pretty};

const MEETINGS_FILE: &str = "meetings.json";
const PETITIONS_FILE: &str = "petitions.json";
const STATS_FILE: &str = "stats.json";
const PARCELS_FILE: &str = "parcels.geojson";

/// Per-source artifact store. Every run overwrites the previous run's
/// artifacts wholesale; there is no incremental merge.
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        ensure_directory(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn meetings_path(&self) -> PathBuf {
        self.data_dir.join(MEETINGS_FILE)
    }

    pub fn petitions_path(&self) -> PathBuf {
        self.data_dir.join(PETITIONS_FILE)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join(STATS_FILE)
    }

    pub fn parcels_path(&self) -> PathBuf {
        self.data_dir.join(PARCELS_FILE)
    }

    pub fn save_meetings(&self, meetings: &[Meeting]) -> Result<()> {
        let artifact = MeetingsArtifact {
            meetings: meetings.to_vec(),
            last_updated: now_utc_string(),
            total_count: meetings.len(),
        };
        let path = self.meetings_path();
        write_json_pretty(&path, &artifact)?;
        info!(path = %path.display(), count = artifact.total_count, "saved meetings");
        Ok(())
    }

    /// Petitions are flattened out of their meetings, each record carrying
    /// its meeting's date and type for standalone consumption.
    pub fn save_petitions(&self, meetings: &[Meeting]) -> Result<()> {
        let petitions: Vec<PetitionRecord> = meetings
            .iter()
            .flat_map(|meeting| {
                meeting.petitions.iter().map(|petition| PetitionRecord {
                    petition: petition.clone(),
                    meeting_date: meeting.meeting_date,
                    meeting_type: meeting.meeting_type.clone(),
                })
            })
            .collect();

        let artifact = PetitionsArtifact {
            total_count: petitions.len(),
            petitions,
            last_updated: now_utc_string(),
        };
        let path = self.petitions_path();
        write_json_pretty(&path, &artifact)?;
        info!(path = %path.display(), count = artifact.total_count, "saved petitions");
        Ok(())
    }

    pub fn save_stats(&self, stats: &RunStats) -> Result<()> {
        let path = self.stats_path();
        write_json_pretty(&path, stats)?;
        debug!(path = %path.display(), "saved run stats");
        Ok(())
    }

    pub fn save_parcels(&self, parcels: &FeatureCollection) -> Result<()> {
        let path = self.parcels_path();
        write_json_pretty(&path, parcels)?;
        info!(path = %path.display(), count = parcels.len(), "saved parcel features");
        Ok(())
    }

    pub fn load_meetings(&self) -> Result<Vec<Meeting>> {
        let path = self.meetings_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let artifact: MeetingsArtifact = read_json(&path)
            .with_context(|| format!("failed to load meetings from {}", path.display()))?;
        Ok(artifact.meetings)
    }

    pub fn load_petitions(&self) -> Result<Vec<PetitionRecord>> {
        let path = self.petitions_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let artifact: PetitionsArtifact = read_json(&path)
            .with_context(|| format!("failed to load petitions from {}", path.display()))?;
        Ok(artifact.petitions)
    }

    pub fn load_stats(&self) -> Result<Option<RunStats>> {
        let path = self.stats_path();
        if !path.exists() {
            return Ok(None);
        }
        let stats = read_json(&path)
            .with_context(|| format!("failed to load stats from {}", path.display()))?;
        Ok(Some(stats))
    }

    pub fn load_parcels(&self) -> Result<FeatureCollection> {
        let path = self.parcels_path();
        if !path.exists() {
            return Ok(FeatureCollection::empty());
        }
        read_json(&path)
            .with_context(|| format!("failed to load parcels from {}", path.display()))
    }
}

/// True when the directory holds any artifact from a previous run.
pub fn has_artifacts(data_dir: &Path) -> bool {
    [MEETINGS_FILE, PETITIONS_FILE, STATS_FILE, PARCELS_FILE]
        .iter()
        .any(|name| data_dir.join(name).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Petition;
    use chrono::{NaiveDate, Utc};
    use tempfile::tempdir;

    fn sample_meetings() -> Vec<Meeting> {
        let mut petition = Petition::new("15-25343".to_string());
        petition.petition_number = Some("2025-103".to_string());
        petition.pins = Some(vec!["12305310".to_string(), "22310197".to_string()]);

        vec![Meeting {
            meeting_type: "Zoning Committee".to_string(),
            meeting_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            meeting_time: Some("5:00 PM".to_string()),
            location: Some("Room 267".to_string()),
            meeting_details_url: "https://example.com/m/1".to_string(),
            agenda_url: None,
            petitions: vec![petition],
            scraped_at: Utc::now(),
        }]
    }

    #[test]
    fn meetings_round_trip_through_the_artifact() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();
        let meetings = sample_meetings();

        storage.save_meetings(&meetings).unwrap();
        let loaded = storage.load_meetings().unwrap();

        assert_eq!(loaded, meetings);
    }

    #[test]
    fn petitions_are_flattened_with_meeting_context() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();

        let meetings = sample_meetings();
        storage.save_petitions(&meetings).unwrap();
        let records = storage.load_petitions().unwrap();

        let expected = vec![PetitionRecord {
            petition: meetings[0].petitions[0].clone(),
            meeting_date: meetings[0].meeting_date,
            meeting_type: meetings[0].meeting_type.clone(),
        }];
        assert_eq!(records, expected);
    }

    #[test]
    fn missing_artifacts_load_as_empty() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();

        assert!(storage.load_meetings().unwrap().is_empty());
        assert!(storage.load_petitions().unwrap().is_empty());
        assert!(storage.load_stats().unwrap().is_none());
        assert!(storage.load_parcels().unwrap().is_empty());
        assert!(!has_artifacts(dir.path()));
    }

    #[test]
    fn each_save_overwrites_the_previous_run() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();

        storage.save_meetings(&sample_meetings()).unwrap();
        storage.save_meetings(&[]).unwrap();

        assert!(storage.load_meetings().unwrap().is_empty());
        assert!(has_artifacts(dir.path()));
    }
}
