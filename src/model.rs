use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One rezoning case discovered on a meeting agenda. Fields other than the
/// file number are filled in best-effort across the detail, attachment and
/// geometry phases; absence means the source never yielded the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Petition {
    pub file_number: String,
    #[serde(default)]
    pub petition_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub current_zoning: Option<String>,
    #[serde(default)]
    pub proposed_zoning: Option<String>,
    #[serde(default)]
    pub petitioner: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub vote_result: Option<String>,
    #[serde(default)]
    pub legislation_url: Option<String>,
    /// Sorted, deduplicated canonical PINs, populated after attachment
    /// processing. `None` until that phase runs.
    #[serde(default)]
    pub pins: Option<Vec<String>>,
}

impl Petition {
    pub fn new(file_number: impl Into<String>) -> Self {
        Self {
            file_number: file_number.into(),
            petition_number: None,
            location: None,
            current_zoning: None,
            proposed_zoning: None,
            petitioner: None,
            status: None,
            action: None,
            vote_result: None,
            legislation_url: None,
            pins: None,
        }
    }

    /// Preferred display key: petition number when known, file number otherwise.
    pub fn display_number(&self) -> &str {
        self.petition_number.as_deref().unwrap_or(&self.file_number)
    }

    pub fn has_pins(&self) -> bool {
        self.pins.as_ref().is_some_and(|pins| !pins.is_empty())
    }

    pub fn pin_count(&self) -> usize {
        self.pins.as_ref().map_or(0, Vec::len)
    }
}

/// One calendar entry. Owns the petitions discovered on its agenda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub meeting_type: String,
    pub meeting_date: NaiveDate,
    #[serde(default)]
    pub meeting_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub meeting_details_url: String,
    #[serde(default)]
    pub agenda_url: Option<String>,
    #[serde(default)]
    pub petitions: Vec<Petition>,
    pub scraped_at: DateTime<Utc>,
}

/// Aggregate snapshot recomputed wholesale at the end of each run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_meetings: usize,
    pub total_petitions: usize,
    pub zoning_meetings: usize,
    pub petitions_with_pins: usize,
    pub total_pins: usize,
    #[serde(default)]
    pub last_scrape_time: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn compute(meetings: &[Meeting]) -> Self {
        let petitions = meetings.iter().flat_map(|m| m.petitions.iter());
        Self {
            total_meetings: meetings.len(),
            total_petitions: meetings.iter().map(|m| m.petitions.len()).sum(),
            zoning_meetings: meetings
                .iter()
                .filter(|m| m.meeting_type.to_lowercase().contains("zoning"))
                .count(),
            petitions_with_pins: petitions.clone().filter(|p| p.has_pins()).count(),
            total_pins: petitions.map(Petition::pin_count).sum(),
            last_scrape_time: Some(Utc::now()),
        }
    }
}

/// Petition flattened with its meeting context, as stored in the petitions
/// artifact so readers never need a join back to meetings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetitionRecord {
    #[serde(flatten)]
    pub petition: Petition,
    pub meeting_date: NaiveDate,
    pub meeting_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingsArtifact {
    pub meetings: Vec<Meeting>,
    pub last_updated: String,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetitionsArtifact {
    pub petitions: Vec<PetitionRecord>,
    pub last_updated: String,
    pub total_count: usize,
}

/// GeoJSON FeatureCollection carrying opaque geometry values. Geometry comes
/// from the GIS service untouched; only feature properties are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<serde_json::Value>,
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self {
            kind: feature_collection_type(),
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting_with_petitions(petitions: Vec<Petition>) -> Meeting {
        Meeting {
            meeting_type: "Zoning Committee".to_string(),
            meeting_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            meeting_time: Some("5:00 PM".to_string()),
            location: None,
            meeting_details_url: "https://example.legistar.com/MeetingDetail.aspx?ID=1"
                .to_string(),
            agenda_url: None,
            petitions,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn display_number_prefers_petition_number_over_file_number() {
        let mut petition = Petition::new("15-25343");
        assert_eq!(petition.display_number(), "15-25343");

        petition.petition_number = Some("2025-103".to_string());
        assert_eq!(petition.display_number(), "2025-103");
    }

    #[test]
    fn run_stats_count_pins_and_zoning_meetings() {
        let mut with_pins = Petition::new("15-1");
        with_pins.pins = Some(vec!["12305310".to_string(), "22310197".to_string()]);
        let mut empty_pins = Petition::new("15-2");
        empty_pins.pins = Some(Vec::new());
        let without = Petition::new("15-3");

        let meetings = vec![meeting_with_petitions(vec![with_pins, empty_pins, without])];
        let stats = RunStats::compute(&meetings);

        assert_eq!(stats.total_meetings, 1);
        assert_eq!(stats.zoning_meetings, 1);
        assert_eq!(stats.total_petitions, 3);
        assert_eq!(stats.petitions_with_pins, 1);
        assert_eq!(stats.total_pins, 2);
    }

    #[test]
    fn petition_record_flattens_meeting_context() {
        let mut petition = Petition::new("15-25343");
        petition.petition_number = Some("2025-103".to_string());
        let record = PetitionRecord {
            petition,
            meeting_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            meeting_type: "Zoning Committee".to_string(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["file_number"], "15-25343");
        assert_eq!(value["petition_number"], "2025-103");
        assert_eq!(value["meeting_date"], "2026-01-20");
        assert_eq!(value["meeting_type"], "Zoning Committee");
    }
}
