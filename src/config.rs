use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

/// Seconds before an HTTP request is abandoned.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Default pause between successive detail-page fetches (ms).
pub const PAGE_DELAY_MS: u64 = 1000;

/// Default pause between successive attachment downloads (ms).
pub const DOWNLOAD_DELAY_MS: u64 = 500;

/// Default pause between successive GIS lookups (ms).
pub const GIS_DELAY_MS: u64 = 200;

/// Deliberate throttles against third-party rate limits. These are fixed
/// inter-request delays, not retry backoffs.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    pub page_delay: Duration,
    pub download_delay: Duration,
    pub gis_delay: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
            download_delay: Duration::from_millis(DOWNLOAD_DELAY_MS),
            gis_delay: Duration::from_millis(GIS_DELAY_MS),
        }
    }
}

/// One jurisdiction's scrape target: its Legistar origin, optional parcel
/// GIS endpoint, and where its artifacts land under the data root.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub state: &'static str,
    pub base_url: &'static str,
    pub calendar_path: &'static str,
    pub gis_url: Option<&'static str>,
    /// Primary lookup field on the GIS layer.
    pub gis_key_field: &'static str,
    /// Alternate lookup field, where the layer carries one.
    pub gis_alt_key_field: Option<&'static str>,
    pub enabled: bool,
}

impl SourceConfig {
    pub fn calendar_url(&self) -> String {
        format!("{}{}", self.base_url, self.calendar_path)
    }

    pub fn data_dir(&self, data_root: &Path) -> PathBuf {
        data_root.join(self.id)
    }

    pub fn attachments_dir(&self, data_root: &Path) -> PathBuf {
        self.data_dir(data_root).join("attachments")
    }
}

pub fn sources() -> &'static [SourceConfig] {
    const SOURCES: &[SourceConfig] = &[
        SourceConfig {
            id: "charlotte_nc",
            name: "Charlotte Mecklenburg",
            state: "NC",
            base_url: "https://charlottenc.legistar.com",
            calendar_path: "/Calendar.aspx",
            gis_url: Some(
                "https://gis.charlottenc.gov/arcgis/rest/services/CountyData/Parcels/MapServer/0",
            ),
            gis_key_field: "PID",
            gis_alt_key_field: Some("NC_PIN"),
            enabled: true,
        },
        SourceConfig {
            id: "durham_nc",
            name: "Durham",
            state: "NC",
            base_url: "https://durhamnc.legistar.com",
            calendar_path: "/Calendar.aspx",
            gis_url: Some(
                "https://durhamnc.gov/arcgis/rest/services/PublicUtility/Parcels/MapServer/0",
            ),
            gis_key_field: "PID",
            gis_alt_key_field: None,
            enabled: true,
        },
    ];

    SOURCES
}

pub fn enabled_sources() -> Vec<&'static SourceConfig> {
    sources().iter().filter(|source| source.enabled).collect()
}

pub fn get_source(id: &str) -> Result<&'static SourceConfig> {
    match sources().iter().find(|source| source.id == id) {
        Some(source) => Ok(source),
        None => {
            let known: Vec<&str> = sources().iter().map(|source| source.id).collect();
            bail!("unknown source: {id}. available: {}", known.join(", "));
        }
    }
}
