use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::pdf;

/// Default anchor patterns for parcel identifiers, in priority order. Every
/// pattern is applied to every document; capture group 1 carries the PIN.
/// Mecklenburg-style PIDs are exactly 8 digits, with a dashed 3-3-2 variant
/// on older tax-parcel stamps.
pub const DEFAULT_PATTERNS: [&str; 5] = [
    r"(?i)TAX\s+PARCEL\s*(?:NO\.?|NUMBER|#)?[:\s]*(\d{8})",
    r"(?i)TAX\s+PARCEL\s+NO\.?\s+(\d{3}-\d{3}-\d{2})",
    r"(?i)PID\s*[#:\s]+(\d{8})",
    r"(?i)PARCEL\s+ID[:\s]*(\d{8})",
    r"(?i)TCA[:\s]*(\d{8})",
];

/// Close a matched identifier into its hyphen-free canonical form.
/// `123-053-10` and `12305310` both normalize to `12305310`.
pub fn normalize_pin(raw: &str) -> String {
    raw.chars().filter(|ch| *ch != '-').collect()
}

/// Extracts parcel identifiers from document text via an ordered set of
/// anchor regexes, normalizing and deduplicating into a sorted canonical set.
#[derive(Debug)]
pub struct PinExtractor {
    patterns: Vec<Regex>,
}

impl PinExtractor {
    pub fn new() -> Result<Self> {
        Self::with_patterns(&DEFAULT_PATTERNS)
    }

    pub fn with_patterns(patterns: &[&str]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile pin pattern: {pattern}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Apply every pattern to the text; the result is lexicographically
    /// sorted and deduplicated, independent of pattern order.
    pub fn extract_from_text(&self, text: &str) -> Vec<String> {
        let mut pins = BTreeSet::new();
        self.collect_from_text(text, &mut pins);
        pins.into_iter().collect()
    }

    fn collect_from_text(&self, text: &str, pins: &mut BTreeSet<String>) {
        for pattern in &self.patterns {
            for captures in pattern.captures_iter(text) {
                if let Some(matched) = captures.get(1) {
                    pins.insert(normalize_pin(matched.as_str()));
                }
            }
        }
    }

    /// Extract PINs from one PDF. A document that cannot be parsed yields
    /// zero identifiers, never an error, so sibling documents are unaffected.
    pub fn extract_from_pdf(&self, path: &Path) -> Vec<String> {
        let parsed = match pdf::parse_pdf(path) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable pdf");
                return Vec::new();
            }
        };

        let pins = self.extract_from_text(&parsed.text);
        if pins.is_empty() {
            debug!(path = %path.display(), "no pins found");
        } else {
            debug!(path = %path.display(), count = pins.len(), "extracted pins");
        }

        pins
    }

    /// Union of PINs across every `*.pdf` in a directory.
    pub fn extract_from_directory(&self, directory: &Path) -> Vec<String> {
        if !directory.exists() {
            warn!(path = %directory.display(), "pin directory not found");
            return Vec::new();
        }

        let pdf_files = match list_pdfs(directory) {
            Ok(files) => files,
            Err(err) => {
                warn!(path = %directory.display(), error = %err, "failed to list pdfs");
                return Vec::new();
            }
        };

        if pdf_files.is_empty() {
            debug!(path = %directory.display(), "no pdf files found");
            return Vec::new();
        }

        info!(
            path = %directory.display(),
            pdf_count = pdf_files.len(),
            "scanning pdfs for pins"
        );

        self.extract_batch(&pdf_files)
    }

    /// Union of PINs across an explicit list of documents.
    pub fn extract_batch(&self, paths: &[PathBuf]) -> Vec<String> {
        let mut pins = BTreeSet::new();
        for path in paths {
            for pin in self.extract_from_pdf(path) {
                pins.insert(pin);
            }
        }
        pins.into_iter().collect()
    }
}

fn list_pdfs(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let path = entry.path();

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
