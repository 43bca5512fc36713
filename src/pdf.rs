use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Minimum characters a backend must produce before its output is trusted.
/// Below this the next backend is tried; some extractors silently return
/// near-empty text on encodings they cannot handle.
const MIN_TEXT_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("pdf not found: {0}")]
    NotFound(PathBuf),
    #[error("text extraction failed: {0}")]
    Extraction(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PdfMetadata {
    pub filename: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PdfText {
    pub text: String,
    pub page_count: usize,
    pub size_kb: f64,
    pub metadata: PdfMetadata,
}

/// Capability-equivalent extraction strategies, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Embedded,
    Pdftotext,
}

const BACKENDS: [Backend; 2] = [Backend::Embedded, Backend::Pdftotext];

impl Backend {
    fn label(self) -> &'static str {
        match self {
            Self::Embedded => "pdf-extract",
            Self::Pdftotext => "pdftotext",
        }
    }

    fn extract(self, path: &Path) -> Result<String, PdfError> {
        match self {
            Self::Embedded => pdf_extract::extract_text(path)
                .map_err(|err| PdfError::Extraction(format!("pdf-extract: {err}"))),
            Self::Pdftotext => extract_with_pdftotext(path),
        }
    }
}

/// Extract plain text plus best-effort page count and metadata from a PDF.
///
/// Backends are tried in order; a backend whose output falls below the
/// quality gate hands over to the next, keeping the longest short output as
/// a candidate. Empty text from a succeeding backend is valid output. Only a
/// missing file or every backend erroring is an error.
pub fn parse_pdf(path: &Path) -> Result<PdfText, PdfError> {
    if !path.exists() {
        return Err(PdfError::NotFound(path.to_path_buf()));
    }

    let mut candidate: Option<String> = None;
    let mut failures: Vec<String> = Vec::new();

    for backend in BACKENDS {
        match backend.extract(path) {
            Ok(text) => {
                if text.len() >= MIN_TEXT_CHARS {
                    candidate = Some(text);
                    break;
                }
                warn!(
                    backend = backend.label(),
                    chars = text.len(),
                    path = %path.display(),
                    "backend yielded little text, trying next"
                );
                if candidate.as_ref().is_none_or(|best| text.len() > best.len()) {
                    candidate = Some(text);
                }
            }
            Err(err) => {
                warn!(
                    backend = backend.label(),
                    path = %path.display(),
                    error = %err,
                    "extraction backend failed"
                );
                failures.push(format!("{}: {err}", backend.label()));
            }
        }
    }

    let text = candidate.ok_or_else(|| {
        PdfError::Extraction(format!(
            "all backends failed for {}: {}",
            path.display(),
            failures.join("; ")
        ))
    })?;

    let size_kb = fs::metadata(path)
        .map(|meta| meta.len() as f64 / 1024.0)
        .unwrap_or(0.0);
    let (page_count, metadata) = read_document_info(path);

    debug!(
        path = %path.display(),
        pages = page_count,
        chars = text.len(),
        "pdf parsed"
    );

    Ok(PdfText {
        text,
        page_count,
        size_kb,
        metadata,
    })
}

fn extract_with_pdftotext(path: &Path) -> Result<String, PdfError> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|err| PdfError::Extraction(format!("failed to execute pdftotext: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PdfError::Extraction(format!(
            "pdftotext returned non-zero exit status for {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    Ok(raw.replace('\u{0000}', ""))
}

/// Page count and document-info metadata. Metadata presence is best-effort
/// and must never block text retrieval, so every failure collapses to
/// defaults here.
fn read_document_info(path: &Path) -> (usize, PdfMetadata) {
    let mut metadata = PdfMetadata {
        filename: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ..PdfMetadata::default()
    };

    let Ok(document) = lopdf::Document::load(path) else {
        return (0, metadata);
    };

    let page_count = document.get_pages().len();

    if let Some(info) = resolve_info_dict(&document) {
        metadata.title = info_string(&document, info, b"Title");
        metadata.author = info_string(&document, info, b"Author");
        metadata.subject = info_string(&document, info, b"Subject");
        metadata.creator = info_string(&document, info, b"Creator");
    }

    (page_count, metadata)
}

fn resolve_info_dict(document: &lopdf::Document) -> Option<&lopdf::Dictionary> {
    let info = document.trailer.get(b"Info").ok()?;
    let info = match info {
        lopdf::Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    info.as_dict().ok()
}

fn info_string(
    document: &lopdf::Document,
    dict: &lopdf::Dictionary,
    key: &[u8],
) -> Option<String> {
    let object = dict.get(key).ok()?;
    let object = match object {
        lopdf::Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };

    match object {
        lopdf::Object::String(bytes, _) => {
            let value = String::from_utf8_lossy(bytes).trim().to_string();
            (!value.is_empty()).then_some(value)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_a_not_found_error() {
        let err = parse_pdf(Path::new("/nonexistent/petition.pdf")).unwrap_err();
        assert!(matches!(err, PdfError::NotFound(_)));
    }

    #[test]
    fn unparseable_file_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pdf");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"this is not a pdf document").unwrap();

        let err = parse_pdf(&path).unwrap_err();
        assert!(matches!(err, PdfError::Extraction(_)));
    }
}
