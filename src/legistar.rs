use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::http::HttpClient;
use crate::model::{Meeting, Petition};
use crate::util::{ensure_directory, sanitize_filename};

/// Attachment links live only inside this container on a legislation page.
const ATTACHMENTS_TABLE_ID: &str = "ctl00_ContentPlaceHolder1_tblAttachments";

/// Only hrefs through the document download endpoint are attachments.
const DOWNLOAD_ENDPOINT_MARKER: &str = "View.ashx";

/// Calendar date formats tried in priority order.
const DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%Y-%m-%d", "%B %d, %Y"];

const ZONING_MEETING_KEYWORDS: [&str; 3] = ["zoning", "rezoning", "planning"];
const PETITION_TITLE_KEYWORDS: [&str; 2] = ["rezoning", "petition"];

/// Inclusive date-range post-filter over parsed meetings; each bound is
/// independently optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateFilter {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Try each known format in priority order; fail closed on no match.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

/// Resolve an href against the source origin. `""` and `"#"` are absent
/// links, not errors.
pub fn make_absolute_url(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href == "#" {
        return None;
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    Some(format!("{base_url}/{}", href.trim_start_matches('/')))
}

pub fn is_zoning_meeting(meeting_type: &str) -> bool {
    let lowered = meeting_type.to_lowercase();
    ZONING_MEETING_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

fn is_petition_title(title: &str) -> bool {
    let lowered = title.to_lowercase();
    PETITION_TITLE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Flatten a page to its text nodes, one per line. Detail fields are found
/// by anchored pattern search over this text rather than DOM traversal,
/// because the source markup varies across document types.
pub fn flatten_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A downloadable document discovered on a legislation detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Fields anchored in a legislation detail page's flattened text. Each is
/// extracted independently; a missing label leaves the field unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub status: Option<String>,
    pub location: Option<String>,
    pub current_zoning: Option<String>,
    pub proposed_zoning: Option<String>,
}

/// Compiled selectors and anchor patterns for Legistar pages.
#[derive(Debug)]
pub struct LegistarParser {
    calendar_rows: Selector,
    agenda_table: Selector,
    agenda_rows: Selector,
    cell: Selector,
    link: Selector,
    span: Selector,
    attachments_table: Selector,
    status: Regex,
    location: Regex,
    current_zoning: Regex,
    proposed_zoning: Regex,
    petition_number: Regex,
    petitioner: Regex,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector {css:?}: {err}"))
}

impl LegistarParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            calendar_rows: selector(
                "table.rgMasterTable tr.rgRow, table.rgMasterTable tr.rgAltRow",
            )?,
            agenda_table: selector("table.rgMasterTable")?,
            agenda_rows: selector("tr.rgRow, tr.rgAltRow")?,
            cell: selector("td")?,
            link: selector("a")?,
            span: selector("span")?,
            attachments_table: selector(&format!("table#{ATTACHMENTS_TABLE_ID} a[href]"))?,
            status: Regex::new(r"Status:\s*([^\n]+)")
                .context("failed to compile status pattern")?,
            location: Regex::new(r"(?i)Location:\s*([^\n]+?)\s*(?:\(|\n|$)")
                .context("failed to compile location pattern")?,
            current_zoning: Regex::new(r"(?i)Current\s+Zoning:\s*([^\n]+)")
                .context("failed to compile current zoning pattern")?,
            proposed_zoning: Regex::new(r"(?i)Proposed\s+Zoning:\s*([^\n]+)")
                .context("failed to compile proposed zoning pattern")?,
            petition_number: Regex::new(r"(\d{4}-\d+)")
                .context("failed to compile petition number pattern")?,
            petitioner: Regex::new(r"(?i)\bby\s+(.+?)$")
                .context("failed to compile petitioner pattern")?,
        })
    }

    /// Parse the calendar listing into meetings. A malformed row is skipped
    /// with a log line; it never aborts the page parse.
    pub fn parse_calendar(&self, html: &str, base_url: &str) -> Vec<Meeting> {
        let document = Html::parse_document(html);
        let mut meetings = Vec::new();

        for row in document.select(&self.calendar_rows) {
            if let Some(meeting) = self.parse_calendar_row(row, base_url) {
                meetings.push(meeting);
            }
        }

        meetings
    }

    fn parse_calendar_row(&self, row: ElementRef<'_>, base_url: &str) -> Option<Meeting> {
        let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
        if cells.len() < 5 {
            debug!(cells = cells.len(), "skipping calendar row with too few cells");
            return None;
        }

        // Cell 0: meeting type, preferring link text over the raw cell.
        let meeting_type = self
            .first_link_text(cells[0])
            .unwrap_or_else(|| cell_text(cells[0]));

        // Cell 1: date, required and parseable.
        let raw_date = cell_text(cells[1]);
        let Some(meeting_date) = parse_date(&raw_date) else {
            debug!(date = %raw_date, "skipping calendar row with unparseable date");
            return None;
        };

        // Cell 3: time, preferring the inner span.
        let meeting_time = cells.get(3).map(|cell| {
            self.first_span_text(*cell)
                .unwrap_or_else(|| cell_text(*cell))
        });

        // Cell 4: location.
        let location = cells.get(4).map(|cell| cell_text(*cell));

        // Cell 5: meeting details link, required.
        let details_href = cells
            .get(5)
            .and_then(|cell| cell.select(&self.link).next())
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| make_absolute_url(base_url, href));
        let Some(meeting_details_url) = details_href else {
            debug!("skipping calendar row without details link");
            return None;
        };

        // Cell 6: agenda link, optional.
        let agenda_url = cells
            .get(6)
            .and_then(|cell| cell.select(&self.link).next())
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| make_absolute_url(base_url, href));

        Some(Meeting {
            meeting_type,
            meeting_date,
            meeting_time: non_empty(meeting_time),
            location: non_empty(location),
            meeting_details_url,
            agenda_url,
            petitions: Vec::new(),
            scraped_at: Utc::now(),
        })
    }

    /// Parse a meeting details page's agenda items into petition candidates.
    /// Only rows whose title carries a zoning/petition keyword promote; the
    /// rest are silently excluded (a content filter, not an error).
    pub fn parse_agenda_rows(&self, html: &str, base_url: &str) -> Vec<Petition> {
        let document = Html::parse_document(html);

        let Some(table) = document.select(&self.agenda_table).next() else {
            warn!("no agenda table found");
            return Vec::new();
        };

        let mut petitions = Vec::new();
        for row in table.select(&self.agenda_rows) {
            if let Some(petition) = self.parse_agenda_row(row, base_url) {
                petitions.push(petition);
            }
        }

        petitions
    }

    fn parse_agenda_row(&self, row: ElementRef<'_>, base_url: &str) -> Option<Petition> {
        let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
        if cells.len() < 6 {
            return None;
        }

        // Cell 0: file number linking to the legislation detail page.
        let file_link = cells[0].select(&self.link).next()?;
        let file_number = element_text(file_link);
        if file_number.is_empty() {
            return None;
        }
        let legislation_url = file_link
            .value()
            .attr("href")
            .and_then(|href| make_absolute_url(base_url, href));

        // Cell 5: title; gates promotion to a petition candidate.
        let title = cell_text(cells[5]);
        if !is_petition_title(&title) {
            return None;
        }

        // Cell 6: action (Approve/Deny/Defer); cell 7: recorded result.
        let action = cells.get(6).map(|cell| cell_text(*cell));
        let vote_result = cells.get(7).map(|cell| cell_text(*cell));

        let mut petition = Petition::new(file_number);
        petition.legislation_url = legislation_url;
        petition.action = non_empty(action);
        petition.vote_result = non_empty(vote_result);

        let (petition_number, petitioner) = self.parse_title_fields(&title);
        petition.petition_number = petition_number;
        petition.petitioner = petitioner;

        Some(petition)
    }

    /// Title text carries its own anchors: a 4-digit-dash-number token for
    /// the petition number and a trailing `by <name>` clause.
    pub fn parse_title_fields(&self, title: &str) -> (Option<String>, Option<String>) {
        let petition_number = self
            .petition_number
            .captures(title)
            .map(|captures| captures[1].to_string());

        let petitioner = self
            .petitioner
            .captures(title)
            .map(|captures| captures[1].trim().to_string());

        (petition_number, petitioner)
    }

    /// Anchored field extraction over flattened detail-page text. Each field
    /// is independent; one anchor's absence never blocks the others.
    pub fn extract_detail_fields(&self, page_text: &str) -> DetailFields {
        let capture = |pattern: &Regex| {
            pattern
                .captures(page_text)
                .map(|captures| captures[1].trim().to_string())
                .filter(|value| !value.is_empty())
        };

        DetailFields {
            status: capture(&self.status),
            location: capture(&self.location),
            current_zoning: capture(&self.current_zoning),
            proposed_zoning: capture(&self.proposed_zoning),
        }
    }

    pub fn apply_detail_fields(&self, petition: &mut Petition, page_text: &str) {
        let fields = self.extract_detail_fields(page_text);
        petition.status = fields.status;
        petition.location = fields.location;
        petition.current_zoning = fields.current_zoning;
        petition.proposed_zoning = fields.proposed_zoning;
    }

    /// Discover attachment links, restricted to the attachments container
    /// and the download endpoint.
    pub fn extract_attachments(&self, html: &str, base_url: &str) -> Vec<Attachment> {
        let document = Html::parse_document(html);
        let mut attachments = Vec::new();

        for link in document.select(&self.attachments_table) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !href.contains(DOWNLOAD_ENDPOINT_MARKER) {
                continue;
            }
            let Some(url) = make_absolute_url(base_url, href) else {
                continue;
            };
            attachments.push(Attachment {
                name: element_text(link),
                url,
            });
        }

        attachments
    }

    fn first_link_text(&self, cell: ElementRef<'_>) -> Option<String> {
        cell.select(&self.link)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    fn first_span_text(&self, cell: ElementRef<'_>) -> Option<String> {
        cell.select(&self.span)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    element_text(cell)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

/// Scrapes one Legistar source: calendar, meeting agendas, legislation
/// detail pages and their attachments, all through the run's shared session.
pub struct LegistarScraper<'a> {
    http: &'a HttpClient,
    base_url: String,
    calendar_url: String,
    parser: LegistarParser,
}

impl<'a> LegistarScraper<'a> {
    pub fn new(http: &'a HttpClient, source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http,
            base_url: source.base_url.to_string(),
            calendar_url: source.calendar_url(),
            parser: LegistarParser::new()?,
        })
    }

    /// Fetch and parse the calendar listing. A failure here is unrecoverable
    /// for the run and propagates.
    pub fn fetch_calendar(&self, filter: &DateFilter) -> Result<Vec<Meeting>> {
        info!(url = %self.calendar_url, "fetching calendar");
        let html = self
            .http
            .get_text(&self.calendar_url)
            .context("calendar page unreachable")?;

        let mut meetings = self.parser.parse_calendar(&html, &self.base_url);
        info!(count = meetings.len(), "extracted meetings");

        if !filter.is_empty() {
            let before = meetings.len();
            meetings.retain(|meeting| filter.contains(meeting.meeting_date));
            info!(before, after = meetings.len(), "date filter applied");
        }

        Ok(meetings)
    }

    /// Populate a meeting's petitions from its details page. Per-petition
    /// detail-page failures are logged and leave that petition's detail
    /// fields unset.
    pub fn fetch_meeting_details(&self, meeting: &mut Meeting) -> Result<()> {
        info!(url = %meeting.meeting_details_url, "fetching meeting details");
        let html = self.http.get_text(&meeting.meeting_details_url)?;

        let mut petitions = self.parser.parse_agenda_rows(&html, &self.base_url);
        for petition in &mut petitions {
            let Some(url) = petition.legislation_url.clone() else {
                continue;
            };
            match self.http.get_text(&url) {
                Ok(page) => {
                    let text = flatten_text(&page);
                    self.parser.apply_detail_fields(petition, &text);
                    debug!(petition = petition.display_number(), "extracted detail fields");
                }
                Err(err) => {
                    warn!(
                        file_number = %petition.file_number,
                        error = %err,
                        "failed to fetch legislation detail page"
                    );
                }
            }
        }

        info!(count = petitions.len(), "extracted petitions from meeting");
        meeting.petitions = petitions;
        Ok(())
    }

    /// Download every attachment for one petition into its own directory.
    /// Each download gets at most one attempt; a failure logs and moves on.
    /// Returns only the successfully saved paths.
    pub fn download_petition_attachments(
        &self,
        petition_key: &str,
        legislation_url: &str,
        attachments_root: &Path,
        delay: Duration,
    ) -> Vec<PathBuf> {
        let page = match self.http.get_text(legislation_url) {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    petition = petition_key,
                    error = %err,
                    "failed to fetch legislation page for attachments"
                );
                return Vec::new();
            }
        };

        let attachments = self.parser.extract_attachments(&page, &self.base_url);
        if attachments.is_empty() {
            debug!(petition = petition_key, "no attachments found");
            return Vec::new();
        }

        let petition_dir = attachments_root.join(petition_key);
        if let Err(err) = ensure_directory(&petition_dir) {
            warn!(petition = petition_key, error = %err, "failed to create attachment dir");
            return Vec::new();
        }

        let total = attachments.len();
        let mut saved = Vec::new();

        for (index, attachment) in attachments.iter().enumerate() {
            let file_path = petition_dir.join(sanitize_filename(&attachment.name));
            info!(
                petition = petition_key,
                seq = index + 1,
                total,
                name = %attachment.name,
                "downloading attachment"
            );

            match self.http.get_bytes(&attachment.url) {
                Ok(bytes) => match std::fs::write(&file_path, &bytes) {
                    Ok(()) => {
                        debug!(
                            path = %file_path.display(),
                            size_kb = bytes.len() as f64 / 1024.0,
                            "saved attachment"
                        );
                        saved.push(file_path);
                    }
                    Err(err) => {
                        warn!(path = %file_path.display(), error = %err, "failed to save attachment");
                    }
                },
                Err(err) => {
                    warn!(url = %attachment.url, error = %err, "failed to download attachment");
                }
            }

            std::thread::sleep(delay);
        }

        info!(
            petition = petition_key,
            saved = saved.len(),
            total,
            "attachment downloads complete"
        );
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> LegistarParser {
        LegistarParser::new().unwrap()
    }

    const BASE: &str = "https://charlottenc.legistar.com";

    const CALENDAR_HTML: &str = r##"
        <html><body><table class="rgMasterTable">
          <tr class="rgRow">
            <td><a href="/DepartmentDetail.aspx?ID=1">Zoning Committee</a></td>
            <td>01/20/2026</td>
            <td></td>
            <td><span>5:00 PM</span></td>
            <td>Room 267</td>
            <td><a href="/MeetingDetail.aspx?ID=100">Meeting details</a></td>
            <td><a href="View.ashx?M=A&ID=100">Agenda</a></td>
          </tr>
          <tr class="rgAltRow">
            <td>City Council</td>
            <td>January 21, 2026</td>
            <td></td>
            <td>6:30 PM</td>
            <td>Chamber</td>
            <td><a href="https://charlottenc.legistar.com/MeetingDetail.aspx?ID=101">Details</a></td>
            <td><a href="#">Agenda</a></td>
          </tr>
          <tr class="rgRow">
            <td>Broken Committee</td>
            <td>not a date</td>
            <td></td>
            <td>4:00 PM</td>
            <td>Room 1</td>
            <td><a href="/MeetingDetail.aspx?ID=102">Details</a></td>
          </tr>
          <tr class="rgAltRow">
            <td>Too few cells</td>
            <td>01/22/2026</td>
          </tr>
        </table></body></html>
    "##;

    #[test]
    fn parse_calendar_skips_malformed_rows_and_keeps_the_rest() {
        let meetings = parser().parse_calendar(CALENDAR_HTML, BASE);
        assert_eq!(meetings.len(), 2);

        let first = &meetings[0];
        assert_eq!(first.meeting_type, "Zoning Committee");
        assert_eq!(
            first.meeting_date,
            NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()
        );
        assert_eq!(first.meeting_time.as_deref(), Some("5:00 PM"));
        assert_eq!(first.location.as_deref(), Some("Room 267"));
        assert_eq!(
            first.meeting_details_url,
            "https://charlottenc.legistar.com/MeetingDetail.aspx?ID=100"
        );
        assert_eq!(
            first.agenda_url.as_deref(),
            Some("https://charlottenc.legistar.com/View.ashx?M=A&ID=100")
        );

        let second = &meetings[1];
        assert_eq!(second.meeting_type, "City Council");
        assert_eq!(
            second.meeting_date,
            NaiveDate::from_ymd_opt(2026, 1, 21).unwrap()
        );
        // An href of "#" is an absent agenda link, not a bug.
        assert_eq!(second.agenda_url, None);
    }

    #[test]
    fn parse_calendar_is_deterministic_for_a_fixed_snapshot() {
        let parser = parser();
        let first = parser.parse_calendar(CALENDAR_HTML, BASE);
        let second = parser.parse_calendar(CALENDAR_HTML, BASE);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.meeting_type, b.meeting_type);
            assert_eq!(a.meeting_date, b.meeting_date);
            assert_eq!(a.meeting_details_url, b.meeting_details_url);
            assert_eq!(a.agenda_url, b.agenda_url);
        }
    }

    #[test]
    fn parse_date_tries_formats_in_priority_order() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        assert_eq!(parse_date("01/20/2026"), Some(expected));
        assert_eq!(parse_date("2026-01-20"), Some(expected));
        assert_eq!(parse_date("January 20, 2026"), Some(expected));
        assert_eq!(parse_date("20 Jan 2026"), None);
    }

    #[test]
    fn date_filter_is_inclusive_on_both_bounds() {
        let filter = DateFilter {
            start: NaiveDate::from_ymd_opt(2026, 1, 10),
            end: NaiveDate::from_ymd_opt(2026, 1, 20),
        };

        assert!(!filter.contains(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap()));
        assert!(filter.contains(NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()));
        assert!(filter.contains(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()));
        assert!(filter.contains(NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()));
        assert!(!filter.contains(NaiveDate::from_ymd_opt(2026, 1, 21).unwrap()));
    }

    #[test]
    fn date_filter_bounds_are_independently_optional() {
        let from = DateFilter {
            start: NaiveDate::from_ymd_opt(2026, 1, 10),
            end: None,
        };
        assert!(from.contains(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap()));
        assert!(!from.contains(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap()));

        assert!(DateFilter::default().is_empty());
        assert!(DateFilter::default().contains(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()));
    }

    #[test]
    fn make_absolute_url_resolves_relative_hrefs() {
        assert_eq!(
            make_absolute_url(BASE, "/MeetingDetail.aspx?ID=1"),
            Some("https://charlottenc.legistar.com/MeetingDetail.aspx?ID=1".to_string())
        );
        assert_eq!(
            make_absolute_url(BASE, "View.ashx?M=A"),
            Some("https://charlottenc.legistar.com/View.ashx?M=A".to_string())
        );
        assert_eq!(
            make_absolute_url(BASE, "https://other.example.com/x"),
            Some("https://other.example.com/x".to_string())
        );
        assert_eq!(make_absolute_url(BASE, "#"), None);
        assert_eq!(make_absolute_url(BASE, ""), None);
    }

    const AGENDA_HTML: &str = r##"
        <html><body><table class="rgMasterTable">
          <tr class="rgRow">
            <td><a href="/LegislationDetail.aspx?ID=500">15-25343</a></td>
            <td>1</td><td></td><td>Ord.</td><td></td>
            <td>Rezoning Petition: 2025-103 by Pappas Properties</td>
            <td>Approve</td>
            <td>Pass</td>
          </tr>
          <tr class="rgAltRow">
            <td><a href="/LegislationDetail.aspx?ID=501">15-25344</a></td>
            <td>2</td><td></td><td>Res.</td><td></td>
            <td>Appointment of the City Clerk</td>
            <td>Adopt</td>
          </tr>
          <tr class="rgRow">
            <td><a href="/LegislationDetail.aspx?ID=502">15-25345</a></td>
            <td>3</td><td></td><td>Ord.</td><td></td>
            <td>Petition 2025-110: text amendment</td>
            <td></td>
          </tr>
        </table></body></html>
    "##;

    #[test]
    fn agenda_rows_promote_only_keyword_titles() {
        let petitions = parser().parse_agenda_rows(AGENDA_HTML, BASE);
        assert_eq!(petitions.len(), 2);

        let first = &petitions[0];
        assert_eq!(first.file_number, "15-25343");
        assert_eq!(first.petition_number.as_deref(), Some("2025-103"));
        assert_eq!(first.petitioner.as_deref(), Some("Pappas Properties"));
        assert_eq!(first.action.as_deref(), Some("Approve"));
        assert_eq!(first.vote_result.as_deref(), Some("Pass"));
        assert_eq!(
            first.legislation_url.as_deref(),
            Some("https://charlottenc.legistar.com/LegislationDetail.aspx?ID=500")
        );

        let second = &petitions[1];
        assert_eq!(second.file_number, "15-25345");
        assert_eq!(second.petition_number.as_deref(), Some("2025-110"));
        assert_eq!(second.petitioner, None);
        assert_eq!(second.action, None);
    }

    #[test]
    fn detail_fields_extract_from_anchored_labels() {
        let text = "Status: Approved\nLocation: 123 Main St (District 4)\nCurrent Zoning: R-3\nProposed Zoning: UR-2";
        let fields = parser().extract_detail_fields(text);

        assert_eq!(fields.status.as_deref(), Some("Approved"));
        assert_eq!(fields.location.as_deref(), Some("123 Main St"));
        assert_eq!(fields.current_zoning.as_deref(), Some("R-3"));
        assert_eq!(fields.proposed_zoning.as_deref(), Some("UR-2"));
    }

    #[test]
    fn detail_fields_are_independent_when_anchors_are_missing() {
        let fields = parser().extract_detail_fields("Location: 400 S Tryon St\nnothing else here");
        assert_eq!(fields.location.as_deref(), Some("400 S Tryon St"));
        assert_eq!(fields.status, None);
        assert_eq!(fields.current_zoning, None);
        assert_eq!(fields.proposed_zoning, None);
    }

    #[test]
    fn detail_fields_survive_flattened_label_value_splits() {
        // Labels and values land in separate text nodes on real pages.
        let html = "<html><body><span>Status:</span><span>In Committee</span>\
                    <div>Current Zoning:</div><div>N1-A</div></body></html>";
        let fields = parser().extract_detail_fields(&flatten_text(html));
        assert_eq!(fields.status.as_deref(), Some("In Committee"));
        assert_eq!(fields.current_zoning.as_deref(), Some("N1-A"));
    }

    const DETAIL_HTML: &str = r##"
        <html><body>
          <table id="ctl00_ContentPlaceHolder1_tblAttachments">
            <tr><td><a href="View.ashx?M=F&ID=900">Site Plan</a></td></tr>
            <tr><td><a href="View.ashx?M=F&ID=901">Staff Report.pdf</a></td></tr>
            <tr><td><a href="LegislationDetail.aspx?ID=77">Related case</a></td></tr>
          </table>
          <a href="View.ashx?M=F&ID=999">Outside the container</a>
        </body></html>
    "##;

    #[test]
    fn attachments_are_gated_by_container_and_endpoint() {
        let attachments = parser().extract_attachments(DETAIL_HTML, BASE);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].name, "Site Plan");
        assert_eq!(
            attachments[0].url,
            "https://charlottenc.legistar.com/View.ashx?M=F&ID=900"
        );
        assert_eq!(attachments[1].name, "Staff Report.pdf");
    }

    #[test]
    fn title_fields_parse_number_and_trailing_petitioner() {
        let parser = parser();
        let (number, petitioner) =
            parser.parse_title_fields("Rezoning Petition: 2025-103 by Pappas Properties");
        assert_eq!(number.as_deref(), Some("2025-103"));
        assert_eq!(petitioner.as_deref(), Some("Pappas Properties"));

        let (number, petitioner) = parser.parse_title_fields("Rezoning district boundary review");
        assert_eq!(number, None);
        assert_eq!(petitioner, None);
    }

    #[test]
    fn zoning_meeting_filter_matches_known_keywords() {
        assert!(is_zoning_meeting("Zoning Committee"));
        assert!(is_zoning_meeting("City Council Rezoning Hearing"));
        assert!(is_zoning_meeting("Planning Commission"));
        assert!(!is_zoning_meeting("Budget Workshop"));
    }
}
