use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::cli::ScrapeArgs;
use crate::config::{SourceConfig, Throttle, enabled_sources, get_source};
use crate::gis::GisClient;
use crate::http::HttpClient;
use crate::legistar::{DateFilter, LegistarScraper, is_zoning_meeting};
use crate::model::{FeatureCollection, Meeting, RunStats};
use crate::pins::PinExtractor;
use crate::storage::Storage;

/// Where a source run got to before it stopped. Logged on both success and
/// failure so a partial run's artifacts can be reasoned about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Init,
    CalendarFetched,
    MeetingsDetailed,
    PetitionsProcessed,
    GeometryFetched,
    Saved,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::CalendarFetched => "calendar-fetched",
            Self::MeetingsDetailed => "meetings-detailed",
            Self::PetitionsProcessed => "petitions-processed",
            Self::GeometryFetched => "geometry-fetched",
            Self::Saved => "saved",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub fn run(args: &ScrapeArgs) -> Result<()> {
    // Argument problems surface before any network or disk I/O.
    let filter = build_date_filter(args)?;
    let throttle = build_throttle(args);

    let targets: Vec<&'static SourceConfig> = match &args.source {
        Some(id) => vec![get_source(id)?],
        None => enabled_sources(),
    };
    if targets.is_empty() {
        bail!("no enabled sources configured");
    }

    let mut failures = 0;
    for source in &targets {
        if run_source(source, args, &filter, &throttle).is_err() {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} source runs failed", targets.len());
    }
    Ok(())
}

fn advance(source: &SourceConfig, from: RunPhase, to: RunPhase) -> RunPhase {
    tracing::debug!(source = source.id, %from, %to, "phase complete");
    to
}

fn build_date_filter(args: &ScrapeArgs) -> Result<DateFilter> {
    let parse = |raw: &str, flag: &str| -> Result<NaiveDate> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid --{flag} {raw:?}, expected YYYY-MM-DD"))
    };

    if let Some(date) = &args.date {
        let date = parse(date, "date")?;
        return Ok(DateFilter {
            start: Some(date),
            end: Some(date),
        });
    }

    let start = args
        .start_date
        .as_deref()
        .map(|raw| parse(raw, "start-date"))
        .transpose()?;
    let end = args
        .end_date
        .as_deref()
        .map(|raw| parse(raw, "end-date"))
        .transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            bail!("--start-date {start} is after --end-date {end}");
        }
    }

    Ok(DateFilter { start, end })
}

fn build_throttle(args: &ScrapeArgs) -> Throttle {
    let mut throttle = Throttle::default();
    if let Some(ms) = args.page_delay_ms {
        throttle.page_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = args.download_delay_ms {
        throttle.download_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = args.gis_delay_ms {
        throttle.gis_delay = Duration::from_millis(ms);
    }
    throttle
}

fn run_source(
    source: &SourceConfig,
    args: &ScrapeArgs,
    filter: &DateFilter,
    throttle: &Throttle,
) -> Result<()> {
    let mut phase = RunPhase::Init;
    scrape_source(source, args, filter, throttle, &mut phase).inspect_err(|err| {
        error!(
            source = source.id,
            phase = %RunPhase::Failed,
            reached = %phase,
            error = %err,
            "source run failed"
        );
    })
}

/// One source's full pipeline: calendar, meeting details, attachments and
/// parcel identifiers, geometry, artifacts. Item-level failures degrade the
/// output; only run-level failures (calendar unreachable, artifacts
/// unwritable) propagate.
fn scrape_source(
    source: &SourceConfig,
    args: &ScrapeArgs,
    filter: &DateFilter,
    throttle: &Throttle,
    phase: &mut RunPhase,
) -> Result<()> {
    info!(source = source.id, name = source.name, "starting scrape run");

    let http = HttpClient::new()?;
    let storage = Storage::new(source.data_dir(&args.data_root))?;
    let scraper = LegistarScraper::new(&http, source)?;

    let mut meetings = scraper.fetch_calendar(filter)?;
    *phase = advance(source, *phase, RunPhase::CalendarFetched);

    if !args.all_meetings {
        let before = meetings.len();
        meetings.retain(|meeting| is_zoning_meeting(&meeting.meeting_type));
        info!(before, after = meetings.len(), "kept zoning-related meetings");
    }

    // An empty calendar window is a complete, successful run.
    if meetings.is_empty() {
        info!(source = source.id, "no meetings matched; nothing to scrape");
        let stats = RunStats::compute(&meetings);
        write_artifacts(source, &storage, &meetings, &stats, &FeatureCollection::empty())?;
        *phase = advance(source, *phase, RunPhase::Saved);
        print_summary(source, &storage, &meetings, *phase);
        return Ok(());
    }

    for meeting in &mut meetings {
        if let Err(err) = scraper.fetch_meeting_details(meeting) {
            warn!(
                url = %meeting.meeting_details_url,
                error = %err,
                "meeting details unavailable, keeping calendar entry"
            );
        }
        std::thread::sleep(throttle.page_delay);
    }
    *phase = advance(source, *phase, RunPhase::MeetingsDetailed);

    if !args.skip_attachments {
        process_attachments(&scraper, source, args, throttle, &mut meetings)?;
    }
    *phase = advance(source, *phase, RunPhase::PetitionsProcessed);

    let parcels = if args.skip_geometry {
        FeatureCollection::empty()
    } else {
        fetch_geometry(&http, source, throttle, &meetings)
    };
    *phase = advance(source, *phase, RunPhase::GeometryFetched);

    let stats = RunStats::compute(&meetings);
    write_artifacts(source, &storage, &meetings, &stats, &parcels)?;
    *phase = advance(source, *phase, RunPhase::Saved);

    print_summary(source, &storage, &meetings, *phase);
    Ok(())
}

/// The four artifacts are written independently so one bad write cannot
/// take the others down with it. One to three failures degrade the run;
/// only all four failing aborts it.
fn write_artifacts(
    source: &SourceConfig,
    storage: &Storage,
    meetings: &[Meeting],
    stats: &RunStats,
    parcels: &FeatureCollection,
) -> Result<()> {
    let mut write_failures = 0;
    for result in [
        storage.save_meetings(meetings),
        storage.save_petitions(meetings),
        storage.save_stats(stats),
        storage.save_parcels(parcels),
    ] {
        if let Err(err) = result {
            error!(source = source.id, error = %err, "artifact write failed");
            write_failures += 1;
        }
    }

    if write_failures == 4 {
        bail!("all artifact writes failed for source {}", source.id);
    }
    if write_failures > 0 {
        warn!(
            source = source.id,
            failed = write_failures,
            "run complete with degraded artifacts"
        );
    }
    Ok(())
}

/// Download each petition's attachments and extract parcel identifiers
/// from them. Every petition is attempted regardless of its neighbors'
/// failures.
fn process_attachments(
    scraper: &LegistarScraper<'_>,
    source: &SourceConfig,
    args: &ScrapeArgs,
    throttle: &Throttle,
    meetings: &mut [Meeting],
) -> Result<()> {
    let extractor = PinExtractor::new()?;
    let attachments_root = source.attachments_dir(&args.data_root);

    for meeting in meetings.iter_mut() {
        for petition in &mut meeting.petitions {
            let Some(url) = petition.legislation_url.clone() else {
                continue;
            };
            let key = petition.display_number().to_string();

            let saved = scraper.download_petition_attachments(
                &key,
                &url,
                &attachments_root,
                throttle.download_delay,
            );
            if saved.is_empty() {
                petition.pins = Some(Vec::new());
                continue;
            }

            let pins = extractor.extract_batch(&saved);
            info!(
                petition = %key,
                documents = saved.len(),
                pins = pins.len(),
                "extracted parcel identifiers"
            );
            petition.pins = Some(pins);
        }
    }

    Ok(())
}

/// Geometry is an enrichment: any failure here degrades to fewer features,
/// never a failed run.
fn fetch_geometry(
    http: &HttpClient,
    source: &SourceConfig,
    throttle: &Throttle,
    meetings: &[Meeting],
) -> FeatureCollection {
    let Some(gis_url) = source.gis_url else {
        info!(source = source.id, "no GIS endpoint configured, skipping geometry");
        return FeatureCollection::empty();
    };

    let client = GisClient::new(
        http,
        gis_url,
        source.gis_key_field,
        source.gis_alt_key_field,
        throttle.gis_delay,
    );
    let (parcels, _stats) = client.fetch_parcels_for_meetings(meetings);
    parcels
}

fn print_summary(source: &SourceConfig, storage: &Storage, meetings: &[Meeting], phase: RunPhase) {
    let stats = RunStats::compute(meetings);
    info!(source = source.id, %phase, "scrape run complete");

    println!("Scrape summary for {} ({})", source.name, source.state);
    println!("  meetings:            {}", stats.total_meetings);
    println!("  petitions:           {}", stats.total_petitions);
    println!("  petitions with PINs: {}", stats.petitions_with_pins);
    println!("  total PINs:          {}", stats.total_pins);
    println!("  meetings artifact:   {}", storage.meetings_path().display());
    println!("  petitions artifact:  {}", storage.petitions_path().display());
    println!("  parcels artifact:    {}", storage.parcels_path().display());
    println!("  stats artifact:      {}", storage.stats_path().display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn scrape_args(argv: &[&str]) -> ScrapeArgs {
        let mut full = vec!["townhall", "scrape"];
        full.extend_from_slice(argv);
        let crate::cli::Cli { command } = crate::cli::Cli::try_parse_from(full).unwrap();
        match command {
            crate::cli::Commands::Scrape(args) => args,
            _ => panic!("expected scrape command"),
        }
    }

    #[test]
    fn single_date_collapses_to_a_one_day_filter() {
        let filter = build_date_filter(&scrape_args(&["--date", "2026-01-20"])).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        assert_eq!(filter.start, Some(day));
        assert_eq!(filter.end, Some(day));
    }

    #[test]
    fn malformed_dates_fail_before_any_io() {
        assert!(build_date_filter(&scrape_args(&["--date", "01/20/2026"])).is_err());
        assert!(build_date_filter(&scrape_args(&["--start-date", "soon"])).is_err());
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let args = scrape_args(&["--start-date", "2026-02-01", "--end-date", "2026-01-01"]);
        let err = build_date_filter(&args).unwrap_err();
        assert!(err.to_string().contains("after"));
    }

    #[test]
    fn one_failed_artifact_write_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();
        let source = get_source("charlotte_nc").unwrap();

        // A directory squatting on the meetings path makes that one write fail.
        std::fs::create_dir(storage.meetings_path()).unwrap();

        let stats = RunStats::compute(&[]);
        write_artifacts(source, &storage, &[], &stats, &FeatureCollection::empty()).unwrap();

        assert!(storage.petitions_path().exists());
        assert!(storage.stats_path().exists());
        assert!(storage.parcels_path().exists());
    }

    #[test]
    fn all_artifact_writes_failing_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();
        let source = get_source("charlotte_nc").unwrap();

        for path in [
            storage.meetings_path(),
            storage.petitions_path(),
            storage.stats_path(),
            storage.parcels_path(),
        ] {
            std::fs::create_dir(path).unwrap();
        }

        let stats = RunStats::compute(&[]);
        let err =
            write_artifacts(source, &storage, &[], &stats, &FeatureCollection::empty())
                .unwrap_err();
        assert!(err.to_string().contains("all artifact writes failed"));
    }

    #[test]
    fn run_phases_have_stable_names() {
        assert_eq!(RunPhase::Init.to_string(), "init");
        assert_eq!(RunPhase::Saved.to_string(), "saved");
        assert_eq!(RunPhase::Failed.to_string(), "failed");
    }

    #[test]
    fn delay_overrides_replace_only_their_own_knob() {
        let throttle = build_throttle(&scrape_args(&["--page-delay-ms", "10"]));
        assert_eq!(throttle.page_delay, Duration::from_millis(10));
        assert_eq!(
            throttle.download_delay,
            Duration::from_millis(crate::config::DOWNLOAD_DELAY_MS)
        );
        assert_eq!(
            throttle.gis_delay,
            Duration::from_millis(crate::config::GIS_DELAY_MS)
        );

        let throttle = build_throttle(&scrape_args(&["--gis-delay-ms", "5"]));
        assert_eq!(throttle.gis_delay, Duration::from_millis(5));
        assert_eq!(
            throttle.page_delay,
            Duration::from_millis(crate::config::PAGE_DELAY_MS)
        );
    }
}
