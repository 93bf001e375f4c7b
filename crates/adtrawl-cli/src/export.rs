//! Writes crawl reports to disk.
//!
//! Each session produces three files sharing one stem:
//! - `<stem>_advertisers.csv`: one flat row per record;
//! - `<stem>_by_advertiser.json`: records grouped with their sub-page URLs;
//! - `<stem>_sub_urls.json`: a flat list of every sub-page URL.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use adtrawl_core::{ExportRow, Record};
use adtrawl_crawler::CrawlReport;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Files written for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub grouped_json: PathBuf,
    pub sub_urls_json: PathBuf,
}

#[derive(Debug, Serialize)]
struct GroupedExport<'a> {
    session_id: String,
    query: &'a str,
    region: &'a str,
    reason: &'static str,
    pages_visited: u32,
    total_advertisers: usize,
    advertisers: Vec<GroupedAdvertiser<'a>>,
}

#[derive(Debug, Serialize)]
struct GroupedAdvertiser<'a> {
    identity: &'a str,
    detail_url: Option<&'a str>,
    verified: bool,
    count: u64,
    location: Option<String>,
    sub_urls: Vec<&'a str>,
    total_sub_urls: usize,
}

#[derive(Debug, Serialize)]
struct SubUrlRow<'a> {
    identity: &'a str,
    detail_url: Option<&'a str>,
    sub_url: &'a str,
    discovered_at: DateTime<Utc>,
}

/// File name stem for a session: sanitized query, sanitized region and the
/// first eight characters of the session id.
#[must_use]
pub fn file_stem(report: &CrawlReport) -> String {
    let query = sanitize(&report.query, "query");
    let region = sanitize(&report.region, "region");
    let id = report.session_id.simple().to_string();
    format!("{query}_{region}_{}", &id[..8])
}

/// Lowercases ASCII alphanumerics and turns everything else into `-`, so the
/// result is a single path component.
fn sanitize(raw: &str, fallback: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let trimmed = mapped.trim_matches('-');
    if trimmed.is_empty() {
        fallback.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Writes all three export files for `report` into `dir`, creating it if
/// needed.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written.
pub fn export_report(dir: &Path, report: &CrawlReport) -> anyhow::Result<ExportPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let stem = file_stem(report);
    let paths = ExportPaths {
        csv: dir.join(format!("{stem}_advertisers.csv")),
        grouped_json: dir.join(format!("{stem}_by_advertiser.json")),
        sub_urls_json: dir.join(format!("{stem}_sub_urls.json")),
    };

    write_csv(create(&paths.csv)?, &report.records)
        .with_context(|| format!("failed to write {}", paths.csv.display()))?;
    write_grouped_json(create(&paths.grouped_json)?, report)
        .with_context(|| format!("failed to write {}", paths.grouped_json.display()))?;
    write_sub_urls_json(create(&paths.sub_urls_json)?, &report.records)
        .with_context(|| format!("failed to write {}", paths.sub_urls_json.display()))?;

    tracing::info!(
        session_id = %report.session_id,
        csv = %paths.csv.display(),
        records = report.records.len(),
        "results exported"
    );
    Ok(paths)
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// One CSV row per record, in discovery order, with a header row.
///
/// # Errors
///
/// Returns an error if a row cannot be serialized or written.
pub fn write_csv<W: Write>(writer: W, records: &[Record]) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(ExportRow::from(record))?;
    }
    csv.flush()?;
    Ok(())
}

/// # Errors
///
/// Returns an error if the document cannot be serialized or written.
pub fn write_grouped_json<W: Write>(mut writer: W, report: &CrawlReport) -> anyhow::Result<()> {
    let advertisers = report
        .records
        .iter()
        .map(|record| GroupedAdvertiser {
            identity: record.identity(),
            detail_url: record.detail_url(),
            verified: record.verified(),
            count: record.count(),
            location: record.location(),
            sub_urls: record.sub_urls().iter().map(String::as_str).collect(),
            total_sub_urls: record.sub_urls().len(),
        })
        .collect();
    let export = GroupedExport {
        session_id: report.session_id.to_string(),
        query: &report.query,
        region: &report.region,
        reason: report.reason.as_str(),
        pages_visited: report.pages_visited,
        total_advertisers: report.records.len(),
        advertisers,
    };
    serde_json::to_writer_pretty(&mut writer, &export)?;
    writer.flush()?;
    Ok(())
}

/// # Errors
///
/// Returns an error if the list cannot be serialized or written.
pub fn write_sub_urls_json<W: Write>(mut writer: W, records: &[Record]) -> anyhow::Result<()> {
    let rows: Vec<SubUrlRow<'_>> = records
        .iter()
        .flat_map(|record| {
            record.sub_urls().iter().map(move |sub_url| SubUrlRow {
                identity: record.identity(),
                detail_url: record.detail_url(),
                sub_url,
                discovered_at: record.discovered_at(),
            })
        })
        .collect();
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use adtrawl_crawler::{DoneReason, FailureCounters};
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn report() -> CrawlReport {
        let mut acme = Record::new("Acme", at())
            .with_count_text(Some("~1,200 ads".to_owned()))
            .with_location_text(Some("United States".to_owned()))
            .with_verified(true);
        acme.set_detail_url("https://adstransparency.google.com/advertiser/AR1".to_owned());
        acme.insert_sub_url("https://adstransparency.google.com/advertiser/AR1/creative/CR2".to_owned());
        acme.insert_sub_url("https://adstransparency.google.com/advertiser/AR1/creative/CR1".to_owned());
        let plain = Record::new("Plain, Inc.", at());

        CrawlReport {
            session_id: Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0),
            query: "Running Shoes!".to_owned(),
            region: "US".to_owned(),
            pages_visited: 2,
            reason: DoneReason::EndOfResults,
            records: vec![acme, plain],
            failures: FailureCounters::default(),
        }
    }

    #[test]
    fn csv_has_header_and_flat_rows() {
        let mut out = Vec::new();
        write_csv(&mut out, &report().records).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("identity,raw_count_text,count,raw_location_text,location,verified,detail_url,sub_url_count,discovered_at")
        );
        let acme = lines.next().unwrap();
        assert!(acme.starts_with("Acme,\"~1,200 ads\",1200,United States,United States,true,"));
        assert!(acme.contains(",2,2026-03-01T12:00:00Z"));
        assert!(lines.next().unwrap().starts_with("\"Plain, Inc.\",,0,,,false,,0,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn grouped_json_nests_sub_urls() {
        let mut out = Vec::new();
        write_grouped_json(&mut out, &report()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["reason"], "end_of_results");
        assert_eq!(value["total_advertisers"], 2);
        assert_eq!(value["advertisers"][0]["total_sub_urls"], 2);
        assert_eq!(
            value["advertisers"][0]["sub_urls"][0],
            "https://adstransparency.google.com/advertiser/AR1/creative/CR1"
        );
        assert!(value["advertisers"][1]["detail_url"].is_null());
    }

    #[test]
    fn sub_url_list_is_flat() {
        let mut out = Vec::new();
        write_sub_urls_json(&mut out, &report().records).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["identity"], "Acme");
        assert_eq!(
            rows[1]["sub_url"],
            "https://adstransparency.google.com/advertiser/AR1/creative/CR2"
        );
        assert_eq!(rows[0]["discovered_at"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn stem_is_filesystem_safe() {
        assert_eq!(file_stem(&report()), "running-shoes_us_12345678");
    }

    #[test]
    fn region_with_separators_stays_one_path_component() {
        let mut report = report();
        report.region = "u/s".to_owned();
        assert_eq!(file_stem(&report), "running-shoes_u-s_12345678");

        let dir = std::env::temp_dir().join(format!("adtrawl-export-{}", Uuid::new_v4()));
        let paths = export_report(&dir, &report).unwrap();
        assert_eq!(paths.csv.parent(), Some(dir.as_path()));
        assert!(paths.csv.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
