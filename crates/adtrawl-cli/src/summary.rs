//! Human-readable run summary printed after a crawl.

use std::fmt::Write as _;

use adtrawl_crawler::{CrawlReport, FailureKind};

const SAMPLE_RECORDS: usize = 3;
const SAMPLE_SUB_URLS: usize = 2;

/// Renders the summary block for one session.
#[must_use]
pub fn render_summary(report: &CrawlReport) -> String {
    let total = report.records.len();
    let verified = report.verified_count();

    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(
        out,
        "session {} | query {:?} | region {}",
        report.session_id, report.query, report.region
    );
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "Finished:            {}", report.reason);
    let _ = writeln!(out, "Pages visited:       {}", report.pages_visited);
    let _ = writeln!(out, "Total advertisers:   {total}");
    let _ = writeln!(out, "Verified:            {verified}");
    let _ = writeln!(out, "Unverified:          {}", total - verified);
    let _ = writeln!(out, "With detail URL:     {}", report.with_detail_url_count());
    let _ = writeln!(out, "Sub-page URLs:       {}", report.sub_url_count());

    let failures: Vec<String> = FailureKind::ALL
        .iter()
        .map(|kind| (kind, report.failures.count(*kind)))
        .filter(|(_, count)| *count > 0)
        .map(|(kind, count)| format!("{}={count}", kind.as_str()))
        .collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "Failures:            {}", failures.join(", "));
    }

    if !report.records.is_empty() {
        let _ = writeln!(out, "\nSample records:");
    }
    for (i, record) in report.records.iter().take(SAMPLE_RECORDS).enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, record.identity());
        let _ = writeln!(out, "   Ads: {}", record.count());
        let _ = writeln!(
            out,
            "   Location: {}",
            record.location().as_deref().unwrap_or("-")
        );
        let _ = writeln!(out, "   Verified: {}", record.verified());
        if let Some(url) = record.detail_url() {
            let _ = writeln!(out, "   Detail URL: {url}");
        }
        for url in record.sub_urls().iter().take(SAMPLE_SUB_URLS) {
            let _ = writeln!(out, "   Sub-page: {url}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use adtrawl_core::Record;
    use adtrawl_crawler::{DoneReason, FailureCounters};
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn report(records: Vec<Record>, failures: FailureCounters) -> CrawlReport {
        CrawlReport {
            session_id: Uuid::nil(),
            query: "a".to_owned(),
            region: "US".to_owned(),
            pages_visited: 4,
            reason: DoneReason::PageLimitReached,
            records,
            failures,
        }
    }

    #[test]
    fn totals_and_reason_are_listed() {
        let mut acme = Record::new("Acme", Utc::now())
            .with_count_text(Some("~63 ads".to_owned()))
            .with_verified(true);
        acme.set_detail_url("https://adstransparency.google.com/advertiser/AR1".to_owned());
        let text = render_summary(&report(
            vec![acme, Record::new("Globex", Utc::now())],
            FailureCounters::default(),
        ));

        assert!(text.contains("Finished:            page_limit_reached"));
        assert!(text.contains("Total advertisers:   2"));
        assert!(text.contains("Verified:            1"));
        assert!(text.contains("Unverified:          1"));
        assert!(text.contains("With detail URL:     1"));
        assert!(text.contains("1. Acme\n   Ads: 63"));
        assert!(!text.contains("Failures:"));
    }

    #[test]
    fn only_three_samples_are_shown() {
        let records = ["A", "B", "C", "D"]
            .iter()
            .map(|n| Record::new(n, Utc::now()))
            .collect();
        let text = render_summary(&report(records, FailureCounters::default()));
        assert!(text.contains("3. C"));
        assert!(!text.contains("4. D"));
    }

    #[test]
    fn non_zero_failures_are_listed() {
        let mut failures = FailureCounters::default();
        failures.record(FailureKind::Duplicate);
        failures.record(FailureKind::Duplicate);
        failures.record(FailureKind::DetailVisit);
        let text = render_summary(&report(Vec::new(), failures));
        assert!(text.contains("Failures:            duplicates=2, detail_visit=1"));
        assert!(!text.contains("Sample records"));
    }
}
