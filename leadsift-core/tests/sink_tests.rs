// Tests for result persistence

use leadsift_core::model::{DomainRecord, EmailCandidate, EmailType, ExtractedBy, LeadRow};
use leadsift_core::sink::{LEADS_FILE, ResultSink, SUMMARY_FILE};
use leadsift_scanner::FetchStatsSnapshot;
use std::fs;

fn rows_for(domain: &str, locals: &[&str]) -> Vec<LeadRow> {
    let record = DomainRecord::from_domain(domain, "greece tours");
    locals
        .iter()
        .map(|local| {
            let candidate = EmailCandidate {
                email: format!("{}@{}", local, domain),
                email_type: EmailType::Generic,
                confidence: 0.9,
                source_url: format!("https://{}/contact", domain),
                extracted_by: ExtractedBy::Regex,
            };
            LeadRow::from_candidate(&record, "Tours, \"Best\" Ltd", &candidate, 3)
        })
        .collect()
}

#[test]
fn test_rows_durable_before_next_domain() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ResultSink::create(dir.path()).unwrap();

    sink.append_domain(&rows_for("one.com", &["info", "sales"]))
        .unwrap();

    // Interrupted before the second domain is written
    let content = fs::read_to_string(dir.path().join(LEADS_FILE)).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("info@one.com"));
    assert!(lines[2].contains("sales@one.com"));
    assert!(!content.contains("two.com"));
    drop(sink);

    assert!(!dir.path().join(SUMMARY_FILE).exists());
    let after_drop = fs::read_to_string(dir.path().join(LEADS_FILE)).unwrap();
    assert_eq!(after_drop, content);
}

#[test]
fn test_fields_are_quoted() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ResultSink::create(dir.path()).unwrap();
    sink.append_domain(&rows_for("one.com", &["info"])).unwrap();

    let content = fs::read_to_string(dir.path().join(LEADS_FILE)).unwrap();
    assert_eq!(
        content.lines().nth(1).unwrap(),
        "\"Tours, \"\"Best\"\" Ltd\",one.com,,,info@one.com,generic,0.90,3,https://one.com/contact,greece tours"
    );
}

#[test]
fn test_domains_appended_in_completion_order() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ResultSink::create(dir.path()).unwrap();
    sink.append_domain(&rows_for("two.com", &["info"])).unwrap();
    sink.append_domain(&rows_for("one.com", &["info"])).unwrap();
    sink.append_domain(&[]).unwrap();

    let domains: Vec<String> = sink.rows().into_iter().map(|r| r.domain).collect();
    assert_eq!(domains, vec!["two.com", "one.com"]);

    let summary = sink.finish(FetchStatsSnapshot::default()).unwrap();
    assert_eq!(summary.leads, 2);
}

#[test]
fn test_create_truncates_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    {
        let sink = ResultSink::create(dir.path()).unwrap();
        sink.append_domain(&rows_for("old.com", &["info"])).unwrap();
        sink.record_skip("old.gr", "pre_crawl", "excluded region TLD .gr");
    }

    let _sink = ResultSink::create(dir.path()).unwrap();
    let leads = fs::read_to_string(dir.path().join(LEADS_FILE)).unwrap();
    assert_eq!(leads.lines().count(), 1);
    let skipped = fs::read_to_string(dir.path().join("skipped.log")).unwrap();
    assert!(skipped.is_empty());
}

#[test]
fn test_create_makes_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("runs").join("latest");
    ResultSink::create(&nested).unwrap();
    assert!(nested.join(LEADS_FILE).exists());
}
