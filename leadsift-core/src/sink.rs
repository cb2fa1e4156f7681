// Incremental result persistence: leads.csv, skipped.log, run_summary.json

use crate::error::{LeadError, Result};
use crate::model::LeadRow;
use chrono::{DateTime, Utc};
use csv::{Terminator, WriterBuilder};
use leadsift_scanner::FetchStatsSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub const LEADS_FILE: &str = "leads.csv";
pub const SKIPPED_FILE: &str = "skipped.log";
pub const SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEntry {
    pub domain: String,
    pub stage: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub domain: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCounters {
    pub requests: u64,
    pub retries: u64,
    pub rate_limited: u64,
    pub failed_fetches: u64,
    pub robots_denied: u64,
}

impl From<FetchStatsSnapshot> for RateLimitCounters {
    fn from(stats: FetchStatsSnapshot) -> Self {
        Self {
            requests: stats.requests,
            retries: stats.retries,
            rate_limited: stats.rate_limited,
            failed_fetches: stats.failures,
            robots_denied: stats.denied,
        }
    }
}

/// Counters and lists accumulated over one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub domains_submitted: u64,
    pub domains_processed: u64,
    pub domains_completed: u64,
    pub domains_skipped: u64,
    pub domains_failed: u64,
    pub snowball_domains: u64,
    pub pages_fetched: u64,
    pub emails_found: u64,
    pub leads: u64,
    pub rate_limits: RateLimitCounters,
    pub skipped: Vec<SkipEntry>,
    pub errors: Vec<ErrorEntry>,
}

/// The run log as written to `run_summary.json`.
pub type RunSummary = RunLog;

impl RunLog {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: 0.0,
            domains_submitted: 0,
            domains_processed: 0,
            domains_completed: 0,
            domains_skipped: 0,
            domains_failed: 0,
            snowball_domains: 0,
            pages_fetched: 0,
            emails_found: 0,
            leads: 0,
            rate_limits: RateLimitCounters::default(),
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Encode records as CSV lines, quoting fields where needed.
fn encode_records<I, R, F>(records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| LeadError::Io(e.into_error()))
}

struct SinkState {
    leads: File,
    skipped: File,
    log: RunLog,
    rows: Vec<LeadRow>,
}

/// Owns the output directory for one run. Safe to share between domain tasks.
pub struct ResultSink {
    dir: PathBuf,
    started: Instant,
    state: Mutex<SinkState>,
}

impl ResultSink {
    /// Create `dir` if needed and start fresh output files.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut leads = File::create(dir.join(LEADS_FILE))?;
        leads.write_all(&encode_records([LeadRow::COLUMNS])?)?;
        leads.flush()?;

        let skipped = File::create(dir.join(SKIPPED_FILE))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            started: Instant::now(),
            state: Mutex::new(SinkState {
                leads,
                skipped,
                log: RunLog::new(),
                rows: Vec::new(),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist every row of one domain with a single write, then record them.
    pub fn append_domain(&self, rows: &[LeadRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let buffer = encode_records(rows.iter().map(LeadRow::fields))?;

        let mut state = self.state();
        state.leads.write_all(&buffer)?;
        state.leads.flush()?;

        state.log.leads += rows.len() as u64;
        state.rows.extend_from_slice(rows);
        Ok(())
    }

    fn write_skip_line(state: &mut SinkState, domain: &str, reason: &str) {
        let written = encode_records([[domain, reason]]).and_then(|line| {
            state.skipped.write_all(&line)?;
            state.skipped.flush()?;
            Ok(())
        });
        if let Err(e) = written {
            warn!(domain, error = %e, "Failed to write skip log");
        }
    }

    pub fn record_skip(&self, domain: &str, stage: &str, reason: &str) {
        let mut state = self.state();
        Self::write_skip_line(&mut state, domain, reason);
        state.log.domains_skipped += 1;
        state.log.skipped.push(SkipEntry {
            domain: domain.to_string(),
            stage: stage.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn record_error(&self, domain: &str, message: &str) {
        let mut state = self.state();
        Self::write_skip_line(&mut state, domain, &format!("error: {}", message));
        state.log.domains_failed += 1;
        state.log.errors.push(ErrorEntry {
            domain: domain.to_string(),
            message: message.to_string(),
        });
    }

    pub fn note_submitted(&self) {
        self.state().log.domains_submitted += 1;
    }

    pub fn note_processed(&self, completed: bool) {
        let mut state = self.state();
        state.log.domains_processed += 1;
        if completed {
            state.log.domains_completed += 1;
        }
    }

    pub fn note_pages(&self, pages: usize) {
        self.state().log.pages_fetched += pages as u64;
    }

    pub fn note_emails(&self, emails: usize) {
        self.state().log.emails_found += emails as u64;
    }

    pub fn note_snowball(&self, accepted: usize) {
        self.state().log.snowball_domains += accepted as u64;
    }

    /// Rows persisted so far, in write order.
    pub fn rows(&self) -> Vec<LeadRow> {
        self.state().rows.clone()
    }

    pub fn snapshot(&self) -> RunLog {
        self.state().log.clone()
    }

    /// Stamp timing and fetch counters, write `run_summary.json`.
    pub fn finish(&self, stats: FetchStatsSnapshot) -> Result<RunSummary> {
        let summary = {
            let mut state = self.state();
            state.log.finished_at = Some(Utc::now());
            state.log.duration_secs = self.started.elapsed().as_secs_f64();
            state.log.rate_limits = stats.into();
            state.log.clone()
        };

        let path = self.dir.join(SUMMARY_FILE);
        fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        info!(path = %path.display(), run_id = %summary.run_id, "Run summary written");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_records_quotes_fields() {
        let encoded = encode_records([
            ["plain", "Tours, Ltd"],
            ["The \"Best\" Tours", "a\nb"],
        ])
        .unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "plain,\"Tours, Ltd\"\n\"The \"\"Best\"\" Tours\",\"a\nb\"\n"
        );
    }

    #[test]
    fn test_create_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::create(dir.path()).unwrap();
        let content = fs::read_to_string(dir.path().join(LEADS_FILE)).unwrap();
        assert_eq!(content, format!("{}\n", LeadRow::COLUMNS.join(",")));
        assert!(dir.path().join(SKIPPED_FILE).exists());
        assert_eq!(sink.dir(), dir.path());
    }

    #[test]
    fn test_skip_and_error_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::create(dir.path()).unwrap();
        sink.record_skip("hotel.gr", "pre_crawl", "excluded region TLD .gr");
        sink.record_error("broken.com", "boom");

        let content = fs::read_to_string(dir.path().join(SKIPPED_FILE)).unwrap();
        assert_eq!(
            content,
            "hotel.gr,excluded region TLD .gr\nbroken.com,error: boom\n"
        );
        let log = sink.snapshot();
        assert_eq!(log.domains_skipped, 1);
        assert_eq!(log.domains_failed, 1);
        assert_eq!(log.skipped[0].stage, "pre_crawl");
        assert_eq!(log.errors[0].message, "boom");
    }

    #[test]
    fn test_finish_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::create(dir.path()).unwrap();
        sink.note_submitted();
        sink.note_processed(true);

        let stats = FetchStatsSnapshot {
            requests: 7,
            retries: 2,
            rate_limited: 1,
            failures: 1,
            denied: 0,
        };
        let summary = sink.finish(stats).unwrap();
        assert!(summary.finished_at.is_some());
        assert_eq!(summary.rate_limits.rate_limited, 1);

        let written: RunLog = serde_json::from_str(
            &fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(written.run_id, summary.run_id);
        assert_eq!(written.domains_completed, 1);
        assert_eq!(written.rate_limits.requests, 7);
    }
}
