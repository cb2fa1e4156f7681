// Domain scheduler: queue, bounded concurrency, per-domain task steps

use crate::ai::{ExternalEmailSource, OpenAiEmailSource};
use crate::config::{FetchMode, PipelineConfig};
use crate::domain::{RegionFilter, normalize_domain};
use crate::email::{EmailExtractor, visible_text};
use crate::error::{LeadError, Result};
use crate::model::{DomainRecord, LeadRow};
use crate::relevance::RelevanceScorer;
use crate::sink::{ResultSink, RunSummary};
use crate::snowball::SnowballExpander;
use futures::FutureExt;
use leadsift_scanner::links::page_title;
use leadsift_scanner::{
    AllowAll, AllowPolicy, BrowserlessStrategy, DomainCrawler, FetchStats, FetchStrategy,
    HttpStrategy, PageCache, PageFetcher, PageResult, RobotsPolicy, ScanError,
};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use url::Url;

/// Lifecycle of a domain inside one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainState {
    Pending,
    InFlight,
    Completed,
    SkippedPreCrawl,
    SkippedPostCrawl,
    Failed,
}

impl DomainState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainState::Pending => "pending",
            DomainState::InFlight => "in_flight",
            DomainState::Completed => "completed",
            DomainState::SkippedPreCrawl => "skipped_pre_crawl",
            DomainState::SkippedPostCrawl => "skipped_post_crawl",
            DomainState::Failed => "failed",
        }
    }
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one domain task.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainOutcome {
    Completed { leads: usize },
    SkippedPreCrawl { reason: String },
    SkippedPostCrawl { reason: String },
    Failed { message: String },
}

impl DomainOutcome {
    pub fn state(&self) -> DomainState {
        match self {
            DomainOutcome::Completed { .. } => DomainState::Completed,
            DomainOutcome::SkippedPreCrawl { .. } => DomainState::SkippedPreCrawl,
            DomainOutcome::SkippedPostCrawl { .. } => DomainState::SkippedPostCrawl,
            DomainOutcome::Failed { .. } => DomainState::Failed,
        }
    }

    pub fn label(&self) -> &'static str {
        self.state().as_str()
    }
}

impl fmt::Display for DomainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainOutcome::Completed { leads } => write!(f, "completed ({} leads)", leads),
            DomainOutcome::SkippedPreCrawl { reason } | DomainOutcome::SkippedPostCrawl { reason } => {
                write!(f, "{}: {}", self.label(), reason)
            }
            DomainOutcome::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

/// Called after every finished domain task.
pub type ProgressCallback = Arc<dyn Fn(&str, &DomainOutcome) + Send + Sync>;

#[derive(Debug)]
struct DomainTask {
    record: DomainRecord,
    depth: usize,
}

/// State shared by the scheduler and every domain task.
struct Shared {
    config: PipelineConfig,
    crawler: DomainCrawler,
    extractor: EmailExtractor,
    scorer: RelevanceScorer,
    expander: SnowballExpander,
    filter: RegionFilter,
    sink: Arc<ResultSink>,
    stats: Arc<FetchStats>,
    processed: Mutex<HashSet<String>>,
    queue: mpsc::UnboundedSender<DomainTask>,
}

pub struct Pipeline {
    shared: Arc<Shared>,
    receiver: AsyncMutex<mpsc::UnboundedReceiver<DomainTask>>,
    semaphore: Arc<Semaphore>,
    progress: Option<ProgressCallback>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Crawl origin for a record: the sample URL's origin when it belongs to the
/// record's domain, `https://{domain}/` otherwise.
fn origin_for(record: &DomainRecord) -> Result<Url> {
    if let Ok(sample) = Url::parse(&record.sample_url)
        && let Some(host) = sample.host_str()
        && normalize_domain(host).as_deref() == Some(record.domain.as_str())
        && let Ok(origin) = sample.join("/")
    {
        return Ok(origin);
    }
    Url::parse(&format!("https://{}/", record.domain))
        .map_err(|e| LeadError::Scan(ScanError::InvalidUrl(format!("{}: {}", record.domain, e))))
}

/// Display name: the record's title, else the homepage `<title>` up to the
/// first separator, else the domain.
fn business_name(record: &DomainRecord, pages: &[PageResult]) -> String {
    let title = record.title.trim();
    if !title.is_empty() {
        return title.to_string();
    }
    pages
        .first()
        .and_then(|home| page_title(&home.html))
        .and_then(|t| {
            t.split(['|', '–', '—'])
                .flat_map(|part| part.split(" - "))
                .map(str::trim)
                .find(|part| !part.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| record.domain.clone())
}

impl Shared {
    fn add_domain(&self, mut record: DomainRecord, depth: usize) -> bool {
        let Some(domain) = normalize_domain(&record.domain) else {
            debug!(domain = %record.domain, "Ignoring unusable domain");
            return false;
        };
        record.domain = domain;

        {
            let mut processed = self
                .processed
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !processed.insert(record.domain.clone()) {
                return false;
            }
        }

        self.sink.note_submitted();
        self.queue.send(DomainTask { record, depth }).is_ok()
    }

    async fn process(&self, task: &DomainTask) -> Result<DomainOutcome> {
        let record = &task.record;

        if let Some(reason) = self.filter.exclusion_reason(&record.domain) {
            return Ok(DomainOutcome::SkippedPreCrawl { reason });
        }

        let origin = origin_for(record)?;
        let pages = self.crawler.crawl(&origin).await;
        self.sink.note_pages(pages.len());
        if pages.is_empty() {
            return Ok(DomainOutcome::SkippedPostCrawl {
                reason: "no pages fetched".to_string(),
            });
        }

        let texts: Vec<String> = pages.iter().map(|p| visible_text(&p.html)).collect();
        let emails = self.extractor.extract_with_texts(&pages, &texts).await;
        self.sink.note_emails(emails.len());

        let mut combined = format!("{} {}", record.title, record.snippet);
        for text in &texts {
            combined.push(' ');
            combined.push_str(text);
        }
        let relevance = self.scorer.score(&combined, &self.config.unrelated_keywords);
        debug!(
            domain = %record.domain,
            score = relevance.score,
            terms = ?relevance.matched_terms,
            "Relevance"
        );

        if self.config.snowball.enabled && task.depth < self.config.snowball.max_depth {
            self.snowball(record, &pages, task.depth);
        }

        if relevance.score < self.config.min_relevance {
            return Ok(DomainOutcome::SkippedPostCrawl {
                reason: format!(
                    "relevance {} below {}",
                    relevance.score, self.config.min_relevance
                ),
            });
        }
        if emails.is_empty() {
            return Ok(DomainOutcome::SkippedPostCrawl {
                reason: "no valid emails".to_string(),
            });
        }

        let name = business_name(record, &pages);
        let rows: Vec<LeadRow> = emails
            .iter()
            .map(|email| LeadRow::from_candidate(record, &name, email, relevance.score))
            .collect();
        self.sink.append_domain(&rows)?;

        Ok(DomainOutcome::Completed { leads: rows.len() })
    }

    fn snowball(&self, source: &DomainRecord, pages: &[PageResult], depth: usize) {
        let limit = self.config.snowball.max_new_per_source;
        let mut accepted = 0;

        for domain in self.expander.expand(pages, &source.domain) {
            if accepted >= limit {
                break;
            }
            if let Some(reason) = self.filter.exclusion_reason(&domain) {
                debug!(domain = %domain, reason = %reason, "Snowball candidate excluded");
                continue;
            }
            let record =
                DomainRecord::from_domain(domain, format!("snowball:{}", source.domain));
            if self.add_domain(record, depth + 1) {
                accepted += 1;
            }
        }

        if accepted > 0 {
            info!(source = %source.domain, added = accepted, "Snowball expansion");
            self.sink.note_snowball(accepted);
        }
    }

    fn record_outcome(&self, domain: &str, outcome: &DomainOutcome) {
        match outcome {
            DomainOutcome::Completed { leads } => {
                info!(domain, leads, "Domain completed");
            }
            DomainOutcome::SkippedPreCrawl { reason } => {
                debug!(domain, reason = %reason, "Skipped before crawl");
                self.sink.record_skip(domain, "pre_crawl", reason);
            }
            DomainOutcome::SkippedPostCrawl { reason } => {
                debug!(domain, reason = %reason, "Skipped after crawl");
                self.sink.record_skip(domain, "post_crawl", reason);
            }
            DomainOutcome::Failed { message } => {
                warn!(domain, error = %message, "Domain failed");
                self.sink.record_error(domain, message);
            }
        }
        self.sink
            .note_processed(matches!(outcome, DomainOutcome::Completed { .. }));
    }
}

impl Pipeline {
    /// Wire the pipeline from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        strategy: Arc<dyn FetchStrategy>,
        policy: Arc<dyn AllowPolicy>,
        external: Option<Arc<dyn ExternalEmailSource>>,
        sink: Arc<ResultSink>,
    ) -> Self {
        let stats = Arc::new(FetchStats::default());
        let fetcher = PageFetcher::new(strategy, policy, config.fetch_options())
            .with_stats(stats.clone());
        let crawler = DomainCrawler::new(Arc::new(fetcher), Arc::new(PageCache::new()))
            .with_options(config.crawl_options());

        let mut extractor = EmailExtractor::new(config.max_emails_per_domain);
        if let Some(source) = external {
            extractor = extractor.with_external(source, config.external.max_chars);
        }

        let (queue, receiver) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(config.effective_domain_concurrency()));

        let shared = Shared {
            crawler,
            extractor,
            scorer: RelevanceScorer::from_profile(&config.profile),
            expander: SnowballExpander::from_profile(&config.profile),
            filter: RegionFilter::new(&config.profile.excluded_tlds, &config.profile.excluded_terms),
            sink,
            stats,
            processed: Mutex::new(HashSet::new()),
            queue,
            config,
        };

        Self {
            shared: Arc::new(shared),
            receiver: AsyncMutex::new(receiver),
            semaphore,
            progress: None,
        }
    }

    /// Build the production collaborators described by `config`.
    pub fn from_config(config: PipelineConfig, sink: Arc<ResultSink>) -> Result<Self> {
        config.validate()?;
        let timeout = config.timeout();

        let strategy: Arc<dyn FetchStrategy> = match &config.fetch_mode {
            FetchMode::Http => Arc::new(HttpStrategy::new(timeout)?),
            FetchMode::Browser {
                endpoint,
                token,
                delay_ms,
            } => Arc::new(BrowserlessStrategy::new(
                endpoint,
                token.as_deref(),
                Duration::from_millis(*delay_ms),
            )?),
        };

        let policy: Arc<dyn AllowPolicy> = if config.respect_robots {
            Arc::new(RobotsPolicy::new(timeout)?)
        } else {
            Arc::new(AllowAll)
        };

        let external: Option<Arc<dyn ExternalEmailSource>> = if config.external.enabled {
            let source = OpenAiEmailSource::new(
                config.external.api_key.clone(),
                config.external.model.clone(),
                timeout * 2,
            )?
            .with_base_url(config.external.base_url.clone());
            Some(Arc::new(source))
        } else {
            None
        };

        info!(
            fetch = strategy.name(),
            domain_concurrency = config.effective_domain_concurrency(),
            page_concurrency = config.effective_page_concurrency(),
            robots = config.respect_robots,
            external = external.is_some(),
            "Pipeline configured"
        );

        Ok(Self::new(config, strategy, policy, external, sink))
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn sink(&self) -> Arc<ResultSink> {
        self.shared.sink.clone()
    }

    /// Queue a domain unless it was already accepted this run.
    pub fn add_domain(&self, record: DomainRecord, depth: usize) -> bool {
        self.shared.add_domain(record, depth)
    }

    /// Process `seeds` and everything they snowball into, then write the summary.
    pub async fn run(&self, seeds: Vec<DomainRecord>) -> Result<RunSummary> {
        let mut submitted = 0;
        for record in seeds {
            if self.add_domain(record, 0) {
                submitted += 1;
            }
        }
        info!("Starting run with {} seed domains", submitted);

        let mut receiver = self.receiver.lock().await;
        let mut tasks: JoinSet<(String, DomainOutcome)> = JoinSet::new();

        loop {
            if tasks.is_empty() {
                match receiver.try_recv() {
                    Ok(task) => {
                        self.spawn(&mut tasks, task);
                        continue;
                    }
                    // Nothing queued and nothing in flight
                    Err(_) => break,
                }
            }

            tokio::select! {
                Some(task) = receiver.recv() => self.spawn(&mut tasks, task),
                Some(joined) = tasks.join_next() => self.on_joined(joined),
                else => break,
            }
        }

        let summary = self.shared.sink.finish(self.shared.stats.snapshot())?;
        info!(
            processed = summary.domains_processed,
            completed = summary.domains_completed,
            leads = summary.leads,
            "Run finished"
        );
        Ok(summary)
    }

    fn spawn(&self, tasks: &mut JoinSet<(String, DomainOutcome)>, task: DomainTask) {
        let shared = self.shared.clone();
        let semaphore = self.semaphore.clone();

        tasks.spawn(async move {
            let domain = task.record.domain.clone();
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    debug!(domain = %domain, depth = task.depth, "Domain in flight");
                    match AssertUnwindSafe(shared.process(&task)).catch_unwind().await {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(e)) => DomainOutcome::Failed {
                            message: e.to_string(),
                        },
                        Err(payload) => DomainOutcome::Failed {
                            message: LeadError::Panic(panic_message(payload)).to_string(),
                        },
                    }
                }
                Err(e) => DomainOutcome::Failed {
                    message: e.to_string(),
                },
            };
            shared.record_outcome(&domain, &outcome);
            (domain, outcome)
        });
    }

    fn on_joined(&self, joined: std::result::Result<(String, DomainOutcome), JoinError>) {
        match joined {
            Ok((domain, outcome)) => {
                if let Some(progress) = &self.progress {
                    progress(&domain, &outcome);
                }
            }
            Err(e) => error!("Domain task aborted: {}", e),
        }
    }
}
