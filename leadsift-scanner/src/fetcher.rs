use crate::error::{Result, ScanError};
use crate::robots::AllowPolicy;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; leadsift/0.1; +https://github.com/trapdoorsec/leadsift)";

/// Per-request settings shared by every fetch of a run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Total attempts per URL, including the first.
    pub retries: usize,
    /// Sleep between attempt `i` and `i + 1`; the last entry repeats.
    pub backoff: Vec<Duration>,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            retries: 3,
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchOptions {
    fn delay_after(&self, attempt: usize) -> Option<Duration> {
        self.backoff
            .get(attempt)
            .or_else(|| self.backoff.last())
            .copied()
    }
}

/// Run-wide fetch counters.
#[derive(Debug, Default)]
pub struct FetchStats {
    pub requests: AtomicU64,
    pub retries: AtomicU64,
    pub rate_limited: AtomicU64,
    pub failures: AtomicU64,
    pub denied: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStatsSnapshot {
    pub requests: u64,
    pub retries: u64,
    pub rate_limited: u64,
    pub failures: u64,
    pub denied: u64,
}

impl FetchStats {
    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
        }
    }
}

/// A single raw fetch attempt. Retries, robots and caching live above this.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<String>;

    /// Delay between sequential page fetches of one domain, for strategies that
    /// must not fan out.
    fn pacing(&self) -> Option<Duration> {
        None
    }

    fn name(&self) -> &'static str;
}

/// Plain HTTP via a pooled reqwest client.
pub struct HttpStrategy {
    client: Client,
}

impl HttpStrategy {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchStrategy for HttpStrategy {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, &options.user_agent)
            .timeout(options.timeout)
            .send()
            .await?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());
        if let Some(content_type) = content_type
            && !(content_type.contains("html") || content_type.contains("text/plain"))
        {
            return Err(ScanError::NotHtml {
                url: url.to_string(),
                content_type,
            });
        }

        Ok(response.text().await?)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Rendered HTML from a Browserless `/content` endpoint.
pub struct BrowserlessStrategy {
    client: Client,
    endpoint: String,
    token: Option<String>,
    delay: Duration,
}

impl BrowserlessStrategy {
    pub fn new(endpoint: &str, token: Option<&str>, delay: Duration) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            delay,
        })
    }
}

#[async_trait]
impl FetchStrategy for BrowserlessStrategy {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<String> {
        let mut endpoint = format!("{}/content", self.endpoint);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let body = serde_json::json!({
            "url": url.as_str(),
            "userAgent": options.user_agent,
            "gotoOptions": { "timeout": options.timeout.as_millis() as u64 },
        });

        let response = self
            .client
            .post(&endpoint)
            .timeout(options.timeout + Duration::from_secs(5))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScanError::Browser(format!(
                "{} for {}: {}",
                status.as_u16(),
                url,
                message
            )));
        }

        Ok(response.text().await?)
    }

    fn pacing(&self) -> Option<Duration> {
        Some(self.delay)
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

/// Fetches one URL with the allow policy applied first and the backoff schedule on failure.
pub struct PageFetcher {
    strategy: Arc<dyn FetchStrategy>,
    policy: Arc<dyn AllowPolicy>,
    options: FetchOptions,
    stats: Arc<FetchStats>,
}

impl PageFetcher {
    pub fn new(
        strategy: Arc<dyn FetchStrategy>,
        policy: Arc<dyn AllowPolicy>,
        options: FetchOptions,
    ) -> Self {
        Self {
            strategy,
            policy,
            options,
            stats: Arc::new(FetchStats::default()),
        }
    }

    pub fn with_stats(mut self, stats: Arc<FetchStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> Arc<FetchStats> {
        self.stats.clone()
    }

    pub fn pacing(&self) -> Option<Duration> {
        self.strategy.pacing()
    }

    /// `Ok(None)` when the allow policy denies the URL.
    pub async fn fetch(&self, url: &Url) -> Result<Option<String>> {
        let mut origin = url.clone();
        origin.set_path("/");
        origin.set_query(None);
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        if !self
            .policy
            .is_allowed(&origin, &path, &self.options.user_agent)
            .await
        {
            debug!("robots denied {}", url);
            self.stats.denied.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let attempts = self.options.retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            self.stats.requests.fetch_add(1, Ordering::Relaxed);
            match self.strategy.fetch(url, &self.options).await {
                Ok(html) => return Ok(Some(html)),
                Err(e) => {
                    if e.is_rate_limited() {
                        self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);
                    }
                    let permanent = e.is_permanent();
                    debug!(
                        "{} attempt {}/{} via {} failed: {}",
                        url,
                        attempt + 1,
                        attempts,
                        self.strategy.name(),
                        e
                    );
                    last_error = Some(e);
                    if permanent || attempt + 1 == attempts {
                        break;
                    }
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    if let Some(delay) = self.options.delay_after(attempt) {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        warn!("Giving up on {}: {}", url, cause);
        Err(ScanError::Fetch {
            url: url.to_string(),
            cause,
        })
    }
}
