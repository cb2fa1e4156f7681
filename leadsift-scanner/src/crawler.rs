use crate::cache::PageCache;
use crate::fetcher::PageFetcher;
use crate::links::{extract_links, is_same_site};
use crate::result::PageResult;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_SEED_PATHS: &[&str] = &[
    "/",
    "/contact",
    "/contact-us",
    "/about",
    "/about-us",
    "/partners",
];

pub const DEFAULT_LINK_KEYWORDS: &[&str] =
    &["contact", "about", "team", "partners", "affiliates", "network"];

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub page_concurrency: usize,
    /// Upper bound on pages fetched per domain, homepage included.
    pub max_pages: usize,
    pub seed_paths: Vec<String>,
    pub link_keywords: Vec<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            page_concurrency: 3,
            max_pages: 10,
            seed_paths: DEFAULT_SEED_PATHS.iter().map(|s| s.to_string()).collect(),
            link_keywords: DEFAULT_LINK_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Fetches the contact-relevant pages of a single domain.
pub struct DomainCrawler {
    fetcher: Arc<PageFetcher>,
    cache: Arc<PageCache>,
    options: CrawlOptions,
}

impl DomainCrawler {
    pub fn new(fetcher: Arc<PageFetcher>, cache: Arc<PageCache>) -> Self {
        Self {
            fetcher,
            cache,
            options: CrawlOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CrawlOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> Arc<PageCache> {
        self.cache.clone()
    }

    /// Crawl `origin` and return every page that was fetched successfully, homepage first.
    /// An empty result means nothing usable was found.
    pub async fn crawl(&self, origin: &Url) -> Vec<PageResult> {
        let Ok(home) = origin.join("/") else {
            warn!("Cannot build homepage URL for {}", origin);
            return Vec::new();
        };

        let mut pages = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(home.to_string());

        let mut discovered = Vec::new();
        if let Some(html) = self.fetch_cached(&home).await {
            discovered = self.contact_links(&html, &home, &mut seen);
            pages.push(PageResult::new(home.as_str(), html));
        }

        let mut targets: Vec<Url> = Vec::new();
        for seed in &self.options.seed_paths {
            if let Ok(url) = home.join(seed)
                && is_same_site(&url, &home)
                && seen.insert(url.to_string())
            {
                targets.push(url);
            }
        }
        targets.extend(discovered);
        targets.truncate(self.options.max_pages.saturating_sub(1));

        debug!("{}: {} follow-up URLs", home, targets.len());

        let fetched: Vec<(Url, Option<String>)> = match self.fetcher.pacing() {
            Some(delay) => {
                let mut fetched = Vec::with_capacity(targets.len());
                for url in targets {
                    tokio::time::sleep(delay).await;
                    let html = self.fetch_cached(&url).await;
                    fetched.push((url, html));
                }
                fetched
            }
            None => {
                stream::iter(targets)
                    .map(|url| async move {
                        let html = self.fetch_cached(&url).await;
                        (url, html)
                    })
                    .buffered(self.options.page_concurrency.max(1))
                    .collect()
                    .await
            }
        };

        pages.extend(
            fetched
                .into_iter()
                .filter_map(|(url, html)| html.map(|h| PageResult::new(url.as_str(), h))),
        );

        info!("Crawled {}: {} pages", home, pages.len());
        pages
    }

    fn contact_links(&self, html: &str, home: &Url, seen: &mut HashSet<String>) -> Vec<Url> {
        extract_links(html, home)
            .into_iter()
            .map(|link| link.url)
            .filter(|url| is_same_site(url, home))
            .filter(|url| {
                let path = url.path().to_lowercase();
                self.options
                    .link_keywords
                    .iter()
                    .any(|k| path.contains(k.as_str()))
            })
            .filter(|url| seen.insert(url.to_string()))
            .collect()
    }

    async fn fetch_cached(&self, url: &Url) -> Option<String> {
        match self
            .cache
            .get_or_fetch(url.as_str(), || self.fetcher.fetch(url))
            .await
        {
            Ok(html) => html,
            Err(e) => {
                warn!("Page fetch failed for {}: {}", url, e);
                None
            }
        }
    }
}
