use crate::error::{LeadError, Result};
use leadsift_scanner::crawler::{DEFAULT_LINK_KEYWORDS, DEFAULT_SEED_PATHS};
use leadsift_scanner::fetcher::DEFAULT_USER_AGENT;
use leadsift_scanner::{CrawlOptions, FetchOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Vertical-specific vocabulary: relevance terms, regional exclusion and snowball keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketProfile {
    pub core_terms: Vec<String>,
    pub destination_terms: Vec<String>,
    pub excluded_tlds: Vec<String>,
    pub excluded_terms: Vec<String>,
    pub snowball_domain_keywords: Vec<String>,
    pub snowball_anchor_keywords: Vec<String>,
}

impl Default for MarketProfile {
    /// Inbound travel to Greece: foreign tour operators and agencies are leads,
    /// businesses inside the region are not.
    fn default() -> Self {
        Self {
            core_terms: strings(&["greece", "greek", "hellas", "hellenic"]),
            destination_terms: strings(&[
                "athens",
                "santorini",
                "mykonos",
                "crete",
                "rhodes",
                "corfu",
                "thessaloniki",
                "meteora",
                "delphi",
                "peloponnese",
                "cyclades",
                "naxos",
                "paros",
                "zakynthos",
                "kefalonia",
                "halkidiki",
            ]),
            excluded_tlds: strings(&["gr"]),
            excluded_terms: Vec::new(),
            snowball_domain_keywords: strings(&[
                "travel", "tour", "trip", "holiday", "vacation", "journey", "voyage", "adventure",
                "cruise", "safari", "expedition", "escape",
            ]),
            snowball_anchor_keywords: strings(&[
                "travel",
                "tour operator",
                "tours",
                "holidays",
                "travel agency",
                "dmc",
                "destination management",
                "partner",
            ]),
        }
    }
}

impl MarketProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LeadError::Config(format!("Failed to read profile {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            LeadError::Config(format!("Invalid profile {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowballConfig {
    pub enabled: bool,
    /// Domains at this depth are not expanded further.
    pub max_depth: usize,
    pub max_new_per_source: usize,
}

impl Default for SnowballConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_depth: 1,
            max_new_per_source: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalExtractionConfig {
    pub enabled: bool,
    pub model: String,
    pub max_chars: usize,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for ExternalExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-4o-mini".to_string(),
            max_chars: 6000,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Http,
    Browser {
        endpoint: String,
        #[serde(skip_serializing)]
        token: Option<String>,
        delay_ms: u64,
    },
}

/// Everything a run needs besides its input domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub domain_concurrency: usize,
    pub page_concurrency: usize,
    pub max_pages_per_domain: usize,
    pub timeout_secs: u64,
    pub retries: usize,
    pub backoff_ms: Vec<u64>,
    pub user_agent: String,
    pub respect_robots: bool,
    pub min_relevance: i32,
    pub max_emails_per_domain: usize,
    pub unrelated_keywords: Vec<String>,
    pub snowball: SnowballConfig,
    pub external: ExternalExtractionConfig,
    pub fetch_mode: FetchMode,
    pub profile: MarketProfile,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            domain_concurrency: 10,
            page_concurrency: 3,
            max_pages_per_domain: 10,
            timeout_secs: 15,
            retries: 3,
            backoff_ms: vec![1000, 2000, 4000],
            user_agent: DEFAULT_USER_AGENT.to_string(),
            respect_robots: true,
            min_relevance: 2,
            max_emails_per_domain: 5,
            unrelated_keywords: Vec::new(),
            snowball: SnowballConfig::default(),
            external: ExternalExtractionConfig::default(),
            fetch_mode: FetchMode::Http,
            profile: MarketProfile::default(),
        }
    }
}

/// Browser instances are heavyweight; never run more domains than this at once.
pub const BROWSER_DOMAIN_CONCURRENCY: usize = 2;

impl PipelineConfig {
    pub fn is_browser(&self) -> bool {
        matches!(self.fetch_mode, FetchMode::Browser { .. })
    }

    pub fn effective_domain_concurrency(&self) -> usize {
        let requested = self.domain_concurrency.max(1);
        if self.is_browser() {
            requested.min(BROWSER_DOMAIN_CONCURRENCY)
        } else {
            requested
        }
    }

    pub fn effective_page_concurrency(&self) -> usize {
        if self.is_browser() {
            1
        } else {
            self.page_concurrency.max(1)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.timeout(),
            retries: self.retries.max(1),
            backoff: self.backoff_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            page_concurrency: self.effective_page_concurrency(),
            max_pages: self.max_pages_per_domain.max(1),
            seed_paths: strings(DEFAULT_SEED_PATHS),
            link_keywords: strings(DEFAULT_LINK_KEYWORDS),
        }
    }

    /// Startup checks; a failure here aborts before any work begins.
    pub fn validate(&self) -> Result<()> {
        if self.max_emails_per_domain == 0 {
            return Err(LeadError::Config(
                "max emails per domain must be at least 1".to_string(),
            ));
        }
        if let FetchMode::Browser { ref endpoint, .. } = self.fetch_mode
            && url::Url::parse(endpoint).is_err()
        {
            return Err(LeadError::Config(format!(
                "Invalid browser endpoint '{}'",
                endpoint
            )));
        }
        if self.external.enabled && self.external.api_key.is_none() {
            tracing::warn!("External extraction enabled without an API key; using pattern extraction only");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_browser_mode_caps_concurrency() {
        let config = PipelineConfig {
            domain_concurrency: 10,
            page_concurrency: 5,
            fetch_mode: FetchMode::Browser {
                endpoint: "http://localhost:3000".to_string(),
                token: None,
                delay_ms: 1500,
            },
            ..PipelineConfig::default()
        };
        assert_eq!(config.effective_domain_concurrency(), 2);
        assert_eq!(config.effective_page_concurrency(), 1);

        let http = PipelineConfig::default();
        assert_eq!(http.effective_domain_concurrency(), 10);
        assert_eq!(http.effective_page_concurrency(), 3);
    }

    #[test]
    fn test_fetch_options_from_config() {
        let options = PipelineConfig::default().fetch_options();
        assert_eq!(options.retries, 3);
        assert_eq!(
            options.backoff,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn test_validate_rejects_bad_browser_endpoint() {
        let config = PipelineConfig {
            fetch_mode: FetchMode::Browser {
                endpoint: "not a url".to_string(),
                token: None,
                delay_ms: 0,
            },
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(LeadError::Config(_))));
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_profile_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"core_terms": ["italy"], "excluded_tlds": ["it"]}}"#).unwrap();

        let profile = MarketProfile::load(file.path()).unwrap();
        assert_eq!(profile.core_terms, vec!["italy".to_string()]);
        assert_eq!(profile.excluded_tlds, vec!["it".to_string()]);
        // Missing fields fall back to the defaults
        assert_eq!(
            profile.snowball_domain_keywords,
            MarketProfile::default().snowball_domain_keywords
        );
    }

    #[test]
    fn test_profile_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(
            MarketProfile::load(file.path()),
            Err(LeadError::Config(_))
        ));
    }
}
