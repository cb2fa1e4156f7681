// Discovery of peer domains from a crawled site's outbound links

use crate::config::MarketProfile;
use crate::domain::normalize_domain;
use leadsift_scanner::PageResult;
use leadsift_scanner::links::{extract_links, host_matches};
use url::{Host, Url};

/// Social networks, marketplaces, review sites and platforms. Never leads.
pub const AGGREGATOR_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "tripadvisor.com",
    "tripadvisor.co.uk",
    "booking.com",
    "expedia.com",
    "airbnb.com",
    "viator.com",
    "getyourguide.com",
    "google.com",
    "goo.gl",
    "wikipedia.org",
    "wikimedia.org",
    "apple.com",
    "amazon.com",
    "yelp.com",
    "trustpilot.com",
    "w3.org",
    "wordpress.org",
    "wordpress.com",
    "wix.com",
    "squarespace.com",
    "shopify.com",
];

pub struct SnowballExpander {
    domain_keywords: Vec<String>,
    anchor_keywords: Vec<String>,
    denylist: Vec<String>,
}

impl SnowballExpander {
    pub fn new(domain_keywords: &[String], anchor_keywords: &[String]) -> Self {
        Self {
            domain_keywords: domain_keywords.iter().map(|k| k.to_lowercase()).collect(),
            anchor_keywords: anchor_keywords.iter().map(|k| k.to_lowercase()).collect(),
            denylist: AGGREGATOR_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn from_profile(profile: &MarketProfile) -> Self {
        Self::new(
            &profile.snowball_domain_keywords,
            &profile.snowball_anchor_keywords,
        )
    }

    fn is_denylisted(&self, host: &str) -> bool {
        self.denylist.iter().any(|d| host_matches(host, d))
    }

    fn is_candidate(&self, host: &str, anchor_text: &str) -> bool {
        if self.domain_keywords.iter().any(|k| host.contains(k.as_str())) {
            return true;
        }
        let anchor_text = anchor_text.to_lowercase();
        self.anchor_keywords
            .iter()
            .any(|k| anchor_text.contains(k.as_str()))
    }

    /// Candidate domains linked from `pages`, normalized, deduplicated and in
    /// discovery order. `own_domain` and its subdomains are never returned.
    pub fn expand(&self, pages: &[PageResult], own_domain: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();

        for page in pages {
            let Ok(base) = Url::parse(&page.url) else {
                continue;
            };
            for link in extract_links(&page.html, &base) {
                if !matches!(link.url.host(), Some(Host::Domain(_))) {
                    continue;
                }
                let Some(host) = link.url.host_str().and_then(normalize_domain) else {
                    continue;
                };
                if host_matches(&host, own_domain) || host_matches(own_domain, &host) {
                    continue;
                }
                if self.is_denylisted(&host) || !self.is_candidate(&host, &link.text) {
                    continue;
                }
                if !found.contains(&host) {
                    found.push(host);
                }
            }
        }

        found
    }
}
