// Domain normalization and regional exclusion

use url::Url;

/// Canonical hostname for a URL or bare host: lowercase, no `www.`, no trailing dot.
pub fn normalize_domain(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("http://{}", input)
    };
    let url = Url::parse(&with_scheme).ok()?;
    let mut host = url.host_str()?.trim_end_matches('.').to_lowercase();
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest.to_string();
    }

    if !host.contains('.') || host.starts_with('.') {
        return None;
    }
    Some(host)
}

/// Classifies domains that belong to an excluded region.
#[derive(Debug, Clone, Default)]
pub struct RegionFilter {
    excluded_tlds: Vec<String>,
    excluded_terms: Vec<String>,
}

impl RegionFilter {
    pub fn new(excluded_tlds: &[String], excluded_terms: &[String]) -> Self {
        Self {
            excluded_tlds: excluded_tlds
                .iter()
                .map(|t| t.trim_start_matches('.').to_lowercase())
                .collect(),
            excluded_terms: excluded_terms.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Why `domain` is excluded, or `None` when it is admissible.
    pub fn exclusion_reason(&self, domain: &str) -> Option<String> {
        let domain = domain.to_lowercase();
        let tld = domain.rsplit('.').next().unwrap_or("");

        if let Some(excluded) = self.excluded_tlds.iter().find(|t| t.as_str() == tld) {
            return Some(format!("excluded region TLD .{}", excluded));
        }
        self.excluded_terms
            .iter()
            .find(|term| domain.contains(term.as_str()))
            .map(|term| format!("excluded region term '{}'", term))
    }

    pub fn is_excluded(&self, domain: &str) -> bool {
        self.exclusion_reason(domain).is_some()
    }
}
