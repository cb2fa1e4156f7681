use crate::domain::normalize_domain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A candidate domain as produced by a discovery source or by snowball expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainRecord {
    pub domain: String,
    pub sample_url: String,
    pub discovery_query: String,
    pub title: String,
    pub snippet: String,
    pub country: String,
    pub city: String,
}

impl DomainRecord {
    pub fn from_domain(domain: impl Into<String>, discovery_query: impl Into<String>) -> Self {
        let domain = domain.into();
        Self {
            sample_url: format!("https://{}/", domain),
            domain,
            discovery_query: discovery_query.into(),
            ..Self::default()
        }
    }

    /// Parse one input line: a JSON object, or a bare domain/URL.
    ///
    /// Returns `None` for blank lines, comments and unusable hosts.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if line.starts_with('{') {
            let mut record: DomainRecord = serde_json::from_str(line).ok()?;
            let source = if record.domain.is_empty() {
                record.sample_url.clone()
            } else {
                record.domain.clone()
            };
            record.domain = normalize_domain(&source)?;
            if record.sample_url.is_empty() {
                record.sample_url = format!("https://{}/", record.domain);
            }
            if record.discovery_query.is_empty() {
                record.discovery_query = "input".to_string();
            }
            return Some(record);
        }

        let domain = normalize_domain(line)?;
        let mut record = Self::from_domain(domain, "input");
        if line.contains("://") {
            record.sample_url = line.to_string();
        }
        Some(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailType {
    Generic,
    Personal,
    Unknown,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Generic => "generic",
            EmailType::Personal => "personal",
            EmailType::Unknown => "unknown",
        }
    }

    /// Lenient parse for values reported by external sources.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "generic" | "role" | "general" => EmailType::Generic,
            "personal" | "person" | "individual" => EmailType::Personal,
            _ => EmailType::Unknown,
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractedBy {
    Regex,
    Ai,
    Both,
}

impl ExtractedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractedBy::Regex => "regex",
            ExtractedBy::Ai => "ai",
            ExtractedBy::Both => "both",
        }
    }
}

/// A validated address found on a domain. Identity is `email`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailCandidate {
    pub email: String,
    pub email_type: EmailType,
    pub confidence: f32,
    pub source_url: String,
    pub extracted_by: ExtractedBy,
}

impl EmailCandidate {
    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or("")
    }
}

/// One output row per surviving (domain, email) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRow {
    pub business_name: String,
    pub domain: String,
    pub country: String,
    pub city: String,
    pub email: String,
    pub email_type: EmailType,
    pub confidence: f32,
    pub relevance_score: i32,
    pub source_url: String,
    pub discovered_by_query: String,
}

impl LeadRow {
    pub const COLUMNS: [&'static str; 10] = [
        "business_name",
        "domain",
        "country",
        "city",
        "email",
        "email_type",
        "confidence",
        "relevance_score",
        "source_url",
        "discovered_by_query",
    ];

    pub fn from_candidate(
        record: &DomainRecord,
        business_name: &str,
        candidate: &EmailCandidate,
        relevance_score: i32,
    ) -> Self {
        Self {
            business_name: business_name.to_string(),
            domain: record.domain.clone(),
            country: record.country.clone(),
            city: record.city.clone(),
            email: candidate.email.clone(),
            email_type: candidate.email_type,
            confidence: candidate.confidence,
            relevance_score,
            source_url: candidate.source_url.clone(),
            discovered_by_query: record.discovery_query.clone(),
        }
    }

    /// Field values in `COLUMNS` order.
    pub fn fields(&self) -> [String; 10] {
        [
            self.business_name.clone(),
            self.domain.clone(),
            self.country.clone(),
            self.city.clone(),
            self.email.clone(),
            self.email_type.as_str().to_string(),
            format!("{:.2}", self.confidence),
            self.relevance_score.to_string(),
            self.source_url.clone(),
            self.discovered_by_query.clone(),
        ]
    }
}
