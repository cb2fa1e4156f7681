// Email discovery: pattern extraction, optional external extraction, merge and rank

pub mod pattern;
pub mod rank;
pub mod validate;

pub use pattern::{pattern_candidates, visible_text};
pub use rank::{merge, rank_and_truncate};
pub use validate::{accept_email, classify, normalize_email, validate_email};

use crate::ai::{ExternalEmailSource, NoExternalSource};
use crate::model::{EmailCandidate, EmailType, ExtractedBy};
use leadsift_scanner::PageResult;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_MAX_PER_DOMAIN: usize = 5;
pub const DEFAULT_MAX_CHARS: usize = 6000;

/// Truncate on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct EmailExtractor {
    external: Arc<dyn ExternalEmailSource>,
    enable_external: bool,
    max_per_domain: usize,
    max_chars: usize,
}

impl Default for EmailExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_DOMAIN)
    }
}

impl EmailExtractor {
    /// Pattern extraction only.
    pub fn new(max_per_domain: usize) -> Self {
        Self {
            external: Arc::new(NoExternalSource),
            enable_external: false,
            max_per_domain: max_per_domain.max(1),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    /// Also ask `source` about every page with visible text.
    pub fn with_external(mut self, source: Arc<dyn ExternalEmailSource>, max_chars: usize) -> Self {
        self.external = source;
        self.enable_external = true;
        self.max_chars = max_chars.max(1);
        self
    }

    pub fn max_per_domain(&self) -> usize {
        self.max_per_domain
    }

    /// Ranked, capped candidates for one domain's pages.
    pub async fn extract(&self, pages: &[PageResult]) -> Vec<EmailCandidate> {
        let texts: Vec<String> = pages.iter().map(|p| visible_text(&p.html)).collect();
        self.extract_with_texts(pages, &texts).await
    }

    /// Same as [`extract`](Self::extract) with visible text already computed,
    /// `texts[i]` belonging to `pages[i]`.
    pub async fn extract_with_texts(
        &self,
        pages: &[PageResult],
        texts: &[String],
    ) -> Vec<EmailCandidate> {
        let mut from_pattern = Vec::new();
        for (page, text) in pages.iter().zip(texts) {
            from_pattern.extend(pattern_candidates(page, text));
        }

        let mut from_external = Vec::new();
        if self.enable_external {
            for (page, text) in pages.iter().zip(texts) {
                if text.trim().is_empty() {
                    continue;
                }
                let excerpt = truncate_chars(text, self.max_chars);
                for reported in self.external.extract_emails(excerpt, &page.url).await {
                    let Some(email) = accept_email(&reported.email) else {
                        debug!(email = %reported.email, "Discarding external address");
                        continue;
                    };
                    let email_type = match classify(&email) {
                        EmailType::Generic => EmailType::Generic,
                        _ => reported.email_type,
                    };
                    from_external.push(EmailCandidate {
                        email,
                        email_type,
                        confidence: reported.confidence,
                        source_url: page.url.clone(),
                        extracted_by: ExtractedBy::Ai,
                    });
                }
            }
        }

        rank_and_truncate(merge(from_pattern, from_external), self.max_per_domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ExternalEmail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedSource {
        emails: Vec<ExternalEmail>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl ExternalEmailSource for FixedSource {
        async fn extract_emails(&self, text: &str, source_url: &str) -> Vec<ExternalEmail> {
            self.seen
                .lock()
                .unwrap()
                .push((source_url.to_string(), text.chars().count()));
            self.emails.clone()
        }
    }

    fn external(email: &str, email_type: EmailType, confidence: f32) -> ExternalEmail {
        ExternalEmail {
            email: email.to_string(),
            email_type,
            confidence,
        }
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("καλημέρα", 4), "καλη");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_extract_pattern_only() {
        let pages = vec![
            PageResult::new("https://site.com/", "<p>maria@site.com</p>"),
            PageResult::new(
                "https://site.com/contact",
                r#"<a href="mailto:info@site.com">mail</a> webmaster@site.com"#,
            ),
        ];
        let found = EmailExtractor::new(5).extract(&pages).await;
        let emails: Vec<_> = found.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["info@site.com", "maria@site.com"]);
        assert_eq!(found[0].source_url, "https://site.com/contact");
    }

    #[tokio::test]
    async fn test_extract_merges_external_results() {
        let source = Arc::new(FixedSource {
            emails: vec![
                external("Info@Site.com", EmailType::Unknown, 0.95),
                external("nikos@site.com", EmailType::Personal, 0.8),
                external("privacy@site.com", EmailType::Generic, 0.9),
                external("made-up@example.com", EmailType::Generic, 0.9),
            ],
            seen: Mutex::new(Vec::new()),
        });
        let extractor = EmailExtractor::new(5).with_external(source.clone(), 10);
        let pages = vec![
            PageResult::new("https://site.com/", "<p>Write to info@site.com for tours</p>"),
            PageResult::new("https://site.com/empty", "<script>x()</script>"),
        ];

        let found = extractor.extract(&pages).await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].email, "info@site.com");
        assert_eq!(found[0].extracted_by, ExtractedBy::Both);
        assert_eq!(found[0].confidence, 0.95);
        assert_eq!(found[1].email, "nikos@site.com");
        assert_eq!(found[1].extracted_by, ExtractedBy::Ai);
        assert_eq!(found[1].email_type, EmailType::Personal);

        // Called once, for the page with text, truncated
        let seen = source.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("https://site.com/".to_string(), 10));
    }

    #[tokio::test]
    async fn test_external_type_overridden_for_generic_local() {
        let source = Arc::new(FixedSource {
            emails: vec![external("sales@site.com", EmailType::Personal, 0.8)],
            seen: Mutex::new(Vec::new()),
        });
        let extractor = EmailExtractor::new(5).with_external(source, 6000);
        let pages = vec![PageResult::new("https://site.com/", "<p>hello</p>")];

        let found = extractor.extract(&pages).await;
        assert_eq!(found[0].email_type, EmailType::Generic);
    }
}
