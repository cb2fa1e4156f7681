use super::validate::{accept_email, classify};
use crate::model::{EmailCandidate, ExtractedBy};
use leadsift_scanner::PageResult;
use regex::Regex;
use scraper::node::Node;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Confidence assigned to pattern matches.
pub const PATTERN_CONFIDENCE: f32 = 0.9;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@(?:[a-z0-9-]+\.)+[a-z]{2,24}").expect("static regex")
});
static ENTITY_ARTIFACTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&[a-z]{2,8};|&#x?[0-9a-f]{1,6};|\\?u003[ce]|\\?u0022").expect("static regex")
});
static AT_OBFUSCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{]\s*at\s*[\]\)\}]\s*").expect("static regex")
});
static DOT_OBFUSCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{]\s*dot\s*[\]\)\}]\s*").expect("static regex")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Human-visible text of a page with entity debris removed and `[at]`/`[dot]`
/// obfuscation folded back.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let chunk = text.trim();
        if !chunk.is_empty() {
            parts.push(chunk);
        }
    }

    clean_text(&parts.join(" "))
}

pub fn clean_text(text: &str) -> String {
    let text = ENTITY_ARTIFACTS.replace_all(text, " ");
    let text = AT_OBFUSCATION.replace_all(&text, "@");
    let text = DOT_OBFUSCATION.replace_all(&text, ".");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Raw addresses from `mailto:` links, in document order.
pub fn mailto_addresses(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut found = Vec::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let Some(target) = href
            .get(..7)
            .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
            .and_then(|_| href.get(7..))
        else {
            continue;
        };
        let target = target.split('?').next().unwrap_or("");
        // mailto:a@x.com,b@x.com
        for address in target.split(',') {
            let address = address.replace("%20", "");
            if !address.trim().is_empty() {
                found.push(address.trim().to_string());
            }
        }
    }

    found
}

/// Raw addresses in free text. A match running straight into another
/// alphanumeric character is treated as a fragment and dropped.
pub fn text_addresses(text: &str) -> Vec<String> {
    EMAIL_PATTERN
        .find_iter(text)
        .filter(|m| {
            !text[m.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric())
        })
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Validated pattern candidates for one page: mailto links first, then text.
pub fn pattern_candidates(page: &PageResult, text: &str) -> Vec<EmailCandidate> {
    let mut candidates: Vec<EmailCandidate> = Vec::new();

    for raw in mailto_addresses(&page.html)
        .into_iter()
        .chain(text_addresses(text))
    {
        let Some(email) = accept_email(&raw) else {
            continue;
        };
        if candidates.iter().any(|c| c.email == email) {
            continue;
        }
        candidates.push(EmailCandidate {
            email_type: classify(&email),
            email,
            confidence: PATTERN_CONFIDENCE,
            source_url: page.url.clone(),
            extracted_by: ExtractedBy::Regex,
        });
    }

    candidates
}
