// Address normalization, validation and local-part classification

use crate::model::EmailType;
use regex::Regex;
use std::sync::LazyLock;

/// Local part that starts with a digit run glued to letters, e.g. a phone number
/// fused onto the address.
static DIGITS_THEN_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[a-z]").expect("static regex"));
static PHONE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{6,}").expect("static regex"));

const ENTITY_PREFIXES: &[&str] = &[
    "u003c", "u003e", "u0022", "u0027", "x3c", "x3e", "%3c", "%3e", "%20",
];

const ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp", "css", "js", "json", "pdf",
    "mp4", "webm", "woff", "woff2", "ttf",
];

/// Generic TLDs that commonly get text fused onto their end.
const GARBAGE_BASES: &[&str] = &["com", "net", "org", "info", "biz", "edu", "gov"];

/// Real TLDs that happen to start with a garbage base.
const LONG_TLDS: &[&str] = &[
    "community", "company", "computer", "comics", "network", "netflix", "organic", "education",
    "government", "business", "biz",
];

/// Second-level labels that are only valid under a country code (`site.com.tr`).
const SECOND_LEVEL: &[&str] = &["com", "net", "org", "co", "gov", "edu", "ac"];

const COUNTRY_CODES: &[&str] = &[
    "ar", "at", "au", "bd", "be", "bg", "br", "by", "ca", "ch", "cl", "cn", "co", "cy", "cz", "de",
    "dk", "ee", "eg", "es", "fi", "fr", "gr", "hk", "hr", "hu", "id", "ie", "il", "in", "ir", "is",
    "it", "jp", "ke", "kr", "lb", "lt", "lu", "lv", "ma", "mt", "mx", "my", "ng", "nl", "no", "nz",
    "pe", "ph", "pk", "pl", "pt", "qa", "ro", "rs", "ru", "sa", "se", "sg", "si", "sk", "th", "tn",
    "tr", "tw", "ua", "ug", "uk", "us", "uy", "ve", "vn", "za",
];

/// Placeholder, legal and infrastructure domains. Matched exactly or as a suffix.
const DENYLIST_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "domain.com",
    "yourdomain.com",
    "yoursite.com",
    "yourcompany.com",
    "email.com",
    "test.com",
    "sentry.io",
    "wixpress.com",
    "w3.org",
    "schema.org",
    "gdpr.eu",
    "godaddy.com",
    "cloudflare.com",
    "squarespace.com",
    "wordpress.com",
    "wix.com",
    "shopify.com",
    "googlemail.com",
];

/// Local parts that are never outreach targets.
const JUNK_PREFIXES: &[&str] = &[
    "privacy",
    "legal",
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "postmaster",
    "webmaster",
    "hostmaster",
    "admin",
    "administrator",
    "abuse",
    "gdpr",
    "dpo",
    "dataprotection",
    "mailer-daemon",
    "unsubscribe",
    "compliance",
    "security",
    "careers",
    "jobs",
];

/// Role addresses suitable for outreach.
const GENERIC_PREFIXES: &[&str] = &[
    "info",
    "contact",
    "contacts",
    "sales",
    "booking",
    "bookings",
    "reservations",
    "reservation",
    "office",
    "hello",
    "enquiry",
    "enquiries",
    "inquiry",
    "inquiries",
    "support",
    "help",
    "mail",
    "team",
    "travel",
    "tours",
    "groups",
    "service",
    "reception",
    "welcome",
];

fn is_trim_char(c: char) -> bool {
    c.is_whitespace()
        || matches!(c, '.' | ',' | ';' | ':' | '<' | '>' | '"' | '\'' | '(' | ')' | '[' | ']')
}

/// Canonical form of an address: lowercase, no `mailto:`, no query, no surrounding
/// punctuation. Idempotent.
pub fn normalize_email(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut current = lowered.as_str();
    loop {
        let before = current;
        current = current.trim_matches(is_trim_char);
        if let Some(rest) = current.strip_prefix("mailto:") {
            current = rest;
        }
        if let Some((head, _)) = current.split_once('?') {
            current = head;
        }
        if current == before {
            break;
        }
    }
    current.to_string()
}

pub(crate) fn matches_compound(local: &str, prefixes: &[&str], separators: &[char]) -> bool {
    prefixes.iter().any(|prefix| {
        local == *prefix
            || local
                .strip_prefix(prefix)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| separators.contains(&c))
    })
}

/// `privacy@`, `noreply.bookings@`, `legal-team@` and friends.
pub fn is_junk_local(local: &str) -> bool {
    matches_compound(local, JUNK_PREFIXES, &['.', '-'])
}

pub fn is_generic_local(local: &str) -> bool {
    matches_compound(local, GENERIC_PREFIXES, &['.', '-', '_'])
}

/// Generic for role addresses, personal otherwise.
pub fn classify(email: &str) -> EmailType {
    let local = email.split('@').next().unwrap_or("");
    if is_generic_local(local) {
        EmailType::Generic
    } else {
        EmailType::Personal
    }
}

fn is_denylisted(domain: &str) -> bool {
    DENYLIST_DOMAINS
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{}", d)))
}

/// A TLD that is a common TLD with text fused on, e.g. `comphone`.
fn has_fused_tld(tld: &str) -> bool {
    tld.len() >= 6
        && !LONG_TLDS.contains(&tld)
        && GARBAGE_BASES
            .iter()
            .any(|base| tld.len() > base.len() && tld.starts_with(base))
}

fn valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn valid_local(local: &str) -> bool {
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '%' | '+' | '-'))
    {
        return false;
    }
    // Leading punctuation
    if !local.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return false;
    }
    if local.ends_with('.') || local.contains("..") {
        return false;
    }
    if ENTITY_PREFIXES.iter().any(|p| local.starts_with(p)) {
        return false;
    }
    !(DIGITS_THEN_LETTERS.is_match(local) || PHONE_RUN.is_match(local))
}

fn valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|l| valid_label(l)) {
        return false;
    }

    let tld = labels[labels.len() - 1];
    if !tld.chars().all(|c| c.is_ascii_alphabetic()) || !(2..=12).contains(&tld.len()) {
        return false;
    }
    if ASSET_EXTENSIONS.contains(&tld) || has_fused_tld(tld) {
        return false;
    }

    if labels.len() >= 3 {
        let second_level = labels[labels.len() - 2];
        if SECOND_LEVEL.contains(&second_level) && !COUNTRY_CODES.contains(&tld) {
            return false;
        }
    }

    !is_denylisted(domain)
}

/// Normalize and validate a raw address. `None` means rejected.
pub fn validate_email(raw: &str) -> Option<String> {
    let email = normalize_email(raw);
    if email.len() > 254 {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if domain.contains('@') || !valid_local(local) || !valid_domain(domain) {
        return None;
    }
    Some(email)
}

/// Validation plus the junk-prefix filter; what every source must pass.
pub fn accept_email(raw: &str) -> Option<String> {
    let email = validate_email(raw)?;
    let local = email.split('@').next().unwrap_or("");
    if is_junk_local(local) {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_is_idempotent() {
        let inputs = [
            "  Info@Site.COM ",
            "mailto:Sales@Site.com?subject=Hi",
            "mailto:mailto:x@y.com",
            "<hello@tours.co.uk>.",
            " .mailto: a@b.io; ",
            "\"Booking@Trip.gr\",",
            "",
            "???",
        ];
        for input in inputs {
            let once = normalize_email(input);
            assert_eq!(normalize_email(&once), once, "input {:?}", input);
        }
        assert_eq!(normalize_email("  Info@Site.COM "), "info@site.com");
        assert_eq!(
            normalize_email("mailto:Sales@Site.com?subject=Hi"),
            "sales@site.com"
        );
    }

    #[test]
    fn test_validation_boundary_cases() {
        assert_eq!(validate_email("info@site.comphone"), None);
        assert_eq!(validate_email("info@site.com").as_deref(), Some("info@site.com"));
        assert_eq!(
            validate_email("sales@site.com.tr").as_deref(),
            Some("sales@site.com.tr")
        );
        assert_eq!(validate_email("office@site.com.you"), None);
    }

    #[test]
    fn test_rejects_phone_and_entity_artifacts() {
        assert_eq!(validate_email("2105551234info@site.com"), None);
        assert_eq!(validate_email("u003einfo@site.com"), None);
        assert_eq!(validate_email("john6945123456@site.com"), None);
        assert_eq!(validate_email("-info@site.com"), None);
        assert_eq!(validate_email("_sales@site.com"), None);
    }

    #[test]
    fn test_rejects_bad_tlds_and_domains() {
        assert_eq!(validate_email("logo@2x.png"), None);
        assert_eq!(validate_email("info@site.c0m"), None);
        assert_eq!(validate_email("info@site.x"), None);
        assert_eq!(validate_email("info@site.abcdefghijklm"), None);
        assert_eq!(validate_email("info@site.information"), None);
        assert_eq!(validate_email("name@example.com"), None);
        assert_eq!(validate_email("abc@o123.ingest.sentry.io"), None);
        assert_eq!(validate_email("info@-site.com"), None);
        assert_eq!(validate_email("info@@site.com"), None);
        assert_eq!(validate_email("no-at-sign.com"), None);
    }

    #[test]
    fn test_accepts_real_long_tlds() {
        assert!(validate_email("hello@walks.community").is_some());
        assert!(validate_email("info@odyssey.travel").is_some());
        assert!(validate_email("maria.k@agency.co.uk").is_some());
    }

    #[test]
    fn test_junk_prefixes() {
        assert!(accept_email("privacy@site.com").is_none());
        assert!(accept_email("noreply.bookings@site.com").is_none());
        assert!(accept_email("legal-team@site.com").is_none());
        assert!(accept_email("webmaster@site.com").is_none());
        // Only whole-word prefixes count
        assert!(accept_email("administration.office@site.com").is_some());
        assert!(accept_email("legalese@site.com").is_some());
    }

    #[test]
    fn test_classify_generic_and_personal() {
        assert_eq!(classify("info@site.com"), EmailType::Generic);
        assert_eq!(classify("sales.uk@site.com"), EmailType::Generic);
        assert_eq!(classify("booking_desk@site.com"), EmailType::Generic);
        assert_eq!(classify("maria@site.com"), EmailType::Personal);
        assert_eq!(classify("information@site.com"), EmailType::Personal);
    }
}
