use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));

/// An anchor found on a page, resolved against the page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,
    pub text: String,
}

/// Collect every navigable `<a href>` on the page.
pub fn extract_links(html: &str, base: &Url) -> Vec<Link> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        if let Some(href) = element.value().attr("href")
            && let Some(url) = resolve_url(base, href)
        {
            let text = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            links.push(Link { url, text });
        }
    }

    links
}

/// Resolve an href against `base`, dropping non-navigable targets and fragments.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, etc.
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Hostname without a leading `www.`.
pub fn bare_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
}

/// True when `host` is `domain` or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

pub fn is_same_site(url: &Url, origin: &Url) -> bool {
    match (bare_host(url), bare_host(origin)) {
        (Some(host), Some(base)) => host_matches(&host, &base) && url.port() == origin.port(),
        _ => false,
    }
}

/// Text of the page's `<title>`, whitespace collapsed.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE_SELECTOR)
        .next()?
        .text()
        .collect::<String>();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { None } else { Some(title) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.example.com/about/").unwrap()
    }

    #[test]
    fn test_resolve_relative_and_strip_fragment() {
        let url = resolve_url(&base(), "../contact#form").unwrap();
        assert_eq!(url.as_str(), "https://www.example.com/contact");
    }

    #[test]
    fn test_resolve_skips_non_navigable() {
        assert!(resolve_url(&base(), "mailto:info@example.com").is_none());
        assert!(resolve_url(&base(), "javascript:void(0)").is_none());
        assert!(resolve_url(&base(), "tel:+301234").is_none());
        assert!(resolve_url(&base(), "#top").is_none());
        assert!(resolve_url(&base(), "ftp://example.com/file").is_none());
    }

    #[test]
    fn test_extract_links_with_anchor_text() {
        let html = r#"<html><body>
            <a href="/team">Our
               Team</a>
            <a href="https://partner-tours.com/">Partner <b>Tours</b></a>
            <a href="mailto:info@example.com">mail</a>
        </body></html>"#;
        let links = extract_links(html, &base());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url.as_str(), "https://www.example.com/team");
        assert_eq!(links[0].text, "Our Team");
        assert_eq!(links[1].text, "Partner Tours");
    }

    #[test]
    fn test_same_site_ignores_www() {
        let origin = Url::parse("https://example.com/").unwrap();
        assert!(is_same_site(&Url::parse("https://www.example.com/a").unwrap(), &origin));
        assert!(is_same_site(&Url::parse("https://shop.example.com/a").unwrap(), &origin));
        assert!(!is_same_site(&Url::parse("https://notexample.com/a").unwrap(), &origin));
    }

    #[test]
    fn test_page_title() {
        assert_eq!(
            page_title("<html><head><title>  Aegean\n Tours </title></head></html>"),
            Some("Aegean Tours".to_string())
        );
        assert_eq!(page_title("<html><body>x</body></html>"), None);
    }
}
