//! HTML link extraction
//!
//! Pulls every followable `<a href>` out of a fetched page and resolves it to
//! an absolute URL. A `<base href>` element, when present, overrides the page
//! URL as the resolution base.

use crate::crawler::FetchedPage;
use crate::ExtractionError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts the absolute URLs of all anchors in a fetched page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document, including anchors carrying a
///   `download` attribute
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links (same page anchors)
/// - Anything that does not resolve to http(s)
///
/// Fragments are stripped and duplicates removed; the order of first
/// appearance is kept.
///
/// # Example
///
/// ```
/// use recursive_dl::crawler::{extract_links, FetchedPage};
/// use url::Url;
///
/// let page = FetchedPage {
///     url: Url::parse("https://example.com/album/").unwrap(),
///     body: r#"<a href="01.mp3">one</a><a href="/02.mp3">two</a>"#.to_string(),
/// };
/// let links = extract_links(&page).unwrap();
/// assert_eq!(links[0].as_str(), "https://example.com/album/01.mp3");
/// assert_eq!(links[1].as_str(), "https://example.com/02.mp3");
/// ```
pub fn extract_links(page: &FetchedPage) -> Result<Vec<Url>, ExtractionError> {
    if page.body.trim().is_empty() {
        return Err(ExtractionError::EmptyDocument {
            url: page.url.to_string(),
        });
    }

    let document = Html::parse_document(&page.body);
    let base = document_base(&document, &page.url);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, &base) {
                    if seen.insert(absolute_url.clone()) {
                        links.push(absolute_url);
                    }
                }
            }
        }
    }

    Ok(links)
}

/// Returns the URL relative links resolve against
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    // Skip fragment-only links (same page anchors)
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(mut absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                absolute_url.set_fragment(None);
                Some(absolute_url)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
