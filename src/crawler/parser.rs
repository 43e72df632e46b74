//! Markup and feed parsers for extracting links
//!
//! This module handles parsing fetched documents to extract:
//! - Anchors within a configured selector (markup pages)
//! - The single "next page" link of a paginated listing
//! - Locations listed by sitemap indexes, urlsets, RSS and Atom feeds

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Links extracted from a markup page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    /// Absolute URLs of the anchors matched by the link selector
    pub links: Vec<Url>,

    /// The pagination link, if one was found
    pub next_page: Option<Url>,
}

/// How the next page of a listing is located
#[derive(Debug, Clone, Copy)]
pub struct NextPageRule<'a> {
    pub selector: Option<&'a Selector>,
    pub text: Option<&'a str>,
}

/// Parses HTML content and extracts links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - Elements matched by `link_selector` that carry an `href`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// The next page is found by the rule's selector, else a `rel="next"` link,
/// else an anchor whose text contains the rule's text (case-insensitive).
///
/// # Example
///
/// ```
/// use ripple_harvest::crawler::{parse_markup, NextPageRule};
/// use scraper::Selector;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page">Link</a><a rel="next" href="?p=2">More</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/list").unwrap();
/// let selector = Selector::parse("a[href]").unwrap();
/// let parsed = parse_markup(html, &base_url, &selector, NextPageRule { selector: None, text: None });
/// assert_eq!(parsed.next_page.unwrap().as_str(), "https://example.com/list?p=2");
/// ```
pub fn parse_markup(
    html: &str,
    base_url: &Url,
    link_selector: &Selector,
    next_page: NextPageRule<'_>,
) -> PageLinks {
    let document = Html::parse_document(html);

    let links = document
        .select(link_selector)
        .filter_map(|element| element_link(element, base_url))
        .collect();

    let next_page = find_next_page(&document, base_url, next_page);

    PageLinks { links, next_page }
}

/// Resolves the `href` of an element unless it is a download link
fn element_link(element: ElementRef<'_>, base_url: &Url) -> Option<Url> {
    if element.value().attr("download").is_some() {
        return None;
    }
    element
        .value()
        .attr("href")
        .and_then(|href| resolve_link(href, base_url))
}

fn find_next_page(document: &Html, base_url: &Url, rule: NextPageRule<'_>) -> Option<Url> {
    if let Some(selector) = rule.selector {
        if let Some(url) = document
            .select(selector)
            .find_map(|element| element_link(element, base_url))
        {
            return Some(url);
        }
    }

    if let Ok(rel_next) = Selector::parse(r#"a[rel~="next"][href], link[rel~="next"][href]"#) {
        if let Some(url) = document
            .select(&rel_next)
            .find_map(|element| element_link(element, base_url))
        {
            return Some(url);
        }
    }

    let text = rule.text?.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    let anchors = Selector::parse("a[href]").ok()?;
    document.select(&anchors).find_map(|element| {
        let anchor_text = element.text().collect::<String>().to_lowercase();
        if anchor_text.contains(&text) {
            element_link(element, base_url)
        } else {
            None
        }
    })
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub(crate) fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url)
        }
        _ => None,
    }
}

/// Root element family of a feed document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    SitemapIndex,
    UrlSet,
    Rss,
    Atom,
}

/// Locations listed by a feed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub kind: FeedKind,

    /// Raw location strings in document order
    pub locations: Vec<String>,
}

impl FeedDocument {
    /// True if the children of this document are themselves feeds
    ///
    /// That is the case for a sitemap index, or when every listed location
    /// ends in `.xml`.
    pub fn lists_feeds(&self) -> bool {
        self.kind == FeedKind::SitemapIndex
            || (!self.locations.is_empty()
                && self.locations.iter().all(|loc| {
                    let path = loc.split(['?', '#']).next().unwrap_or(loc);
                    path.to_ascii_lowercase().ends_with(".xml")
                }))
    }
}

/// Errors raised while reading a feed document
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Malformed XML at position {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Document root <{0}> is not a sitemap, RSS or Atom feed")]
    UnknownRoot(String),

    #[error("Document has no root element")]
    Empty,
}

/// Where the reader currently is inside the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Loc,
    RssLink,
}

/// Parses a sitemap index, urlset, RSS or Atom document
///
/// Collects `<loc>` of sitemaps, `<item><link>` of RSS and
/// `<entry><link href>` of Atom.
pub fn parse_feed(xml: &str) -> Result<FeedDocument, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut kind = None;
    let mut locations = Vec::new();
    let mut capture = Capture::None;
    let mut in_rss_item = false;
    let mut in_atom_entry = false;
    let mut entry_has_link = false;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|source| FeedError::Xml {
            position: reader.buffer_position(),
            source,
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let local = e.local_name();
                let name = local.as_ref();

                if kind.is_none() {
                    kind = Some(root_kind(name)?);
                }

                match name {
                    b"loc" if !is_empty => {
                        capture = Capture::Loc;
                        text.clear();
                    }
                    b"item" => in_rss_item = !is_empty,
                    b"entry" => {
                        in_atom_entry = !is_empty;
                        entry_has_link = false;
                    }
                    b"link" if in_atom_entry && !entry_has_link => {
                        if let Some(href) = atom_link_href(e) {
                            locations.push(href);
                            entry_has_link = true;
                        }
                    }
                    b"link" if in_rss_item && !is_empty => {
                        capture = Capture::RssLink;
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) if capture != Capture::None => {
                let unescaped = t.unescape().map_err(|source| FeedError::Xml {
                    position: reader.buffer_position(),
                    source,
                })?;
                text.push_str(&unescaped);
            }
            Event::CData(ref c) if capture != Capture::None => {
                text.push_str(&String::from_utf8_lossy(c));
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"loc" | b"link" if capture != Capture::None => {
                    let location = text.trim();
                    if !location.is_empty() {
                        locations.push(location.to_string());
                    }
                    capture = Capture::None;
                    text.clear();
                }
                b"item" => in_rss_item = false,
                b"entry" => in_atom_entry = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let kind = kind.ok_or(FeedError::Empty)?;
    Ok(FeedDocument { kind, locations })
}

fn root_kind(name: &[u8]) -> Result<FeedKind, FeedError> {
    match name {
        b"sitemapindex" => Ok(FeedKind::SitemapIndex),
        b"urlset" => Ok(FeedKind::UrlSet),
        b"rss" | b"RDF" => Ok(FeedKind::Rss),
        b"feed" => Ok(FeedKind::Atom),
        other => Err(FeedError::UnknownRoot(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

/// Returns the `href` of an Atom link that points at the entry itself
fn atom_link_href(element: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel_alternate = true;

    for attr in element.attributes().flatten() {
        let value = attr.unescape_value().ok()?;
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value.trim().to_string()),
            b"rel" => rel_alternate = value.trim() == "alternate",
            _ => {}
        }
    }

    href.filter(|h| rel_alternate && !h.is_empty())
}

/// Decides whether a fetched document should be read as a feed
///
/// True when the content type mentions XML, or the body opens with an XML
/// declaration or a feed root element.
pub fn looks_like_feed(content_type: Option<&str>, body: &str) -> bool {
    if content_type
        .map(|ct| ct.to_ascii_lowercase().contains("xml"))
        .unwrap_or(false)
    {
        return true;
    }

    let head = body.trim_start_matches('\u{feff}').trim_start();
    ["<?xml", "<urlset", "<sitemapindex", "<rss", "<feed"]
        .iter()
        .any(|prefix| head.starts_with(prefix))
}
