use super::{FeedError, NormalizedItem};
use chrono::{DateTime, NaiveDateTime, Utc};
use roxmltree::{Document, Node};

const DUBLIN_CORE_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Candidate document formats, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss2,
    Atom,
    Rdf,
}

impl FeedFormat {
    pub const CANDIDATES: [FeedFormat; 3] = [FeedFormat::Rss2, FeedFormat::Atom, FeedFormat::Rdf];

    /// Returns the decoded items when the document matches this format and
    /// yields at least one usable item.
    fn decode(self, doc: &Document, now: DateTime<Utc>) -> Option<Vec<NormalizedItem>> {
        let root = doc.root_element();
        let items: Vec<NormalizedItem> = match self {
            FeedFormat::Rss2 => {
                if root.tag_name().name() != "rss" {
                    return None;
                }
                let channel = child_element(root, "channel")?;
                channel
                    .children()
                    .filter(|n| n.has_tag_name("item"))
                    .filter_map(|item| {
                        let date = child_text(item, "pubDate").or_else(|| dublin_core_date(item));
                        normalize(child_text(item, "title"), child_text(item, "link"), date, now)
                    })
                    .collect()
            }
            FeedFormat::Atom => {
                if root.tag_name().name() != "feed" {
                    return None;
                }
                root.children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "entry")
                    .filter_map(|entry| {
                        let date = child_text(entry, "updated").or_else(|| child_text(entry, "published"));
                        normalize(child_text(entry, "title"), atom_link(entry), date, now)
                    })
                    .collect()
            }
            FeedFormat::Rdf => {
                if root.tag_name().name() != "RDF" {
                    return None;
                }
                root.children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "item")
                    .filter_map(|item| {
                        normalize(child_text(item, "title"), child_text(item, "link"), dublin_core_date(item), now)
                    })
                    .collect()
            }
        };

        if items.is_empty() {
            None
        } else {
            Some(items)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub format: FeedFormat,
    pub items: Vec<NormalizedItem>,
}

/// Parses a feed document, substituting the current instant for missing dates.
pub fn parse(raw: &[u8]) -> Result<ParsedFeed, FeedError> {
    parse_at(raw, Utc::now())
}

/// Parses a feed document using `now` as the fallback publication instant.
///
/// The first candidate format that decodes and yields at least one item wins.
pub fn parse_at(raw: &[u8], now: DateTime<Utc>) -> Result<ParsedFeed, FeedError> {
    let text = String::from_utf8_lossy(raw);
    // roxmltree rejects a leading BOM
    let text = text.trim_start_matches('\u{feff}');
    let doc = match Document::parse(text) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("Document is not well-formed XML: {e}");
            return Err(FeedError::UnknownFormat);
        }
    };

    for format in FeedFormat::CANDIDATES {
        if let Some(items) = format.decode(&doc, now) {
            return Ok(ParsedFeed { format, items });
        }
    }
    Err(FeedError::UnknownFormat)
}

fn normalize(
    title: Option<String>,
    link: Option<String>,
    date: Option<String>,
    now: DateTime<Utc>,
) -> Option<NormalizedItem> {
    // link is the dedup key; an entry without one cannot be stored
    let link = link?;
    let published_at = date.and_then(|d| parse_date(&d)).unwrap_or(now);
    Some(NormalizedItem {
        title: title.unwrap_or_else(|| link.clone()),
        link,
        published_at,
    })
}

/// Accepts RFC 2822 (RSS), RFC 3339 (Atom, Dublin Core) and a few common
/// variants seen in the wild.
pub(crate) fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: Node, name: &str) -> Option<String> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().name() == name && c.tag_name().namespace() != Some(DUBLIN_CORE_NS))
        .find_map(non_empty_text)
}

fn dublin_core_date(node: Node) -> Option<String> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().name() == "date" && c.tag_name().namespace() == Some(DUBLIN_CORE_NS))
        .find_map(non_empty_text)
}

/// Prefers `rel="alternate"` (or no rel) over other link relations.
fn atom_link(entry: Node) -> Option<String> {
    let links: Vec<Node> = entry
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "link")
        .collect();
    let href = |n: &Node| n.attribute("href").map(str::trim).filter(|h| !h.is_empty()).map(str::to_string);

    links
        .iter()
        .filter(|n| matches!(n.attribute("rel"), None | Some("alternate")))
        .find_map(href)
        .or_else(|| links.iter().find_map(href))
}

fn non_empty_text(node: Node) -> Option<String> {
    // CDATA and entity-split text arrive as several text children
    let text: String = node
        .descendants()
        .filter(|d| d.is_text())
        .filter_map(|d| d.text())
        .collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
