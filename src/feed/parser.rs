//! RSS/Atom feed parsing.
//!
//! Fields are read through ordered [`Accessor`] chains: each field lists the
//! element names (and link/attribute lookups) it may come from, and the first
//! one that yields non-empty text wins. RSS and Atom differ only in which chain
//! is used, so dialect handling stays declarative.

use super::date::normalize_date;
use super::types::{Feed, FeedItem, FeedMetadata};
use super::xml::{parse_document, Document, Element, ParseMode};
use crate::util::clean_text;
use html_escape::decode_html_entities;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors produced while turning feed XML into items.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The document was read but contains no item with both a title and a link.
    ///
    /// Not a failure for most callers: the feed exists and can be subscribed
    /// to, it just has nothing in it right now.
    #[error("Feed contains no items")]
    EmptyFeed,
    /// The input has no XML root element, or its root is not `rss`, `feed`,
    /// `channel` or `RDF` (an HTML page, a sitemap)
    #[error("Not an RSS or Atom document")]
    NotAFeed,
    /// XML syntax error (only in [`ParseMode::Strict`])
    #[error("Malformed XML: {0}")]
    Malformed(String),
}

// ============================================================================
// Field Accessors
// ============================================================================

/// One way of reading a field from an element.
///
/// Repeated children are all consulted: the first one with a usable value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// Text of a child with this name (raw markup if it has child elements)
    Text(&'static str),
    /// Text of a grandchild, e.g. Atom `author/name`
    Path(&'static str, &'static str),
    /// `href` of a `link` child whose `rel` matches, tried in order;
    /// `""` matches a link without `rel`
    Link(&'static [&'static str]),
    /// Attribute of a child with this name
    Attr(&'static str, &'static str),
    /// Attribute of the element itself
    OwnAttr(&'static str),
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl Accessor {
    /// Returns the trimmed value, or `None` when missing or blank.
    pub fn resolve<'e>(&self, el: &'e Element<'_>) -> Option<&'e str> {
        match *self {
            Accessor::Text(name) => el
                .children_named(name)
                .find_map(|c| non_blank(c.text_or_markup())),
            Accessor::Path(outer, inner) => el
                .children_named(outer)
                .flat_map(|c| c.children_named(inner))
                .find_map(|c| non_blank(c.text_or_markup())),
            Accessor::Link(rels) => rels.iter().find_map(|rel| {
                el.children_named("link")
                    .filter(|link| link.attr("rel").unwrap_or("").trim() == *rel)
                    .find_map(|link| link.attr("href").and_then(non_blank))
            }),
            Accessor::Attr(name, attr) => el
                .children_named(name)
                .find_map(|c| c.attr(attr).and_then(non_blank)),
            Accessor::OwnAttr(attr) => el.attr(attr).and_then(non_blank),
        }
    }
}

/// Tries each accessor in order; first non-empty value wins.
pub fn first_of<'e>(el: &'e Element<'_>, chain: &[Accessor]) -> Option<&'e str> {
    chain.iter().find_map(|accessor| accessor.resolve(el))
}

pub const ITEM_TITLE: &[Accessor] = &[Accessor::Text("title")];
pub const ITEM_LINK: &[Accessor] = &[
    Accessor::Text("link"),
    Accessor::Link(&["alternate", "", "self"]),
    Accessor::Attr("link", "href"),
];
pub const ITEM_DATE: &[Accessor] = &[
    Accessor::Text("pubDate"),
    Accessor::Text("published"),
    Accessor::Text("date"),
    Accessor::Text("updated"),
    Accessor::Text("dc:date"),
];
pub const ITEM_CONTENT: &[Accessor] = &[
    Accessor::Text("content:encoded"),
    Accessor::Text("content"),
    Accessor::Text("description"),
    Accessor::Text("summary"),
];
pub const ITEM_SUMMARY: &[Accessor] = &[Accessor::Text("description"), Accessor::Text("summary")];
pub const ITEM_GUID: &[Accessor] = &[Accessor::Text("guid"), Accessor::Text("id")];

/// Accessor chains for every [`FeedMetadata`] field of one dialect.
struct MetadataChains {
    title: &'static [Accessor],
    description: &'static [Accessor],
    link: &'static [Accessor],
    language: &'static [Accessor],
    copyright: &'static [Accessor],
    publication_date: &'static [Accessor],
    last_build_date: &'static [Accessor],
    generator: &'static [Accessor],
    managing_editor: &'static [Accessor],
    web_master: &'static [Accessor],
}

const RSS_CHANNEL: MetadataChains = MetadataChains {
    title: &[Accessor::Text("title")],
    description: &[Accessor::Text("description")],
    link: &[Accessor::Text("link")],
    language: &[Accessor::Text("language"), Accessor::Text("dc:language")],
    copyright: &[Accessor::Text("copyright"), Accessor::Text("dc:rights")],
    publication_date: &[Accessor::Text("pubDate"), Accessor::Text("dc:date")],
    last_build_date: &[Accessor::Text("lastBuildDate")],
    generator: &[Accessor::Text("generator")],
    managing_editor: &[Accessor::Text("managingEditor")],
    web_master: &[Accessor::Text("webMaster")],
};

const ATOM_FEED: MetadataChains = MetadataChains {
    title: &[Accessor::Text("title")],
    description: &[Accessor::Text("subtitle"), Accessor::Text("summary")],
    link: &[Accessor::Link(&["self", "alternate", ""])],
    language: &[Accessor::OwnAttr("xml:lang")],
    copyright: &[Accessor::Text("rights")],
    publication_date: &[Accessor::Text("updated")],
    last_build_date: &[],
    generator: &[Accessor::Text("generator")],
    managing_editor: &[Accessor::Path("author", "name")],
    web_master: &[],
};

// ============================================================================
// Parser
// ============================================================================

/// Feed parser with an explicit XML error policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedParser {
    mode: ParseMode,
}

impl FeedParser {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    /// Reads channel/feed-level metadata.
    ///
    /// Input that is not an RSS/Atom document yields empty metadata. Errors only
    /// in strict mode.
    pub fn metadata(&self, xml: &str) -> Result<FeedMetadata, ParseError> {
        Ok(self
            .document(xml)?
            .filter(|doc| is_feed_root(&doc.root.name))
            .map(|doc| metadata_from(&doc))
            .unwrap_or_default())
    }

    /// Extracts every item that has both a title and a link.
    ///
    /// # Errors
    ///
    /// - [`ParseError::EmptyFeed`] - the document has no qualifying item
    /// - [`ParseError::NotAFeed`] - the input is not XML, or its root is not a feed element
    /// - [`ParseError::Malformed`] - syntax error in strict mode
    pub fn items(&self, xml: &str) -> Result<Vec<FeedItem>, ParseError> {
        let doc = self.feed_document(xml)?;
        let items = items_from(&doc);
        if items.is_empty() {
            return Err(ParseError::EmptyFeed);
        }
        Ok(items)
    }

    /// Metadata and items from a single pass over the document.
    pub fn parse(&self, xml: &str) -> Result<Feed, ParseError> {
        let doc = self.feed_document(xml)?;
        let items = items_from(&doc);
        if items.is_empty() {
            return Err(ParseError::EmptyFeed);
        }
        Ok(Feed {
            metadata: metadata_from(&doc),
            items,
        })
    }

    fn document<'a>(&self, xml: &'a str) -> Result<Option<Document<'a>>, ParseError> {
        parse_document(xml, self.mode).map_err(|e| ParseError::Malformed(e.to_string()))
    }

    fn feed_document<'a>(&self, xml: &'a str) -> Result<Document<'a>, ParseError> {
        let doc = self.document(xml)?.ok_or(ParseError::NotAFeed)?;
        if !is_feed_root(&doc.root.name) {
            tracing::debug!(root = %doc.root.name, "Document root is not a feed element");
            return Err(ParseError::NotAFeed);
        }
        Ok(doc)
    }
}

/// `rss`, Atom `feed`, a bare `channel`, or RSS 1.0 `rdf:RDF` under any prefix.
fn is_feed_root(name: &str) -> bool {
    let local = name.rsplit(':').next().unwrap_or(name);
    ["rss", "feed", "channel", "rdf"]
        .iter()
        .any(|root| local.eq_ignore_ascii_case(root))
}

/// Reads feed metadata permissively. Never fails; unknown input yields empty metadata.
pub fn parse_feed_metadata(xml: &str) -> FeedMetadata {
    FeedParser::default().metadata(xml).unwrap_or_default()
}

/// Reads feed items permissively. See [`FeedParser::items`].
pub fn parse_feed_items(xml: &str) -> Result<Vec<FeedItem>, ParseError> {
    FeedParser::default().items(xml)
}

fn metadata_from(doc: &Document<'_>) -> FeedMetadata {
    // RSS if a <channel> exists anywhere (RSS 2.0 and RDF), otherwise the root is an Atom <feed>
    let (source, chains) = match doc.root.find("channel") {
        Some(channel) => (channel, &RSS_CHANNEL),
        None => (&doc.root, &ATOM_FEED),
    };

    let field = |chain: &[Accessor]| first_of(source, chain).and_then(clean_text);

    FeedMetadata {
        title: field(chains.title),
        description: field(chains.description),
        link: field(chains.link),
        language: field(chains.language),
        copyright: field(chains.copyright),
        publication_date: field(chains.publication_date),
        last_build_date: field(chains.last_build_date),
        generator: field(chains.generator),
        managing_editor: field(chains.managing_editor),
        web_master: field(chains.web_master),
    }
}

fn items_from(doc: &Document<'_>) -> Vec<FeedItem> {
    let mut elements = doc.root.find_all("item");
    if elements.is_empty() {
        elements = doc.root.find_all("entry");
    }

    elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, el)| build_item(el, index))
        .collect()
}

fn build_item(el: &Element<'_>, index: usize) -> Option<FeedItem> {
    let title = first_of(el, ITEM_TITLE).and_then(clean_text);
    let link = first_of(el, ITEM_LINK).map(str::to_owned);

    let (title, link) = match (title, link) {
        (Some(title), Some(link)) => (title, link),
        (title, link) => {
            tracing::warn!(
                index = index,
                has_title = title.is_some(),
                has_link = link.is_some(),
                "Skipping feed item without title or link"
            );
            return None;
        }
    };

    let content = first_of(el, ITEM_CONTENT).map(str::to_owned);
    let summary = first_of(el, ITEM_SUMMARY).map(str::to_owned);
    let image_url = extract_image(el, content.as_deref(), summary.as_deref());
    let guid = first_of(el, ITEM_GUID)
        .map(str::to_owned)
        .unwrap_or_else(|| link.clone());

    Some(FeedItem {
        publication_date: first_of(el, ITEM_DATE).and_then(normalize_date),
        categories: categories(el),
        title,
        link,
        content,
        summary,
        guid,
        image_url,
    })
}

/// Category text in document order; Atom `term` when the element has no text.
fn categories(el: &Element<'_>) -> Vec<String> {
    el.children_named("category")
        .filter_map(|c| {
            let text = c.text.trim();
            if text.is_empty() {
                c.attr("term").and_then(clean_text)
            } else {
                clean_text(text)
            }
        })
        .collect()
}

/// `media:content` url, then an image enclosure, then the first inline `<img>`.
fn extract_image(el: &Element<'_>, content: Option<&str>, summary: Option<&str>) -> Option<String> {
    let non_empty = |s: &&str| !s.trim().is_empty();

    let media = el
        .find_all("media:content")
        .into_iter()
        .find_map(|m| m.attr("url").filter(non_empty));

    let enclosure = || {
        el.children_named("enclosure")
            .filter(|e| {
                e.attr("type")
                    .is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
            })
            .find_map(|e| e.attr("url").filter(non_empty))
    };

    media
        .or_else(enclosure)
        .map(|url| url.trim().to_owned())
        .or_else(|| [content, summary].into_iter().flatten().find_map(first_img_src))
}

static IMG_SRC: OnceLock<Option<Regex>> = OnceLock::new();

fn img_src_pattern() -> Option<&'static Regex> {
    IMG_SRC
        .get_or_init(|| Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).ok())
        .as_ref()
}

/// First `<img src="...">` in an HTML fragment.
fn first_img_src(html: &str) -> Option<String> {
    let captures = img_src_pattern()?.captures(html)?;
    let src = captures.get(1)?.as_str().trim();
    (!src.is_empty()).then(|| decode_html_entities(src).into_owned())
}
