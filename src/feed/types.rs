use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Parsed Feed Content
// ============================================================================

/// One article/entry extracted from an RSS `<item>` or Atom `<entry>`.
///
/// Only constructed when both `title` and `link` are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Normalized publication instant; `None` when absent or unparseable
    pub publication_date: Option<DateTime<Utc>>,
    /// Raw HTML/text body
    pub content: Option<String>,
    pub summary: Option<String>,
    /// Entry id, or the link when the feed provides none
    pub guid: String,
    pub categories: Vec<String>,
    /// First image from `media:content`, an image enclosure, or an inline `<img>`
    pub image_url: Option<String>,
}

/// Channel-level descriptors. Absent fields stay `None`; nothing is invented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub copyright: Option<String>,
    pub publication_date: Option<String>,
    pub last_build_date: Option<String>,
    pub generator: Option<String>,
    pub managing_editor: Option<String>,
    pub web_master: Option<String>,
}

/// A fetched and parsed feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub metadata: FeedMetadata,
    pub items: Vec<FeedItem>,
}

// ============================================================================
// Discovery & Resolution
// ============================================================================

/// A candidate feed found on a web page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredFeed {
    /// Absolute URL of the RSS/Atom feed
    pub url: String,
    /// Title from the `<link title>` attribute (or the feed itself), if any
    pub title: Option<String>,
}

impl DiscoveredFeed {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
        }
    }
}

/// The feed that owns a shared article, plus site-level metadata of its page.
///
/// `feed_url: None` means "no feed found", which is the common outcome for
/// arbitrary article URLs and not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleFeed {
    pub feed_url: Option<String>,
    pub feed_title: Option<String>,
    pub site_title: Option<String>,
    pub site_description: Option<String>,
    pub site_icon: Option<String>,
}
