use super::fetcher::{FetchError, Fetcher};
use super::parser::{FeedParser, ParseError};
use super::types::{Feed, FeedItem};
use crate::util::normalize_page_url;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 5;

pub const NO_FEED_MESSAGE: &str = "No feed found on this page";
pub const EMPTY_FEED_MESSAGE: &str = "This feed is currently empty, you can still subscribe";
pub const READ_FAILED_MESSAGE: &str = "Could not read feed, check the URL";

/// Errors from fetching and parsing one feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FeedError {
    /// The feed was read fine but has no items. Callers treat this as success.
    pub fn is_empty_feed(&self) -> bool {
        matches!(self, FeedError::Parse(ParseError::EmptyFeed))
    }

    /// Message to show an end user for this outcome.
    pub fn user_message(&self) -> &'static str {
        if self.is_empty_feed() {
            EMPTY_FEED_MESSAGE
        } else {
            READ_FAILED_MESSAGE
        }
    }
}

/// Fetches and parses a single feed.
///
/// `url` may be user input such as `example.com/feed.xml`; it is normalized
/// the same way discovery normalizes page URLs.
///
/// [`ParseError::EmptyFeed`] is kept as an error so the caller decides how
/// to present it; see [`FeedError::is_empty_feed`].
pub async fn fetch_feed(fetcher: &Fetcher, parser: &FeedParser, url: &str) -> Result<Feed, FeedError> {
    let xml = match normalize_page_url(url) {
        Some(normalized) => fetcher.fetch_text(normalized.as_str()).await?,
        None => fetcher.fetch_text(url).await?,
    };
    Ok(parser.parse(&xml)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Active,
    Error,
}

/// Result of one feed in a batch ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedOutcome {
    pub url: String,
    pub status: FeedStatus,
    pub item_count: usize,
    /// User-facing message for failed feeds
    pub error: Option<String>,
    /// Underlying cause, for logs and `--json` output
    pub detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// An item tagged with the feed it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedItem {
    pub feed_url: String,
    #[serde(flatten)]
    pub item: FeedItem,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregation {
    /// One entry per input URL, in input order
    pub outcomes: Vec<FeedOutcome>,
    /// Newest first; undated items last
    pub items: Vec<AggregatedItem>,
}

/// Ingests many feeds in fixed-size concurrent groups.
///
/// Each group is fetched with a fan-out/fan-in join; groups run one after
/// another. A failing feed never cancels or delays its siblings beyond its
/// own fetch deadline.
#[derive(Debug, Clone)]
pub struct Aggregator {
    fetcher: Fetcher,
    parser: FeedParser,
    batch_size: usize,
}

impl Aggregator {
    pub fn new(fetcher: Fetcher, parser: FeedParser) -> Self {
        Self {
            fetcher,
            parser,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn ingest<S: AsRef<str>>(&self, urls: &[S]) -> Aggregation {
        let mut aggregation = Aggregation::default();

        for batch in urls.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|url| self.ingest_one(url.as_ref()))).await;
            for (outcome, items) in results {
                aggregation.outcomes.push(outcome);
                aggregation.items.extend(items);
            }
        }

        // Stable: equal dates keep feed order, then item order
        aggregation
            .items
            .sort_by(|a, b| b.item.publication_date.cmp(&a.item.publication_date));

        tracing::info!(
            feeds = aggregation.outcomes.len(),
            items = aggregation.items.len(),
            "Aggregation complete"
        );
        aggregation
    }

    async fn ingest_one(&self, url: &str) -> (FeedOutcome, Vec<AggregatedItem>) {
        let result = fetch_feed(&self.fetcher, &self.parser, url).await;
        let checked_at = Utc::now();

        match result {
            Ok(feed) => {
                let items: Vec<AggregatedItem> = feed
                    .items
                    .into_iter()
                    .map(|item| AggregatedItem {
                        feed_url: url.to_owned(),
                        item,
                    })
                    .collect();
                let outcome = FeedOutcome {
                    url: url.to_owned(),
                    status: FeedStatus::Active,
                    item_count: items.len(),
                    error: None,
                    detail: None,
                    checked_at,
                };
                (outcome, items)
            }
            Err(e) if e.is_empty_feed() => {
                tracing::debug!(url = url, "Feed is empty");
                let outcome = FeedOutcome {
                    url: url.to_owned(),
                    status: FeedStatus::Active,
                    item_count: 0,
                    error: None,
                    detail: None,
                    checked_at,
                };
                (outcome, Vec::new())
            }
            Err(e) => {
                tracing::warn!(url = url, error = %e, "Feed failed");
                let outcome = FeedOutcome {
                    url: url.to_owned(),
                    status: FeedStatus::Error,
                    item_count: 0,
                    error: Some(e.user_message().to_owned()),
                    detail: Some(e.to_string()),
                    checked_at,
                };
                (outcome, Vec::new())
            }
        }
    }
}
