//! Feed ingestion pipeline: fetching, discovery, parsing and article resolution.
//!
//! The pipeline is four stateless pieces that can be combined freely:
//!
//! - **Fetching**: bounded-time HTTP retrieval of feed XML and page HTML
//! - **Discovery**: finding RSS/Atom feeds for a web page
//! - **Parsing**: RSS and Atom metadata and items, with permissive XML handling
//! - **Resolution**: mapping a shared article URL to the feed that owns it
//!
//! # Architecture
//!
//! - [`fetcher`] - `reqwest` GET/HEAD with a per-call [`Deadline`] and SSRF checks
//! - [`discovery`] - `<link>` scanning plus conventional-path probing
//! - [`parser`] - accessor-chain field extraction over the [`xml`] element tree
//! - [`resolver`] - site metadata and feed lookup from one page fetch
//! - [`aggregate`] - batched multi-feed ingestion for callers
//!
//! Every call is independent; nothing is cached or shared between calls apart
//! from the caller's `reqwest::Client` connection pool.
//!
//! # Example
//!
//! ```no_run
//! use feedscout::feed::{fetch_feed, FeedDiscoverer, FeedParser, FetchSettings, Fetcher};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(reqwest::Client::new(), FetchSettings::default());
//!
//! let feeds = FeedDiscoverer::new(fetcher.clone())
//!     .discover_feeds("example.com/blog")
//!     .await;
//!
//! if let Some(found) = feeds.first() {
//!     let feed = fetch_feed(&fetcher, &FeedParser::default(), &found.url).await?;
//!     println!("{} items", feed.items.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod date;
pub mod discovery;
pub mod fetcher;
pub mod parser;
pub mod resolver;
mod types;
pub mod xml;

pub use aggregate::{
    fetch_feed, AggregatedItem, Aggregation, Aggregator, FeedError, FeedOutcome, FeedStatus,
    DEFAULT_BATCH_SIZE, EMPTY_FEED_MESSAGE, NO_FEED_MESSAGE, READ_FAILED_MESSAGE,
};
pub use date::normalize_date;
pub use discovery::{FeedDiscoverer, DEFAULT_STATIC_SITE_PLATFORMS};
pub use fetcher::{
    default_user_agent, Deadline, FetchError, FetchSettings, Fetcher, Probe,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEOUT,
};
pub use parser::{parse_feed_items, parse_feed_metadata, FeedParser, ParseError};
pub use resolver::{ArticleResolver, SiteMetadata};
pub use types::{ArticleFeed, DiscoveredFeed, Feed, FeedItem, FeedMetadata};
pub use xml::ParseMode;
