use super::discovery::FeedDiscoverer;
use super::fetcher::FetchError;
use super::parser::FeedParser;
use super::types::ArticleFeed;
use crate::util::html::{element_text, find_tags};
use crate::util::{clean_text, normalize_page_url, resolve_url};
use html_escape::decode_html_entities;
use url::Url;

/// Site-level metadata read from a page's `<head>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Works out which feed a shared article belongs to.
#[derive(Debug, Clone)]
pub struct ArticleResolver {
    discoverer: FeedDiscoverer,
    parser: FeedParser,
}

impl ArticleResolver {
    pub fn new(discoverer: FeedDiscoverer, parser: FeedParser) -> Self {
        Self { discoverer, parser }
    }

    /// Fetches the article page once, reads its site metadata and runs feed
    /// discovery on the same HTML.
    ///
    /// A page without a feed is `Ok` with `feed_url: None`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the URL is unusable or the article page
    /// itself cannot be fetched.
    pub async fn resolve_feed_for_article(&self, article_url: &str) -> Result<ArticleFeed, FetchError> {
        let page = normalize_page_url(article_url)
            .ok_or_else(|| FetchError::InvalidUrl(article_url.trim().to_owned()))?;

        let fetcher = self.discoverer.fetcher();
        let html = fetcher.fetch_text(page.as_str()).await?;
        let site = site_metadata(&html, &page);

        let discovered = self.discoverer.discover_in_page(&page, Some(&html)).await;
        let Some(feed) = discovered.into_iter().next() else {
            tracing::debug!(url = %page, "Article has no feed");
            return Ok(ArticleFeed {
                feed_url: None,
                feed_title: None,
                site_title: site.title,
                site_description: site.description,
                site_icon: site.icon,
            });
        };

        let feed_title = match feed.title {
            Some(title) => Some(title),
            None => self.feed_title(&feed.url).await,
        };

        Ok(ArticleFeed {
            feed_url: Some(feed.url),
            feed_title,
            site_title: site.title,
            site_description: site.description,
            site_icon: site.icon,
        })
    }

    /// Title from the feed document; any failure just leaves it out.
    async fn feed_title(&self, feed_url: &str) -> Option<String> {
        let xml = match self.discoverer.fetcher().fetch_text(feed_url).await {
            Ok(xml) => xml,
            Err(e) => {
                tracing::debug!(url = feed_url, error = %e, "Could not fetch feed for its title");
                return None;
            }
        };
        self.parser.metadata(&xml).ok()?.title
    }
}

/// Reads `<title>`, `<meta name="description">` and the preferred icon link.
///
/// `apple-touch-icon` beats `icon` / `shortcut icon`. No icon is guessed when
/// the page declares none.
pub fn site_metadata(html: &str, page: &Url) -> SiteMetadata {
    let title = element_text(html, "title").and_then(|t| clean_text(&decode_html_entities(t)));

    let description = find_tags(html, "meta")
        .into_iter()
        .find(|tag| {
            tag.attr("name")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|tag| tag.attr("content"))
        .and_then(|content| clean_text(&content));

    let links = find_tags(html, "link");
    let icon_href = |rel: &str| {
        links
            .iter()
            .filter(|tag| tag.attr_has_token("rel", rel))
            .find_map(|tag| tag.attr("href").and_then(|href| resolve_url(&href, page)))
    };
    let icon = icon_href("apple-touch-icon").or_else(|| icon_href("icon"));

    SiteMetadata {
        title,
        description,
        icon,
    }
}
