use super::fetcher::Fetcher;
use super::types::DiscoveredFeed;
use crate::util::html::find_tags;
use crate::util::{clean_text, normalize_page_url, origin_of, resolve_url};
use url::Url;

/// Conventional feed locations, probed in this order against the page origin.
pub const CONVENTIONAL_PATHS: &[&str] = &[
    "/feed",
    "/rss",
    "/feed.xml",
    "/rss.xml",
    "/atom.xml",
    "/index.xml",
    "/feeds/posts/default",
    "/blog/feed",
    "/blog/rss",
    "/blog/index.xml",
    "/blog/atom.xml",
    "/rss/index.rss",
    "/atom/index.atom",
];

/// Extra locations used by static-site generators, probed only on platform hosts.
pub const PLATFORM_PATHS: &[&str] = &[
    "/feed.atom",
    "/posts/index.xml",
    "/index.rss",
    "/rss/feed.xml",
];

/// Feed file names tried under a project page's first path segment.
const PROJECT_FEED_FILES: &[&str] = &["feed.xml", "atom.xml", "index.xml", "rss.xml"];

pub const DEFAULT_STATIC_SITE_PLATFORMS: &[&str] = &[
    "github.io",
    "gitlab.io",
    "netlify.app",
    "vercel.app",
    "pages.dev",
    "surge.sh",
    "neocities.org",
];

/// Finds RSS/Atom feeds for a web page.
///
/// Stages, stopping at the first one that finds anything:
/// 1. the page is itself a feed
/// 2. `<link>` tags whose `type` mentions rss, atom or xml
/// 3. [`CONVENTIONAL_PATHS`] on the page origin
/// 4. [`PLATFORM_PATHS`] when the host is a static-site platform
///
/// Never fails: "no feed" is an empty list.
#[derive(Debug, Clone)]
pub struct FeedDiscoverer {
    fetcher: Fetcher,
    platforms: Vec<String>,
}

impl FeedDiscoverer {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            platforms: DEFAULT_STATIC_SITE_PLATFORMS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
        }
    }

    /// Replaces the static-site platform host suffixes.
    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetches `page_url` and runs every discovery stage.
    ///
    /// `page_url` may omit the scheme (`example.com/blog`); `https://` is assumed.
    pub async fn discover_feeds(&self, page_url: &str) -> Vec<DiscoveredFeed> {
        let Some(page) = normalize_page_url(page_url) else {
            tracing::debug!(url = page_url, "Not a usable page URL");
            return Vec::new();
        };

        let html = match self.fetcher.fetch_text(page.as_str()).await {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::debug!(url = %page, error = %e, "Page fetch failed, probing paths only");
                None
            }
        };

        self.discover_in_page(&page, html.as_deref()).await
    }

    /// Runs discovery against an already fetched page body.
    ///
    /// `html: None` means the page could not be fetched; only path probing runs.
    pub async fn discover_in_page(&self, page: &Url, html: Option<&str>) -> Vec<DiscoveredFeed> {
        if let Some(html) = html {
            if let Some(feed) = page_as_feed(html, page) {
                tracing::info!(url = %feed.url, "Page is itself a feed");
                return vec![feed];
            }

            let linked = find_feed_links(html, page);
            if !linked.is_empty() {
                tracing::info!(url = %page, count = linked.len(), "Discovered feed links");
                return linked;
            }
        }

        if let Some(url) = self.probe_first(conventional_candidates(page)).await {
            return vec![DiscoveredFeed::new(url, None)];
        }

        if self.is_static_site(page) {
            if let Some(url) = self.probe_first(platform_candidates(page)).await {
                return vec![DiscoveredFeed::new(url, None)];
            }
        }

        tracing::debug!(url = %page, "No feed found");
        Vec::new()
    }

    /// Probes candidates one at a time and returns the first that looks like a feed.
    async fn probe_first(&self, candidates: Vec<String>) -> Option<String> {
        for candidate in candidates {
            match self.fetcher.probe(&candidate).await {
                Ok(probe) if probe.is_feed() => {
                    tracing::info!(url = %candidate, "Discovered feed by probing");
                    return Some(candidate);
                }
                Ok(probe) => {
                    tracing::debug!(
                        url = %candidate,
                        status = probe.status,
                        content_type = %probe.content_type,
                        "Probe miss"
                    );
                }
                Err(e) => {
                    tracing::debug!(url = %candidate, error = %e, "Probe failed");
                }
            }
        }
        None
    }

    fn is_static_site(&self, page: &Url) -> bool {
        page.host_str()
            .is_some_and(|host| is_platform_host(host, &self.platforms))
    }
}

/// True when `host` equals a platform suffix or is a subdomain of one.
fn is_platform_host(host: &str, platforms: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    platforms.iter().any(|platform| {
        let platform = platform.trim().trim_start_matches('.').to_ascii_lowercase();
        !platform.is_empty()
            && (host == platform || host.ends_with(&format!(".{platform}")))
    })
}

/// Returns the page itself when its body is an RSS, Atom or JSON feed.
fn page_as_feed(body: &str, page: &Url) -> Option<DiscoveredFeed> {
    let feed = feed_rs::parser::parse(body.as_bytes()).ok()?;
    let title = feed.title.and_then(|t| clean_text(&t.content));
    Some(DiscoveredFeed::new(page.as_str(), title))
}

/// Collects `<link>` tags whose `type` mentions rss, atom or xml, in document
/// order, with hrefs resolved against the page. Duplicates keep the first.
pub fn find_feed_links(html: &str, page: &Url) -> Vec<DiscoveredFeed> {
    let mut feeds: Vec<DiscoveredFeed> = Vec::new();

    for tag in find_tags(html, "link") {
        let is_feed_type = ["rss", "atom", "xml"]
            .iter()
            .any(|kind| tag.attr_contains("type", kind));
        if !is_feed_type {
            continue;
        }

        let Some(url) = tag.attr("href").and_then(|href| resolve_url(&href, page)) else {
            continue;
        };
        if feeds.iter().any(|f| f.url == url) {
            continue;
        }

        let title = tag.attr("title").and_then(|t| clean_text(&t));
        feeds.push(DiscoveredFeed::new(url, title));
    }

    feeds
}

fn conventional_candidates(page: &Url) -> Vec<String> {
    let origin = origin_of(page);
    CONVENTIONAL_PATHS
        .iter()
        .map(|path| format!("{origin}{path}"))
        .collect()
}

/// Project-page variants under the first path segment, then [`PLATFORM_PATHS`].
fn platform_candidates(page: &Url) -> Vec<String> {
    let origin = origin_of(page);
    let project = page
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty());

    let mut candidates: Vec<String> = project
        .map(|segment| {
            PROJECT_FEED_FILES
                .iter()
                .map(|file| format!("{origin}/{segment}/{file}"))
                .collect()
        })
        .unwrap_or_default();

    candidates.extend(PLATFORM_PATHS.iter().map(|path| format!("{origin}{path}")));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::fetcher::FetchSettings;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Blog</title>
  <link>https://example.com</link>
  <item><title>First</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    fn discoverer() -> FeedDiscoverer {
        FeedDiscoverer::new(Fetcher::new(
            reqwest::Client::new(),
            FetchSettings {
                allow_private_hosts: true,
                ..FetchSettings::default()
            },
        ))
    }

    fn page(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    fn html_page(head: &str) -> String {
        format!("<!DOCTYPE html><html><head>{head}</head><body><p>Hello</p></body></html>")
    }

    // --- HTML link scanning ---

    #[test]
    fn test_find_feed_links_resolves_and_titles() {
        let html = html_page(
            r#"<link rel="alternate" type="application/rss+xml" href="/feed.xml" title="  Main   RSS ">
               <LINK REL="alternate" TYPE="Application/Atom+XML" HREF="atom.xml">
               <link rel="stylesheet" href="/style.css" type="text/css">"#,
        );
        let feeds = find_feed_links(&html, &page("https://example.com/blog/"));
        assert_eq!(
            feeds,
            vec![
                DiscoveredFeed::new("https://example.com/feed.xml", Some("Main RSS".into())),
                DiscoveredFeed::new("https://example.com/blog/atom.xml", None),
            ]
        );
    }

    #[test]
    fn test_find_feed_links_accepts_any_xml_type_and_quotes() {
        let html = html_page(
            r#"<link type='application/xml' href='/a.xml'>
               <link type=text/xml href=/b.xml>
               <link href="//cdn.example.org/c.rss" type="application/rss+xml">"#,
        );
        let urls: Vec<String> = find_feed_links(&html, &page("https://example.com/"))
            .into_iter()
            .map(|f| f.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a.xml",
                "https://example.com/b.xml",
                "https://cdn.example.org/c.rss",
            ]
        );
    }

    #[test]
    fn test_find_feed_links_dedupes_in_order() {
        let html = html_page(
            r#"<link type="application/rss+xml" href="/feed" title="First">
               <link type="application/rss+xml" href="https://example.com/feed" title="Second">"#,
        );
        let feeds = find_feed_links(&html, &page("https://example.com/"));
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title.as_deref(), Some("First"));
    }

    #[test]
    fn test_find_feed_links_ignores_commented_out_and_hrefless() {
        let html = html_page(
            r#"<!-- <link type="application/rss+xml" href="/old.xml"> -->
               <link type="application/rss+xml">
               <link type="application/rss+xml" href="">"#,
        );
        assert!(find_feed_links(&html, &page("https://example.com/")).is_empty());
    }

    // --- Candidate lists ---

    #[test]
    fn test_conventional_candidates_use_origin_in_order() {
        let candidates = conventional_candidates(&page("https://example.com:8443/a/b?c=d"));
        assert_eq!(candidates.len(), CONVENTIONAL_PATHS.len());
        assert_eq!(candidates[0], "https://example.com:8443/feed");
        assert_eq!(candidates[2], "https://example.com:8443/feed.xml");
        assert_eq!(
            candidates.last().map(String::as_str),
            Some("https://example.com:8443/atom/index.atom")
        );
    }

    #[test]
    fn test_platform_candidates_try_project_first() {
        let candidates = platform_candidates(&page("https://user.github.io/project/post/1"));
        assert_eq!(
            candidates,
            vec![
                "https://user.github.io/project/feed.xml",
                "https://user.github.io/project/atom.xml",
                "https://user.github.io/project/index.xml",
                "https://user.github.io/project/rss.xml",
                "https://user.github.io/feed.atom",
                "https://user.github.io/posts/index.xml",
                "https://user.github.io/index.rss",
                "https://user.github.io/rss/feed.xml",
            ]
        );

        let root_only = platform_candidates(&page("https://user.github.io/"));
        assert_eq!(root_only.len(), PLATFORM_PATHS.len());
    }

    #[test]
    fn test_platform_host_matching() {
        let platforms: Vec<String> = DEFAULT_STATIC_SITE_PLATFORMS
            .iter()
            .map(|p| (*p).to_owned())
            .collect();
        assert!(is_platform_host("user.github.io", &platforms));
        assert!(is_platform_host("Blog.Netlify.App", &platforms));
        assert!(is_platform_host("pages.dev", &platforms));
        assert!(!is_platform_host("notgithub.io", &platforms));
        assert!(!is_platform_host("example.com", &platforms));
    }

    // --- End-to-end against a mock server ---

    #[tokio::test]
    async fn test_link_tag_wins_without_probing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html_page(
                r#"<link rel="alternate" type="application/rss+xml" href="/feed.xml">"#,
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let feeds = discoverer()
            .discover_feeds(&format!("{}/post", server.uri()))
            .await;
        assert_eq!(
            feeds,
            vec![DiscoveredFeed::new(format!("{}/feed.xml", server.uri()), None)]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_conventional_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html_page("<title>No feeds</title>")))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Content-Type", "application/rss+xml"),
            )
            .expect(1)
            .mount(&server)
            .await;
        // Later paths must not be probed once /feed.xml hits
        Mock::given(method("HEAD"))
            .and(path("/atom.xml"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Content-Type", "application/atom+xml"),
            )
            .expect(0)
            .mount(&server)
            .await;

        let feeds = discoverer().discover_feeds(&server.uri()).await;
        assert_eq!(
            feeds,
            vec![DiscoveredFeed::new(format!("{}/feed.xml", server.uri()), None)]
        );
    }

    #[tokio::test]
    async fn test_page_that_is_a_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/rss+xml")
                    .set_body_string(RSS),
            )
            .mount(&server)
            .await;

        let url = format!("{}/feed", server.uri());
        let feeds = discoverer().discover_feeds(&url).await;
        assert_eq!(
            feeds,
            vec![DiscoveredFeed::new(url, Some("Example Blog".into()))]
        );
    }

    #[tokio::test]
    async fn test_failed_page_fetch_still_probes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/rss"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Content-Type", "application/xml"),
            )
            .mount(&server)
            .await;

        let feeds = discoverer()
            .discover_feeds(&format!("{}/article", server.uri()))
            .await;
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].url, format!("{}/rss", server.uri()));
    }

    #[tokio::test]
    async fn test_platform_paths_probed_on_platform_hosts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html_page("")))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/project/atom.xml"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Content-Type", "application/atom+xml"),
            )
            .mount(&server)
            .await;

        let page_url = format!("{}/project/2024/post.html", server.uri());

        // Mock server host is not a platform by default
        assert!(discoverer().discover_feeds(&page_url).await.is_empty());

        let feeds = discoverer()
            .with_platforms(["127.0.0.1"])
            .discover_feeds(&page_url)
            .await;
        assert_eq!(
            feeds,
            vec![DiscoveredFeed::new(
                format!("{}/project/atom.xml", server.uri()),
                None
            )]
        );
    }

    #[tokio::test]
    async fn test_nothing_found_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html_page("")))
            .mount(&server)
            .await;

        assert!(discoverer().discover_feeds(&server.uri()).await.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_urls_yield_empty() {
        let discoverer = discoverer();
        assert!(discoverer.discover_feeds("").await.is_empty());
        assert!(discoverer.discover_feeds("ftp://example.com").await.is_empty());
    }
}
