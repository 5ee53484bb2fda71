use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedscout::config::Config;
use feedscout::feed::{
    fetch_feed, Aggregation, Aggregator, ArticleFeed, ArticleResolver, DiscoveredFeed, Feed,
    FeedDiscoverer, FeedParser, FeedStatus, Fetcher, EMPTY_FEED_MESSAGE, NO_FEED_MESSAGE,
    READ_FAILED_MESSAGE,
};
use serde::Serialize;
use std::path::PathBuf;

/// Get the config directory path (~/.config/feedscout/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedscout"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedscout",
    version,
    about = "Find, read and aggregate RSS/Atom feeds"
)]
struct Args {
    /// Config file (default: ~/.config/feedscout/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List candidate feeds for a web page
    Discover {
        /// Page URL; https:// is assumed when no scheme is given
        url: String,
    },
    /// Fetch a feed and print its metadata and items
    Parse {
        #[arg(value_name = "FEED_URL")]
        url: String,
    },
    /// Find the feed that an article belongs to
    Resolve {
        #[arg(value_name = "ARTICLE_URL")]
        url: String,
    },
    /// Fetch several feeds and merge their items, newest first
    Aggregate {
        #[arg(value_name = "FEED_URL", required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = Fetcher::new(client, config.fetch_settings());
    let parser = FeedParser::new(config.parse_mode());
    let discoverer =
        FeedDiscoverer::new(fetcher.clone()).with_platforms(config.static_site_platforms.clone());

    match args.command {
        Command::Discover { url } => {
            let feeds = discoverer.discover_feeds(&url).await;
            if args.json {
                print_json(&feeds)?;
            } else {
                print_discovered(&feeds);
            }
        }
        Command::Parse { url } => match fetch_feed(&fetcher, &parser, &url).await {
            Ok(feed) => {
                if args.json {
                    print_json(&feed)?;
                } else {
                    print_feed(&feed);
                }
            }
            Err(e) if e.is_empty_feed() => {
                println!("{EMPTY_FEED_MESSAGE}");
            }
            Err(e) => {
                eprintln!("{READ_FAILED_MESSAGE}: {e}");
                std::process::exit(1);
            }
        },
        Command::Resolve { url } => {
            let resolver = ArticleResolver::new(discoverer, parser);
            match resolver.resolve_feed_for_article(&url).await {
                Ok(article) => {
                    if args.json {
                        print_json(&article)?;
                    } else {
                        print_article(&article);
                    }
                }
                Err(e) => {
                    eprintln!("{READ_FAILED_MESSAGE}: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Aggregate { urls } => {
            let aggregation = Aggregator::new(fetcher, parser)
                .with_batch_size(config.batch_size)
                .ingest(&urls)
                .await;
            if args.json {
                print_json(&aggregation)?;
            } else {
                print_aggregation(&aggregation);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn print_discovered(feeds: &[DiscoveredFeed]) {
    if feeds.is_empty() {
        println!("{NO_FEED_MESSAGE}");
        return;
    }
    for feed in feeds {
        match &feed.title {
            Some(title) => println!("{}  ({title})", feed.url),
            None => println!("{}", feed.url),
        }
    }
}

fn print_feed(feed: &Feed) {
    let meta = &feed.metadata;
    println!("{}", meta.title.as_deref().unwrap_or("Untitled feed"));
    if let Some(link) = &meta.link {
        println!("{link}");
    }
    if let Some(description) = &meta.description {
        println!("{description}");
    }
    println!();

    for item in &feed.items {
        let date = item
            .publication_date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "----------------".to_string());
        println!("{date}  {}", item.title);
        println!("                  {}", item.link);
    }
}

fn print_article(article: &ArticleFeed) {
    if let Some(title) = &article.site_title {
        println!("Site:        {title}");
    }
    if let Some(description) = &article.site_description {
        println!("Description: {description}");
    }
    if let Some(icon) = &article.site_icon {
        println!("Icon:        {icon}");
    }

    match &article.feed_url {
        Some(url) => {
            println!("Feed:        {url}");
            if let Some(title) = &article.feed_title {
                println!("Feed title:  {title}");
            }
        }
        None => println!("{NO_FEED_MESSAGE}"),
    }
}

fn print_aggregation(aggregation: &Aggregation) {
    for outcome in &aggregation.outcomes {
        match outcome.status {
            FeedStatus::Active if outcome.item_count == 0 => {
                println!("[active] {}  ({EMPTY_FEED_MESSAGE})", outcome.url);
            }
            FeedStatus::Active => {
                println!("[active] {}  ({} items)", outcome.url, outcome.item_count);
            }
            FeedStatus::Error => {
                println!(
                    "[error]  {}  ({})",
                    outcome.url,
                    outcome.detail.as_deref().unwrap_or(READ_FAILED_MESSAGE)
                );
            }
        }
    }
    println!();

    for entry in &aggregation.items {
        let date = entry
            .item
            .publication_date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "----------------".to_string());
        println!("{date}  {}", entry.item.title);
        println!("                  {}", entry.item.link);
    }
}
