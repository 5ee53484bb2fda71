//! RSS/Atom feed discovery, parsing and article-to-feed resolution.
//!
//! See [`feed`] for the pipeline and [`config`] for the TOML configuration
//! the `feedscout` binary reads.

pub mod config;
pub mod feed;
pub mod util;
