//! Utility functions shared by the feed pipeline.
//!
//! - **URL handling**: SSRF validation, scheme normalization, relative resolution
//! - **HTML scanning**: dependency-free start-tag and attribute extraction
//! - **Text processing**: control-character stripping and whitespace cleanup
//!
//! # Examples
//!
//! ```
//! use feedscout::util::{normalize_page_url, validate_url};
//!
//! let page = normalize_page_url("example.com/blog").unwrap();
//! assert_eq!(page.as_str(), "https://example.com/blog");
//! assert!(validate_url(page.as_str()).is_ok());
//! ```

pub mod html;
mod text;
mod url_validator;

pub use text::{clean_text, collapse_whitespace, strip_control_chars};
pub use url_validator::{
    normalize_page_url, origin_of, resolve_url, validate_url, UrlValidationError,
};
