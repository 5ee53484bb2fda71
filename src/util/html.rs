//! Minimal HTML tag scanner.
//!
//! Pages handed to discovery are arbitrary real-world HTML, so this works on
//! raw text instead of building a DOM: it finds start tags by name and reads
//! their attributes. Matching is ASCII case-insensitive; byte offsets are shared
//! between the original and the lowercased copy because `to_ascii_lowercase`
//! never changes lengths.

use html_escape::decode_html_entities;

/// A start tag found in an HTML document, e.g. `<link rel="alternate" ...>`.
#[derive(Debug, Clone, Copy)]
pub struct Tag<'a> {
    /// Text between the tag name and the closing `>`.
    attrs: &'a str,
}

impl<'a> Tag<'a> {
    /// Returns the entity-decoded value of the first attribute named `name`.
    ///
    /// Valueless attributes (`<link async>`) yield an empty string.
    pub fn attr(&self, name: &str) -> Option<String> {
        AttrIter { rest: self.attrs }
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| decode_html_entities(value).into_owned())
    }

    /// True if the attribute exists and its value, lowercased, contains `needle`.
    pub fn attr_contains(&self, name: &str, needle: &str) -> bool {
        self.attr(name)
            .is_some_and(|v| v.to_ascii_lowercase().contains(needle))
    }

    /// True if the whitespace-separated token list in `name` contains `token`.
    pub fn attr_has_token(&self, name: &str, token: &str) -> bool {
        self.attr(name).is_some_and(|v| {
            v.split_ascii_whitespace()
                .any(|t| t.eq_ignore_ascii_case(token))
        })
    }
}

/// Finds every start tag called `name` in document order.
pub fn find_tags<'a>(html: &'a str, name: &str) -> Vec<Tag<'a>> {
    let lower = html.to_ascii_lowercase();
    let needle = format!("<{}", name.to_ascii_lowercase());
    let mut tags = Vec::new();
    let mut search_from = 0;

    while let Some(found) = lower[search_from..].find(&needle) {
        let start = search_from + found;
        let after_name = start + needle.len();

        // `<li` must not match `<link`
        let boundary = lower.as_bytes().get(after_name).copied();
        if !matches!(boundary, Some(b) if b.is_ascii_whitespace() || b == b'>' || b == b'/') {
            search_from = after_name;
            continue;
        }

        let Some(end) = tag_end(&html[after_name..]) else {
            break;
        };

        if !inside_comment(&lower[..start]) {
            tags.push(Tag {
                attrs: &html[after_name..after_name + end],
            });
        }
        search_from = after_name + end + 1;
    }

    tags
}

/// Returns the trimmed text between the first `<name ...>` and its `</name>`.
pub fn element_text<'a>(html: &'a str, name: &str) -> Option<&'a str> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", name.to_ascii_lowercase());
    let close = format!("</{}", name.to_ascii_lowercase());

    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find(&open) {
        let start = search_from + found + open.len();
        let boundary = lower.as_bytes().get(start).copied();
        if !matches!(boundary, Some(b) if b.is_ascii_whitespace() || b == b'>') {
            search_from = start;
            continue;
        }
        let body_start = start + tag_end(&html[start..])? + 1;
        let body_end = body_start + lower[body_start..].find(&close)?;
        let text = html[body_start..body_end].trim();
        return (!text.is_empty()).then_some(text);
    }
    None
}

/// Offset of the `>` closing a tag, skipping `>` inside quoted values.
fn tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in s.bytes().enumerate() {
        match (quote, b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(b),
            (None, b'>') => return Some(i),
            (None, _) => {}
        }
    }
    None
}

/// True if the prefix ends inside an unterminated `<!--`.
fn inside_comment(prefix: &str) -> bool {
    match prefix.rfind("<!--") {
        Some(open) => !prefix[open..].contains("-->"),
        None => false,
    }
}

/// Iterates `(name, raw value)` pairs of a tag's attribute text.
struct AttrIter<'a> {
    rest: &'a str,
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let s = self
            .rest
            .trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');
        if s.is_empty() {
            return None;
        }

        let name_len = s
            .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '/')
            .unwrap_or(s.len());
        if name_len == 0 {
            // Stray '=' with no name; skip it
            self.rest = &s[1..];
            return self.next();
        }
        let name = &s[..name_len];
        let after_name = s[name_len..].trim_start();

        let Some(value_part) = after_name.strip_prefix('=') else {
            self.rest = after_name;
            return Some((name, ""));
        };
        let value_part = value_part.trim_start();

        let (value, rest) = match value_part.as_bytes().first() {
            Some(&q) if q == b'"' || q == b'\'' => {
                let inner = &value_part[1..];
                match inner.find(q as char) {
                    Some(end) => (&inner[..end], &inner[end + 1..]),
                    None => (inner, ""),
                }
            }
            _ => {
                let end = value_part
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(value_part.len());
                (&value_part[..end], &value_part[end..])
            }
        };

        self.rest = rest;
        Some((name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_link_tags() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/style.css">
            <LINK REL="alternate" TYPE="application/rss+xml" HREF="/feed.xml" title="RSS">
        </head></html>"#;
        let tags = find_tags(html, "link");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].attr("href").as_deref(), Some("/feed.xml"));
        assert_eq!(tags[1].attr("title").as_deref(), Some("RSS"));
        assert!(tags[1].attr_contains("type", "rss"));
    }

    #[test]
    fn test_prefix_of_other_tag_is_not_matched() {
        let html = r#"<ul><li>one</li></ul><link href="/a">"#;
        assert_eq!(find_tags(html, "li").len(), 1);
        assert_eq!(find_tags(html, "link").len(), 1);
    }

    #[test]
    fn test_quote_styles_and_unquoted_values() {
        let html = r#"<link rel='alternate' type=application/atom+xml href=/atom.xml/>"#;
        let tag = find_tags(html, "link")[0];
        assert_eq!(tag.attr("rel").as_deref(), Some("alternate"));
        assert_eq!(tag.attr("type").as_deref(), Some("application/atom+xml"));
        assert_eq!(tag.attr("href").as_deref(), Some("/atom.xml/"));
    }

    #[test]
    fn test_gt_inside_quoted_value() {
        let html = r#"<link title="a > b" href="/feed">"#;
        let tag = find_tags(html, "link")[0];
        assert_eq!(tag.attr("title").as_deref(), Some("a > b"));
        assert_eq!(tag.attr("href").as_deref(), Some("/feed"));
    }

    #[test]
    fn test_data_attribute_does_not_shadow_href() {
        let html = r#"<link data-href="/wrong" href="/right">"#;
        let tag = find_tags(html, "link")[0];
        assert_eq!(tag.attr("href").as_deref(), Some("/right"));
    }

    #[test]
    fn test_entities_in_attribute_values_are_decoded() {
        let html = r#"<link href="/feed?a=1&amp;b=2">"#;
        let tag = find_tags(html, "link")[0];
        assert_eq!(tag.attr("href").as_deref(), Some("/feed?a=1&b=2"));
    }

    #[test]
    fn test_commented_out_tags_are_skipped() {
        let html = r#"<!-- <link href="/old"> --><link href="/new">"#;
        let tags = find_tags(html, "link");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].attr("href").as_deref(), Some("/new"));
    }

    #[test]
    fn test_token_list_attribute() {
        let html = r#"<link rel="shortcut icon" href="/favicon.png">"#;
        let tag = find_tags(html, "link")[0];
        assert!(tag.attr_has_token("rel", "icon"));
        assert!(!tag.attr_has_token("rel", "apple-touch-icon"));
    }

    #[test]
    fn test_element_text() {
        let html = "<html><head><TITLE>  My Blog </title></head></html>";
        assert_eq!(element_text(html, "title"), Some("My Blog"));
        assert_eq!(element_text("<title></title>", "title"), None);
        assert_eq!(element_text("<html></html>", "title"), None);
    }
}
