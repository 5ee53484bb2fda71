//! Permissive XML element tree for feed documents.
//!
//! Real-world feeds are frequently not well-formed: stray end tags, unclosed
//! elements, undeclared prefixes, HTML entities. The tree builder recovers from
//! all of these and, in permissive mode, keeps whatever structure was read
//! before a fatal syntax error.

use html_escape::decode_html_entities;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Whether XML syntax errors abort parsing or are swallowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Keep the partial tree built before the first syntax error
    #[default]
    Permissive,
    /// Surface the first syntax error to the caller
    Strict,
}

/// An XML element with its qualified name (`media:content`, `dc:date`, ...).
#[derive(Debug, Clone, Default)]
pub struct Element<'a> {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text and CDATA children, with XML and HTML entities decoded
    pub text: String,
    /// Raw markup between the start and end tags
    pub inner: &'a str,
    pub children: Vec<Element<'a>>,
}

impl<'a> Element<'a> {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with this exact qualified name.
    pub fn child(&self, name: &str) -> Option<&Element<'a>> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with this exact qualified name, in document order.
    pub fn children_named<'s>(
        &'s self,
        name: &'s str,
    ) -> impl Iterator<Item = &'s Element<'a>> + 's {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First element with this name in a depth-first walk, including `self`.
    pub fn find(&self, name: &str) -> Option<&Element<'a>> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Every element with this name in document order, without descending
    /// into matches (an `<item>` inside an `<item>` is not reported twice).
    pub fn find_all(&self, name: &str) -> Vec<&Element<'a>> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'s>(&'s self, name: &str, out: &mut Vec<&'s Element<'a>>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            } else {
                child.collect_named(name, out);
            }
        }
    }

    /// Trimmed text of a leaf element, or the raw inner markup of an element
    /// with children (unescaped HTML in a description, Atom `type="xhtml"`).
    pub fn text_or_markup(&self) -> &str {
        if self.children.is_empty() {
            self.text.trim()
        } else {
            self.inner.trim()
        }
    }
}

/// A document's root element.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    pub root: Element<'a>,
}

/// XML syntax error reported in [`ParseMode::Strict`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub position: u64,
    pub message: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at byte {}", self.message, self.position)
    }
}

/// Builds an element tree from `source`.
///
/// Returns `Ok(None)` when no element could be read at all.
pub fn parse_document(source: &str, mode: ParseMode) -> Result<Option<Document<'_>>, SyntaxError> {
    let source = source.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(source);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.expand_empty_elements = false;
    }

    // Synthetic container; the document root is its first element child.
    let mut stack: Vec<(Element<'_>, usize)> = vec![(Element::default(), 0)];

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = open_element(&start);
                stack.push((element, reader.buffer_position() as usize));
            }
            Ok(Event::Empty(start)) => {
                let element = open_element(&start);
                if let Some((parent, _)) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::End(end)) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                // Close up to the nearest matching open element; ignore strays
                if let Some(depth) = stack.iter().rposition(|(el, _)| el.name == name) {
                    if depth == 0 {
                        continue;
                    }
                    while stack.len() > depth + 1 {
                        close_top(&mut stack, source, before);
                    }
                    close_top(&mut stack, source, before);
                }
            }
            Ok(Event::Text(text)) => {
                // Feeds use HTML named entities freely; unknown ones stay verbatim
                let raw = String::from_utf8_lossy(&text);
                if let Some((el, _)) = stack.last_mut() {
                    el.text.push_str(&decode_html_entities(&raw));
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some((el, _)) = stack.last_mut() {
                    el.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                let error = SyntaxError {
                    position: reader.error_position(),
                    message: e.to_string(),
                };
                if mode == ParseMode::Strict {
                    return Err(error);
                }
                tracing::debug!(error = %error, "Malformed XML, keeping partial document");
                break;
            }
        }
    }

    let end = source.len();
    while stack.len() > 1 {
        close_top(&mut stack, source, end);
    }

    let container = stack.pop().map(|(el, _)| el).unwrap_or_default();
    Ok(container
        .children
        .into_iter()
        .next()
        .map(|root| Document { root }))
}

fn open_element<'a>(start: &BytesStart<'_>) -> Element<'a> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attrs = start.html_attributes();
    attrs.with_checks(false);
    let attributes = attrs
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = decode_html_entities(&String::from_utf8_lossy(&attr.value)).into_owned();
            (key, value)
        })
        .collect();

    Element {
        name,
        attributes,
        ..Element::default()
    }
}

/// Pops the innermost open element, records its raw markup, attaches it to its parent.
fn close_top<'a>(stack: &mut Vec<(Element<'a>, usize)>, source: &'a str, inner_end: usize) {
    if stack.len() < 2 {
        return;
    }
    if let Some((mut element, inner_start)) = stack.pop() {
        element.inner = source.get(inner_start..inner_end).unwrap_or("");
        if let Some((parent, _)) = stack.last_mut() {
            parent.children.push(element);
        }
    }
}
