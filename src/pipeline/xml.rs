//! Minimal element tree built from `quick_xml` events
//!
//! The tree keeps tag names, attributes (in document order), the direct text
//! content before the first child, and child elements. Text that follows a
//! child element (tail text) and comments are dropped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct XmlError(String);

impl XmlError {
    fn new(message: impl Into<String>) -> Self {
        XmlError(message.into())
    }
}

/// A parsed XML element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Text and CDATA seen before the first child element, untrimmed
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::new(format!("bad attribute in <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::new(format!("bad attribute value in <{}>: {}", name, e)))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Element {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// Follow a slash-separated child path, taking the first match at each step
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |current, segment| {
                current.children.iter().find(|child| child.name == segment)
            })
    }

    /// Trimmed text at `path`, or `None` when the path is absent or blank
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.find(path)
            .map(|element| element.text.trim())
            .filter(|text| !text.is_empty())
    }

    /// All elements named `name` below this one, at any depth, in document order.
    /// The element itself is never included.
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_descendants(self, name, &mut found);
        found
    }
}

fn collect_descendants<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for child in &element.children {
        if child.name == name {
            found.push(child);
        }
        collect_descendants(child, name, found);
    }
}

/// Parse a complete document into its root element.
///
/// Fails on anything that is not exactly one well-formed root element,
/// including stray text outside the root.
pub fn parse(input: &str) -> Result<Element, XmlError> {
    let input = input.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XmlError::new(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(XmlError::new("multiple root elements"));
                }
                stack.push(Element::from_start(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(XmlError::new("multiple root elements"));
                }
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::new("closing tag without opening tag"))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| XmlError::new(format!("bad text content: {}", e)))?;
                match stack.last_mut() {
                    Some(current) if current.children.is_empty() => current.text.push_str(&text),
                    Some(_) => {}
                    None if text.trim().is_empty() => {}
                    None => return Err(XmlError::new("text outside the root element")),
                }
            }
            Event::CData(data) => match stack.last_mut() {
                Some(current) if current.children.is_empty() => {
                    current.text.push_str(&String::from_utf8_lossy(&data))
                }
                Some(_) => {}
                None => return Err(XmlError::new("CDATA outside the root element")),
            },
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::new("unexpected end of document"));
    }
    root.ok_or_else(|| XmlError::new("no root element"))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}
