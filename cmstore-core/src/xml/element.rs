//! Generic XML element tree with streaming parse and write.
//!
//! The object store's wire format is a bespoke XML convention: one element
//! per component, scalar fields as attributes or text-only children,
//! collections as repeated children. Components never touch the streaming
//! layer directly; they walk [`XmlElement`] trees produced here.

use std::io::BufRead;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ObjectStoreError, Result};

/// A single element in a parsed XML document.
///
/// Attribute order and child order are preserved so that a tree written out
/// and re-parsed compares equal. Mixed content is not part of the
/// convention: an element carries either text or child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    /// Creates an empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text content (empty for container elements).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Builder method to add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder method to set text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder method to append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Sets an attribute, replacing any existing value for the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// Appends a child element.
    pub fn add_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Appends a text-only child element, the convention for scalar fields.
    pub fn add_text_child(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.children.push(XmlElement::new(name).with_text(text));
    }

    /// Looks up an attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlElement::text)
    }
}

/// Parses a complete XML document from a reader into an element tree.
///
/// Comments, processing instructions, and the XML declaration are skipped.
/// Whitespace-only text between elements is dropped.
///
/// # Errors
/// Returns [`ObjectStoreError::Xml`] for malformed documents and
/// [`ObjectStoreError::InvalidValue`] for structural violations (no root,
/// trailing content after the root element).
pub fn parse_document<R: BufRead>(input: R) -> Result<XmlElement> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(ObjectStoreError::invalid_value(
                        "document",
                        "content found after the root element",
                    ));
                }
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(ObjectStoreError::invalid_value(
                        "document",
                        "content found after the root element",
                    ));
                }
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ObjectStoreError::invalid_value("document", "unbalanced end tag")
                })?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            // Declaration, comments, doctype, processing instructions
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ObjectStoreError::invalid_value(
            "document",
            "unexpected end of document inside an element",
        ));
    }

    root.ok_or_else(|| ObjectStoreError::invalid_value("document", "no root element"))
}

/// Parses an XML document held in a string.
pub fn parse_str(xml: &str) -> Result<XmlElement> {
    parse_document(xml.as_bytes())
}

/// Writes an element tree as a UTF-8 XML document with declaration.
pub fn write_document(element: &XmlElement) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, element)?;

    let bytes = writer.into_inner();
    String::from_utf8(bytes).map_err(|e| {
        ObjectStoreError::invalid_value("document", format!("non-UTF-8 output: {}", e))
    })
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = decode_name(start.name().as_ref())?;
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = decode_name(attribute.key.as_ref())?;
        let value = attribute.unescape_value()?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn decode_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| ObjectStoreError::invalid_value("document", format!("non-UTF-8 name: {}", e)))
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name());
    for (name, value) in element.attributes() {
        start.push_attribute((name, value));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else if element.children.is_empty() {
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
        writer.write_event(Event::End(BytesEnd::new(element.name())))?;
    } else {
        writer.write_event(Event::Start(start))?;
        for child in &element.children {
            write_element(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(element.name())))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let root = parse_str(r#"<Attribute name="color"><Value>blue</Value></Attribute>"#).unwrap();
        assert_eq!(root.name(), "Attribute");
        assert_eq!(root.attribute("name"), Some("color"));
        assert_eq!(root.child_text("Value"), Some("blue"));
    }

    #[test]
    fn test_parse_empty_element() {
        let root = parse_str(r#"<Pipe name="orders"/>"#).unwrap();
        assert_eq!(root.name(), "Pipe");
        assert!(root.children().is_empty());
        assert_eq!(root.text(), "");
    }

    #[test]
    fn test_parse_skips_declaration_and_comments() {
        let xml = "<?xml version=\"1.0\"?>\n<!-- generated -->\n<Root><Child/></Root>";
        let root = parse_str(xml).unwrap();
        assert_eq!(root.name(), "Root");
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn test_parse_rejects_trailing_root() {
        let result = parse_str("<A/><B/>");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_empty_document() {
        assert!(parse_str("  ").is_err());
    }

    #[test]
    fn test_escaped_text_round_trip() {
        let element = XmlElement::new("Value").with_text("a < b & c > d");
        let xml = write_document(&element).unwrap();
        let reparsed = parse_str(&xml).unwrap();
        assert_eq!(reparsed.text(), "a < b & c > d");
    }

    #[test]
    fn test_escaped_attribute_round_trip() {
        let element = XmlElement::new("Table").with_attribute("alias", "a \"b\" & c");
        let xml = write_document(&element).unwrap();
        let reparsed = parse_str(&xml).unwrap();
        assert_eq!(reparsed.attribute("alias"), Some("a \"b\" & c"));
    }

    #[test]
    fn test_write_parse_round_trip_preserves_order() {
        let element = XmlElement::new("Container")
            .with_attribute("first", "1")
            .with_attribute("second", "2")
            .with_child(XmlElement::new("A").with_text("one"))
            .with_child(XmlElement::new("B"))
            .with_child(XmlElement::new("A").with_text("two"));

        let xml = write_document(&element).unwrap();
        let reparsed = parse_str(&xml).unwrap();
        assert_eq!(reparsed, element);
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut element = XmlElement::new("E");
        element.set_attribute("id", "1");
        element.set_attribute("id", "2");
        assert_eq!(element.attribute("id"), Some("2"));
        assert_eq!(element.attributes().count(), 1);
    }

    #[test]
    fn test_children_named() {
        let element = XmlElement::new("List")
            .with_child(XmlElement::new("Item").with_text("a"))
            .with_child(XmlElement::new("Other"))
            .with_child(XmlElement::new("Item").with_text("b"));

        let items: Vec<&str> = element.children_named("Item").map(XmlElement::text).collect();
        assert_eq!(items, vec!["a", "b"]);
    }
}
