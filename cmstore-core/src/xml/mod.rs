//! XML (de)serialization convention shared by every object-store component.
//!
//! Each component type owns one element name. `from_xml` rejects elements
//! with the wrong name so containers fail fast instead of silently reading
//! a sibling type. Unknown child elements are skipped on read for forward
//! compatibility and never re-emitted.
//!
//! Booleans travel as `"yes"`/`"no"` on the wire; the parser additionally
//! accepts `"true"`/`"false"` and `"1"`/`"0"` from hand-edited files.

mod element;

pub use element::{XmlElement, parse_document, parse_str, write_document};

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{ObjectStoreError, Result};

/// Deserialization from the object store's XML element format.
pub trait FromXml: Sized {
    /// The element name this type owns.
    const NODE_NAME: &'static str;

    /// Builds the component from a parsed element.
    ///
    /// # Errors
    /// Returns `UnknownNode` if the element is not [`Self::NODE_NAME`], and
    /// `MissingElement`/`MissingAttribute`/`InvalidValue` for violated field
    /// requirements.
    fn from_xml(element: &XmlElement) -> Result<Self>;
}

/// Serialization to the object store's XML element format.
pub trait ToXml {
    /// Produces the element representation of this component.
    fn to_xml(&self) -> XmlElement;
}

/// Parses a wire-format boolean flag.
pub fn parse_flag(value: &str, field: &str) -> Result<bool> {
    match value {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        other => Err(ObjectStoreError::invalid_value(
            field,
            format!("expected yes/no, got '{}'", other),
        )),
    }
}

/// Encodes a boolean in the wire format.
pub fn flag_str(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

impl XmlElement {
    /// Verifies the element name, the first step of every `from_xml`.
    pub fn expect_name(&self, expected: &'static str) -> Result<()> {
        if self.name() == expected {
            Ok(())
        } else {
            Err(ObjectStoreError::unknown_node(expected, self.name()))
        }
    }

    /// Attribute that must be present.
    pub fn required_attribute(&self, name: &'static str) -> Result<&str> {
        self.attribute(name)
            .ok_or_else(|| ObjectStoreError::missing_attribute(self.name(), name))
    }

    /// Child element that must be present.
    pub fn required_child(&self, name: &'static str) -> Result<&XmlElement> {
        self.child(name)
            .ok_or_else(|| ObjectStoreError::missing_element(self.name(), name))
    }

    /// Text of a child element that must be present.
    pub fn required_child_text(&self, name: &'static str) -> Result<&str> {
        self.required_child(name).map(XmlElement::text)
    }

    /// Parses an optional attribute into a typed value.
    ///
    /// Absence is `Ok(None)`; presence with an unparseable value is an
    /// `InvalidValue` error naming the attribute.
    pub fn parse_attribute<T>(&self, name: &'static str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.attribute(name) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e| {
                ObjectStoreError::invalid_value(
                    format!("{}@{}", self.name(), name),
                    format!("'{}': {}", raw, e),
                )
            }),
        }
    }

    /// Parses an optional boolean attribute in the wire flag format.
    pub fn flag_attribute(&self, name: &'static str, default: bool) -> Result<bool> {
        match self.attribute(name) {
            None => Ok(default),
            Some(raw) => parse_flag(raw, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_wire_values() {
        assert!(parse_flag("yes", "f").unwrap());
        assert!(!parse_flag("no", "f").unwrap());
        assert!(parse_flag("true", "f").unwrap());
        assert!(!parse_flag("0", "f").unwrap());
        assert!(parse_flag("maybe", "f").is_err());
    }

    #[test]
    fn test_flag_str() {
        assert_eq!(flag_str(true), "yes");
        assert_eq!(flag_str(false), "no");
    }

    #[test]
    fn test_expect_name() {
        let element = XmlElement::new("Attribute");
        assert!(element.expect_name("Attribute").is_ok());

        let err = element.expect_name("Pipe").unwrap_err();
        assert!(matches!(
            err,
            ObjectStoreError::UnknownNode { expected: "Pipe", .. }
        ));
    }

    #[test]
    fn test_required_attribute() {
        let element = XmlElement::new("E").with_attribute("name", "x");
        assert_eq!(element.required_attribute("name").unwrap(), "x");
        assert!(matches!(
            element.required_attribute("id").unwrap_err(),
            ObjectStoreError::MissingAttribute { attribute: "id", .. }
        ));
    }

    #[test]
    fn test_parse_attribute_typed() {
        let element = XmlElement::new("E").with_attribute("count", "42");
        assert_eq!(element.parse_attribute::<u32>("count").unwrap(), Some(42));
        assert_eq!(element.parse_attribute::<u32>("missing").unwrap(), None);

        let element = XmlElement::new("E").with_attribute("count", "forty");
        assert!(element.parse_attribute::<u32>("count").is_err());
    }

    #[test]
    fn test_flag_attribute_default() {
        let element = XmlElement::new("E").with_attribute("enabled", "no");
        assert!(!element.flag_attribute("enabled", true).unwrap());
        assert!(element.flag_attribute("missing", true).unwrap());
    }
}
