//! Named multi-valued attributes attached to application definitions.

use serde::{Deserialize, Serialize};

use crate::component::DbComponent;
use crate::error::{ObjectStoreError, Result};
use crate::validation::{MAX_NAME_LEN, Validate, ValidationContext, validate_name};
use crate::xml::{FromXml, ToXml, XmlElement};

/// A named attribute holding an ordered list of string values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    values: Vec<String>,
}

impl Attribute {
    /// Creates an attribute with no values.
    ///
    /// # Errors
    /// Rejects names that are empty, overlong, or not identifier-shaped.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name("Attribute.name", &name, MAX_NAME_LEN)?;
        Ok(Self {
            name,
            values: Vec::new(),
        })
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values in insertion order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Renames the attribute.
    ///
    /// # Errors
    /// Same name invariants as [`Attribute::new`].
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name("Attribute.name", &name, MAX_NAME_LEN)?;
        self.name = name;
        Ok(())
    }

    /// Appends a value.
    pub fn add_value(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    /// Replaces all values.
    pub fn set_values(&mut self, values: Vec<String>) {
        self.values = values;
    }

    /// Drops all values.
    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Shallow copy of all fields from another attribute.
    pub fn copy_from(&mut self, other: &Attribute) {
        self.name = other.name.clone();
        self.values = other.values.clone();
    }
}

impl FromXml for Attribute {
    const NODE_NAME: &'static str = "Attribute";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let mut attribute = Attribute::new(element.required_attribute("name")?)?;
        for value in element.children_named("Value") {
            attribute.add_value(value.text());
        }
        Ok(attribute)
    }
}

impl ToXml for Attribute {
    fn to_xml(&self) -> XmlElement {
        let mut element =
            XmlElement::new(Self::NODE_NAME).with_attribute("name", self.name.clone());
        for value in &self.values {
            element.add_text_child("Value", value.clone());
        }
        element
    }
}

impl Validate for Attribute {
    fn validate(&self, ctx: &mut ValidationContext) {
        ctx.require_valid_name("Attribute.name", &self.name, MAX_NAME_LEN);
    }
}

impl DbComponent for Attribute {
    fn component_type() -> &'static str {
        "Attribute"
    }

    fn key(&self) -> &str {
        &self.name
    }
}

/// Ordered collection of attributes with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeList {
    attributes: Vec<Attribute>,
}

impl AttributeList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    ///
    /// # Errors
    /// `DuplicateKey` if an attribute with the same name exists.
    pub fn add(&mut self, attribute: Attribute) -> Result<()> {
        if self.get(attribute.name()).is_some() {
            return Err(ObjectStoreError::DuplicateKey {
                set: "AttributeList",
                key: attribute.name().to_string(),
            });
        }
        self.attributes.push(attribute);
        Ok(())
    }

    /// Looks up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Removes an attribute by name, returning whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.name() != name);
        self.attributes.len() != before
    }

    /// Merges another list into this one.
    ///
    /// Unseen attributes are appended; for shared names, values missing
    /// from this side are appended in the other side's order.
    pub fn merge(&mut self, other: &AttributeList) {
        for incoming in &other.attributes {
            match self
                .attributes
                .iter_mut()
                .find(|a| a.name() == incoming.name())
            {
                Some(existing) => {
                    for value in incoming.values() {
                        if !existing.values().contains(value) {
                            existing.add_value(value.clone());
                        }
                    }
                }
                None => self.attributes.push(incoming.clone()),
            }
        }
    }

    /// Attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Shallow copy of all attributes from another list.
    pub fn copy_from(&mut self, other: &AttributeList) {
        self.attributes = other.attributes.clone();
    }
}

impl FromXml for AttributeList {
    const NODE_NAME: &'static str = "AttributeList";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let mut list = AttributeList::new();
        for child in element.children_named(Attribute::NODE_NAME) {
            list.add(Attribute::from_xml(child)?)?;
        }
        Ok(list)
    }
}

impl ToXml for AttributeList {
    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NODE_NAME);
        for attribute in &self.attributes {
            element.add_child(attribute.to_xml());
        }
        element
    }
}

impl Validate for AttributeList {
    fn validate(&self, ctx: &mut ValidationContext) {
        for attribute in &self.attributes {
            ctx.visit(format!("Attribute[{}]", attribute.name()), |ctx| {
                attribute.validate(ctx);
            });
        }
    }
}
