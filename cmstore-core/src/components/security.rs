//! Security-provider instance configurations.
//!
//! An instance names one authentication source and carries its provider
//! settings as an opaque property map. Group providers are referenced by
//! name only; the directory lookups they stand for happen in the server's
//! security layer, not in this slice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::DbComponent;
use crate::error::{ObjectStoreError, Result};
use crate::validation::{MAX_NAME_LEN, Validate, ValidationContext, validate_name};
use crate::xml::{FromXml, ToXml, XmlElement};

/// Provider type codes fixed by the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Users and roles resolved from back-end tables
    BackEndTable,
    /// Directory server
    Ldap,
    /// Authentication delegated to the fronting web server
    WebServer,
    /// Trust by originating host address
    HostAddress,
    /// Legacy ODBC-backed catalog
    Odbc,
}

impl ProviderType {
    /// Numeric wire code used in the `typeCode` attribute.
    pub fn code(self) -> u32 {
        match self {
            ProviderType::BackEndTable => 1,
            ProviderType::Ldap => 2,
            ProviderType::WebServer => 3,
            ProviderType::HostAddress => 4,
            ProviderType::Odbc => 5,
        }
    }

    /// Resolves a wire code.
    ///
    /// # Errors
    /// Rejects codes outside the fixed set.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(ProviderType::BackEndTable),
            2 => Ok(ProviderType::Ldap),
            3 => Ok(ProviderType::WebServer),
            4 => Ok(ProviderType::HostAddress),
            5 => Ok(ProviderType::Odbc),
            other => Err(ObjectStoreError::invalid_value(
                "SecurityProviderInstance.typeCode",
                format!("unknown provider type code {}", other),
            )),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::BackEndTable => write!(f, "BackEndTable"),
            ProviderType::Ldap => write!(f, "LDAP"),
            ProviderType::WebServer => write!(f, "WebServer"),
            ProviderType::HostAddress => write!(f, "HostAddress"),
            ProviderType::Odbc => write!(f, "ODBC"),
        }
    }
}

/// One configured authentication source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityProviderInstance {
    name: String,
    provider_type: ProviderType,
    properties: BTreeMap<String, String>,
    group_providers: Vec<String>,
}

impl SecurityProviderInstance {
    /// Creates an instance with no properties.
    ///
    /// # Errors
    /// Rejects names that are empty, overlong, or not identifier-shaped.
    pub fn new(name: impl Into<String>, provider_type: ProviderType) -> Result<Self> {
        let name = name.into();
        validate_name("SecurityProviderInstance.name", &name, MAX_NAME_LEN)?;
        Ok(Self {
            name,
            provider_type,
            properties: BTreeMap::new(),
            group_providers: Vec::new(),
        })
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider type.
    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    /// Looks up a provider property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Provider properties in sorted order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Group-provider names, referenced only.
    pub fn group_providers(&self) -> &[String] {
        &self.group_providers
    }

    /// Renames the instance.
    ///
    /// # Errors
    /// Same name invariants as [`SecurityProviderInstance::new`].
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name("SecurityProviderInstance.name", &name, MAX_NAME_LEN)?;
        self.name = name;
        Ok(())
    }

    /// Changes the provider type, keeping existing properties.
    pub fn set_provider_type(&mut self, provider_type: ProviderType) {
        self.provider_type = provider_type;
    }

    /// Sets a provider property, replacing any existing value.
    ///
    /// # Errors
    /// Rejects an empty property name.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "SecurityProviderInstance.property",
                "property name must not be empty",
            ));
        }
        self.properties.insert(name, value.into());
        Ok(())
    }

    /// Removes a provider property, returning whether it existed.
    pub fn remove_property(&mut self, name: &str) -> bool {
        self.properties.remove(name).is_some()
    }

    /// Appends a group-provider reference.
    ///
    /// # Errors
    /// Rejects an empty or duplicate name.
    pub fn add_group_provider(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "SecurityProviderInstance.groupProvider",
                "must not be empty",
            ));
        }
        if self.group_providers.contains(&name) {
            return Err(ObjectStoreError::DuplicateKey {
                set: "GroupProviders",
                key: name,
            });
        }
        self.group_providers.push(name);
        Ok(())
    }

    /// Shallow copy of all fields from another instance.
    pub fn copy_from(&mut self, other: &SecurityProviderInstance) {
        self.name = other.name.clone();
        self.provider_type = other.provider_type;
        self.properties = other.properties.clone();
        self.group_providers = other.group_providers.clone();
    }
}

impl FromXml for SecurityProviderInstance {
    const NODE_NAME: &'static str = "SecurityProviderInstance";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let code = element
            .parse_attribute::<u32>("typeCode")?
            .ok_or_else(|| ObjectStoreError::missing_attribute(element.name(), "typeCode"))?;
        let mut instance = SecurityProviderInstance::new(
            element.required_attribute("name")?,
            ProviderType::from_code(code)?,
        )?;

        if let Some(properties) = element.child("Properties") {
            for property in properties.children_named("Property") {
                instance.set_property(property.required_attribute("name")?, property.text())?;
            }
        }
        if let Some(groups) = element.child("GroupProviders") {
            for group in groups.children_named("GroupProviderName") {
                instance.add_group_provider(group.text())?;
            }
        }
        Ok(instance)
    }
}

impl ToXml for SecurityProviderInstance {
    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NODE_NAME)
            .with_attribute("name", self.name.clone())
            .with_attribute("typeCode", self.provider_type.code().to_string());

        if !self.properties.is_empty() {
            let mut properties = XmlElement::new("Properties");
            for (name, value) in &self.properties {
                properties.add_child(
                    XmlElement::new("Property")
                        .with_attribute("name", name.clone())
                        .with_text(value.clone()),
                );
            }
            element.add_child(properties);
        }

        if !self.group_providers.is_empty() {
            let mut groups = XmlElement::new("GroupProviders");
            for group in &self.group_providers {
                groups.add_text_child("GroupProviderName", group.clone());
            }
            element.add_child(groups);
        }

        element
    }
}

impl Validate for SecurityProviderInstance {
    fn validate(&self, ctx: &mut ValidationContext) {
        ctx.require_valid_name("SecurityProviderInstance.name", &self.name, MAX_NAME_LEN);
        for (name, _) in &self.properties {
            if name.is_empty() {
                ctx.error("property name must not be empty");
            }
        }
        if self.provider_type == ProviderType::HostAddress && !self.group_providers.is_empty() {
            ctx.warning("host-address providers cannot resolve group membership");
        }
    }
}

impl DbComponent for SecurityProviderInstance {
    fn component_type() -> &'static str {
        "SecurityProviderInstance"
    }

    fn key(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ldap_instance() -> SecurityProviderInstance {
        let mut instance = SecurityProviderInstance::new("corpLdap", ProviderType::Ldap).unwrap();
        instance
            .set_property("hostName", "directory.corp.example.com")
            .unwrap();
        instance.set_property("port", "389").unwrap();
        instance.add_group_provider("corpGroups").unwrap();
        instance
    }

    #[test]
    fn test_provider_type_codes_round_trip() {
        for provider_type in [
            ProviderType::BackEndTable,
            ProviderType::Ldap,
            ProviderType::WebServer,
            ProviderType::HostAddress,
            ProviderType::Odbc,
        ] {
            assert_eq!(
                ProviderType::from_code(provider_type.code()).unwrap(),
                provider_type
            );
        }
        assert!(ProviderType::from_code(99).is_err());
    }

    #[test]
    fn test_instance_xml_round_trip() {
        let instance = ldap_instance();
        let reparsed = SecurityProviderInstance::from_xml(&instance.to_xml()).unwrap();
        assert_eq!(reparsed, instance);
        assert_eq!(reparsed.property("port"), Some("389"));
    }

    #[test]
    fn test_type_code_on_wire() {
        let element = ldap_instance().to_xml();
        assert_eq!(element.attribute("typeCode"), Some("2"));
    }

    #[test]
    fn test_unknown_type_code_rejected() {
        let element = XmlElement::new("SecurityProviderInstance")
            .with_attribute("name", "x")
            .with_attribute("typeCode", "42");
        assert!(SecurityProviderInstance::from_xml(&element).is_err());
    }

    #[test]
    fn test_duplicate_group_provider_rejected() {
        let mut instance = ldap_instance();
        assert!(instance.add_group_provider("corpGroups").is_err());
    }

    #[test]
    fn test_set_property_replaces() {
        let mut instance = ldap_instance();
        instance.set_property("port", "636").unwrap();
        assert_eq!(instance.property("port"), Some("636"));
    }

    #[test]
    fn test_host_address_groups_warn() {
        let mut instance =
            SecurityProviderInstance::new("perimeter", ProviderType::HostAddress).unwrap();
        instance.add_group_provider("corpGroups").unwrap();

        let mut ctx = ValidationContext::new();
        instance.validate(&mut ctx);
        assert!(!ctx.has_errors());
        assert_eq!(ctx.issues().len(), 1);
    }

    #[test]
    fn test_copy_from() {
        let source = ldap_instance();
        let mut target =
            SecurityProviderInstance::new("other", ProviderType::WebServer).unwrap();
        target.copy_from(&source);
        assert_eq!(target, source);
    }
}
