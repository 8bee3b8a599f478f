//! The application definition: root container of the object store.
//!
//! An application ties together the attributes, credentials, security
//! providers, relationship configurations, and pipes that make up one
//! XML-configured application. It is itself a component: loaded with
//! `from_xml`, checked by the validation visitor, copied with
//! `copy_from`, and diffed into action batches like its children.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::error::{ObjectStoreError, Result};
use crate::validation::{
    MAX_NAME_LEN, Validate, ValidationContext, ValidationIssue, validate_name,
};
use crate::xml::{FromXml, ToXml, XmlElement, flag_str};

use super::attribute::AttributeList;
use super::credential::BackEndCredential;
use super::pipe::Pipe;
use super::relationship::RelationshipConfig;
use super::security::SecurityProviderInstance;

/// One complete application definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationDef {
    id: ComponentId,
    name: String,
    request_root: String,
    enabled: bool,
    description: Option<String>,
    created: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    attributes: AttributeList,
    credentials: Vec<BackEndCredential>,
    security_providers: Vec<SecurityProviderInstance>,
    relationships: Vec<RelationshipConfig>,
    pipes: Vec<Pipe>,
}

impl ApplicationDef {
    /// Creates an enabled, empty definition.
    ///
    /// # Errors
    /// Rejects an illegal name or request root.
    pub fn new(name: impl Into<String>, request_root: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name("Application.name", &name, MAX_NAME_LEN)?;
        let request_root = request_root.into();
        validate_name("Application.requestRoot", &request_root, MAX_NAME_LEN)?;
        Ok(Self {
            id: ComponentId::UNASSIGNED,
            name,
            request_root,
            enabled: true,
            description: None,
            created: None,
            last_modified: None,
            attributes: AttributeList::new(),
            credentials: Vec::new(),
            security_providers: Vec::new(),
            relationships: Vec::new(),
            pipes: Vec::new(),
        })
    }

    /// Object-store id; unassigned until first persisted.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Assigns the object-store id (persistence layer only).
    pub fn set_id(&mut self, id: ComponentId) {
        self.id = id;
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL root this application serves under.
    pub fn request_root(&self) -> &str {
        &self.request_root
    }

    /// Whether the server should start this application.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Maintainer description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Creation timestamp, if recorded.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    /// Last revision timestamp, if recorded.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Application-level attributes.
    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    /// Mutable access to the application-level attributes.
    pub fn attributes_mut(&mut self) -> &mut AttributeList {
        &mut self.attributes
    }

    /// Credentials in insertion order.
    pub fn credentials(&self) -> &[BackEndCredential] {
        &self.credentials
    }

    /// Security-provider instances in insertion order.
    pub fn security_providers(&self) -> &[SecurityProviderInstance] {
        &self.security_providers
    }

    /// Relationship configurations in insertion order.
    pub fn relationships(&self) -> &[RelationshipConfig] {
        &self.relationships
    }

    /// Pipes in insertion order.
    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    /// Renames the application.
    ///
    /// # Errors
    /// Rejects names that are empty, overlong, or not identifier-shaped.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name("Application.name", &name, MAX_NAME_LEN)?;
        self.name = name;
        Ok(())
    }

    /// Changes the request root.
    ///
    /// # Errors
    /// Same invariants as the name.
    pub fn set_request_root(&mut self, request_root: impl Into<String>) -> Result<()> {
        let request_root = request_root.into();
        validate_name("Application.requestRoot", &request_root, MAX_NAME_LEN)?;
        self.request_root = request_root;
        Ok(())
    }

    /// Enables or disables the application.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Sets or clears the description.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description.filter(|d| !d.is_empty());
    }

    /// Records the creation timestamp.
    pub fn set_created(&mut self, created: Option<DateTime<Utc>>) {
        self.created = created;
    }

    /// Records a revision timestamp.
    pub fn set_last_modified(&mut self, last_modified: Option<DateTime<Utc>>) {
        self.last_modified = last_modified;
    }

    /// Adds a credential.
    ///
    /// # Errors
    /// `DuplicateKey` if the alias is already taken.
    pub fn add_credential(&mut self, credential: BackEndCredential) -> Result<()> {
        if self.credential(credential.alias()).is_some() {
            return Err(ObjectStoreError::DuplicateKey {
                set: "Application.credentials",
                key: credential.alias().to_string(),
            });
        }
        self.credentials.push(credential);
        Ok(())
    }

    /// Looks up a credential by alias.
    pub fn credential(&self, alias: &str) -> Option<&BackEndCredential> {
        self.credentials.iter().find(|c| c.alias() == alias)
    }

    /// Adds a security-provider instance.
    ///
    /// # Errors
    /// `DuplicateKey` if the name is already taken.
    pub fn add_security_provider(&mut self, provider: SecurityProviderInstance) -> Result<()> {
        if self.security_providers.iter().any(|p| p.name() == provider.name()) {
            return Err(ObjectStoreError::DuplicateKey {
                set: "Application.securityProviders",
                key: provider.name().to_string(),
            });
        }
        self.security_providers.push(provider);
        Ok(())
    }

    /// Adds a relationship configuration.
    ///
    /// # Errors
    /// `DuplicateKey` if the name is already taken.
    pub fn add_relationship(&mut self, config: RelationshipConfig) -> Result<()> {
        if self.relationships.iter().any(|r| r.name() == config.name()) {
            return Err(ObjectStoreError::DuplicateKey {
                set: "Application.relationships",
                key: config.name().to_string(),
            });
        }
        self.relationships.push(config);
        Ok(())
    }

    /// Adds a pipe.
    ///
    /// # Errors
    /// `DuplicateKey` if the name is already taken.
    pub fn add_pipe(&mut self, pipe: Pipe) -> Result<()> {
        if self.pipes.iter().any(|p| p.name() == pipe.name()) {
            return Err(ObjectStoreError::DuplicateKey {
                set: "Application.pipes",
                key: pipe.name().to_string(),
            });
        }
        self.pipes.push(pipe);
        Ok(())
    }

    /// Total number of contained components.
    pub fn object_count(&self) -> usize {
        self.attributes.len()
            + self.credentials.len()
            + self.security_providers.len()
            + self.relationships.len()
            + self.pipes.len()
    }

    /// Shallow copy of all data fields from another definition.
    ///
    /// The object-store id stays: copying changes what a definition says,
    /// not which definition it is.
    pub fn copy_from(&mut self, other: &ApplicationDef) {
        self.name = other.name.clone();
        self.request_root = other.request_root.clone();
        self.enabled = other.enabled;
        self.description = other.description.clone();
        self.created = other.created;
        self.last_modified = other.last_modified;
        self.attributes = other.attributes.clone();
        self.credentials = other.credentials.clone();
        self.security_providers = other.security_providers.clone();
        self.relationships = other.relationships.clone();
        self.pipes = other.pipes.clone();
    }

    /// Runs the validation visitor over the whole definition.
    ///
    /// # Errors
    /// [`ObjectStoreError::Validation`] when any error-severity issue is
    /// recorded; warnings alone come back in the `Ok` value.
    pub fn validate_definition(&self) -> Result<Vec<ValidationIssue>> {
        let mut ctx = ValidationContext::new();
        ctx.visit(format!("Application[{}]", self.name), |ctx| {
            self.validate(ctx);
        });
        ctx.into_result()
    }
}

fn parse_timestamp(element: &XmlElement, name: &'static str) -> Result<Option<DateTime<Utc>>> {
    match element.child_text(name) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| {
                ObjectStoreError::invalid_value(
                    format!("Application.{}", name),
                    format!("'{}': {}", raw, e),
                )
            }),
    }
}

impl FromXml for ApplicationDef {
    const NODE_NAME: &'static str = "Application";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let mut definition = ApplicationDef::new(
            element.required_attribute("name")?,
            element.required_attribute("requestRoot")?,
        )?;
        definition.id = element.parse_attribute("id")?.unwrap_or(ComponentId::UNASSIGNED);
        definition.enabled = element.flag_attribute("enabled", true)?;
        definition.set_description(element.child_text("description").map(str::to_owned));
        definition.created = parse_timestamp(element, "created")?;
        definition.last_modified = parse_timestamp(element, "lastModified")?;

        if let Some(attributes) = element.child(AttributeList::NODE_NAME) {
            definition.attributes = AttributeList::from_xml(attributes)?;
        }
        if let Some(credentials) = element.child("BackEndCredentials") {
            for child in credentials.children_named(BackEndCredential::NODE_NAME) {
                definition.add_credential(BackEndCredential::from_xml(child)?)?;
            }
        }
        if let Some(providers) = element.child("SecurityProviders") {
            for child in providers.children_named(SecurityProviderInstance::NODE_NAME) {
                definition.add_security_provider(SecurityProviderInstance::from_xml(child)?)?;
            }
        }
        if let Some(relationships) = element.child("RelationshipConfigs") {
            for child in relationships.children_named(RelationshipConfig::NODE_NAME) {
                definition.add_relationship(RelationshipConfig::from_xml(child)?)?;
            }
        }
        if let Some(pipes) = element.child("Pipes") {
            for child in pipes.children_named(Pipe::NODE_NAME) {
                definition.add_pipe(Pipe::from_xml(child)?)?;
            }
        }
        Ok(definition)
    }
}

impl ToXml for ApplicationDef {
    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NODE_NAME)
            .with_attribute("name", self.name.clone())
            .with_attribute("requestRoot", self.request_root.clone())
            .with_attribute("enabled", flag_str(self.enabled));
        if self.id.is_assigned() {
            element.set_attribute("id", self.id.to_string());
        }
        if let Some(description) = &self.description {
            element.add_text_child("description", description.clone());
        }
        if let Some(created) = self.created {
            element.add_text_child("created", created.to_rfc3339());
        }
        if let Some(last_modified) = self.last_modified {
            element.add_text_child("lastModified", last_modified.to_rfc3339());
        }

        if !self.attributes.is_empty() {
            element.add_child(self.attributes.to_xml());
        }
        if !self.credentials.is_empty() {
            let mut credentials = XmlElement::new("BackEndCredentials");
            for credential in &self.credentials {
                credentials.add_child(credential.to_xml());
            }
            element.add_child(credentials);
        }
        if !self.security_providers.is_empty() {
            let mut providers = XmlElement::new("SecurityProviders");
            for provider in &self.security_providers {
                providers.add_child(provider.to_xml());
            }
            element.add_child(providers);
        }
        if !self.relationships.is_empty() {
            let mut relationships = XmlElement::new("RelationshipConfigs");
            for relationship in &self.relationships {
                relationships.add_child(relationship.to_xml());
            }
            element.add_child(relationships);
        }
        if !self.pipes.is_empty() {
            let mut pipes = XmlElement::new("Pipes");
            for pipe in &self.pipes {
                pipes.add_child(pipe.to_xml());
            }
            element.add_child(pipes);
        }
        element
    }
}

impl Validate for ApplicationDef {
    fn validate(&self, ctx: &mut ValidationContext) {
        ctx.require_valid_name("Application.name", &self.name, MAX_NAME_LEN);
        ctx.require_valid_name("Application.requestRoot", &self.request_root, MAX_NAME_LEN);

        self.attributes.validate(ctx);
        for credential in &self.credentials {
            ctx.visit(format!("BackEndCredential[{}]", credential.alias()), |ctx| {
                credential.validate(ctx);
            });
        }
        for provider in &self.security_providers {
            ctx.visit(
                format!("SecurityProviderInstance[{}]", provider.name()),
                |ctx| provider.validate(ctx),
            );
        }
        for relationship in &self.relationships {
            ctx.visit(format!("RelationshipConfig[{}]", relationship.name()), |ctx| {
                relationship.validate(ctx);
            });
        }
        for pipe in &self.pipes {
            ctx.visit(format!("Pipe[{}]", pipe.name()), |ctx| {
                pipe.validate(ctx);

                // Tables name their credential through the datasource
                for table in pipe.tank().tables() {
                    if !self.credentials.is_empty()
                        && self.credential(table.datasource()).is_none()
                    {
                        ctx.warning(format!(
                            "table '{}' references datasource '{}' with no matching credential",
                            table.alias(),
                            table.datasource()
                        ));
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::backend::{BackEndColumn, BackEndTable};
    use crate::components::pipe::{DataMapper, DataMapping, PipeKind};
    use crate::components::relationship::{ConfigType, RelationshipCategory};
    use crate::components::security::ProviderType;

    fn sample_definition() -> ApplicationDef {
        let mut definition = ApplicationDef::new("corporate", "corp").unwrap();
        definition.set_description(Some("corporate site".to_string()));

        let mut credential =
            BackEndCredential::new("inventoryDb", "oracle:thin", "//dbhost:1521/INV").unwrap();
        credential.set_user_id(Some("cmsuser".to_string()));
        credential.set_secret(Some("hunter2".to_string()));
        definition.add_credential(credential).unwrap();

        definition
            .add_security_provider(
                SecurityProviderInstance::new("corpLdap", ProviderType::Ldap).unwrap(),
            )
            .unwrap();

        definition
            .add_relationship(
                RelationshipConfig::new(
                    "translation",
                    RelationshipCategory::Translation,
                    ConfigType::System,
                )
                .unwrap(),
            )
            .unwrap();

        let mut pipe = Pipe::new("orders", PipeKind::query()).unwrap();
        pipe.tank_mut()
            .add_table(BackEndTable::new("ord", "inventoryDb", "ORDERS").unwrap())
            .unwrap();
        pipe.mapper_mut()
            .add(
                DataMapping::new(
                    BackEndColumn::new("ord", "STATUS", 12).unwrap(),
                    "Order/status",
                )
                .unwrap(),
            )
            .unwrap();
        definition.add_pipe(pipe).unwrap();

        definition
    }

    #[test]
    fn test_definition_creation() {
        let definition = sample_definition();
        assert_eq!(definition.name(), "corporate");
        assert!(definition.enabled());
        assert_eq!(definition.object_count(), 4);
        assert!(!definition.id().is_assigned());
    }

    #[test]
    fn test_definition_xml_round_trip() {
        let mut definition = sample_definition();
        definition.set_id(ComponentId::new(301));
        definition.set_created(Some("2024-03-01T09:30:00Z".parse().unwrap()));

        let reparsed = ApplicationDef::from_xml(&definition.to_xml()).unwrap();
        assert_eq!(reparsed, definition);
        assert_eq!(reparsed.id(), ComponentId::new(301));
    }

    #[test]
    fn test_duplicate_pipe_rejected() {
        let mut definition = sample_definition();
        let err = definition
            .add_pipe(Pipe::new("orders", PipeKind::query()).unwrap())
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::DuplicateKey { .. }));
    }

    #[test]
    fn test_valid_definition_passes() {
        let issues = sample_definition().validate_definition().unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn test_dangling_datasource_warns() {
        let mut definition = sample_definition();
        let mut pipe = Pipe::new("ghosts", PipeKind::query()).unwrap();
        pipe.tank_mut()
            .add_table(BackEndTable::new("g", "missingDb", "GHOSTS").unwrap())
            .unwrap();
        pipe.mapper_mut()
            .add(
                DataMapping::new(BackEndColumn::new("g", "ID", 4).unwrap(), "Ghost/id").unwrap(),
            )
            .unwrap();
        definition.add_pipe(pipe).unwrap();

        let issues = definition.validate_definition().unwrap();
        assert!(
            issues
                .iter()
                .any(|i| i.message.contains("datasource 'missingDb'"))
        );
    }

    #[test]
    fn test_copy_from_preserves_id() {
        let mut source = sample_definition();
        source.set_id(ComponentId::new(7));

        let mut target = ApplicationDef::new("scratch", "scratch").unwrap();
        target.set_id(ComponentId::new(301));
        target.copy_from(&source);

        assert_eq!(target.name(), "corporate");
        assert_eq!(target.id(), ComponentId::new(301));
        assert_eq!(target.object_count(), source.object_count());
    }

    #[test]
    fn test_json_dump_parses() {
        let definition = sample_definition();
        let json = serde_json::to_string_pretty(&definition).unwrap();
        assert!(json.contains("corporate"));
        assert!(!json.contains("hunter2"));
    }
}
