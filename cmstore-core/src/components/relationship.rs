//! Relationship configurations between content items.
//!
//! System configurations ship with the server and keep their names for the
//! lifetime of an installation; user configurations are free-form. Effects
//! are extension references executed by the relationship engine; only
//! their names and execution contexts are stored here.

use serde::{Deserialize, Serialize};

use crate::component::DbComponent;
use crate::error::{ObjectStoreError, Result};
use crate::validation::{MAX_NAME_LEN, Validate, ValidationContext, validate_name};
use crate::xml::{FromXml, ToXml, XmlElement, flag_str};

/// Relationship category, fixed by the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipCategory {
    ActiveAssembly,
    NewCopy,
    Promotable,
    Translation,
    Generic,
}

impl RelationshipCategory {
    /// Wire representation used in the `category` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipCategory::ActiveAssembly => "activeAssembly",
            RelationshipCategory::NewCopy => "newCopy",
            RelationshipCategory::Promotable => "promotable",
            RelationshipCategory::Translation => "translation",
            RelationshipCategory::Generic => "generic",
        }
    }

    /// Resolves a wire string.
    ///
    /// # Errors
    /// Rejects categories outside the fixed set.
    pub fn from_str_wire(value: &str) -> Result<Self> {
        match value {
            "activeAssembly" => Ok(RelationshipCategory::ActiveAssembly),
            "newCopy" => Ok(RelationshipCategory::NewCopy),
            "promotable" => Ok(RelationshipCategory::Promotable),
            "translation" => Ok(RelationshipCategory::Translation),
            "generic" => Ok(RelationshipCategory::Generic),
            other => Err(ObjectStoreError::invalid_value(
                "RelationshipConfig.category",
                format!("unknown category '{}'", other),
            )),
        }
    }
}

/// Whether a configuration is server-owned or user-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    System,
    User,
}

impl ConfigType {
    /// Wire representation used in the `type` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigType::System => "system",
            ConfigType::User => "user",
        }
    }

    /// Resolves a wire string.
    ///
    /// # Errors
    /// Rejects values other than `system`/`user`.
    pub fn from_str_wire(value: &str) -> Result<Self> {
        match value {
            "system" => Ok(ConfigType::System),
            "user" => Ok(ConfigType::User),
            other => Err(ObjectStoreError::invalid_value(
                "RelationshipConfig.type",
                format!("unknown config type '{}'", other),
            )),
        }
    }
}

/// System properties every relationship configuration carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipProperties {
    /// Whether items on this relationship may be cloned
    pub allow_cloning: bool,
    /// Whether the dependent is local to the owner's site
    pub is_local_dependency: bool,
    /// Whether promotion skips over this relationship
    pub skip_promotion: bool,
    /// Whether ids are assigned by the server rather than the client
    pub use_server_id: bool,
}

impl Default for RelationshipProperties {
    fn default() -> Self {
        Self {
            allow_cloning: true,
            is_local_dependency: false,
            skip_promotion: false,
            use_server_id: true,
        }
    }
}

impl RelationshipProperties {
    /// Creates properties with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the cloning flag.
    pub fn with_allow_cloning(mut self, allow_cloning: bool) -> Self {
        self.allow_cloning = allow_cloning;
        self
    }

    /// Builder method to set the local-dependency flag.
    pub fn with_is_local_dependency(mut self, is_local_dependency: bool) -> Self {
        self.is_local_dependency = is_local_dependency;
        self
    }

    /// Builder method to set the skip-promotion flag.
    pub fn with_skip_promotion(mut self, skip_promotion: bool) -> Self {
        self.skip_promotion = skip_promotion;
        self
    }

    /// Builder method to set the server-id flag.
    pub fn with_use_server_id(mut self, use_server_id: bool) -> Self {
        self.use_server_id = use_server_id;
        self
    }
}

/// Execution contexts an effect can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionContext {
    PreConstruction,
    PreDestruction,
    PreUpdate,
    PreClone,
}

impl ExecutionContext {
    /// Wire representation used in the `context` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionContext::PreConstruction => "preConstruction",
            ExecutionContext::PreDestruction => "preDestruction",
            ExecutionContext::PreUpdate => "preUpdate",
            ExecutionContext::PreClone => "preClone",
        }
    }

    /// Resolves a wire string.
    ///
    /// # Errors
    /// Rejects contexts outside the fixed set.
    pub fn from_str_wire(value: &str) -> Result<Self> {
        match value {
            "preConstruction" => Ok(ExecutionContext::PreConstruction),
            "preDestruction" => Ok(ExecutionContext::PreDestruction),
            "preUpdate" => Ok(ExecutionContext::PreUpdate),
            "preClone" => Ok(ExecutionContext::PreClone),
            other => Err(ObjectStoreError::invalid_value(
                "Effect.context",
                format!("unknown execution context '{}'", other),
            )),
        }
    }
}

/// An extension reference executed by the relationship engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Effect {
    name: String,
    context: ExecutionContext,
}

impl Effect {
    /// Creates an effect reference.
    ///
    /// # Errors
    /// Rejects an empty extension name.
    pub fn new(name: impl Into<String>, context: ExecutionContext) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "Effect.name",
                "must not be empty",
            ));
        }
        Ok(Self { name, context })
    }

    /// Extension name, uninterpreted.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execution context.
    pub fn context(&self) -> ExecutionContext {
        self.context
    }
}

impl FromXml for Effect {
    const NODE_NAME: &'static str = "Effect";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        Effect::new(
            element.required_attribute("name")?,
            ExecutionContext::from_str_wire(element.required_attribute("context")?)?,
        )
    }
}

impl ToXml for Effect {
    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NODE_NAME)
            .with_attribute("name", self.name.clone())
            .with_attribute("context", self.context.as_str())
    }
}

/// One relationship configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipConfig {
    name: String,
    label: String,
    category: RelationshipCategory,
    config_type: ConfigType,
    properties: RelationshipProperties,
    effects: Vec<Effect>,
}

impl RelationshipConfig {
    /// Creates a configuration with default properties and the name as
    /// its label.
    ///
    /// # Errors
    /// Rejects names that are empty, overlong, or not identifier-shaped.
    pub fn new(
        name: impl Into<String>,
        category: RelationshipCategory,
        config_type: ConfigType,
    ) -> Result<Self> {
        let name = name.into();
        validate_name("RelationshipConfig.name", &name, MAX_NAME_LEN)?;
        Ok(Self {
            label: name.clone(),
            name,
            category,
            config_type,
            properties: RelationshipProperties::default(),
            effects: Vec::new(),
        })
    }

    /// Configuration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Relationship category.
    pub fn category(&self) -> RelationshipCategory {
        self.category
    }

    /// System or user ownership.
    pub fn config_type(&self) -> ConfigType {
        self.config_type
    }

    /// System properties.
    pub fn properties(&self) -> RelationshipProperties {
        self.properties
    }

    /// Attached effects in execution order.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Renames the configuration.
    ///
    /// # Errors
    /// System configurations cannot be renamed; user names follow the
    /// usual name invariants.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        if self.config_type == ConfigType::System {
            return Err(ObjectStoreError::invalid_value(
                "RelationshipConfig.name",
                "system configurations cannot be renamed",
            ));
        }
        let name = name.into();
        validate_name("RelationshipConfig.name", &name, MAX_NAME_LEN)?;
        self.name = name;
        Ok(())
    }

    /// Changes the display label.
    ///
    /// # Errors
    /// Rejects an empty label.
    pub fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        if label.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "RelationshipConfig.label",
                "must not be empty",
            ));
        }
        self.label = label;
        Ok(())
    }

    /// Replaces the system properties.
    pub fn set_properties(&mut self, properties: RelationshipProperties) {
        self.properties = properties;
    }

    /// Appends an effect.
    pub fn add_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Drops all effects.
    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }

    /// Shallow copy of all fields from another configuration.
    pub fn copy_from(&mut self, other: &RelationshipConfig) {
        self.name = other.name.clone();
        self.label = other.label.clone();
        self.category = other.category;
        self.config_type = other.config_type;
        self.properties = other.properties;
        self.effects = other.effects.clone();
    }
}

impl FromXml for RelationshipConfig {
    const NODE_NAME: &'static str = "RelationshipConfig";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let mut config = RelationshipConfig::new(
            element.required_attribute("name")?,
            RelationshipCategory::from_str_wire(element.required_attribute("category")?)?,
            ConfigType::from_str_wire(element.required_attribute("type")?)?,
        )?;
        if let Some(label) = element.attribute("label") {
            config.set_label(label.to_owned())?;
        }

        if let Some(properties) = element.child("Properties") {
            config.properties = RelationshipProperties {
                allow_cloning: properties.flag_attribute("allowCloning", true)?,
                is_local_dependency: properties.flag_attribute("isLocalDependency", false)?,
                skip_promotion: properties.flag_attribute("skipPromotion", false)?,
                use_server_id: properties.flag_attribute("useServerId", true)?,
            };
        }
        if let Some(effects) = element.child("Effects") {
            for effect in effects.children_named(Effect::NODE_NAME) {
                config.add_effect(Effect::from_xml(effect)?);
            }
        }
        Ok(config)
    }
}

impl ToXml for RelationshipConfig {
    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NODE_NAME)
            .with_attribute("name", self.name.clone())
            .with_attribute("label", self.label.clone())
            .with_attribute("category", self.category.as_str())
            .with_attribute("type", self.config_type.as_str());

        element.add_child(
            XmlElement::new("Properties")
                .with_attribute("allowCloning", flag_str(self.properties.allow_cloning))
                .with_attribute(
                    "isLocalDependency",
                    flag_str(self.properties.is_local_dependency),
                )
                .with_attribute("skipPromotion", flag_str(self.properties.skip_promotion))
                .with_attribute("useServerId", flag_str(self.properties.use_server_id)),
        );

        if !self.effects.is_empty() {
            let mut effects = XmlElement::new("Effects");
            for effect in &self.effects {
                effects.add_child(effect.to_xml());
            }
            element.add_child(effects);
        }

        element
    }
}

impl Validate for RelationshipConfig {
    fn validate(&self, ctx: &mut ValidationContext) {
        ctx.require_valid_name("RelationshipConfig.name", &self.name, MAX_NAME_LEN);
        if self.label.is_empty() {
            ctx.error("label must not be empty");
        }
        if self.category == RelationshipCategory::NewCopy && !self.properties.allow_cloning {
            ctx.warning("new-copy relationship with cloning disabled is inert");
        }
        for effect in &self.effects {
            if effect.name().is_empty() {
                ctx.error("effect name must not be empty");
            }
        }
    }
}

impl DbComponent for RelationshipConfig {
    fn component_type() -> &'static str {
        "RelationshipConfig"
    }

    fn key(&self) -> &str {
        &self.name
    }
}
