//! Pipes: the request channels joining XML fields to back-end tables.
//!
//! A pipe is either a query pipe (reads rows into XML documents) or an
//! update pipe (writes document fields back to its tables). The mapper
//! pairs back-end columns with XML field names; extension calls that the
//! full product can attach to a mapping are out of scope here and are not
//! modeled.

use serde::{Deserialize, Serialize};

use crate::component::DbComponent;
use crate::error::{ObjectStoreError, Result};
use crate::validation::{MAX_NAME_LEN, Validate, ValidationContext, validate_name};
use crate::xml::{FromXml, ToXml, XmlElement, flag_str};

use super::backend::{BackEndColumn, BackEndDataTank};

/// Longest legal XML field reference in a mapping.
const MAX_FIELD_LEN: usize = 255;

/// Discriminates query pipes from update pipes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeKind {
    /// Reads rows into result documents
    Query {
        /// Whether result caching is enabled for this pipe
        cache_enabled: bool,
        /// Row cap for a single request; `None` means unlimited
        max_rows: Option<u32>,
    },
    /// Writes document fields back to the tables
    Update {
        allow_insert: bool,
        allow_update: bool,
        allow_delete: bool,
    },
}

impl PipeKind {
    /// A query kind with caching off and no row cap.
    pub fn query() -> Self {
        PipeKind::Query {
            cache_enabled: false,
            max_rows: None,
        }
    }

    /// An update kind with all write flags enabled.
    pub fn update() -> Self {
        PipeKind::Update {
            allow_insert: true,
            allow_update: true,
            allow_delete: true,
        }
    }
}

/// One column-to-field pairing inside a data mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataMapping {
    column: BackEndColumn,
    xml_field: String,
}

impl DataMapping {
    /// Creates a mapping.
    ///
    /// # Errors
    /// Rejects an empty or overlong XML field reference.
    pub fn new(column: BackEndColumn, xml_field: impl Into<String>) -> Result<Self> {
        let xml_field = xml_field.into();
        if xml_field.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "DataMapping.xmlField",
                "must not be empty",
            ));
        }
        if xml_field.len() > MAX_FIELD_LEN {
            return Err(ObjectStoreError::invalid_value(
                "DataMapping.xmlField",
                format!("exceeds {} characters", MAX_FIELD_LEN),
            ));
        }
        Ok(Self { column, xml_field })
    }

    /// The back-end side of the pairing.
    pub fn column(&self) -> &BackEndColumn {
        &self.column
    }

    /// The document side of the pairing ("Order/status").
    pub fn xml_field(&self) -> &str {
        &self.xml_field
    }
}

impl FromXml for DataMapping {
    const NODE_NAME: &'static str = "DataMapping";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let column = BackEndColumn::from_xml(element.required_child(BackEndColumn::NODE_NAME)?)?;
        DataMapping::new(column, element.required_attribute("fieldName")?)
    }
}

impl ToXml for DataMapping {
    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NODE_NAME)
            .with_attribute("fieldName", self.xml_field.clone())
            .with_child(self.column.to_xml())
    }
}

/// Ordered list of mappings with unique XML fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataMapper {
    mappings: Vec<DataMapping>,
}

impl DataMapper {
    /// Creates an empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping.
    ///
    /// # Errors
    /// `DuplicateKey` if the XML field is already mapped.
    pub fn add(&mut self, mapping: DataMapping) -> Result<()> {
        if self.get(mapping.xml_field()).is_some() {
            return Err(ObjectStoreError::DuplicateKey {
                set: "DataMapper",
                key: mapping.xml_field().to_string(),
            });
        }
        self.mappings.push(mapping);
        Ok(())
    }

    /// Looks up a mapping by XML field.
    pub fn get(&self, xml_field: &str) -> Option<&DataMapping> {
        self.mappings.iter().find(|m| m.xml_field() == xml_field)
    }

    /// Mappings in insertion order.
    pub fn mappings(&self) -> &[DataMapping] {
        &self.mappings
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the mapper is empty.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl FromXml for DataMapper {
    const NODE_NAME: &'static str = "DataMapper";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let mut mapper = DataMapper::new();
        for child in element.children_named(DataMapping::NODE_NAME) {
            mapper.add(DataMapping::from_xml(child)?)?;
        }
        Ok(mapper)
    }
}

impl ToXml for DataMapper {
    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NODE_NAME);
        for mapping in &self.mappings {
            element.add_child(mapping.to_xml());
        }
        element
    }
}

/// A named request channel over a back-end data tank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pipe {
    name: String,
    description: Option<String>,
    kind: PipeKind,
    tank: BackEndDataTank,
    mapper: DataMapper,
}

impl Pipe {
    /// Creates a pipe with an empty tank and mapper.
    ///
    /// # Errors
    /// Rejects names that are empty, overlong, or not identifier-shaped.
    pub fn new(name: impl Into<String>, kind: PipeKind) -> Result<Self> {
        let name = name.into();
        validate_name("Pipe.name", &name, MAX_NAME_LEN)?;
        Ok(Self {
            name,
            description: None,
            kind,
            tank: BackEndDataTank::new(),
            mapper: DataMapper::new(),
        })
    }

    /// Pipe name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maintainer description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Query/update discriminator and its options.
    pub fn kind(&self) -> &PipeKind {
        &self.kind
    }

    /// The pipe's back-end tables.
    pub fn tank(&self) -> &BackEndDataTank {
        &self.tank
    }

    /// Mutable access to the back-end tables.
    pub fn tank_mut(&mut self) -> &mut BackEndDataTank {
        &mut self.tank
    }

    /// The pipe's column-field mapper.
    pub fn mapper(&self) -> &DataMapper {
        &self.mapper
    }

    /// Mutable access to the mapper.
    pub fn mapper_mut(&mut self) -> &mut DataMapper {
        &mut self.mapper
    }

    /// Renames the pipe.
    ///
    /// # Errors
    /// Same name invariants as [`Pipe::new`].
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name("Pipe.name", &name, MAX_NAME_LEN)?;
        self.name = name;
        Ok(())
    }

    /// Sets or clears the description.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description.filter(|d| !d.is_empty());
    }

    /// Replaces the kind and its options.
    pub fn set_kind(&mut self, kind: PipeKind) {
        self.kind = kind;
    }

    /// Shallow copy of all fields from another pipe.
    pub fn copy_from(&mut self, other: &Pipe) {
        self.name = other.name.clone();
        self.description = other.description.clone();
        self.kind = other.kind.clone();
        self.tank = other.tank.clone();
        self.mapper = other.mapper.clone();
    }
}

impl FromXml for Pipe {
    const NODE_NAME: &'static str = "Pipe";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;

        let kind = match (element.child("QueryOptions"), element.child("UpdateOptions")) {
            (Some(options), None) => PipeKind::Query {
                cache_enabled: options.flag_attribute("cacheEnabled", false)?,
                max_rows: options.parse_attribute("maxRows")?,
            },
            (None, Some(options)) => PipeKind::Update {
                allow_insert: options.flag_attribute("allowInsert", true)?,
                allow_update: options.flag_attribute("allowUpdate", true)?,
                allow_delete: options.flag_attribute("allowDelete", true)?,
            },
            (None, None) => {
                return Err(ObjectStoreError::missing_element(
                    element.name(),
                    "QueryOptions",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(ObjectStoreError::invalid_value(
                    "Pipe",
                    "both QueryOptions and UpdateOptions present",
                ));
            }
        };

        let mut pipe = Pipe::new(element.required_attribute("name")?, kind)?;
        pipe.set_description(element.child_text("description").map(str::to_owned));
        if let Some(tank) = element.child(BackEndDataTank::NODE_NAME) {
            pipe.tank = BackEndDataTank::from_xml(tank)?;
        }
        if let Some(mapper) = element.child(DataMapper::NODE_NAME) {
            pipe.mapper = DataMapper::from_xml(mapper)?;
        }
        Ok(pipe)
    }
}

impl ToXml for Pipe {
    fn to_xml(&self) -> XmlElement {
        let mut element =
            XmlElement::new(Self::NODE_NAME).with_attribute("name", self.name.clone());
        if let Some(description) = &self.description {
            element.add_text_child("description", description.clone());
        }

        match &self.kind {
            PipeKind::Query {
                cache_enabled,
                max_rows,
            } => {
                let mut options = XmlElement::new("QueryOptions")
                    .with_attribute("cacheEnabled", flag_str(*cache_enabled));
                if let Some(max_rows) = max_rows {
                    options.set_attribute("maxRows", max_rows.to_string());
                }
                element.add_child(options);
            }
            PipeKind::Update {
                allow_insert,
                allow_update,
                allow_delete,
            } => {
                element.add_child(
                    XmlElement::new("UpdateOptions")
                        .with_attribute("allowInsert", flag_str(*allow_insert))
                        .with_attribute("allowUpdate", flag_str(*allow_update))
                        .with_attribute("allowDelete", flag_str(*allow_delete)),
                );
            }
        }

        element.add_child(self.tank.to_xml());
        element.add_child(self.mapper.to_xml());
        element
    }
}

impl Validate for Pipe {
    fn validate(&self, ctx: &mut ValidationContext) {
        ctx.require_valid_name("Pipe.name", &self.name, MAX_NAME_LEN);

        match &self.kind {
            PipeKind::Query { max_rows, .. } => {
                if *max_rows == Some(0) {
                    ctx.error("maxRows must be greater than 0 when set");
                }
            }
            PipeKind::Update {
                allow_insert,
                allow_update,
                allow_delete,
            } => {
                if !allow_insert && !allow_update && !allow_delete {
                    ctx.warning("update pipe has no write operations enabled");
                }
            }
        }

        self.tank.validate(ctx);

        if self.mapper.is_empty() {
            ctx.warning("pipe maps no fields");
        }
        for mapping in self.mapper.mappings() {
            ctx.visit(format!("DataMapping[{}]", mapping.xml_field()), |ctx| {
                mapping.column().validate(ctx);
                if self.tank.table(mapping.column().table_alias()).is_none() {
                    ctx.error(format!(
                        "mapping references unknown table alias '{}'",
                        mapping.column().table_alias()
                    ));
                }
            });
        }
    }
}

impl DbComponent for Pipe {
    fn component_type() -> &'static str {
        "Pipe"
    }

    fn key(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::backend::BackEndTable;

    fn orders_pipe() -> Pipe {
        let mut pipe = Pipe::new(
            "orders",
            PipeKind::Query {
                cache_enabled: true,
                max_rows: Some(500),
            },
        )
        .unwrap();
        pipe.set_description(Some("order lookup".to_string()));
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
        pipe
    }

    #[test]
    fn test_pipe_xml_round_trip() {
        let pipe = orders_pipe();
        let reparsed = Pipe::from_xml(&pipe.to_xml()).unwrap();
        assert_eq!(reparsed, pipe);
    }

    #[test]
    fn test_update_pipe_round_trip() {
        let mut pipe = Pipe::new(
            "order_update",
            PipeKind::Update {
                allow_insert: true,
                allow_update: true,
                allow_delete: false,
            },
        )
        .unwrap();
        pipe.tank_mut()
            .add_table(BackEndTable::new("ord", "inventoryDb", "ORDERS").unwrap())
            .unwrap();

        let reparsed = Pipe::from_xml(&pipe.to_xml()).unwrap();
        assert_eq!(reparsed, pipe);
        assert!(matches!(
            reparsed.kind(),
            PipeKind::Update {
                allow_delete: false,
                ..
            }
        ));
    }

    #[test]
    fn test_pipe_requires_options_element() {
        let element = XmlElement::new("Pipe").with_attribute("name", "orders");
        assert!(Pipe::from_xml(&element).is_err());
    }

    #[test]
    fn test_mapper_rejects_duplicate_field() {
        let mut mapper = DataMapper::new();
        mapper
            .add(
                DataMapping::new(BackEndColumn::new("t", "A", 4).unwrap(), "Order/a").unwrap(),
            )
            .unwrap();
        let err = mapper
            .add(
                DataMapping::new(BackEndColumn::new("t", "B", 4).unwrap(), "Order/a").unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::DuplicateKey { .. }));
    }

    #[test]
    fn test_validation_flags_unknown_table_alias() {
        let mut pipe = orders_pipe();
        pipe.mapper_mut()
            .add(
                DataMapping::new(
                    BackEndColumn::new("ghost", "X", 4).unwrap(),
                    "Order/ghost",
                )
                .unwrap(),
            )
            .unwrap();

        let mut ctx = ValidationContext::new();
        pipe.validate(&mut ctx);
        assert!(ctx.has_errors());
        assert!(
            ctx.issues()
                .iter()
                .any(|i| i.message.contains("unknown table alias 'ghost'"))
        );
    }

    #[test]
    fn test_validation_warns_on_inert_update_pipe() {
        let mut pipe = orders_pipe();
        pipe.set_kind(PipeKind::Update {
            allow_insert: false,
            allow_update: false,
            allow_delete: false,
        });

        let mut ctx = ValidationContext::new();
        pipe.validate(&mut ctx);
        assert!(
            ctx.issues()
                .iter()
                .any(|i| i.message.contains("no write operations"))
        );
    }

    #[test]
    fn test_zero_max_rows_is_error() {
        let mut pipe = orders_pipe();
        pipe.set_kind(PipeKind::Query {
            cache_enabled: false,
            max_rows: Some(0),
        });

        let mut ctx = ValidationContext::new();
        pipe.validate(&mut ctx);
        assert!(ctx.has_errors());
    }
}
