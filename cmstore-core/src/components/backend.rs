//! Back-end table and column descriptors.
//!
//! Tables are referenced throughout a definition by alias, never by
//! physical name; the datasource is an opaque server-side name (connection
//! handling lives in the persistence layer, not here).

use serde::{Deserialize, Serialize};

use crate::component::DbComponent;
use crate::error::{ObjectStoreError, Result};
use crate::validation::{MAX_ALIAS_LEN, Validate, ValidationContext, validate_name};
use crate::xml::{FromXml, ToXml, XmlElement};

/// Descriptor of one relational table behind a pipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackEndTable {
    alias: String,
    datasource: String,
    table: String,
    origin: Option<String>,
    comment: Option<String>,
}

impl BackEndTable {
    /// Creates a table descriptor.
    ///
    /// # Errors
    /// Rejects an illegal alias, or an empty datasource or table name.
    pub fn new(
        alias: impl Into<String>,
        datasource: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self> {
        let mut descriptor = Self {
            alias: String::new(),
            datasource: String::new(),
            table: String::new(),
            origin: None,
            comment: None,
        };
        descriptor.set_alias(alias)?;
        descriptor.set_datasource(datasource)?;
        descriptor.set_table(table)?;
        Ok(descriptor)
    }

    /// Alias the rest of the definition refers to.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Opaque datasource name resolved by the persistence layer.
    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    /// Physical table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Schema/owner qualifier, if any.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Maintainer comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Changes the alias.
    ///
    /// # Errors
    /// Rejects names that are empty, overlong, or not identifier-shaped.
    pub fn set_alias(&mut self, alias: impl Into<String>) -> Result<()> {
        let alias = alias.into();
        validate_name("BackEndTable.alias", &alias, MAX_ALIAS_LEN)?;
        self.alias = alias;
        Ok(())
    }

    /// Changes the datasource name.
    ///
    /// # Errors
    /// Rejects an empty datasource.
    pub fn set_datasource(&mut self, datasource: impl Into<String>) -> Result<()> {
        let datasource = datasource.into();
        if datasource.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "BackEndTable.datasource",
                "must not be empty",
            ));
        }
        self.datasource = datasource;
        Ok(())
    }

    /// Changes the physical table name.
    ///
    /// # Errors
    /// Rejects an empty or overlong table name.
    pub fn set_table(&mut self, table: impl Into<String>) -> Result<()> {
        let table = table.into();
        if table.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "BackEndTable.table",
                "must not be empty",
            ));
        }
        if table.len() > MAX_ALIAS_LEN {
            return Err(ObjectStoreError::invalid_value(
                "BackEndTable.table",
                format!("exceeds {} characters", MAX_ALIAS_LEN),
            ));
        }
        self.table = table;
        Ok(())
    }

    /// Sets or clears the schema/owner qualifier.
    pub fn set_origin(&mut self, origin: Option<String>) {
        self.origin = origin.filter(|o| !o.is_empty());
    }

    /// Sets or clears the maintainer comment.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment.filter(|c| !c.is_empty());
    }

    /// Shallow copy of all fields from another table descriptor.
    pub fn copy_from(&mut self, other: &BackEndTable) {
        self.alias = other.alias.clone();
        self.datasource = other.datasource.clone();
        self.table = other.table.clone();
        self.origin = other.origin.clone();
        self.comment = other.comment.clone();
    }
}

impl FromXml for BackEndTable {
    const NODE_NAME: &'static str = "BackEndTable";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let mut descriptor = BackEndTable::new(
            element.required_attribute("alias")?,
            element.required_child_text("dataSource")?,
            element.required_child_text("tableName")?,
        )?;
        descriptor.set_origin(element.child_text("origin").map(str::to_owned));
        descriptor.set_comment(element.child_text("comment").map(str::to_owned));
        Ok(descriptor)
    }
}

impl ToXml for BackEndTable {
    fn to_xml(&self) -> XmlElement {
        let mut element =
            XmlElement::new(Self::NODE_NAME).with_attribute("alias", self.alias.clone());
        element.add_text_child("dataSource", self.datasource.clone());
        element.add_text_child("tableName", self.table.clone());
        if let Some(origin) = &self.origin {
            element.add_text_child("origin", origin.clone());
        }
        if let Some(comment) = &self.comment {
            element.add_text_child("comment", comment.clone());
        }
        element
    }
}

impl Validate for BackEndTable {
    fn validate(&self, ctx: &mut ValidationContext) {
        ctx.require_valid_name("BackEndTable.alias", &self.alias, MAX_ALIAS_LEN);
        if self.datasource.is_empty() {
            ctx.error("datasource must not be empty");
        }
        if self.table.is_empty() {
            ctx.error("table name must not be empty");
        }
    }
}

impl DbComponent for BackEndTable {
    fn component_type() -> &'static str {
        "BackEndTable"
    }

    fn key(&self) -> &str {
        &self.alias
    }
}

/// Reference to one column of an aliased back-end table.
///
/// The JDBC type code is carried verbatim for the persistence layer; this
/// slice never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackEndColumn {
    table_alias: String,
    column: String,
    jdbc_type: i32,
    alias: Option<String>,
}

impl BackEndColumn {
    /// Creates a column reference.
    ///
    /// # Errors
    /// Rejects an illegal table alias or empty column name.
    pub fn new(
        table_alias: impl Into<String>,
        column: impl Into<String>,
        jdbc_type: i32,
    ) -> Result<Self> {
        let table_alias = table_alias.into();
        validate_name("BackEndColumn.tableAlias", &table_alias, MAX_ALIAS_LEN)?;
        let column = column.into();
        if column.is_empty() {
            return Err(ObjectStoreError::invalid_value(
                "BackEndColumn.column",
                "must not be empty",
            ));
        }
        Ok(Self {
            table_alias,
            column,
            jdbc_type,
            alias: None,
        })
    }

    /// Alias of the owning table.
    pub fn table_alias(&self) -> &str {
        &self.table_alias
    }

    /// Physical column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// JDBC type code, uninterpreted.
    pub fn jdbc_type(&self) -> i32 {
        self.jdbc_type
    }

    /// Column alias, if any.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Sets or clears the column alias.
    pub fn set_alias(&mut self, alias: Option<String>) {
        self.alias = alias.filter(|a| !a.is_empty());
    }

    /// Fully-qualified `tableAlias.column` form used in logs and errors.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table_alias, self.column)
    }
}

impl FromXml for BackEndColumn {
    const NODE_NAME: &'static str = "BackEndColumn";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let jdbc_type = element.parse_attribute::<i32>("jdbcType")?.unwrap_or(0);
        let mut column = BackEndColumn::new(
            element.required_attribute("tableAlias")?,
            element.required_child_text("columnName")?,
            jdbc_type,
        )?;
        column.set_alias(element.attribute("alias").map(str::to_owned));
        Ok(column)
    }
}

impl ToXml for BackEndColumn {
    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NODE_NAME)
            .with_attribute("tableAlias", self.table_alias.clone())
            .with_attribute("jdbcType", self.jdbc_type.to_string());
        if let Some(alias) = &self.alias {
            element.set_attribute("alias", alias.clone());
        }
        element.add_text_child("columnName", self.column.clone());
        element
    }
}

impl Validate for BackEndColumn {
    fn validate(&self, ctx: &mut ValidationContext) {
        ctx.require_valid_name("BackEndColumn.tableAlias", &self.table_alias, MAX_ALIAS_LEN);
        if self.column.is_empty() {
            ctx.error("column name must not be empty");
        }
    }
}

/// The set of back-end tables joined by one pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackEndDataTank {
    tables: Vec<BackEndTable>,
}

impl BackEndDataTank {
    /// Creates an empty tank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    ///
    /// # Errors
    /// `DuplicateKey` if the alias is already taken.
    pub fn add_table(&mut self, table: BackEndTable) -> Result<()> {
        if self.table(table.alias()).is_some() {
            return Err(ObjectStoreError::DuplicateKey {
                set: "BackEndDataTank",
                key: table.alias().to_string(),
            });
        }
        self.tables.push(table);
        Ok(())
    }

    /// Looks up a table by alias.
    pub fn table(&self, alias: &str) -> Option<&BackEndTable> {
        self.tables.iter().find(|t| t.alias() == alias)
    }

    /// Tables in insertion order.
    pub fn tables(&self) -> &[BackEndTable] {
        &self.tables
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the tank holds no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Shallow copy of all tables from another tank.
    pub fn copy_from(&mut self, other: &BackEndDataTank) {
        self.tables = other.tables.clone();
    }
}

impl FromXml for BackEndDataTank {
    const NODE_NAME: &'static str = "BackEndDataTank";

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name(Self::NODE_NAME)?;
        let mut tank = BackEndDataTank::new();
        for child in element.children_named(BackEndTable::NODE_NAME) {
            tank.add_table(BackEndTable::from_xml(child)?)?;
        }
        Ok(tank)
    }
}

impl ToXml for BackEndDataTank {
    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NODE_NAME);
        for table in &self.tables {
            element.add_child(table.to_xml());
        }
        element
    }
}

impl Validate for BackEndDataTank {
    fn validate(&self, ctx: &mut ValidationContext) {
        if self.tables.is_empty() {
            ctx.error("data tank must reference at least one table");
        }
        for (index, table) in self.tables.iter().enumerate() {
            ctx.visit(format!("BackEndTable[{}]", table.alias()), |ctx| {
                table.validate(ctx);
                // add_table enforces this; re-check for deserialized trees
                if self.tables[..index].iter().any(|t| t.alias() == table.alias()) {
                    ctx.error(format!("duplicate table alias '{}'", table.alias()));
                }
            });
        }
    }
}
