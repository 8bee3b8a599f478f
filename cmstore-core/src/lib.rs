//! Core object-store data model and XML persistence layer for cmstore.
//!
//! This crate is the in-memory representation of a content-management
//! server's XML-configured application definitions: typed component
//! records, the bespoke XML element format they serialize to, a
//! validation visitor, and the database-component change-tracking
//! protocol that diffs edits into insert/update/delete action batches.
//!
//! # Architecture
//! - [`xml`] owns the wire convention: an element tree parsed and written
//!   with quick-xml, plus the `FromXml`/`ToXml` traits.
//! - [`components`] holds the records themselves, all following the same
//!   constructor/from_xml/to_xml/validate/copy_from template.
//! - [`component`] is the change-tracking core: per-object CRUD state,
//!   tracked sets, and action-batch flushing.
//! - [`validation`] is the visitor that re-checks whole trees and the
//!   cross-field rules setters cannot see.
//!
//! Back-end connections, extension execution, and directory lookups are
//! deliberately absent; those belong to the server runtime, which
//! consumes the action batches produced here.

pub mod component;
pub mod components;
pub mod error;
pub mod logging;
pub mod validation;
pub mod xml;

// Re-export commonly used types
pub use component::{ActionType, ComponentId, ComponentState, DbComponent, Tracked, TrackedSet};
pub use components::{
    ApplicationDef, Attribute, AttributeList, BackEndColumn, BackEndDataTank, BackEndTable,
    BackEndCredential, Pipe, PipeKind, ProviderType, RelationshipCategory, RelationshipConfig,
    SecurityProviderInstance,
};
pub use error::{ObjectStoreError, Result, redact_server_url};
pub use logging::init_logging;
pub use validation::{Severity, Validate, ValidationContext, ValidationIssue};
pub use xml::{FromXml, ToXml, XmlElement, parse_document, parse_str, write_document};
