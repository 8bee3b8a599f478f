//! The object-store component records.
//!
//! Every type here follows the same template: a validated constructor,
//! `from_xml`/`to_xml` for the wire format, individually-validated
//! setters, `copy_from` shallow cloning, derived equality over data
//! fields, and a [`Validate`](crate::validation::Validate) impl for the
//! visitor pass.

pub mod application;
pub mod attribute;
pub mod backend;
pub mod credential;
pub mod pipe;
pub mod relationship;
pub mod security;

pub use application::ApplicationDef;
pub use attribute::{Attribute, AttributeList};
pub use backend::{BackEndColumn, BackEndDataTank, BackEndTable};
pub use credential::BackEndCredential;
pub use pipe::{DataMapper, DataMapping, Pipe, PipeKind};
pub use relationship::{
    ConfigType, Effect, ExecutionContext, RelationshipCategory, RelationshipConfig,
    RelationshipProperties,
};
pub use security::{ProviderType, SecurityProviderInstance};
