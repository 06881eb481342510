//! Core contracts and helpers for domainsmith.
//!
//! This crate defines the table descriptors every introspector produces, the
//! canonical domain configuration the generator merges and renders, and the
//! small pure helpers (type mapping, singularization) shared across crates.

pub mod config;
pub mod error;
pub mod inflect;
pub mod redaction;
pub mod schema;
pub mod types;
pub mod validation;

pub use config::{
    AssociationDescriptor, CanonicalDomainConfig, ConfigTable, ConfigValue, ConflictKind,
    FieldEntry, FilterConfig, HierarchyConfig, JoinConfig, JoinType, MergeConflict,
    MetadataEntry, Provenance, SchemaSection, SourceSection,
};
pub use error::{IntrospectionError, Result};
pub use inflect::{humanize, singularize};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{ColumnDescriptor, DEFAULT_SCHEMA, ForeignKeyDescriptor, TableDescriptor, TableRef};
pub use types::{CanonicalType, map_type};
pub use validation::validate_descriptor;

/// Name recorded in generated metadata.
pub const GENERATOR_NAME: &str = "domainsmith";
