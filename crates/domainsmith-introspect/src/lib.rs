//! Schema introspection sources and foreign-key relationship resolution.

pub mod introspector;
pub mod object;
pub mod options;
pub mod postgres;
pub mod relationships;

pub use introspector::SchemaIntrospector;
pub use object::{
    ObjectAssociation, ObjectField, ObjectModel, ObjectModelError, ObjectSchema,
    ObjectSchemaIntrospector, RelationshipKind,
};
pub use options::ResolveOptions;
pub use postgres::{CatalogIntrospector, introspect_table};
pub use relationships::{
    AssociationSet, DISPLAY_FIELD_PRIORITY, RelationshipResolver, derive_associations, join_for,
    select_display_field,
};

pub use domainsmith_core::TableDescriptor;
