use async_trait::async_trait;

use domainsmith_core::{Result, TableDescriptor, TableRef};

/// Capability implemented by every schema source.
///
/// Implementations must produce equal descriptors for equivalent underlying
/// schemas, whatever the source.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Short identifier of the source (e.g. `catalog`).
    fn source_kind(&self) -> &'static str;

    /// Introspect one table into a fresh descriptor.
    async fn introspect(&self, table: &TableRef) -> Result<TableDescriptor>;

    /// List the tables this source can introspect in a schema, sorted by name.
    async fn list_tables(&self, schema_name: &str) -> Result<Vec<String>>;
}
