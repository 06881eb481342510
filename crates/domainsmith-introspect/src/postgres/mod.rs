use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;

use domainsmith_core::{Result, TableDescriptor, TableRef};

use crate::introspector::SchemaIntrospector;

mod mapper;
mod queries;

/// Introspector backed by the Postgres system catalog.
///
/// Every query checks a connection out of the pool and returns it as soon as
/// the rows are fetched, so one pool can serve concurrent table runs.
#[derive(Debug, Clone)]
pub struct CatalogIntrospector {
    pool: PgPool,
}

impl CatalogIntrospector {
    /// Create a new introspector using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SchemaIntrospector for CatalogIntrospector {
    fn source_kind(&self) -> &'static str {
        "catalog"
    }

    async fn introspect(&self, table: &TableRef) -> Result<TableDescriptor> {
        introspect_table(&self.pool, table).await
    }

    async fn list_tables(&self, schema_name: &str) -> Result<Vec<String>> {
        queries::list_base_tables(&self.pool, schema_name).await
    }
}

/// Introspect one table: columns, primary key, foreign keys, then enum labels on demand.
pub async fn introspect_table(pool: &PgPool, table: &TableRef) -> Result<TableDescriptor> {
    let raw_columns = queries::list_columns(pool, &table.schema_name, &table.table_name).await?;
    let raw_pk = queries::list_primary_key(pool, &table.schema_name, &table.table_name).await?;
    let raw_fks = queries::list_foreign_keys(pool, &table.schema_name, &table.table_name).await?;

    let mut enum_labels: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for (type_schema, type_name) in mapper::enum_candidates(&raw_columns) {
        let labels = queries::list_enum_labels(pool, &type_schema, &type_name)
            .await?
            .into_iter()
            .map(|row| row.enumlabel)
            .collect();
        enum_labels.insert((type_schema, type_name), labels);
    }

    let columns = raw_columns
        .into_iter()
        .map(|raw| {
            let labels = if mapper::is_user_defined(&raw) {
                enum_labels
                    .get(&(raw.udt_schema.clone(), raw.udt_name.clone()))
                    .cloned()
            } else {
                None
            };
            mapper::map_column(raw, labels)
        })
        .collect();

    let descriptor = mapper::build_descriptor(
        table,
        columns,
        mapper::map_primary_key(raw_pk),
        mapper::map_foreign_keys(table, raw_fks),
    )?;

    tracing::debug!(
        event = "table_introspected",
        source = "catalog",
        table = %table,
        columns = descriptor.columns.len(),
        foreign_keys = descriptor.foreign_keys.len()
    );

    Ok(descriptor)
}
