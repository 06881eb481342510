use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::CanonicalType;

/// Schema used when a caller does not name one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Structural metadata for one table, produced fresh by every introspection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    pub table_name: String,
    pub schema_name: String,
    /// Primary key columns in key order.
    pub primary_key: Vec<String>,
    /// Columns in introspection order.
    pub columns: Vec<ColumnDescriptor>,
    /// Foreign keys ordered by constraint name, then key position.
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.schema_name, &self.table_name)
    }

    /// Table a foreign key of this descriptor points at.
    pub fn foreign_key_target(&self, fk: &ForeignKeyDescriptor) -> TableRef {
        TableRef::new(
            fk.target_schema.as_deref().unwrap_or(&self.schema_name),
            &fk.target_table,
        )
    }

    /// Sort foreign keys into their canonical order.
    ///
    /// Introspectors call this before handing a descriptor out so that two
    /// sources describing the same table compare equal. The sort is stable,
    /// so the columns of a composite key keep the order they were given in.
    pub fn normalize(mut self) -> Self {
        self.foreign_keys
            .sort_by(|left, right| left.constraint_name.cmp(&right.constraint_name));
        self.foreign_keys.dedup();
        self
    }
}

/// Column metadata. Immutable once introspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type name as reported by the source (`integer`, `character varying`, `utc_datetime`).
    pub source_type: String,
    pub canonical_type: CanonicalType,
    pub nullable: bool,
    /// Default expression as text, when the source exposes one.
    pub default: Option<String>,
    pub max_length: Option<i32>,
    /// Allowed labels for enum-typed columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Single-column foreign key fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeyDescriptor {
    pub local_column: String,
    pub target_table: String,
    pub target_column: String,
    pub constraint_name: String,
    /// Schema of the target table when it differs from the owning table's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_schema: Option<String>,
}

/// Schema-qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub schema_name: String,
    pub table_name: String,
}

impl TableRef {
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }

    /// Reference in the default `public` schema.
    pub fn public(table_name: impl Into<String>) -> Self {
        Self::new(DEFAULT_SCHEMA, table_name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}
