//! Canonical, provenance-tagged domain configuration.
//!
//! This is the shape the builder produces, the merger combines with preserved
//! customizations, and the renderer serializes. Ordered collections are kept
//! as vectors so rendering never depends on hash iteration order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDescriptor, TableDescriptor};

/// Inline value carried by field, filter and metadata entries.
pub type ConfigValue = toml::Value;
/// Key/value table carried by field and filter definitions.
pub type ConfigTable = toml::Table;

/// Where an element of the canonical config came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Generated,
    Preserved,
    PreservedWithConflict,
}

impl Provenance {
    /// Whether the element must carry the customization marker when rendered.
    pub fn is_preserved(self) -> bool {
        !matches!(self, Provenance::Generated)
    }
}

/// How a consuming query engine should join an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Left,
    Inner,
    Dimension,
    Tagging,
    Hierarchical,
    StarDimension,
    SnowflakeDimension,
}

impl JoinType {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinType::Left => "left",
            JoinType::Inner => "inner",
            JoinType::Dimension => "dimension",
            JoinType::Tagging => "tagging",
            JoinType::Hierarchical => "hierarchical",
            JoinType::StarDimension => "star_dimension",
            JoinType::SnowflakeDimension => "snowflake_dimension",
        }
    }

    /// Join types that present the target through a single display column.
    pub fn wants_display_field(self) -> bool {
        matches!(
            self,
            JoinType::Dimension
                | JoinType::StarDimension
                | JoinType::SnowflakeDimension
                | JoinType::Tagging
        )
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value.trim().trim_start_matches(':') {
            "left" => JoinType::Left,
            "inner" => JoinType::Inner,
            "dimension" => JoinType::Dimension,
            "tagging" => JoinType::Tagging,
            "hierarchical" => JoinType::Hierarchical,
            "star_dimension" => JoinType::StarDimension,
            "snowflake_dimension" => JoinType::SnowflakeDimension,
            other => return Err(format!("unknown join type: {other}")),
        };
        Ok(parsed)
    }
}

/// Named association derived from a foreign key, or preserved from a prior artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDescriptor {
    pub name: String,
    /// Target table name.
    pub target: String,
    pub owner_key: String,
    pub related_key: String,
    pub join_type: JoinType,
    pub is_custom: bool,
    pub provenance: Provenance,
    /// Keys a user added that have no structured meaning; rendered back verbatim.
    pub extra: ConfigTable,
}

/// Traversal bounds attached to hierarchical joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyConfig {
    pub hierarchy_type: String,
    pub depth_limit: i64,
}

impl HierarchyConfig {
    /// Fixed defaults for hierarchical joins; not configurable at this layer.
    pub fn adjacency_list() -> Self {
        Self {
            hierarchy_type: "adjacency_list".to_string(),
            depth_limit: 5,
        }
    }
}

/// Join presentation for one association.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinConfig {
    /// Association name the join belongs to.
    pub name: String,
    /// Human readable label.
    pub label: String,
    pub join_type: JoinType,
    pub display_field: Option<String>,
    pub hierarchy: Option<HierarchyConfig>,
    pub provenance: Provenance,
    pub extra: ConfigTable,
}

/// One column of a source or schema section.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub name: String,
    pub definition: ConfigTable,
    pub provenance: Provenance,
    /// Set when a preserved field no longer exists in the live schema.
    pub orphaned: bool,
}

impl FieldEntry {
    /// Generated entry for an introspected column.
    pub fn from_column(column: &ColumnDescriptor) -> Self {
        let mut definition = ConfigTable::new();
        definition.insert(
            "type".to_string(),
            ConfigValue::String(column.canonical_type.as_str().to_string()),
        );
        definition.insert(
            "source_type".to_string(),
            ConfigValue::String(column.source_type.clone()),
        );
        definition.insert("nullable".to_string(), ConfigValue::Boolean(column.nullable));
        if let Some(default) = &column.default {
            definition.insert("default".to_string(), ConfigValue::String(default.clone()));
        }
        if let Some(max_length) = column.max_length {
            definition.insert(
                "max_length".to_string(),
                ConfigValue::Integer(i64::from(max_length)),
            );
        }
        if let Some(labels) = &column.enum_values {
            definition.insert(
                "enum_values".to_string(),
                ConfigValue::Array(labels.iter().cloned().map(ConfigValue::String).collect()),
            );
        }

        Self {
            name: column.name.clone(),
            definition,
            provenance: Provenance::Generated,
            orphaned: false,
        }
    }

    /// Canonical type tag recorded in the definition, if any.
    pub fn type_tag(&self) -> Option<&str> {
        self.definition.get("type").and_then(ConfigValue::as_str)
    }
}

/// A named filter definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub name: String,
    pub definition: ConfigTable,
    pub provenance: Provenance,
}

/// One metadata key.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: ConfigValue,
    pub provenance: Provenance,
}

/// Columns and keys of the root table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSection {
    pub table_name: String,
    pub schema_name: String,
    pub primary_key: Vec<String>,
    pub fields: Vec<FieldEntry>,
}

impl SourceSection {
    pub fn from_descriptor(descriptor: &TableDescriptor) -> Self {
        Self {
            table_name: descriptor.table_name.clone(),
            schema_name: descriptor.schema_name.clone(),
            primary_key: descriptor.primary_key.clone(),
            fields: descriptor.columns.iter().map(FieldEntry::from_column).collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Expanded table reached by following foreign keys.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSection {
    pub table_name: String,
    pub schema_name: String,
    pub primary_key: Vec<String>,
    pub fields: Vec<FieldEntry>,
    pub associations: Vec<AssociationDescriptor>,
}

/// Which category a merge conflict belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    FieldType,
    Association,
    Join,
    Metadata,
}

/// A situation the merger resolved by policy but wants reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub kind: ConflictKind,
    pub name: String,
    pub detail: String,
}

/// Root artifact shape for one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalDomainConfig {
    /// Display name of the domain.
    pub name: String,
    /// Output namespace, `<app>.domains.<table>`.
    pub namespace: String,
    pub source: SourceSection,
    pub schemas: BTreeMap<String, SchemaSection>,
    pub associations: Vec<AssociationDescriptor>,
    pub joins: Vec<JoinConfig>,
    pub default_selected: Vec<String>,
    pub filters: Vec<FilterConfig>,
    pub metadata: Vec<MetadataEntry>,
    pub conflicts: Vec<MergeConflict>,
}

impl CanonicalDomainConfig {
    pub fn association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|assoc| assoc.name == name)
    }

    pub fn join(&self, name: &str) -> Option<&JoinConfig> {
        self.joins.iter().find(|join| join.name == name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterConfig> {
        self.filters.iter().find(|filter| filter.name == name)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&ConfigValue> {
        self.metadata
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    /// Whether every element is tagged [`Provenance::Generated`].
    pub fn is_fully_generated(&self) -> bool {
        self.source
            .fields
            .iter()
            .all(|field| field.provenance == Provenance::Generated)
            && self
                .associations
                .iter()
                .all(|assoc| assoc.provenance == Provenance::Generated)
            && self
                .joins
                .iter()
                .all(|join| join.provenance == Provenance::Generated)
            && self
                .filters
                .iter()
                .all(|filter| filter.provenance == Provenance::Generated)
            && self
                .metadata
                .iter()
                .all(|entry| entry.provenance == Provenance::Generated)
    }
}
