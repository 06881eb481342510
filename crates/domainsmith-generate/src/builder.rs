//! Fresh canonical config from introspection results.

use std::collections::BTreeMap;

use domainsmith_core::{
    CanonicalDomainConfig, CanonicalType, ColumnDescriptor, ConfigTable, ConfigValue, FieldEntry,
    FilterConfig, GENERATOR_NAME, MetadataEntry, Provenance, SchemaSection, SourceSection,
    TableDescriptor, humanize,
};
use domainsmith_introspect::{AssociationSet, derive_associations};

use crate::options::RenderSettings;

/// Number of columns selected by default.
pub const DEFAULT_SELECTED_LIMIT: usize = 5;

/// Inputs that shape a generated config beyond the descriptor itself.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    pub render: &'a RenderSettings,
    /// Introspector source kind recorded in metadata.
    pub source_kind: &'a str,
    pub expansion_depth: usize,
}

/// Build the generated (not yet merged) config for one table.
///
/// Every element is tagged [`Provenance::Generated`].
pub fn build_config(
    descriptor: &TableDescriptor,
    relationships: AssociationSet,
    context: &BuildContext<'_>,
) -> CanonicalDomainConfig {
    let schemas: BTreeMap<String, SchemaSection> = relationships
        .schemas
        .iter()
        .map(|(name, expanded)| (name.clone(), schema_section(expanded)))
        .collect();

    CanonicalDomainConfig {
        name: humanize(&descriptor.table_name),
        namespace: context.render.namespace(&descriptor.table_name),
        source: SourceSection::from_descriptor(descriptor),
        schemas,
        associations: relationships.associations,
        joins: relationships.joins,
        default_selected: default_selected(&descriptor.columns),
        filters: suggested_filters(&descriptor.columns),
        metadata: generated_metadata(context),
        conflicts: Vec::new(),
    }
}

fn schema_section(descriptor: &TableDescriptor) -> SchemaSection {
    SchemaSection {
        table_name: descriptor.table_name.clone(),
        schema_name: descriptor.schema_name.clone(),
        primary_key: descriptor.primary_key.clone(),
        fields: descriptor.columns.iter().map(FieldEntry::from_column).collect(),
        associations: derive_associations(descriptor),
    }
}

/// The first selectable columns in introspection order.
pub fn default_selected(columns: &[ColumnDescriptor]) -> Vec<String> {
    columns
        .iter()
        .filter(|column| column.canonical_type.is_selectable())
        .take(DEFAULT_SELECTED_LIMIT)
        .map(|column| column.name.clone())
        .collect()
}

/// Filters suggested from column types, in column order.
pub fn suggested_filters(columns: &[ColumnDescriptor]) -> Vec<FilterConfig> {
    columns
        .iter()
        .filter_map(|column| {
            let mut definition = ConfigTable::new();
            if let Some(labels) = &column.enum_values {
                definition.insert("type".to_string(), ConfigValue::String("select".to_string()));
                definition.insert(
                    "options".to_string(),
                    ConfigValue::Array(labels.iter().cloned().map(ConfigValue::String).collect()),
                );
            } else {
                let kind = match column.canonical_type {
                    CanonicalType::Boolean => "boolean",
                    CanonicalType::Date | CanonicalType::Datetime => "date_range",
                    _ => return None,
                };
                definition.insert("type".to_string(), ConfigValue::String(kind.to_string()));
            }
            Some(FilterConfig {
                name: column.name.clone(),
                definition,
                provenance: Provenance::Generated,
            })
        })
        .collect()
}

fn generated_metadata(context: &BuildContext<'_>) -> Vec<MetadataEntry> {
    let depth = i64::try_from(context.expansion_depth).unwrap_or(i64::MAX);
    vec![
        MetadataEntry {
            key: "generator".to_string(),
            value: ConfigValue::String(GENERATOR_NAME.to_string()),
            provenance: Provenance::Generated,
        },
        MetadataEntry {
            key: "source_kind".to_string(),
            value: ConfigValue::String(context.source_kind.to_string()),
            provenance: Provenance::Generated,
        },
        MetadataEntry {
            key: "expansion_depth".to_string(),
            value: ConfigValue::Integer(depth),
            provenance: Provenance::Generated,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, canonical_type: CanonicalType) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            source_type: canonical_type.as_str().to_string(),
            canonical_type,
            nullable: true,
            default: None,
            max_length: None,
            enum_values: None,
        }
    }

    #[test]
    fn default_selection_skips_opaque_columns() {
        let columns = vec![
            column("id", CanonicalType::BinaryId),
            column("a", CanonicalType::String),
            column("payload", CanonicalType::Map),
            column("b", CanonicalType::Integer),
            column("c", CanonicalType::Date),
            column("d", CanonicalType::Boolean),
            column("e", CanonicalType::Float),
            column("f", CanonicalType::String),
        ];
        assert_eq!(default_selected(&columns), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn filters_follow_column_types() {
        let mut status = column("status", CanonicalType::String);
        status.enum_values = Some(vec!["open".to_string(), "closed".to_string()]);
        let columns = vec![
            column("id", CanonicalType::Integer),
            column("active", CanonicalType::Boolean),
            status,
            column("placed_at", CanonicalType::Datetime),
            column("note", CanonicalType::String),
        ];

        let filters = suggested_filters(&columns);
        let names: Vec<&str> = filters.iter().map(|filter| filter.name.as_str()).collect();
        assert_eq!(names, vec!["active", "status", "placed_at"]);
        assert_eq!(
            filters[1].definition.get("type").and_then(ConfigValue::as_str),
            Some("select")
        );
        assert_eq!(
            filters[2].definition.get("type").and_then(ConfigValue::as_str),
            Some("date_range")
        );
    }
}
