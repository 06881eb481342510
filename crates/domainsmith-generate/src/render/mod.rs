//! Serializes a canonical config into the TOML artifact.
//!
//! Output is a pure function of the config. Each region entry occupies one
//! line, and preserved entries end with the customization marker so the
//! extractor can find them again on the next run.

pub mod value;

use std::fmt::Write as _;

use domainsmith_core::{
    AssociationDescriptor, CanonicalDomainConfig, ConfigTable, ConfigValue, FieldEntry,
    FilterConfig, JoinConfig, MetadataEntry, Provenance, SchemaSection,
};

use crate::region::{MARKER_COMMENT, Region};

pub const FIELD_KEYS: &[&str] = &[
    "type",
    "source_type",
    "nullable",
    "default",
    "max_length",
    "enum_values",
];
pub const ASSOCIATION_KEYS: &[&str] = &["target", "owner_key", "related_key", "join_type"];
pub const JOIN_KEYS: &[&str] = &[
    "label",
    "join_type",
    "display_field",
    "hierarchy_type",
    "depth_limit",
];
pub const FILTER_KEYS: &[&str] = &["type", "label", "options"];

const HEADER: &str = "# Generated by domainsmith. Entries ending in \"# CUSTOM\" are kept when this file is regenerated.";

/// Render a merged config.
///
/// # Panics
///
/// Panics when a region holds two entries with the same name; the merger
/// never produces such a config.
pub fn render(config: &CanonicalDomainConfig) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    section(&mut out, "[domain]");
    pair(&mut out, "name", &value::string(&config.name));
    pair(&mut out, "namespace", &value::string(&config.namespace));
    pair(&mut out, "source_table", &value::string(&config.source.table_name));
    pair(&mut out, "schema", &value::string(&config.source.schema_name));
    pair(
        &mut out,
        "default_selected",
        &value::string_array(&config.default_selected),
    );

    section(&mut out, "[source]");
    pair(&mut out, "table", &value::string(&config.source.table_name));
    pair(&mut out, "schema", &value::string(&config.source.schema_name));
    pair(
        &mut out,
        "primary_key",
        &value::string_array(&config.source.primary_key),
    );

    section(&mut out, &Region::Fields.header());
    ensure_unique(Region::Fields, config.source.fields.iter().map(|f| f.name.as_str()));
    for field in &config.source.fields {
        field_line(&mut out, field, &config.source.table_name);
    }

    section(&mut out, &Region::Associations.header());
    ensure_unique(
        Region::Associations,
        config.associations.iter().map(|a| a.name.as_str()),
    );
    for assoc in &config.associations {
        entry(&mut out, &assoc.name, &association_value(assoc), assoc.provenance);
    }

    section(&mut out, &Region::Joins.header());
    ensure_unique(Region::Joins, config.joins.iter().map(|j| j.name.as_str()));
    for join in &config.joins {
        entry(&mut out, &join.name, &join_value(join), join.provenance);
    }

    section(&mut out, &Region::Filters.header());
    ensure_unique(Region::Filters, config.filters.iter().map(|f| f.name.as_str()));
    for filter in &config.filters {
        filter_line(&mut out, filter);
    }

    section(&mut out, &Region::Metadata.header());
    ensure_unique(Region::Metadata, config.metadata.iter().map(|m| m.key.as_str()));
    for metadata in &config.metadata {
        metadata_line(&mut out, metadata);
    }

    for (name, schema) in &config.schemas {
        schema_sections(&mut out, name, schema);
    }

    out
}

fn section(out: &mut String, header: &str) {
    out.push('\n');
    out.push_str(header);
    out.push('\n');
}

fn pair(out: &mut String, key: &str, rendered: &str) {
    let _ = writeln!(out, "{} = {}", value::key(key), rendered);
}

/// One region entry, with the marker when the entry is preserved.
fn entry(out: &mut String, name: &str, rendered: &str, provenance: Provenance) {
    let _ = write!(out, "{} = {}", value::key(name), rendered);
    if provenance.is_preserved() {
        out.push(' ');
        out.push_str(MARKER_COMMENT);
    }
    out.push('\n');
}

fn field_line(out: &mut String, field: &FieldEntry, table: &str) {
    // Names are written as keys so a line break in one cannot end the comment.
    let name = value::key(&field.name);
    if field.orphaned {
        let _ = writeln!(
            out,
            "# WARNING: column {name} no longer exists in {}; customized definition kept",
            value::key(table)
        );
    } else if field.provenance == Provenance::PreservedWithConflict {
        let _ = writeln!(
            out,
            "# WARNING: type of {name} changed upstream; customized definition kept"
        );
    }
    entry(
        out,
        &field.name,
        &value::inline_table(&field.definition, FIELD_KEYS),
        field.provenance,
    );
}

fn filter_line(out: &mut String, filter: &FilterConfig) {
    entry(
        out,
        &filter.name,
        &value::inline_table(&filter.definition, FILTER_KEYS),
        filter.provenance,
    );
}

fn metadata_line(out: &mut String, metadata: &MetadataEntry) {
    entry(out, &metadata.key, &value::value(&metadata.value), metadata.provenance);
}

fn association_value(assoc: &AssociationDescriptor) -> String {
    let mut table = assoc.extra.clone();
    table.insert("target".to_string(), ConfigValue::String(assoc.target.clone()));
    table.insert(
        "owner_key".to_string(),
        ConfigValue::String(assoc.owner_key.clone()),
    );
    table.insert(
        "related_key".to_string(),
        ConfigValue::String(assoc.related_key.clone()),
    );
    table.insert(
        "join_type".to_string(),
        ConfigValue::String(assoc.join_type.as_str().to_string()),
    );
    value::inline_table(&table, ASSOCIATION_KEYS)
}

fn join_value(join: &JoinConfig) -> String {
    let mut table: ConfigTable = join.extra.clone();
    table.insert("label".to_string(), ConfigValue::String(join.label.clone()));
    table.insert(
        "join_type".to_string(),
        ConfigValue::String(join.join_type.as_str().to_string()),
    );
    if let Some(display_field) = &join.display_field {
        table.insert(
            "display_field".to_string(),
            ConfigValue::String(display_field.clone()),
        );
    }
    if let Some(hierarchy) = &join.hierarchy {
        table.insert(
            "hierarchy_type".to_string(),
            ConfigValue::String(hierarchy.hierarchy_type.clone()),
        );
        table.insert(
            "depth_limit".to_string(),
            ConfigValue::Integer(hierarchy.depth_limit),
        );
    }
    value::inline_table(&table, JOIN_KEYS)
}

fn schema_sections(out: &mut String, name: &str, schema: &SchemaSection) {
    let prefix = format!("schemas.{}", value::key(name));

    section(out, &format!("[{prefix}]"));
    pair(out, "table", &value::string(&schema.table_name));
    pair(out, "schema", &value::string(&schema.schema_name));
    pair(out, "primary_key", &value::string_array(&schema.primary_key));

    section(out, &format!("[{prefix}.columns]"));
    for field in &schema.fields {
        entry(
            out,
            &field.name,
            &value::inline_table(&field.definition, FIELD_KEYS),
            field.provenance,
        );
    }

    section(out, &format!("[{prefix}.associations]"));
    for assoc in &schema.associations {
        entry(out, &assoc.name, &association_value(assoc), assoc.provenance);
    }
}

fn ensure_unique<'a>(region: Region, names: impl Iterator<Item = &'a str>) {
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        assert!(
            seen.insert(name),
            "render invariant violated: duplicate entry {name:?} in {}",
            region.header()
        );
    }
}
