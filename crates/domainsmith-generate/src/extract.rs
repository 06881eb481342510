//! Recovers user customizations from a previously rendered artifact.
//!
//! Detection is line-granular: inside a known region, a line whose trailing
//! comment carries [`MARKER`] is user-authored. Each such line is parsed on
//! its own as a one-key TOML document, so the preserved value keeps its
//! structure. The document as a whole must still be valid TOML; otherwise
//! nothing is preserved and regeneration proceeds as if no file existed.

use domainsmith_core::{
    AssociationDescriptor, ConfigTable, ConfigValue, FieldEntry, FilterConfig, HierarchyConfig,
    JoinConfig, JoinType, MetadataEntry, Provenance, humanize,
};

use crate::errors::ExtractionError;
use crate::region::{MARKER, Region, is_marked, split_comment};

/// Customizations found in a prior artifact, in order of appearance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreservedCustomizations {
    pub custom_fields: Vec<FieldEntry>,
    pub custom_filters: Vec<FilterConfig>,
    pub custom_associations: Vec<AssociationDescriptor>,
    pub custom_joins: Vec<JoinConfig>,
    pub custom_metadata: Vec<MetadataEntry>,
    pub has_customizations: bool,
}

impl PreservedCustomizations {
    /// Nothing preserved; the first-generation base case.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn custom_field(&self, name: &str) -> Option<&FieldEntry> {
        self.custom_fields.iter().find(|field| field.name == name)
    }

    pub fn custom_filter(&self, name: &str) -> Option<&FilterConfig> {
        self.custom_filters.iter().find(|filter| filter.name == name)
    }

    /// Total number of preserved entries across regions.
    pub fn len(&self) -> usize {
        self.custom_fields.len()
            + self.custom_filters.len()
            + self.custom_associations.len()
            + self.custom_joins.len()
            + self.custom_metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extract customizations from an artifact's text, if there is one.
///
/// Never fails: a malformed artifact is logged and yields no customizations.
pub fn extract(existing: Option<&str>) -> PreservedCustomizations {
    let Some(text) = existing else {
        return PreservedCustomizations::empty();
    };

    match try_extract(text) {
        Ok(preserved) => {
            tracing::debug!(
                event = "customizations_extracted",
                fields = preserved.custom_fields.len(),
                filters = preserved.custom_filters.len(),
                associations = preserved.custom_associations.len(),
                joins = preserved.custom_joins.len(),
                metadata = preserved.custom_metadata.len()
            );
            preserved
        }
        Err(err) => {
            tracing::warn!(event = "artifact_malformed", error = %err);
            PreservedCustomizations::empty()
        }
    }
}

fn try_extract(text: &str) -> Result<PreservedCustomizations, ExtractionError> {
    text.parse::<ConfigTable>()
        .map_err(|err| ExtractionError::MalformedExistingArtifact(err.to_string()))?;

    let mut preserved = PreservedCustomizations::empty();
    let mut current: Option<Region> = None;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let (code, _) = split_comment(line);
        let code = code.trim();

        if code.starts_with('[') {
            current = if code.starts_with("[[") {
                None
            } else {
                header_path(code).and_then(|path| Region::from_path(&path))
            };
            continue;
        }

        if code.is_empty() || !is_marked(line) {
            continue;
        }

        let Some(region) = current else {
            tracing::warn!(
                event = "custom_entry_outside_region",
                line = line_number,
                marker = MARKER
            );
            continue;
        };

        let Some((name, value)) = parse_entry(code) else {
            tracing::warn!(
                event = "custom_entry_skipped",
                line = line_number,
                reason = "line is not a single key/value pair"
            );
            continue;
        };

        if let Err(reason) = collect(&mut preserved, region, name, value) {
            tracing::warn!(event = "custom_entry_skipped", line = line_number, reason = %reason);
        }
    }

    preserved.has_customizations = !preserved.is_empty();
    Ok(preserved)
}

/// Dotted path of a `[a.b.c]` header, honouring quoted keys.
fn header_path(header: &str) -> Option<Vec<String>> {
    let mut table: ConfigTable = header.parse().ok()?;
    let mut path = Vec::new();
    loop {
        let mut entries = table.into_iter();
        let (name, value) = entries.next()?;
        path.push(name);
        match value {
            ConfigValue::Table(inner) if !inner.is_empty() => table = inner,
            ConfigValue::Table(_) => return Some(path),
            _ => return None,
        }
    }
}

fn parse_entry(code: &str) -> Option<(String, ConfigValue)> {
    let table: ConfigTable = code.parse().ok()?;
    if table.len() != 1 {
        return None;
    }
    table.into_iter().next()
}

fn collect(
    preserved: &mut PreservedCustomizations,
    region: Region,
    name: String,
    value: ConfigValue,
) -> Result<(), String> {
    match region {
        Region::Fields => {
            let definition = into_table(value, "field")?;
            preserved.custom_fields.push(FieldEntry {
                name,
                definition,
                provenance: Provenance::Preserved,
                orphaned: false,
            });
        }
        Region::Filters => {
            let definition = into_table(value, "filter")?;
            preserved.custom_filters.push(FilterConfig {
                name,
                definition,
                provenance: Provenance::Preserved,
            });
        }
        Region::Associations => {
            let table = into_table(value, "association")?;
            preserved.custom_associations.push(association(name, table)?);
        }
        Region::Joins => {
            let table = into_table(value, "join")?;
            preserved.custom_joins.push(join(name, table)?);
        }
        Region::Metadata => {
            preserved.custom_metadata.push(MetadataEntry {
                key: name,
                value,
                provenance: Provenance::Preserved,
            });
        }
    }
    Ok(())
}

fn into_table(value: ConfigValue, what: &str) -> Result<ConfigTable, String> {
    match value {
        ConfigValue::Table(table) => Ok(table),
        other => Err(format!("{what} must be an inline table, found {}", other.type_str())),
    }
}

fn take_string(table: &mut ConfigTable, key: &str) -> Result<Option<String>, String> {
    match table.remove(key) {
        None => Ok(None),
        Some(ConfigValue::String(text)) => Ok(Some(text)),
        Some(other) => Err(format!("`{key}` must be a string, found {}", other.type_str())),
    }
}

fn require_string(table: &mut ConfigTable, key: &str) -> Result<String, String> {
    take_string(table, key)?.ok_or_else(|| format!("missing `{key}`"))
}

fn take_join_type(table: &mut ConfigTable) -> Result<JoinType, String> {
    match take_string(table, "join_type")? {
        Some(text) => text.parse(),
        None => Ok(JoinType::Left),
    }
}

fn association(name: String, mut table: ConfigTable) -> Result<AssociationDescriptor, String> {
    let target = require_string(&mut table, "target")?;
    let owner_key = require_string(&mut table, "owner_key")?;
    let related_key = require_string(&mut table, "related_key")?;
    let join_type = take_join_type(&mut table)?;

    Ok(AssociationDescriptor {
        name,
        target,
        owner_key,
        related_key,
        join_type,
        is_custom: true,
        provenance: Provenance::Preserved,
        extra: table,
    })
}

fn join(name: String, mut table: ConfigTable) -> Result<JoinConfig, String> {
    let label = take_string(&mut table, "label")?.unwrap_or_else(|| humanize(&name));
    let join_type = take_join_type(&mut table)?;
    let display_field = take_string(&mut table, "display_field")?;
    let hierarchy = match take_string(&mut table, "hierarchy_type")? {
        Some(hierarchy_type) => {
            let depth_limit = match table.remove("depth_limit") {
                None => HierarchyConfig::adjacency_list().depth_limit,
                Some(ConfigValue::Integer(limit)) => limit,
                Some(other) => {
                    return Err(format!(
                        "`depth_limit` must be an integer, found {}",
                        other.type_str()
                    ));
                }
            };
            Some(HierarchyConfig {
                hierarchy_type,
                depth_limit,
            })
        }
        None => None,
    };

    Ok(JoinConfig {
        name,
        label,
        join_type,
        display_field,
        hierarchy,
        provenance: Provenance::Preserved,
        extra: table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIOR: &str = r#"# Generated by domainsmith.

[domain]
name = "Orders"
owner = "sales" # CUSTOM

[source.columns]
id = { type = "integer", source_type = "integer", nullable = false }
total = { type = "decimal", source_type = "numeric", nullable = true, precision = 2 } # CUSTOM
legacy_code = { type = "string" } # CUSTOM

[associations]
customer = { target = "customers", owner_key = "customer_id", related_key = "id", join_type = "left" }
referrer = { target = "customers", owner_key = "referrer_id", related_key = "id", join_type = "inner", note = "kept" } # CUSTOM

[joins]
referrer = { label = "Referred by", join_type = "hierarchical", hierarchy_type = "adjacency_list", depth_limit = 3 } # CUSTOM

[filters]
placed_at = { type = "date_range" }
vip = { type = "boolean", label = "VIP # only" } # CUSTOM

[metadata]
generator = "domainsmith"
owner_team = "sales" # CUSTOM
"#;

    #[test]
    fn absent_artifact_is_the_empty_base_case() {
        let preserved = extract(None);
        assert!(!preserved.has_customizations);
        assert!(preserved.is_empty());
    }

    #[test]
    fn collects_only_marked_entries_per_region() {
        let preserved = extract(Some(PRIOR));
        assert!(preserved.has_customizations);

        let fields: Vec<&str> = preserved
            .custom_fields
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(fields, vec!["total", "legacy_code"]);
        assert_eq!(
            preserved
                .custom_field("total")
                .and_then(|field| field.definition.get("precision")),
            Some(&ConfigValue::Integer(2))
        );

        assert_eq!(preserved.custom_filters.len(), 1);
        let vip = preserved.custom_filter("vip").expect("vip filter");
        assert_eq!(
            vip.definition.get("label").and_then(ConfigValue::as_str),
            Some("VIP # only")
        );

        assert_eq!(preserved.custom_metadata.len(), 1);
        assert_eq!(preserved.custom_metadata[0].key, "owner_team");
    }

    #[test]
    fn associations_and_joins_become_structured() {
        let preserved = extract(Some(PRIOR));

        let referrer = &preserved.custom_associations[0];
        assert_eq!(referrer.owner_key, "referrer_id");
        assert_eq!(referrer.join_type, JoinType::Inner);
        assert!(referrer.is_custom);
        assert_eq!(
            referrer.extra.get("note").and_then(ConfigValue::as_str),
            Some("kept")
        );

        let join = &preserved.custom_joins[0];
        assert_eq!(join.label, "Referred by");
        assert_eq!(join.join_type, JoinType::Hierarchical);
        assert_eq!(
            join.hierarchy,
            Some(HierarchyConfig {
                hierarchy_type: "adjacency_list".to_string(),
                depth_limit: 3,
            })
        );
        assert!(join.extra.is_empty());
    }

    #[test]
    fn one_marked_filter_among_many_generated() {
        let mut text = String::from("[filters]\n");
        for index in 0..10 {
            text.push_str(&format!("generated_{index} = {{ type = \"boolean\" }}\n"));
        }
        text.push_str("vip = { type = \"boolean\" } # CUSTOM\n");

        let preserved = extract(Some(&text));
        assert_eq!(preserved.custom_filters.len(), 1);
        assert_eq!(preserved.custom_filters[0].name, "vip");
    }

    #[test]
    fn malformed_artifact_degrades_to_empty() {
        let preserved = extract(Some("[filters\nvip = { type = \"boolean\" } # CUSTOM\n"));
        assert!(!preserved.has_customizations);
        assert!(preserved.is_empty());
    }

    #[test]
    fn unusable_marked_lines_are_skipped() {
        let text = r#"
[source.columns]
weird = "not a table" # CUSTOM
fine = { type = "string" } # CUSTOM

[associations]
broken = { target = "customers" } # CUSTOM
bad_join = { target = "x", owner_key = "x_id", related_key = "id", join_type = "outer" } # CUSTOM
"#;
        let preserved = extract(Some(text));
        assert_eq!(preserved.custom_fields.len(), 1);
        assert_eq!(preserved.custom_fields[0].name, "fine");
        assert!(preserved.custom_associations.is_empty());
    }

    #[test]
    fn quoted_headers_and_keys_are_understood() {
        let text = r#"
["source"."columns"]
"line items" = { type = "string" } # CUSTOM

[schemas.customers.columns]
nickname = { type = "string" } # CUSTOM
"#;
        let preserved = extract(Some(text));
        let names: Vec<&str> = preserved
            .custom_fields
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(names, vec!["line items"]);
    }
}
