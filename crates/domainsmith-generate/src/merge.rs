//! Combines a generated config with preserved customizations.
//!
//! Policy per category:
//! - fields: preserved definitions replace generated ones in place; preserved
//!   fields missing from the live schema are kept, flagged orphaned, and
//!   appended at the end
//! - filters: preserved values win on key collision; the rest are appended
//! - associations and joins: generated entries are never overwritten; a
//!   preserved entry with a colliding name is kept as `<name>_custom`. A
//!   preserved join follows the rename of the preserved association it
//!   shares a name with, and a preserved association without any join gets
//!   a default one derived from it
//! - metadata: preserved keys are appended; generated keys are never replaced

use std::collections::{BTreeMap, BTreeSet};

use domainsmith_core::{
    AssociationDescriptor, CanonicalDomainConfig, ConflictKind, FieldEntry, FilterConfig,
    JoinConfig, MergeConflict, MetadataEntry, Provenance,
};

use domainsmith_introspect::join_for;

use crate::extract::PreservedCustomizations;

/// Suffix given to preserved associations and joins whose name is generated.
pub const CUSTOM_SUFFIX: &str = "_custom";

pub fn merge(
    mut generated: CanonicalDomainConfig,
    preserved: PreservedCustomizations,
) -> CanonicalDomainConfig {
    if !preserved.has_customizations {
        return generated;
    }

    let mut conflicts = Vec::new();
    merge_fields(&mut generated, preserved.custom_fields, &mut conflicts);
    merge_filters(&mut generated, preserved.custom_filters);
    let renames = merge_associations(&mut generated, preserved.custom_associations, &mut conflicts);
    merge_joins(&mut generated, preserved.custom_joins, &renames, &mut conflicts);
    pair_custom_associations(&mut generated);
    merge_metadata(&mut generated, preserved.custom_metadata, &mut conflicts);

    for conflict in &conflicts {
        tracing::warn!(
            event = "merge_conflict",
            domain = %generated.source.table_name,
            kind = ?conflict.kind,
            name = %conflict.name,
            detail = %conflict.detail
        );
    }
    generated.conflicts.extend(conflicts);
    generated
}

fn merge_fields(
    config: &mut CanonicalDomainConfig,
    custom_fields: Vec<FieldEntry>,
    conflicts: &mut Vec<MergeConflict>,
) {
    let mut orphans = Vec::new();
    for mut custom in custom_fields {
        let Some(slot) = config
            .source
            .fields
            .iter_mut()
            .find(|field| field.name == custom.name)
        else {
            custom.orphaned = true;
            orphans.push(custom);
            continue;
        };

        custom.provenance = match (custom.type_tag(), slot.type_tag()) {
            (Some(kept), Some(live)) if kept != live => {
                conflicts.push(MergeConflict {
                    kind: ConflictKind::FieldType,
                    name: custom.name.clone(),
                    detail: format!("live type is {live}, customized type is {kept}"),
                });
                Provenance::PreservedWithConflict
            }
            _ => Provenance::Preserved,
        };
        *slot = custom;
    }
    config.source.fields.extend(orphans);
}

fn merge_filters(
    config: &mut CanonicalDomainConfig,
    custom_filters: Vec<FilterConfig>,
) {
    for mut custom in custom_filters {
        custom.provenance = Provenance::Preserved;
        match config
            .filters
            .iter_mut()
            .find(|filter| filter.name == custom.name)
        {
            Some(slot) => *slot = custom,
            None => config.filters.push(custom),
        }
    }
}

/// Returns the renames applied, original name to kept name.
fn merge_associations(
    config: &mut CanonicalDomainConfig,
    custom_associations: Vec<AssociationDescriptor>,
    conflicts: &mut Vec<MergeConflict>,
) -> BTreeMap<String, String> {
    let mut taken: BTreeSet<String> = config
        .associations
        .iter()
        .map(|assoc| assoc.name.clone())
        .collect();
    let mut renames = BTreeMap::new();

    for mut custom in custom_associations {
        if taken.contains(&custom.name) {
            let renamed = custom_name(&custom.name, &taken);
            conflicts.push(MergeConflict {
                kind: ConflictKind::Association,
                name: custom.name.clone(),
                detail: format!("kept beside the generated association as {renamed}"),
            });
            renames.insert(custom.name.clone(), renamed.clone());
            custom.name = renamed;
        }
        custom.is_custom = true;
        custom.provenance = Provenance::Preserved;
        taken.insert(custom.name.clone());
        config.associations.push(custom);
    }
    renames
}

fn merge_joins(
    config: &mut CanonicalDomainConfig,
    custom_joins: Vec<JoinConfig>,
    association_renames: &BTreeMap<String, String>,
    conflicts: &mut Vec<MergeConflict>,
) {
    let mut taken: BTreeSet<String> = config.joins.iter().map(|join| join.name.clone()).collect();

    for mut custom in custom_joins {
        let follows = association_renames
            .get(&custom.name)
            .filter(|renamed| !taken.contains(*renamed));
        if let Some(renamed) = follows {
            custom.name = renamed.clone();
        } else if taken.contains(&custom.name) {
            let renamed = custom_name(&custom.name, &taken);
            let detail = if config.association(&renamed).is_some() {
                format!("kept beside the generated join as {renamed}")
            } else {
                format!("kept beside the generated join as {renamed}, which names no association")
            };
            conflicts.push(MergeConflict {
                kind: ConflictKind::Join,
                name: custom.name.clone(),
                detail,
            });
            custom.name = renamed;
        }
        custom.provenance = Provenance::Preserved;
        taken.insert(custom.name.clone());
        config.joins.push(custom);
    }
}

/// Give every preserved association without a join a default, generated one.
fn pair_custom_associations(config: &mut CanonicalDomainConfig) {
    let missing: Vec<JoinConfig> = config
        .associations
        .iter()
        .filter(|assoc| assoc.provenance.is_preserved())
        .filter(|assoc| !config.joins.iter().any(|join| join.name == assoc.name))
        .map(|assoc| join_for(assoc, None))
        .collect();
    config.joins.extend(missing);
}

fn merge_metadata(
    config: &mut CanonicalDomainConfig,
    custom_metadata: Vec<MetadataEntry>,
    conflicts: &mut Vec<MergeConflict>,
) {
    for mut custom in custom_metadata {
        if config.metadata.iter().any(|entry| entry.key == custom.key) {
            conflicts.push(MergeConflict {
                kind: ConflictKind::Metadata,
                name: custom.key.clone(),
                detail: "generated metadata key is not user-editable; custom value dropped"
                    .to_string(),
            });
            continue;
        }
        custom.provenance = Provenance::Preserved;
        config.metadata.push(custom);
    }
}

fn custom_name(name: &str, taken: &BTreeSet<String>) -> String {
    let base = format!("{name}{CUSTOM_SUFFIX}");
    if !taken.contains(&base) {
        return base;
    }
    (2..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}
