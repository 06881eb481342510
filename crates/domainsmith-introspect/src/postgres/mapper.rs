use std::collections::BTreeSet;

use domainsmith_core::{
    CanonicalType, ColumnDescriptor, ForeignKeyDescriptor, IntrospectionError, Result,
    TableDescriptor, TableRef, map_type, validate_descriptor,
};

use super::queries::{RawColumn, RawForeignKey, RawPrimaryKeyColumn};

const USER_DEFINED: &str = "USER-DEFINED";
const ARRAY: &str = "ARRAY";

/// Whether a column's type is user-defined and may carry enum labels.
pub fn is_user_defined(raw: &RawColumn) -> bool {
    raw.data_type == USER_DEFINED
}

/// Map a catalog column row, with enum labels when the type is an enum.
pub fn map_column(raw: RawColumn, enum_labels: Option<Vec<String>>) -> ColumnDescriptor {
    let source_type = match raw.data_type.as_str() {
        USER_DEFINED | ARRAY => raw.udt_name.clone(),
        "numeric" => match (raw.numeric_precision, raw.numeric_scale) {
            (Some(precision), Some(scale)) => format!("numeric({precision},{scale})"),
            _ => raw.data_type.clone(),
        },
        _ => raw.data_type.clone(),
    };

    let enum_values = enum_labels.filter(|labels| !labels.is_empty());
    let canonical_type = if enum_values.is_some() {
        CanonicalType::String
    } else {
        map_type(&source_type)
    };

    ColumnDescriptor {
        name: raw.column_name,
        source_type,
        canonical_type,
        nullable: raw.is_nullable.eq_ignore_ascii_case("YES"),
        default: raw.column_default,
        max_length: raw.character_maximum_length,
        enum_values,
    }
}

pub fn map_primary_key(raw: Vec<RawPrimaryKeyColumn>) -> Vec<String> {
    raw.into_iter().map(|row| row.attname).collect()
}

/// Map foreign key rows; the target schema is kept only when it is not the table's own.
pub fn map_foreign_keys(table: &TableRef, raw: Vec<RawForeignKey>) -> Vec<ForeignKeyDescriptor> {
    raw.into_iter()
        .map(|row| {
            let target_schema = (row.foreign_table_schema != table.schema_name)
                .then_some(row.foreign_table_schema);
            if let Some(schema) = &target_schema {
                tracing::debug!(
                    event = "cross_schema_foreign_key",
                    table = %table,
                    constraint = %row.constraint_name,
                    target_schema = %schema
                );
            }
            ForeignKeyDescriptor {
                local_column: row.column_name,
                target_table: row.foreign_table_name,
                target_column: row.foreign_column_name,
                constraint_name: row.constraint_name,
                target_schema,
            }
        })
        .collect()
}

/// Assemble and validate a descriptor from mapped catalog rows.
pub fn build_descriptor(
    table: &TableRef,
    columns: Vec<ColumnDescriptor>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKeyDescriptor>,
) -> Result<TableDescriptor> {
    if columns.is_empty() {
        return Err(IntrospectionError::TableNotFound {
            schema: table.schema_name.clone(),
            table: table.table_name.clone(),
        });
    }

    let descriptor = TableDescriptor {
        table_name: table.table_name.clone(),
        schema_name: table.schema_name.clone(),
        primary_key,
        columns,
        foreign_keys,
    }
    .normalize();

    validate_descriptor(&descriptor)?;
    Ok(descriptor)
}

/// Distinct `(schema, type)` pairs of user-defined columns, for on-demand enum lookups.
pub fn enum_candidates(columns: &[RawColumn]) -> BTreeSet<(String, String)> {
    columns
        .iter()
        .filter(|raw| is_user_defined(raw))
        .map(|raw| (raw.udt_schema.clone(), raw.udt_name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_column(name: &str, data_type: &str, udt_name: &str, nullable: bool) -> RawColumn {
        RawColumn {
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            udt_schema: "pg_catalog".to_string(),
            udt_name: udt_name.to_string(),
            is_nullable: if nullable { "YES" } else { "NO" }.to_string(),
            column_default: None,
            character_maximum_length: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    #[test]
    fn maps_plain_columns() {
        let mut raw = raw_column("email", "character varying", "varchar", true);
        raw.character_maximum_length = Some(255);
        let column = map_column(raw, None);
        assert_eq!(column.source_type, "character varying");
        assert_eq!(column.canonical_type, CanonicalType::String);
        assert_eq!(column.max_length, Some(255));
        assert!(column.nullable);
    }

    #[test]
    fn maps_numeric_with_precision() {
        let mut raw = raw_column("total", "numeric", "numeric", false);
        raw.numeric_precision = Some(10);
        raw.numeric_scale = Some(2);
        let column = map_column(raw, None);
        assert_eq!(column.source_type, "numeric(10,2)");
        assert_eq!(column.canonical_type, CanonicalType::Decimal);
        assert!(!column.nullable);
    }

    #[test]
    fn maps_enum_columns_to_string_with_labels() {
        let mut raw = raw_column("status", "USER-DEFINED", "order_status", false);
        raw.udt_schema = "public".to_string();
        assert!(is_user_defined(&raw));
        let column = map_column(raw, Some(vec!["pending".to_string(), "paid".to_string()]));
        assert_eq!(column.source_type, "order_status");
        assert_eq!(column.canonical_type, CanonicalType::String);
        assert_eq!(column.enum_values.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn user_defined_without_labels_uses_udt_name() {
        let raw = raw_column("doc", "USER-DEFINED", "hstore", true);
        let column = map_column(raw, Some(Vec::new()));
        assert_eq!(column.canonical_type, CanonicalType::Map);
        assert_eq!(column.enum_values, None);
    }

    #[test]
    fn zero_columns_is_table_not_found() {
        let table = TableRef::public("ghosts");
        let err = build_descriptor(&table, Vec::new(), Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, IntrospectionError::TableNotFound { .. }));
    }

    #[test]
    fn keeps_the_target_schema_of_cross_schema_keys() {
        let table = TableRef::new("sales", "orders");
        let row = |column: &str, schema: &str, target: &str| RawForeignKey {
            column_name: column.to_string(),
            foreign_table_schema: schema.to_string(),
            foreign_table_name: target.to_string(),
            foreign_column_name: "id".to_string(),
            constraint_name: format!("orders_{column}_fkey"),
        };

        let fks = map_foreign_keys(
            &table,
            vec![
                row("customer_id", "public", "customers"),
                row("region_id", "sales", "regions"),
            ],
        );
        assert_eq!(fks[0].target_schema.as_deref(), Some("public"));
        assert_eq!(fks[1].target_schema, None);

        let descriptor = TableDescriptor {
            table_name: "orders".to_string(),
            schema_name: "sales".to_string(),
            primary_key: Vec::new(),
            columns: Vec::new(),
            foreign_keys: fks,
        };
        assert_eq!(
            descriptor.foreign_key_target(&descriptor.foreign_keys[0]),
            TableRef::new("public", "customers")
        );
        assert_eq!(
            descriptor.foreign_key_target(&descriptor.foreign_keys[1]),
            TableRef::new("sales", "regions")
        );
    }

    #[test]
    fn collects_enum_candidates_once() {
        let mut first = raw_column("status", "USER-DEFINED", "order_status", false);
        first.udt_schema = "public".to_string();
        let second = RawColumn {
            column_name: "previous_status".to_string(),
            ..first.clone()
        };
        let candidates = enum_candidates(&[first, second, raw_column("id", "integer", "int4", false)]);
        assert_eq!(candidates.len(), 1);
    }
}
