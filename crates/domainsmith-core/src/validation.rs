use std::collections::BTreeSet;

use crate::error::{IntrospectionError, Result};
use crate::schema::TableDescriptor;

/// Validate internal consistency of a table descriptor.
///
/// This checks:
/// - the table has at least one column
/// - column names are unique
/// - primary key columns exist
/// - foreign key local columns exist
pub fn validate_descriptor(descriptor: &TableDescriptor) -> Result<()> {
    let qualified = format!("{}.{}", descriptor.schema_name, descriptor.table_name);

    if descriptor.columns.is_empty() {
        return Err(IntrospectionError::InvalidDescriptor(format!(
            "table has no columns: {qualified}"
        )));
    }

    let mut columns = BTreeSet::new();
    for column in &descriptor.columns {
        if !columns.insert(column.name.as_str()) {
            return Err(IntrospectionError::InvalidDescriptor(format!(
                "duplicate column name: {qualified}.{}",
                column.name
            )));
        }
    }

    for column in &descriptor.primary_key {
        if !columns.contains(column.as_str()) {
            return Err(IntrospectionError::InvalidDescriptor(format!(
                "primary key column not found: {qualified}.{column}"
            )));
        }
    }

    for fk in &descriptor.foreign_keys {
        if !columns.contains(fk.local_column.as_str()) {
            return Err(IntrospectionError::InvalidDescriptor(format!(
                "foreign key column not found: {qualified}.{} ({})",
                fk.local_column, fk.constraint_name
            )));
        }
    }

    Ok(())
}
