//! Introspection of in-memory object schemas.
//!
//! An [`ObjectModel`] is a registry of named references. A reference either
//! resolves to an [`ObjectSchema`] (fields, field types, primary key and
//! declared relationships) or to some other kind of object that exposes no
//! schema at all. No I/O happens during introspection.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use domainsmith_core::{
    CanonicalType, ColumnDescriptor, DEFAULT_SCHEMA, ForeignKeyDescriptor, IntrospectionError,
    Result, TableDescriptor, TableRef, map_type, validate_descriptor,
};

use crate::introspector::SchemaIntrospector;

/// Errors raised while loading an object model file.
#[derive(Debug, Error)]
pub enum ObjectModelError {
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("invalid model {reference}: {message}")]
    Invalid { reference: String, message: String },
}

/// Field declared by an object schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub max_length: Option<i32>,
    #[serde(default)]
    pub enum_values: Option<Vec<String>>,
}

impl ObjectField {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            nullable: None,
            default: None,
            max_length: None,
            enum_values: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }
}

/// Relationship kinds an object schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    #[default]
    BelongsTo,
    HasMany,
    HasOne,
}

/// Relationship declared by an object schema.
///
/// Only `belongs_to` relationships own the foreign key column and therefore
/// become foreign-key facts; the others are ignored by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectAssociation {
    pub name: String,
    #[serde(default)]
    pub kind: RelationshipKind,
    pub owner_key: String,
    pub related_table: String,
    #[serde(default = "default_related_key")]
    pub related_key: String,
}

fn default_related_key() -> String {
    "id".to_string()
}

impl ObjectAssociation {
    pub fn belongs_to(
        name: impl Into<String>,
        owner_key: impl Into<String>,
        related_table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationshipKind::BelongsTo,
            owner_key: owner_key.into(),
            related_table: related_table.into(),
            related_key: default_related_key(),
        }
    }
}

/// Object-relational schema description for one table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectSchema {
    /// Backing table name.
    pub source: String,
    /// Schema the table lives in; `public` when absent.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub fields: Vec<ObjectField>,
    #[serde(default)]
    pub associations: Vec<ObjectAssociation>,
}

impl ObjectSchema {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            prefix: None,
            primary_key: Vec::new(),
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(mut self, field: ObjectField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn association(mut self, association: ObjectAssociation) -> Self {
        self.associations.push(association);
        self
    }

    pub fn schema_name(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    /// Field names in declaration order.
    pub fn fields(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    /// Declared type of a field, if the field exists and declares one.
    pub fn field_type(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|candidate| candidate.name == field)
            .and_then(|candidate| candidate.type_name.as_deref())
    }

    fn to_descriptor(&self) -> Result<TableDescriptor> {
        let columns = self
            .fields
            .iter()
            .map(|field| {
                let in_primary_key = self.primary_key.iter().any(|pk| pk == &field.name);
                let (source_type, canonical_type) = match field.type_name.as_deref() {
                    Some(type_name) => (type_name.to_string(), map_type(type_name)),
                    None => ("unknown".to_string(), CanonicalType::Unknown),
                };
                ColumnDescriptor {
                    name: field.name.clone(),
                    source_type,
                    canonical_type,
                    nullable: field.nullable.unwrap_or(!in_primary_key),
                    default: field.default.clone(),
                    max_length: field.max_length,
                    enum_values: field.enum_values.clone(),
                }
            })
            .collect();

        let foreign_keys = self
            .associations
            .iter()
            .filter(|assoc| assoc.kind == RelationshipKind::BelongsTo)
            .map(|assoc| ForeignKeyDescriptor {
                local_column: assoc.owner_key.clone(),
                target_table: assoc.related_table.clone(),
                target_column: assoc.related_key.clone(),
                constraint_name: format!("{}_{}_fkey", self.source, assoc.owner_key),
                target_schema: None,
            })
            .collect();

        let descriptor = TableDescriptor {
            table_name: self.source.clone(),
            schema_name: self.schema_name().to_string(),
            primary_key: self.primary_key.clone(),
            columns,
            foreign_keys,
        }
        .normalize();

        validate_descriptor(&descriptor)?;
        Ok(descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ObjectEntry {
    Schema(ObjectSchema),
    Opaque { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawModelFile {
    #[serde(default)]
    models: BTreeMap<String, RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(flatten)]
    rest: toml::Table,
}

fn default_kind() -> String {
    "schema".to_string()
}

/// Registry of object references, loaded from a file or built in code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectModel {
    entries: BTreeMap<String, ObjectEntry>,
}

impl ObjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a model file with `[models.<Reference>]` tables.
    pub fn from_toml_str(input: &str) -> std::result::Result<Self, ObjectModelError> {
        let raw: RawModelFile = toml::from_str(input)?;
        let mut model = Self::new();

        for (reference, entry) in raw.models {
            if entry.kind != "schema" {
                model = model.with_opaque(reference, entry.kind);
                continue;
            }
            let schema: ObjectSchema = toml::Value::Table(entry.rest)
                .try_into()
                .map_err(|err: toml::de::Error| ObjectModelError::Invalid {
                    reference: reference.clone(),
                    message: err.to_string(),
                })?;
            model = model.with_schema(reference, schema);
        }

        Ok(model)
    }

    pub fn with_schema(mut self, reference: impl Into<String>, schema: ObjectSchema) -> Self {
        self.entries.insert(reference.into(), ObjectEntry::Schema(schema));
        self
    }

    /// Register a reference that resolves to something without a schema.
    pub fn with_opaque(mut self, reference: impl Into<String>, kind: impl Into<String>) -> Self {
        self.entries
            .insert(reference.into(), ObjectEntry::Opaque { kind: kind.into() });
        self
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn schema_by_reference(&self, reference: &str) -> Option<Result<&ObjectSchema>> {
        self.entries.get(reference).map(|entry| match entry {
            ObjectEntry::Schema(schema) => Ok(schema),
            ObjectEntry::Opaque { kind } => Err(IntrospectionError::NotASchema(format!(
                "{reference} is a {kind}, not a schema"
            ))),
        })
    }

    fn schema_by_table(&self, table: &TableRef) -> Option<&ObjectSchema> {
        self.entries.values().find_map(|entry| match entry {
            ObjectEntry::Schema(schema)
                if schema.source == table.table_name
                    && schema.schema_name() == table.schema_name =>
            {
                Some(schema)
            }
            _ => None,
        })
    }
}

/// Introspector over an [`ObjectModel`].
#[derive(Debug, Clone, Default)]
pub struct ObjectSchemaIntrospector {
    model: ObjectModel,
}

impl ObjectSchemaIntrospector {
    pub fn new(model: ObjectModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ObjectModel {
        &self.model
    }

    /// Introspect a schema by its reference name.
    pub fn introspect_reference(&self, reference: &str) -> Result<TableDescriptor> {
        match self.model.schema_by_reference(reference) {
            Some(schema) => schema?.to_descriptor(),
            None => Err(IntrospectionError::SchemaNotFound(reference.to_string())),
        }
    }

    /// Resolve either a reference name or a table name to a descriptor.
    fn resolve(&self, table: &TableRef) -> Result<TableDescriptor> {
        if let Some(schema) = self.model.schema_by_reference(&table.table_name) {
            return schema?.to_descriptor();
        }
        match self.model.schema_by_table(table) {
            Some(schema) => schema.to_descriptor(),
            None => Err(IntrospectionError::SchemaNotFound(table.to_string())),
        }
    }
}

#[async_trait]
impl SchemaIntrospector for ObjectSchemaIntrospector {
    fn source_kind(&self) -> &'static str {
        "object_schema"
    }

    async fn introspect(&self, table: &TableRef) -> Result<TableDescriptor> {
        let descriptor = self.resolve(table)?;
        tracing::debug!(
            event = "table_introspected",
            source = "object_schema",
            table = %descriptor.table_ref(),
            columns = descriptor.columns.len()
        );
        Ok(descriptor)
    }

    async fn list_tables(&self, schema_name: &str) -> Result<Vec<String>> {
        let mut tables: Vec<String> = self
            .model
            .entries
            .values()
            .filter_map(|entry| match entry {
                ObjectEntry::Schema(schema) if schema.schema_name() == schema_name => {
                    Some(schema.source.clone())
                }
                _ => None,
            })
            .collect();
        tables.sort();
        tables.dedup();
        Ok(tables)
    }
}
