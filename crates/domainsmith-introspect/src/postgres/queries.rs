use sqlx::{FromRow, PgPool};

use domainsmith_core::{IntrospectionError, Result};

fn connection_error(err: sqlx::Error) -> IntrospectionError {
    IntrospectionError::Connection(err.to_string())
}

#[derive(Debug, Clone, FromRow)]
pub struct RawColumn {
    pub column_name: String,
    pub data_type: String,
    pub udt_schema: String,
    pub udt_name: String,
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

pub async fn list_columns(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
    sqlx::query_as::<_, RawColumn>(
        r#"
        select
          c.column_name::text as column_name,
          c.data_type::text as data_type,
          c.udt_schema::text as udt_schema,
          c.udt_name::text as udt_name,
          c.is_nullable::text as is_nullable,
          c.column_default::text as column_default,
          c.character_maximum_length::int4 as character_maximum_length,
          c.numeric_precision::int4 as numeric_precision,
          c.numeric_scale::int4 as numeric_scale
        from information_schema.columns c
        where c.table_schema = $1
          and c.table_name = $2
        order by c.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(connection_error)
}

#[derive(Debug, Clone, FromRow)]
pub struct RawPrimaryKeyColumn {
    pub attname: String,
}

pub async fn list_primary_key(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<RawPrimaryKeyColumn>> {
    sqlx::query_as::<_, RawPrimaryKeyColumn>(
        r#"
        select att.attname::text as attname
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join unnest(con.conkey) with ordinality as ord(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = ord.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and con.contype = 'p'
        order by ord.ordinality
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(connection_error)
}

#[derive(Debug, Clone, FromRow)]
pub struct RawForeignKey {
    pub column_name: String,
    pub foreign_table_schema: String,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
    pub constraint_name: String,
}

pub async fn list_foreign_keys(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<RawForeignKey>> {
    sqlx::query_as::<_, RawForeignKey>(
        r#"
        select
          src_att.attname::text as column_name,
          ref_nsp.nspname::text as foreign_table_schema,
          ref_rel.relname::text as foreign_table_name,
          ref_att.attname::text as foreign_column_name,
          con.conname::text as constraint_name
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey, con.confkey) with ordinality as k(src_attnum, ref_attnum, ordinality) on true
        join pg_attribute src_att on src_att.attrelid = src_rel.oid and src_att.attnum = k.src_attnum
        join pg_attribute ref_att on ref_att.attrelid = ref_rel.oid and ref_att.attnum = k.ref_attnum
        where src_nsp.nspname = $1
          and src_rel.relname = $2
          and con.contype = 'f'
        order by con.conname, k.ordinality
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(connection_error)
}

#[derive(Debug, Clone, FromRow)]
pub struct RawEnumLabel {
    pub enumlabel: String,
}

pub async fn list_enum_labels(
    pool: &PgPool,
    type_schema: &str,
    type_name: &str,
) -> Result<Vec<RawEnumLabel>> {
    sqlx::query_as::<_, RawEnumLabel>(
        r#"
        select e.enumlabel::text as enumlabel
        from pg_enum e
        join pg_type t on t.oid = e.enumtypid
        join pg_namespace n on n.oid = t.typnamespace
        where n.nspname = $1
          and t.typname = $2
        order by e.enumsortorder
        "#,
    )
    .bind(type_schema)
    .bind(type_name)
    .fetch_all(pool)
    .await
    .map_err(connection_error)
}

pub async fn list_base_tables(pool: &PgPool, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select t.table_name::text
        from information_schema.tables t
        where t.table_schema = $1
          and t.table_type = 'BASE TABLE'
        order by t.table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(connection_error)
}
