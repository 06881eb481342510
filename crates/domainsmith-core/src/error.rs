use thiserror::Error;

/// Failures raised while turning a schema source into a [`TableDescriptor`].
///
/// These are fatal for the table being generated but never for a batch.
///
/// [`TableDescriptor`]: crate::TableDescriptor
#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// The schema reference does not resolve to anything.
    #[error("schema not found: {0}")]
    SchemaNotFound(String),
    /// The reference resolves, but not to something exposing a schema.
    #[error("not a schema: {0}")]
    NotASchema(String),
    /// The catalog returned no columns for the table.
    #[error("table not found: {schema}.{table}")]
    TableNotFound { schema: String, table: String },
    /// Transport or query failure against the live connection.
    #[error("connection error: {0}")]
    Connection(String),
    /// The source produced a descriptor that violates its invariants.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    /// Introspection did not finish within the configured budget.
    #[error("introspection of {table} timed out after {seconds}s")]
    Timeout { table: String, seconds: u64 },
}

impl IntrospectionError {
    /// Whether the error means the table simply is not there.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            IntrospectionError::SchemaNotFound(_) | IntrospectionError::TableNotFound { .. }
        )
    }
}

/// Convenience alias for introspection results.
pub type Result<T> = std::result::Result<T, IntrospectionError>;
