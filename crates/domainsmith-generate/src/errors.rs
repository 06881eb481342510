use thiserror::Error;

use domainsmith_core::IntrospectionError;

/// Why a prior artifact could not be read for customizations.
///
/// Never escapes [`crate::extract::extract`]; it is logged and degrades to
/// empty customizations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("existing artifact is malformed: {0}")]
    MalformedExistingArtifact(String),
}

/// Failure of one table's pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
    #[error("artifact store error for {file}: {source}")]
    Store {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("table task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
