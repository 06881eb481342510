//! Domain config generation: build, extract, merge and render.
//!
//! The pipeline turns a table descriptor and its relationships into a
//! canonical config, folds in the customizations found in the previously
//! rendered artifact, and renders the result so a later run can recover the
//! same customizations again.

pub mod builder;
pub mod errors;
pub mod extract;
pub mod merge;
pub mod options;
pub mod pipeline;
pub mod region;
pub mod render;

pub use builder::{BuildContext, build_config, default_selected, suggested_filters};
pub use errors::{ExtractionError, PipelineError, Result};
pub use extract::{PreservedCustomizations, extract};
pub use merge::merge;
pub use options::{DEFAULT_APP_NAME, GenerateOptions, RenderSettings};
pub use pipeline::{
    ArtifactStore, BatchReport, DomainGenerator, GeneratedDomain, MemoryStore, TableOutcome,
    TableStatus, artifact_file_name,
};
pub use region::{MARKER, Region};
pub use render::render;
