mod atomic;
mod settings;
mod store;

pub use atomic::{write_bytes_atomic, write_json_atomic};
pub use settings::{
    APP_NAME_ENV, ProjectSettings, load_settings, parse_join_overrides, resolve_app_name,
};
pub use store::DirectoryStore;

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
