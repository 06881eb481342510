use std::collections::BTreeMap;
use std::time::Duration;

use domainsmith_core::JoinType;
use domainsmith_introspect::ResolveOptions;

/// Application name used when nothing else configures one.
pub const DEFAULT_APP_NAME: &str = "app";

/// Naming inputs for rendered artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub app_name: String,
}

impl RenderSettings {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Namespace of the domain generated for `table`.
    pub fn namespace(&self, table: &str) -> String {
        format!("{}.domains.{table}", self.app_name)
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::new(DEFAULT_APP_NAME)
    }
}

/// Options for one generation run, shared by every table in a batch.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub expansion_depth: usize,
    pub join_overrides: BTreeMap<String, JoinType>,
    /// Budget for introspecting one table and resolving its relationships.
    pub introspect_timeout: Option<Duration>,
    pub render: RenderSettings,
}

impl GenerateOptions {
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            expansion_depth: self.expansion_depth,
            join_overrides: self.join_overrides.clone(),
        }
    }
}
