use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use domainsmith_core::JoinType;
use domainsmith_generate::DEFAULT_APP_NAME;

use super::{WorkspaceError, WorkspaceResult};

/// Settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = "domainsmith.toml";
/// Environment fallback for the application name.
pub const APP_NAME_ENV: &str = "DOMAINSMITH_APP_NAME";

/// Project-level defaults; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectSettings {
    pub app_name: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub schema: Option<String>,
    pub expansion_depth: Option<usize>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    /// Join type per association name.
    pub joins: BTreeMap<String, String>,
}

/// Load settings from `explicit`, or from [`SETTINGS_FILE`] in `cwd` when present.
pub fn load_settings(explicit: Option<&Path>, cwd: &Path) -> WorkspaceResult<ProjectSettings> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = cwd.join(SETTINGS_FILE);
            if !candidate.exists() {
                return Ok(ProjectSettings::default());
            }
            candidate
        }
    };

    let content = std::fs::read_to_string(&path)?;
    let settings: ProjectSettings = toml::from_str(&content)?;
    tracing::debug!(event = "settings_loaded", path = %path.display());
    Ok(settings)
}

/// Flag, then settings file, then environment, then [`DEFAULT_APP_NAME`].
pub fn resolve_app_name(
    flag: Option<&str>,
    settings: &ProjectSettings,
    env_value: Option<String>,
) -> String {
    flag.map(str::to_string)
        .or_else(|| settings.app_name.clone())
        .or(env_value)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_APP_NAME.to_string())
}

/// Merge `[joins]` from settings with `name=type` flags; flags win.
pub fn parse_join_overrides(
    settings: &ProjectSettings,
    flags: &[String],
) -> WorkspaceResult<BTreeMap<String, JoinType>> {
    let mut overrides = BTreeMap::new();
    for (name, join_type) in &settings.joins {
        overrides.insert(name.clone(), parse_join_type(name, join_type)?);
    }
    for flag in flags {
        let (name, join_type) = flag.split_once('=').ok_or_else(|| {
            WorkspaceError::Invalid(format!("join override must be name=type, got {flag}"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkspaceError::Invalid(format!(
                "join override has no association name: {flag}"
            )));
        }
        overrides.insert(name.to_string(), parse_join_type(name, join_type)?);
    }
    Ok(overrides)
}

fn parse_join_type(name: &str, value: &str) -> WorkspaceResult<JoinType> {
    value
        .parse()
        .map_err(|err: String| WorkspaceError::Invalid(format!("join {name}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(None, dir.path()).expect("settings");
        assert_eq!(settings, ProjectSettings::default());
    }

    #[test]
    fn reads_settings_from_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"
app_name = "storefront"
out_dir = "domains"
expansion_depth = 1
concurrency = 8

[joins]
customer = "dimension"
"#,
        )
        .expect("write settings");

        let settings = load_settings(None, dir.path()).expect("settings");
        assert_eq!(settings.app_name.as_deref(), Some("storefront"));
        assert_eq!(settings.out_dir, Some(PathBuf::from("domains")));
        assert_eq!(settings.expansion_depth, Some(1));
        assert_eq!(settings.joins.get("customer").map(String::as_str), Some("dimension"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "app = \"typo\"\n").expect("write settings");
        let err = load_settings(Some(&path), dir.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::TomlDecode(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_settings(Some(&dir.path().join("nope.toml")), dir.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::Io(_)));
    }

    #[test]
    fn app_name_precedence() {
        let settings = ProjectSettings {
            app_name: Some("from_file".to_string()),
            ..ProjectSettings::default()
        };
        assert_eq!(
            resolve_app_name(Some("from_flag"), &settings, Some("from_env".to_string())),
            "from_flag"
        );
        assert_eq!(
            resolve_app_name(None, &settings, Some("from_env".to_string())),
            "from_file"
        );
        assert_eq!(
            resolve_app_name(None, &ProjectSettings::default(), Some("from_env".to_string())),
            "from_env"
        );
        assert_eq!(resolve_app_name(None, &ProjectSettings::default(), None), "app");
    }

    #[test]
    fn join_flags_override_settings() {
        let mut settings = ProjectSettings::default();
        settings.joins.insert("customer".to_string(), "dimension".to_string());
        settings.joins.insert("region".to_string(), "tagging".to_string());

        let overrides =
            parse_join_overrides(&settings, &["customer=:hierarchical".to_string()]).expect("joins");
        assert_eq!(overrides.get("customer"), Some(&JoinType::Hierarchical));
        assert_eq!(overrides.get("region"), Some(&JoinType::Tagging));

        assert!(parse_join_overrides(&settings, &["customer".to_string()]).is_err());
        assert!(parse_join_overrides(&settings, &["customer=outer".to_string()]).is_err());
    }
}
