//! Configuration handling for brickwork.
//!
//! Looks for `.config/brickwork.json` in the current directory or any parent directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::CollectionConfig;

/// Engine-wide naming and storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix of every table the engine owns
    pub table_prefix: String,
    /// Table referenced by media fields (default `<prefix>_media`)
    pub media_table: Option<String>,
    /// Table referenced by user fields and audit columns (default `<prefix>_users`)
    pub users_table: Option<String>,
    /// Audit table for applied plans (default `<prefix>_collection_migrations`)
    pub migration_table: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            table_prefix: "bw".to_string(),
            media_table: None,
            users_table: None,
            migration_table: None,
        }
    }
}

impl EngineConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn media_table(&self) -> String {
        self.media_table
            .clone()
            .unwrap_or_else(|| format!("{}_media", self.table_prefix))
    }

    pub fn users_table(&self) -> String {
        self.users_table
            .clone()
            .unwrap_or_else(|| format!("{}_users", self.table_prefix))
    }

    pub fn migration_table(&self) -> String {
        self.migration_table
            .clone()
            .unwrap_or_else(|| format!("{}_collection_migrations", self.table_prefix))
    }
}

/// Contents of `.config/brickwork.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Database connection URL, for the Postgres adapter
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

/// Load configuration from `.config/brickwork.json`, searching up the directory tree.
pub fn load() -> Result<(ProjectConfig, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(ProjectConfig, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;

    let config: ProjectConfig =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?;

    tracing::debug!(
        path = %config_path.display(),
        collections = config.collections.len(),
        "loaded brickwork config"
    );

    Ok((config, config_path))
}

/// Find `.config/brickwork.json` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".config/brickwork.json");
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no .config/brickwork.json found in current directory or any parent")]
    NotFound,

    #[error("failed to read the current directory")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "brickwork-config-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn derived_table_names() {
        let config = EngineConfig::with_prefix("cms");
        assert_eq!(config.media_table(), "cms_media");
        assert_eq!(config.users_table(), "cms_users");
        assert_eq!(config.migration_table(), "cms_collection_migrations");

        let config = EngineConfig {
            media_table: Some("assets".to_string()),
            ..EngineConfig::default()
        };
        assert_eq!(config.media_table(), "assets");
        assert_eq!(config.users_table(), "bw_users");
    }

    #[test]
    fn loads_from_parent_directory() {
        let root = scratch_dir("parent");
        std::fs::create_dir_all(root.join(".config")).unwrap();
        std::fs::write(
            root.join(".config/brickwork.json"),
            r#"{
                "engine": { "table_prefix": "site" },
                "collections": [{ "key": "news", "fields": [{ "key": "title", "type": "text" }] }]
            }"#,
        )
        .unwrap();
        let nested = root.join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = load_from(&nested).unwrap();
        assert_eq!(path, root.join(".config/brickwork.json"));
        assert_eq!(config.engine.table_prefix, "site");
        assert_eq!(config.engine.migration_table, None);
        assert_eq!(config.collections[0].key, "news");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn reports_parse_errors() {
        let root = scratch_dir("broken");
        std::fs::create_dir_all(root.join(".config")).unwrap();
        std::fs::write(root.join(".config/brickwork.json"), "{ nope").unwrap();

        let err = load_from(&root).unwrap_err();
        assert!(
            matches!(
                &err,
                ConfigError::Parse { path, .. } if path.ends_with(".config/brickwork.json")
            ),
            "{err}"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.is::<serde_json::Error>());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn reports_read_errors_with_their_source() {
        let root = scratch_dir("unreadable");
        // A directory where the file should be exists but cannot be read
        std::fs::create_dir_all(root.join(".config/brickwork.json")).unwrap();

        let err = load_from(&root).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "{err}");
        assert!(err.to_string().starts_with("failed to read "), "{err}");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.is::<std::io::Error>());

        let _ = std::fs::remove_dir_all(&root);
    }
}
