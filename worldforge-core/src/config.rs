use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transfer::export::ExportFormat;

/// Default config file name looked up next to a project.
pub const CONFIG_FILE_NAME: &str = "worldforge.toml";

/// Top-level Worldforge configuration, matching `worldforge.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldforgeConfig {
    #[serde(default)]
    pub editor: EditorSection,
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub remote: RemoteSection,
}

impl WorldforgeConfig {
    /// Parse a config document and check its values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.editor.history_depth == 0 {
            return Err(ConfigError::Invalid(
                "editor.history_depth must be at least 1".into(),
            ));
        }
        if self.editor.grid_size == 0 {
            return Err(ConfigError::Invalid(
                "editor.grid_size must be at least 1".into(),
            ));
        }
        if self.import.max_file_size == 0 {
            return Err(ConfigError::Invalid(
                "import.max_file_size must be positive".into(),
            ));
        }
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.base_url is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSection {
    pub snap_to_grid: bool,
    pub autosave_enabled: bool,
    pub autosave_interval_ms: u64,
    pub history_depth: usize,
    pub grid_size: u32,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            snap_to_grid: false,
            autosave_enabled: true,
            autosave_interval_ms: 30_000,
            history_depth: 50,
            grid_size: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSection {
    /// Hard size ceiling for import files, in bytes.
    pub max_file_size: u64,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    /// Recorded as `metadata.appVersion` in exported snapshots.
    pub app_version: String,
    pub default_format: ExportFormat,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            default_format: ExportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = WorldforgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.editor.autosave_interval_ms, 30_000);
        assert_eq!(config.editor.history_depth, 50);
        assert_eq!(config.editor.grid_size, 15);
        assert_eq!(config.import.max_file_size, 10_485_760);
        assert_eq!(config.export.default_format, ExportFormat::Json);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = WorldforgeConfig::from_toml_str(
            "[editor]\nsnap_to_grid = true\n\n[export]\ndefault_format = \"graphml\"\n",
        )
        .unwrap();
        assert!(config.editor.snap_to_grid);
        assert!(config.editor.autosave_enabled);
        assert_eq!(config.export.default_format, ExportFormat::Graphml);
        assert_eq!(config.remote.base_url, "http://localhost:3001");
    }

    #[test]
    fn zero_history_depth_is_invalid() {
        let err = WorldforgeConfig::from_toml_str("[editor]\nhistory_depth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_syntax_is_parse_error() {
        let err = WorldforgeConfig::from_toml_str("[editor\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorldforgeConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
