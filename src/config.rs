//! Runtime configuration loaded from TOML.
//!
//! Everything here is read once at startup: the rescan period, the set of
//! in-progress download suffixes, the retry budget, per-category extension
//! overrides and optional exclude rules.
//!
//! # Configuration File Format
//!
//! ```toml
//! [watch]
//! rescan_interval_secs = 10
//! ignored_suffixes = [".part", ".crdownload"]
//!
//! [retry]
//! max_attempts = 3
//! backoff_ms = 1000
//!
//! [categories]
//! Images = [".jpg", ".png", ".avif"]
//!
//! [filters.exclude]
//! filenames = ["desktop.ini"]
//! patterns = ["*.tmp"]
//! ```

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::file_category::{Category, ExtensionTable};
use crate::relocator::RelocationPolicy;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("Unknown category '{0}' in [categories]")]
    UnknownCategory(String),

    #[error("Extension '{extension}' is mapped to both {first} and {second}")]
    DuplicateExtension {
        extension: String,
        first: Category,
        second: Category,
    },

    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    pub watch: WatchSettings,
    pub retry: RetrySettings,
    /// Per-category replacement extension lists, keyed by category label.
    pub categories: BTreeMap<String, Vec<String>>,
    pub filters: FilterRules,
}

/// Trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Seconds between two reconciliation passes.
    pub rescan_interval_secs: u64,
    /// File name suffixes marking downloads still in progress.
    pub ignored_suffixes: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            rescan_interval_secs: 10,
            ignored_suffixes: default_ignored_suffixes(),
        }
    }
}

/// Suffixes used by Firefox and Chromium for partial downloads.
pub fn default_ignored_suffixes() -> Vec<String> {
    vec![".part".to_string(), ".crdownload".to_string()]
}

/// Move retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total move attempts, including the first.
    pub max_attempts: u32,
    /// Fixed wait between two attempts.
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

/// Optional exclusion rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    #[serde(default)]
    pub exclude: ExcludeRules,
}

/// Rules for leaving files where they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact file names to leave alone (e.g. "desktop.ini").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the file name (e.g. "*.tmp").
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl OrderConfig {
    /// Load configuration, falling back to defaults.
    ///
    /// Looks in this order:
    /// 1. `config_path`, if provided
    /// 2. `.orderrc.toml` in the current directory
    /// 3. `~/.config/order/config.toml`
    /// 4. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a file is found but cannot be read, parsed or
    /// validated, or if `config_path` does not exist.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".orderrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("order")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and that the category table can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ConfigInvalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.watch.rescan_interval_secs == 0 {
            return Err(ConfigError::ConfigInvalid(
                "watch.rescan_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.watch.ignored_suffixes.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::ConfigInvalid(
                "watch.ignored_suffixes must not contain empty entries".to_string(),
            ));
        }
        self.extension_table()?;
        self.compile_filters()?;
        Ok(())
    }

    /// Builds the extension table: defaults plus `[categories]` overrides.
    pub fn extension_table(&self) -> Result<ExtensionTable, ConfigError> {
        let mut overrides = HashMap::new();
        for (label, extensions) in &self.categories {
            let category = Category::from_label(label)
                .ok_or_else(|| ConfigError::UnknownCategory(label.clone()))?;
            overrides.insert(category, extensions.clone());
        }
        ExtensionTable::with_overrides(&overrides)
    }

    /// Compiles the exclude rules for matching.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }

    /// The relocation policy these settings describe.
    pub fn relocation_policy(&self) -> RelocationPolicy {
        RelocationPolicy {
            ignored_suffixes: self.watch.ignored_suffixes.clone(),
            max_attempts: self.retry.max_attempts,
            backoff: Duration::from_millis(self.retry.backoff_ms),
        }
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.watch.rescan_interval_secs)
    }
}

/// Exclude rules compiled for matching.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    exclude_filenames: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = rules
            .exclude
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_patterns,
        })
    }

    /// Returns false when a file matches an exclude rule.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        !self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrderConfig::default();
        assert_eq!(config.watch.rescan_interval_secs, 10);
        assert_eq!(config.watch.ignored_suffixes, vec![".part", ".crdownload"]);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = OrderConfig::from_toml_str("").unwrap();
        assert_eq!(config.rescan_interval(), Duration::from_secs(10));
        assert_eq!(config.relocation_policy().backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_partial_sections() {
        let config = OrderConfig::from_toml_str(
            r#"
            [watch]
            rescan_interval_secs = 30

            [retry]
            backoff_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.watch.rescan_interval_secs, 30);
        assert_eq!(config.watch.ignored_suffixes, default_ignored_suffixes());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_ms, 50);
    }

    #[test]
    fn test_category_override() {
        let config = OrderConfig::from_toml_str(
            r#"
            [categories]
            Images = [".jpg", ".avif"]
            "#,
        )
        .unwrap();

        let table = config.extension_table().unwrap();
        assert_eq!(table.classify(".avif"), Category::Images);
        assert_eq!(table.classify(".png"), Category::Others);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let result = OrderConfig::from_toml_str(
            r#"
            [categories]
            Fonts = [".ttf"]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::UnknownCategory(name)) if name == "Fonts"));
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let result = OrderConfig::from_toml_str(
            r#"
            [categories]
            Documents = [".json"]
            "#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateExtension { .. })
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = OrderConfig::from_toml_str("[retry]\nmax_attempts = 0\n");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = OrderConfig::from_toml_str("[watch]\nrescan_interval_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = OrderConfig::from_toml_str("[watch\n");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let result = OrderConfig::from_toml_str("[filters.exclude]\npatterns = [\"[\"]\n");
        assert!(matches!(result, Err(ConfigError::InvalidGlobPattern(_))));
    }

    #[test]
    fn test_exclude_filters() {
        let config = OrderConfig::from_toml_str(
            r#"
            [filters.exclude]
            filenames = ["desktop.ini"]
            patterns = ["*.tmp"]
            "#,
        )
        .unwrap();
        let filters = config.compile_filters().unwrap();

        assert!(!filters.should_include(Path::new("/d/desktop.ini")));
        assert!(!filters.should_include(Path::new("/d/build.tmp")));
        assert!(filters.should_include(Path::new("/d/photo.jpg")));
    }

    #[test]
    fn test_default_filters_include_everything() {
        let filters = CompiledFilters::default();
        assert!(filters.should_include(Path::new(".hidden")));
        assert!(filters.should_include(Path::new("a.jpg")));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = OrderConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }
}
