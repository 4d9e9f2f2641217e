//! Tool configuration.
//!
//! Handles loading, validating, and merging `fotei.toml`. Stock defaults are
//! the base layer; a user file (either `--config <FILE>` or `<ROOT>/fotei.toml`)
//! is merged on top key by key, then the result is validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [tagging]
//! api_key_env = "GEMINI_API_KEY"   # Environment variable holding the API key
//! endpoint = "https://generativelanguage.googleapis.com/v1beta"
//! model = "gemini-1.5-flash"
//! prompt = "..."                   # Instruction sent with every file
//! temperature = 0.7
//! timeout_secs = 60                # Per-request timeout
//!
//! [retry]
//! max_attempts = 3                 # Total attempts per file, including the first
//! backoff_base = 2                 # Delay before retry n is unit × base^n
//! backoff_unit_ms = 1000
//!
//! [files]
//! metadata = "semantic_tags_metadata.json"   # Relative to the tagged root
//! checkpoint = ".fotei_tag_checkpoint"       # Relative to the tagged root
//! media_extensions = ["jpg", "jpeg", "png", "gif", "bmp", "heic", "heif", "tiff", "mp4", "mov", "avi"]
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [retry]
//! max_attempts = 5
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the tagged root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "fotei.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("API key not found: environment variable {0} is unset or empty")]
    MissingCredential(String),
}

/// Configuration loaded from `fotei.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoteiConfig {
    /// Tagging service settings.
    pub tagging: TaggingConfig,
    /// Backoff settings around each tagging call.
    pub retry: RetryConfig,
    /// Names of the durable state files and which files count as media.
    pub files: FilesConfig,
}

impl FoteiConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.backoff_base == 0 {
            return Err(ConfigError::Validation(
                "retry.backoff_base must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.tagging.temperature) {
            return Err(ConfigError::Validation(
                "tagging.temperature must be 0.0-2.0".into(),
            ));
        }
        if self.tagging.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "tagging.timeout_secs must be non-zero".into(),
            ));
        }
        if self.tagging.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tagging.api_key_env must not be empty".into(),
            ));
        }
        if self.files.media_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "files.media_extensions must not be empty".into(),
            ));
        }
        if self.files.metadata.trim().is_empty() || self.files.checkpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "files.metadata and files.checkpoint must not be empty".into(),
            ));
        }
        Ok(())
    }
}

const DEFAULT_PROMPT: &str = "以下の画像または動画に対して、内容を表すタグを10個程度、日本語のカンマ区切りで出力してください。タグ以外の文章は出力しないでください。";

/// Tagging service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaggingConfig {
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    /// Base URL of the generative language API.
    pub endpoint: String,
    pub model: String,
    /// Instruction sent alongside every media file.
    pub prompt: String,
    pub temperature: f32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GEMINI_API_KEY".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-1.5-flash".into(),
            prompt: DEFAULT_PROMPT.into(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Backoff settings around each tagging call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per file, including the first.
    pub max_attempts: u32,
    pub backoff_base: u32,
    /// Length of one backoff unit in milliseconds.
    pub backoff_unit_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2,
            backoff_unit_ms: 1000,
        }
    }
}

/// Durable state file names and media detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Metadata store file, relative to the tagged root.
    pub metadata: String,
    /// Checkpoint marker file, relative to the tagged root.
    pub checkpoint: String,
    /// Lowercase extensions treated as media (matched case-insensitively).
    pub media_extensions: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            metadata: "semantic_tags_metadata.json".into(),
            checkpoint: ".fotei_tag_checkpoint".into(),
            media_extensions: [
                "jpg", "jpeg", "png", "gif", "bmp", "heic", "heif", "tiff", "mp4", "mov", "avi",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(FoteiConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a TOML file as a raw value.
pub fn read_raw_config(file: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(file)?;
    Ok(toml::from_str(&content)?)
}

/// Load `fotei.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `fotei.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    read_raw_config(&config_path).map(Some)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<FoteiConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FoteiConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config for a run over `root`.
///
/// An explicit file wins and must exist; otherwise `<root>/fotei.toml` is used
/// when present. User values are merged on top of stock defaults, unknown keys
/// are rejected, and the result is validated.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<FoteiConfig, ConfigError> {
    let overlay = match explicit {
        Some(file) => Some(read_raw_config(file)?),
        None => load_raw_config(root)?,
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `fotei.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# fotei configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# fotei looks for <ROOT>/fotei.toml, or the file given with --config.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Tagging service
# ---------------------------------------------------------------------------
[tagging]
# Environment variable holding the API key. The key itself never goes here.
api_key_env = "GEMINI_API_KEY"

# Base URL of the generative language API.
endpoint = "https://generativelanguage.googleapis.com/v1beta"

# Model asked to describe each file.
model = "gemini-1.5-flash"

# Instruction sent with every file. The reply is split on commas, Japanese
# commas and newlines.
prompt = "以下の画像または動画に対して、内容を表すタグを10個程度、日本語のカンマ区切りで出力してください。タグ以外の文章は出力しないでください。"

# Sampling temperature (0.0 - 2.0).
temperature = 0.7

# Per-request timeout in seconds.
timeout_secs = 60

# ---------------------------------------------------------------------------
# Retries
# ---------------------------------------------------------------------------
[retry]
# Total attempts per file, including the first. Only network errors,
# timeouts, rate limits and server errors are retried.
max_attempts = 3

# The delay before retry n (counted from 0) is backoff_unit_ms × backoff_base^n.
backoff_base = 2
backoff_unit_ms = 1000

# ---------------------------------------------------------------------------
# Files
# ---------------------------------------------------------------------------
[files]
# Tag store, relative to the tagged root. Rewritten after every directory.
metadata = "semantic_tags_metadata.json"

# Resume marker, relative to the tagged root. Removed when a run completes.
checkpoint = ".fotei_tag_checkpoint"

# Extensions treated as media (case-insensitive).
media_extensions = ["jpg", "jpeg", "png", "gif", "bmp", "heic", "heif", "tiff", "mp4", "mov", "avi"]
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = FoteiConfig::default();
        assert_eq!(config.tagging.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_base, 2);
        assert_eq!(config.files.metadata, "semantic_tags_metadata.json");
        assert!(config.files.media_extensions.contains(&"mov".to_string()));
    }

    #[test]
    fn parse_partial_config() {
        let config: FoteiConfig = toml::from_str(
            r#"
[retry]
max_attempts = 5
"#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        // Unspecified values in the same section fall back to defaults
        assert_eq!(config.retry.backoff_base, 2);
        assert_eq!(config.tagging.model, "gemini-1.5-flash");
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.files.checkpoint, ".fotei_tag_checkpoint");
    }

    #[test]
    fn load_config_reads_root_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
[tagging]
model = "gemini-2.0-flash"

[files]
media_extensions = ["jpg"]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.tagging.model, "gemini-2.0-flash");
        assert_eq!(config.files.media_extensions, vec!["jpg"]);
        assert_eq!(config.tagging.timeout_secs, 60);
    }

    #[test]
    fn explicit_config_wins_over_root_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[retry]\nmax_attempts = 7\n",
        )
        .unwrap();
        let explicit = tmp.path().join("other.toml");
        fs::write(&explicit, "[retry]\nmax_attempts = 2\n").unwrap();

        let config = load_config(tmp.path(), Some(&explicit)).unwrap();
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn explicit_config_must_exist() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(tmp.path(), Some(&tmp.path().join("missing.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path(), None);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[retry]
max_attempts = 3
backoff_base = 2
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[retry]\nmax_attempts = 9\n").unwrap();
        let merged = merge_toml(base, overlay);
        let retry = merged.get("retry").unwrap();
        assert_eq!(retry.get("max_attempts").unwrap().as_integer(), Some(9));
        assert_eq!(retry.get("backoff_base").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_arrays_replace_wholesale() {
        let base: toml::Value = toml::from_str(r#"exts = ["a", "b", "c"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"exts = ["z"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("exts").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<FoteiConfig, _> = toml::from_str("[retry]\nmax_attempt = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<FoteiConfig, _> = toml::from_str("[colors]\nlight = 1\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(FoteiConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_attempts() {
        let mut config = FoteiConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_base() {
        let mut config = FoteiConfig::default();
        config.retry.backoff_base = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_temperature_range() {
        let mut config = FoteiConfig::default();
        config.tagging.temperature = 2.0;
        assert!(config.validate().is_ok());
        config.tagging.temperature = 2.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_extensions() {
        let mut config = FoteiConfig::default();
        config.files.media_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_file_names() {
        let mut config = FoteiConfig::default();
        config.files.checkpoint = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("[tagging]\ntimeout_secs = 0\n").unwrap();
        let result = resolve_config(stock_defaults_value().unwrap(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: FoteiConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = FoteiConfig::default();
        assert_eq!(config.tagging.prompt, defaults.tagging.prompt);
        assert_eq!(config.tagging.endpoint, defaults.tagging.endpoint);
        assert_eq!(config.retry.backoff_unit_ms, defaults.retry.backoff_unit_ms);
        assert_eq!(config.files.media_extensions, defaults.files.media_extensions);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        for section in ["tagging", "retry", "files"] {
            assert!(value.get(section).is_some(), "missing [{section}]");
        }
    }
}
