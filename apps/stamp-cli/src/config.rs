//! Configuration for the `pdfstamp` command
//!
//! Settings come from an optional TOML file. Every section and field has a
//! default, so an empty file (or no file at all) is a valid configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stamp_core::preview::clamp_zoom;
use stamp_core::session::{DEFAULT_HISTORY_FILENAME, DEFAULT_PDF_FILENAME};
use stamp_core::{EngineConfig, SessionOptions, HISTORY_KEY};
use std::fs;
use std::path::{Path, PathBuf};

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "pdfstamp.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Load `explicit` if given, otherwise `pdfstamp.toml` when it exists,
    /// otherwise defaults.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Read the configured assets into an engine configuration.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let preferred_font = read_optional(self.assets.font.as_deref(), "font")?;
        let marker_png = read_optional(self.assets.marker.as_deref(), "marker image")?;
        Ok(EngineConfig {
            preferred_font,
            marker_png,
            ..EngineConfig::default()
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            history_key: self.storage.key.clone(),
            pdf_filename: self.output.filename.clone(),
            history_filename: self.output.history_filename.clone(),
        }
    }

    pub fn zoom(&self) -> f64 {
        clamp_zoom(self.view.zoom)
    }
}

fn read_optional(path: Option<&Path>, what: &str) -> anyhow::Result<Option<Vec<u8>>> {
    path.map(|p| {
        fs::read(p).with_context(|| format!("Failed to read {} file: {}", what, p.display()))
    })
    .transpose()
}

/// Where the entry history lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the key-value store
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Key the entry list is stored under
    #[serde(default = "default_storage_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            key: default_storage_key(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".pdfstamp").join("history.json")
}

fn default_storage_key() -> String {
    HISTORY_KEY.to_string()
}

/// Optional drawing resources. Missing entries fall back to the built-in
/// standard font and check mark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetsConfig {
    pub font: Option<PathBuf>,
    pub marker: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_pdf_filename")]
    pub filename: String,
    #[serde(default = "default_history_filename")]
    pub history_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            filename: default_pdf_filename(),
            history_filename: default_history_filename(),
        }
    }
}

fn default_pdf_filename() -> String {
    DEFAULT_PDF_FILENAME.to_string()
}

fn default_history_filename() -> String {
    DEFAULT_HISTORY_FILENAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
        }
    }
}

fn default_zoom() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage.key, "pdfTextHistory");
        assert_eq!(config.output.filename, "edited-document.pdf");
        assert_eq!(config.output.history_filename, "pdf_text_history.json");
        assert_eq!(config.zoom(), 1.0);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [storage]
            path = "/tmp/stamps.json"

            [output]
            filename = "signed.pdf"

            [view]
            zoom = 7.5
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.path, PathBuf::from("/tmp/stamps.json"));
        assert_eq!(config.storage.key, "pdfTextHistory");
        assert_eq!(config.output.filename, "signed.pdf");
        assert_eq!(config.output.history_filename, "pdf_text_history.json");
        assert_eq!(config.zoom(), 3.0);

        let options = config.session_options();
        assert_eq!(options.pdf_filename, "signed.pdf");
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(Config::parse("[storage\npath = 1").is_err());
        assert!(Config::parse("[view]\nzoom = \"big\"").is_err());
    }

    #[test]
    fn test_missing_asset_file_is_an_error() {
        let config = Config::parse("[assets]\nfont = \"/definitely/not/here.ttf\"").unwrap();
        let err = config.engine_config().unwrap_err();
        assert!(err.to_string().contains("font"));
    }

    #[test]
    fn test_no_assets_means_builtin_resources() {
        let engine = Config::default().engine_config().unwrap();
        assert!(engine.preferred_font.is_none());
        assert!(engine.marker_png.is_none());
    }
}
