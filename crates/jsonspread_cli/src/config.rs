//! Layered CLI configuration: defaults, then `jsonspread.toml`, then `JSONSPREAD_*` env vars.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use jsonspread_io_sheet::SpecSpreadOptions;
use serde::Deserialize;

pub const C_CONFIG_FILE_DEFAULT: &str = "jsonspread.toml";
pub const C_ENV_PREFIX: &str = "JSONSPREAD_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecCliConfig {
    /// `tracing` filter directive; `RUST_LOG` wins when set.
    pub log_filter: String,
    /// Base output file name.
    pub file_name: Option<String>,
    /// Output extension.
    pub extension: Option<String>,
    /// Output directory for file saves.
    pub out_dir: Option<PathBuf>,
    /// Workbook conversion options.
    pub spread: SpecSpreadOptions,
}

impl Default for SpecCliConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            file_name: None,
            extension: None,
            out_dir: None,
            spread: SpecSpreadOptions::default(),
        }
    }
}

/// Build the provider chain. Nested keys use `__` in env var names
/// (`JSONSPREAD_SPREAD__IF_STRICT_CONTENT_TYPE=true`).
pub fn derive_figment(path_config: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path_config))
        .merge(Env::prefixed(C_ENV_PREFIX).split("__"))
}

/// Load configuration. An explicitly given config file must exist.
pub fn load_config(path_config: Option<&Path>) -> Result<SpecCliConfig> {
    let path_config = match path_config {
        Some(path) => {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => PathBuf::from(C_CONFIG_FILE_DEFAULT),
    };

    derive_figment(&path_config)
        .extract::<SpecCliConfig>()
        .with_context(|| format!("Failed to read config from {}", path_config.display()))
}
