use anyhow::{Context as AnyhowContext, Result};
use scribe_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file looked up in the working directory when `--config` is absent
pub const DEFAULT_SETTINGS_FILE: &str = "scribe.toml";

/// Contents of `scribe.toml`
///
/// ```toml
/// json = false
///
/// [engine]
/// prefix = "scribe"
/// strip_markers = false
///
/// [engine.resolver]
/// self_reference_fallback = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub engine: EngineConfig,
    /// Print scan results as JSON
    pub json: bool,
}

impl Settings {
    /// Load `explicit`, else `scribe.toml` from the working directory if it
    /// exists, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_SETTINGS_FILE)).filter(|p| p.is_file()),
        };
        let settings = match path {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read settings {}", path.display()))?;
                let settings: Self = toml::from_str(&raw)
                    .with_context(|| format!("Invalid settings in {}", path.display()))?;
                log::debug!("Loaded settings from {}", path.display());
                settings
            }
            None => Self::default(),
        };
        settings
            .engine
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid engine settings")?;
        Ok(settings)
    }
}
