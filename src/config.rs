use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

const CONFIG_FILENAME: &str = "config.toml";

/// User settings from `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub search: SearchConfig,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Upper bound for the author column
    pub author_name_width: usize,
    /// 0 fits the widest date seen
    pub author_date_width: usize,
    /// 0 uses the terminal height
    pub page_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            author_name_width: 10,
            author_date_width: 0,
            page_size: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub ignore_case: bool,
}

impl Config {
    pub fn default_location() -> Option<PathBuf> {
        ProjectDirs::from("", "", "glv").map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Load the config at `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
