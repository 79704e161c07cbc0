//! `cellflow.toml` loading.
//!
//! ```toml
//! columns = 10
//! rows = 5
//! log_level = "warn"
//! ```

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};
use cellflow_core::GridBounds;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub columns: usize,
    pub rows: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let bounds = GridBounds::default();
        Config {
            columns: bounds.columns,
            rows: bounds.rows,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn bounds(&self) -> GridBounds {
        GridBounds::new(self.columns, self.rows)
    }
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "cellflow")?;
    Some(proj.config_dir().join("cellflow.toml"))
}

/// Load the explicit config file, or the user's one if present, or defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match user_config_path() {
            Some(path) if path.is_file() => path,
            _ => return Ok(Config::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    parse_config(&content).map_err(|message| CliError::Config { path, message })
}

fn parse_config(content: &str) -> std::result::Result<Config, String> {
    toml::from_str::<Config>(content).map_err(|e| e.message().to_string())
}
