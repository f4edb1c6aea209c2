use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_matches")]
    pub max_matches_per_file: usize,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_tool_candidates")]
    pub tool_candidates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

fn default_workers() -> usize {
    4
}
fn default_max_matches() -> usize {
    20
}
fn default_context_lines() -> usize {
    1
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_tool_candidates() -> Vec<String> {
    [
        "rg",
        "/usr/local/bin/rg",
        "/usr/bin/rg",
        "/opt/homebrew/bin/rg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_matches_per_file: default_max_matches(),
            context_lines: default_context_lines(),
            timeout_secs: default_timeout_secs(),
            tool_candidates: default_tool_candidates(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Some(xdg_config) = dirs::config_dir() {
            let xdg_path = xdg_config.join("sessiongrep/config.toml");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let home_path = home.join(".sessiongrep.toml");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        let current_path = Path::new(".sessiongrep.toml");
        if current_path.exists() {
            return Some(current_path.to_path_buf());
        }

        None
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Deadline budget for one content search call.
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.content.timeout_secs)
    }
}
