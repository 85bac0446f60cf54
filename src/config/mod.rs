use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validate;

/// Optional `dockhand.toml`. Every value has a default, so a missing file
/// is equivalent to an empty one.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DockhandConfig {
    #[serde(default)]
    pub defaults: PromptDefaults,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: LocalConfig,
}

/// Pre-filled answers for the interactive prompts.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PromptDefaults {
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub key_path: Option<String>,
    pub app_port: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Relative to the SSH user's home directory.
    #[serde(default = "default_app_dir")]
    pub app_dir: String,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default = "default_image_name")]
    pub image_name: String,
    #[serde(default = "default_nginx_site")]
    pub nginx_site: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Pause between starting the container and validating it.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            app_dir: default_app_dir(),
            container_name: default_container_name(),
            image_name: default_image_name(),
            nginx_site: default_nginx_site(),
            connect_timeout_secs: default_connect_timeout(),
            settle_secs: default_settle(),
        }
    }
}

fn default_app_dir() -> String {
    "app".to_string()
}
fn default_container_name() -> String {
    "dockhand-app".to_string()
}
fn default_image_name() -> String {
    "dockhand-app".to_string()
}
fn default_nginx_site() -> String {
    "dockhand".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_settle() -> u64 {
    5
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    /// Where repositories are cloned.
    #[serde(default = "default_dir")]
    pub workspace: PathBuf,
    #[serde(default = "default_dir")]
    pub log_dir: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            workspace: default_dir(),
            log_dir: default_dir(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

pub const DEFAULT_BRANCH: &str = "main";

impl DockhandConfig {
    /// Load the config at `path`, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        validate::validate(&config)?;
        Ok(config)
    }
}
