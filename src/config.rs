use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub blobs: BlobConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlobConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkspaceConfig {
    /// Fallback workspace directory when no settings override exists.
    pub default_directory: Option<PathBuf>,
    /// Where mutable local settings (JSON) are persisted.
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PluginsConfig {
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Resolved settings file path: explicit, or a sibling of the database.
    pub fn settings_path(&self) -> PathBuf {
        match &self.workspace.settings_path {
            Some(path) => path.clone(),
            None => self.data_dir().join("settings.json"),
        }
    }

    /// Resolved plugin directory: explicit, or a sibling of the database.
    pub fn plugins_dir(&self) -> PathBuf {
        match &self.plugins.directory {
            Some(dir) => dir.clone(),
            None => self.data_dir().join("plugins"),
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.db
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }
    if config.blobs.path.as_os_str().is_empty() {
        anyhow::bail!("blobs.path must not be empty");
    }
    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}
