//! Mutable local settings.
//!
//! Deployment configuration ([`crate::config`]) is read-only TOML; the
//! pieces a running client may change — the default workspace directory and
//! the plugin-subscriber list — live in a JSON settings file with explicit
//! load/save boundaries. Nothing here is ambient: callers hold a
//! [`Settings`] value and decide when to persist it.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a plugin subscription is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriberKind {
    /// Download and extract the latest GitHub release assets.
    GitRelease,
    /// Clone the repository and pull on every sync.
    GitRepository,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSubscriber {
    pub name: String,
    pub url: String,
    pub kind: SubscriberKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub default_directory: Option<PathBuf>,
    pub plugin_subscribers: Vec<PluginSubscriber>,
}

impl Settings {
    /// Load settings from `path`; a missing file is an empty settings set.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))
    }

    /// Effective workspace directory: the settings override, else the
    /// configured fallback.
    pub fn effective_default_directory<'a>(&'a self, fallback: Option<&'a Path>) -> Option<&'a Path> {
        self.default_directory.as_deref().or(fallback)
    }

    /// Register a subscriber. Duplicate names and urls are rejected — the
    /// subscription set is a registry, not a list.
    pub fn add_subscriber(&mut self, subscriber: PluginSubscriber) -> Result<()> {
        if self
            .plugin_subscribers
            .iter()
            .any(|existing| existing.name == subscriber.name || existing.url == subscriber.url)
        {
            bail!(
                "plugin {}/{} is already subscribed",
                subscriber.name,
                subscriber.url
            );
        }
        self.plugin_subscribers.push(subscriber);
        Ok(())
    }
}
