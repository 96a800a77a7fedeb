//! Plugin-subscription synchronization.
//!
//! Subscribers come in two shapes: `git-release` (download and extract the
//! latest GitHub release assets) and `git-repository` (clone once, pull on
//! every sync). Each subscriber owns a subdirectory of the plugin directory;
//! release subscribers leave a marker file recording the last tag so
//! unchanged releases are not re-downloaded.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::settings::{Settings, SubscriberKind};

/// Marker written into a release subscriber's directory after a download.
const RELEASE_MARKER: &str = ".docvault.release.json";

const USER_AGENT: &str = concat!("docvault/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubRelease {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRemote {
    pub name: String,
    pub url: String,
    /// `fetch` or `push`.
    pub direction: String,
}

/// A plugin present on disk, regardless of whether it is still subscribed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSubscriber {
    pub name: String,
    pub url: String,
}

/// `(owner, repo)` of a GitHub repository url.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let url = url.strip_suffix(".git").unwrap_or(url);
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let mut segments = url.split('/');
    let _host = segments.next()?;
    let owner = segments.next()?;
    let repo = segments.next()?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

async fn latest_release(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
) -> Result<GitHubRelease> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/releases/latest");
    let response = client
        .get(&url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .with_context(|| format!("Failed to query latest release of {owner}/{repo}"))?;
    if !response.status().is_success() {
        bail!(
            "release query for {}/{} failed with status {}",
            owner,
            repo,
            response.status()
        );
    }
    Ok(response.json().await?)
}

/// Download the latest release into `output_dir` if its tag differs from the
/// locally recorded one. Returns whether anything was downloaded.
async fn download_release(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
    output_dir: &Path,
) -> Result<bool> {
    let latest = latest_release(client, owner, repo).await?;

    let marker_path = output_dir.join(RELEASE_MARKER);
    let last: GitHubRelease = match std::fs::read_to_string(&marker_path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => GitHubRelease::default(),
    };
    if latest.tag_name == last.tag_name {
        return Ok(false);
    }

    let mut downloads = Vec::new();
    for asset in &latest.assets {
        let bytes = client
            .get(&asset.browser_download_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("Failed to download asset {}", asset.browser_download_url))?
            .bytes()
            .await?;
        let download_path = output_dir.join(&asset.name);
        tokio::fs::write(&download_path, &bytes)
            .await
            .with_context(|| format!("Failed to write asset: {}", download_path.display()))?;
        downloads.push(download_path);
    }

    for download in &downloads {
        if download.extension().is_some_and(|ext| ext == "zip") {
            extract_zip(download, output_dir).await?;
        }
    }

    std::fs::write(&marker_path, serde_json::to_string(&latest)?)
        .with_context(|| format!("Failed to write release marker: {}", marker_path.display()))?;
    info!(owner, repo, tag = %latest.tag_name, "downloaded plugin release");
    Ok(true)
}

/// Extract an archive into a sibling directory named after its stem.
async fn extract_zip(archive_path: &Path, output_dir: &Path) -> Result<()> {
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extracted".to_string());
    let destination = output_dir.join(stem);
    let archive_path = archive_path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&archive_path)
            .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("Failed to read archive: {}", archive_path.display()))?;
        archive
            .extract(&destination)
            .with_context(|| format!("Failed to extract archive: {}", archive_path.display()))?;
        Ok(())
    })
    .await??;
    Ok(())
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run git {:?} in {}", args, dir.display()))?;
    if !output.status.success() {
        bail!(
            "git {:?} failed in {}: {}",
            args,
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Clone a repository into `dir`, or pull when a clone already exists.
pub fn clone_or_pull(url: &str, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create plugin directory: {}", dir.display()))?;
    if dir.join(".git").exists() {
        run_git(dir, &["pull"])?;
    } else {
        run_git(dir, &["clone", url, "."])?;
    }
    Ok(())
}

fn parse_remotes(output: &str) -> Vec<GitRemote> {
    let mut remotes = Vec::new();
    for line in output.lines() {
        let mut columns = line.split('\t');
        let (Some(name), Some(rest)) = (columns.next(), columns.next()) else {
            continue;
        };
        let mut parts = rest.split(' ');
        let (Some(url), Some(direction)) = (parts.next(), parts.next()) else {
            continue;
        };
        remotes.push(GitRemote {
            name: name.to_string(),
            url: url.to_string(),
            direction: direction.trim_matches(|c| c == '(' || c == ')').to_string(),
        });
    }
    remotes
}

pub fn remotes(dir: &Path) -> Result<Vec<GitRemote>> {
    Ok(parse_remotes(&run_git(dir, &["remote", "-v"])?))
}

/// Bring every subscribed plugin up to date.
pub async fn sync_subscribers(settings: &Settings, plugins_dir: &Path) -> Result<()> {
    let client = reqwest::Client::new();
    for subscriber in &settings.plugin_subscribers {
        let output_dir = plugins_dir.join(&subscriber.name);
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create plugin directory: {}", output_dir.display())
        })?;
        match subscriber.kind {
            SubscriberKind::GitRelease => {
                let Some((owner, repo)) = parse_repo_url(&subscriber.url) else {
                    bail!("cannot parse repository url: {}", subscriber.url);
                };
                download_release(&client, &owner, &repo, &output_dir).await?;
            }
            SubscriberKind::GitRepository => {
                clone_or_pull(&subscriber.url, &output_dir)?;
            }
        }
    }
    Ok(())
}

/// Plugins present in the plugin directory, with their origin urls.
pub fn local_subscribers(plugins_dir: &Path) -> Result<Vec<LocalSubscriber>> {
    let mut subscribers = Vec::new();
    let entries = match std::fs::read_dir(plugins_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(subscribers),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("Failed to list plugin directory: {}", plugins_dir.display())
            })
        }
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let marker_path = dir.join(RELEASE_MARKER);
        if marker_path.exists() {
            let release: GitHubRelease = std::fs::read_to_string(&marker_path)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .unwrap_or_default();
            subscribers.push(LocalSubscriber {
                name,
                url: release.html_url,
            });
        } else if dir.join(".git").exists() {
            let url = remotes(&dir)?
                .into_iter()
                .find(|remote| remote.direction == "fetch")
                .map(|remote| remote.url)
                .unwrap_or_default();
            subscribers.push(LocalSubscriber { name, url });
        }
    }
    subscribers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(subscribers)
}

/// Delete a plugin's directory. Unknown names are a no-op.
pub fn remove_local_subscriber(plugins_dir: &Path, name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
        bail!("invalid plugin name: {name}");
    }
    let dir = plugins_dir.join(name);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to remove plugin directory: {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_url() {
        assert_eq!(
            parse_repo_url("https://github.com/opencads/ui-home.git"),
            Some(("opencads".to_string(), "ui-home".to_string()))
        );
        assert_eq!(
            parse_repo_url("http://github.com/acme/widgets"),
            Some(("acme".to_string(), "widgets".to_string()))
        );
        assert_eq!(parse_repo_url("https://github.com/justowner"), None);
    }

    #[test]
    fn test_parse_remotes() {
        let output = "origin\thttps://github.com/acme/widgets.git (fetch)\n\
                      origin\thttps://github.com/acme/widgets.git (push)\n";
        let remotes = parse_remotes(output);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].name, "origin");
        assert_eq!(remotes[0].url, "https://github.com/acme/widgets.git");
        assert_eq!(remotes[0].direction, "fetch");
        assert_eq!(remotes[1].direction, "push");
    }

    #[test]
    fn test_parse_remotes_skips_malformed_lines() {
        assert!(parse_remotes("garbage with no tab\n\n").is_empty());
    }

    #[test]
    fn test_remove_rejects_path_traversal() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(remove_local_subscriber(tmp.path(), "..").is_err());
        assert!(remove_local_subscriber(tmp.path(), "a/b").is_err());
        // Unknown but well-formed name is fine
        assert!(remove_local_subscriber(tmp.path(), "ghost").is_ok());
    }
}
