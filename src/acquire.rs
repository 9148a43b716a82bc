//! Package acquisition: resolve where the plugin archive lives, fetch it,
//! and extract it into the environment's plugins directory.

use crate::config::HarnessConfig;
use crate::environment::HostEnvironment;
use crate::error::{AcquireError, Result};
use crate::manifest::PluginDescriptor;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use tracing::info;
use url::Url;
use zip::ZipArchive;

/// Where a plugin package comes from, resolved once from the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// The descriptor carries a direct archive URL.
    Direct(String),
    /// The newest release asset of a hosted repository.
    LatestRelease { owner: String, repo: String },
}

impl DownloadSource {
    /// A direct download URL wins over the source-code URL; otherwise the
    /// owner and repository are the first two path segments of the
    /// repository URL.
    pub fn resolve(descriptor: &PluginDescriptor) -> Result<Self> {
        if let Some(url) = &descriptor.url_download {
            return Ok(Self::Direct(url.clone()));
        }
        let source = descriptor
            .url_source_code
            .as_deref()
            .ok_or(AcquireError::MissingSource)?;
        let parsed = Url::parse(source)
            .map_err(|e| AcquireError::MalformedRepositoryUrl(format!("{source}: {e}")))?;
        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| AcquireError::MalformedRepositoryUrl(source.to_string()))?;
        let owner = segments.next().filter(|s| !s.is_empty());
        let repo = segments.next().filter(|s| !s.is_empty());
        match (owner, repo) {
            (Some(owner), Some(repo)) => Ok(Self::LatestRelease {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(AcquireError::MalformedRepositoryUrl(source.to_string()).into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    browser_download_url: String,
}

/// Look up the newest release of `owner/repo` and return the download URL
/// of its first asset. First asset wins; no fallback.
pub async fn resolve_release_asset(
    client: &reqwest::Client,
    api_base: &str,
    owner: &str,
    repo: &str,
) -> Result<String> {
    let url = format!("{api_base}/repos/{owner}/{repo}/releases/latest");
    let response = client
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(AcquireError::Http)?;
    let release: ReleaseResponse = response
        .json()
        .await
        .map_err(|e| AcquireError::ReleaseShape(e.to_string()))?;
    let asset = release
        .assets
        .into_iter()
        .next()
        .ok_or_else(|| AcquireError::NoReleaseAssets {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })?;
    Ok(asset.browser_download_url)
}

/// Fetch the archive body. Non-2xx responses are fatal; nothing is retried.
pub async fn fetch_archive(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(AcquireError::Http)?;
    let bytes = response.bytes().await.map_err(AcquireError::Http)?;
    Ok(bytes.to_vec())
}

/// Extract every entry of a zip payload under `dest`, creating it if
/// absent. Entry paths are sanitized against absolute and parent-dir
/// components; entries are otherwise trusted.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(AcquireError::Archive)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(AcquireError::Archive)?;
        let raw = entry.name().replace('\\', "/");
        let rel = sanitize_entry_path(Path::new(&raw))?;
        let out = dest.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&out)?;
        io::copy(&mut entry, &mut file)?;
    }
    Ok(())
}

fn sanitize_entry_path(path: &Path) -> Result<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(AcquireError::UnsafeArchivePath(path.display().to_string()).into());
            }
            Component::CurDir => {}
            Component::Normal(part) => cleaned.push(part),
        }
    }
    if cleaned.as_os_str().is_empty() {
        return Err(AcquireError::UnsafeArchivePath("empty entry path".to_string()).into());
    }
    Ok(cleaned)
}

/// Produce a populated package directory for the selected descriptor and
/// return its path.
pub async fn acquire(
    client: &reqwest::Client,
    config: &HarnessConfig,
    env: &HostEnvironment,
    descriptor: &PluginDescriptor,
) -> Result<PathBuf> {
    let download_url = match DownloadSource::resolve(descriptor)? {
        DownloadSource::Direct(url) => url,
        DownloadSource::LatestRelease { owner, repo } => {
            resolve_release_asset(client, &config.release_api_base, &owner, &repo).await?
        }
    };
    info!("Downloading from {download_url}");
    let bytes = fetch_archive(client, &download_url).await?;

    let extract_dir = env.plugins_dir().join(&descriptor.name);
    info!("Extracting into {}", extract_dir.display());
    extract_archive(&bytes, &extract_dir)?;
    Ok(extract_dir)
}
