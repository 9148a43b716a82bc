use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Acquisition error: {0}")]
    Acquire(#[from] AcquireError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Environment variable error: {0}")]
    EnvVar(String),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to fetch manifest from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to read manifest {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse manifest: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Descriptor carries neither a download URL nor a source-code URL")]
    MissingSource,

    #[error("Malformed repository URL: {0}")]
    MalformedRepositoryUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected release API response: {0}")]
    ReleaseShape(String),

    #[error("Latest release of {owner}/{repo} has no assets")]
    NoReleaseAssets { owner: String, repo: String },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive entry escapes extraction directory: {0}")]
    UnsafeArchivePath(String),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("No plugin.json found under {0}")]
    ManifestNotFound(PathBuf),

    #[error("Failed to parse {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    #[error("Failed to parse settings template {path}: {reason}")]
    TemplateParse { path: PathBuf, reason: String },

    #[error("Global settings file is malformed: {0}")]
    GlobalSettings(String),
}

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Failed to spawn plugin process: {reason}")]
    SpawnFailed { reason: String },

    #[error("Plugin I/O error: {reason}")]
    IoError { reason: String },
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_errors_name_json() {
        let inner = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = HarnessError::from(inner);
        assert!(err.to_string().starts_with("JSON serialization error:"));
    }
}
