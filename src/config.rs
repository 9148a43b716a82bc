//! Harness configuration.
//!
//! Settings are layered: serde defaults, then an optional config file
//! (`smoketest.toml` / `smoketest.yaml`), then `SMOKETEST_`-prefixed
//! environment variables. Command-line flags override the extracted
//! configuration last, in `main`.

use crate::error::{ConfigError, Result};
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory name the launcher uses under both platform data roots.
pub const APP_DIR_NAME: &str = "FlowLauncher";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Path or http(s) URL of the plugin manifest.
    pub manifest: String,

    /// Implementation-language tag a candidate must carry.
    pub language: String,

    /// Interpreter used to launch the plugin executable.
    pub interpreter: String,

    /// Code-hosting domain an untested candidate must be hosted on.
    pub supported_host: String,

    /// Hosting-platform API base for latest-release lookups.
    pub release_api_base: String,

    /// Override for the user-data root. Defaults to `%APPDATA%/FlowLauncher`.
    pub user_data_dir: Option<PathBuf>,

    /// Override for the application-data root. Defaults to
    /// `%LOCALAPPDATA%/FlowLauncher`.
    pub app_data_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            manifest: "plugins.json".to_string(),
            language: "python".to_string(),
            interpreter: "python".to_string(),
            supported_host: "github.com".to_string(),
            release_api_base: "https://api.github.com".to_string(),
            user_data_dir: None,
            app_data_dir: None,
        }
    }
}

pub fn load() -> Result<HarnessConfig> {
    let config: HarnessConfig = Figment::from(Serialized::defaults(HarnessConfig::default()))
        .merge(Toml::file("smoketest.toml"))
        .merge(Yaml::file("smoketest.yaml"))
        .merge(Env::prefixed("SMOKETEST_"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(config)
}
