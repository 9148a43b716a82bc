//! The emulated launcher environment on disk.
//!
//! The harness provisions the same directory tree the launcher expects at
//! runtime so the plugin under test finds a plausible host around it. The
//! environment value is threaded explicitly through every later stage;
//! nothing relies on well-known paths after construction.

use crate::config::{HarnessConfig, APP_DIR_NAME};
use crate::error::{ConfigError, Result};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subdirectories required under the user-data root.
const USER_DIRS: &[&str] = &["Settings", "Logs", "PythonEmbeddable", "Themes", "Plugins"];

/// Subdirectories required under the application-data root. The versioned
/// directory stands in for the launcher's installed application payload.
const APP_DIRS: &[&str] = &["Images", "app-1.9.0"];

#[derive(Debug, Clone)]
pub struct HostEnvironment {
    user_root: PathBuf,
    app_root: PathBuf,
}

impl HostEnvironment {
    pub fn new(user_root: PathBuf, app_root: PathBuf) -> Self {
        Self {
            user_root,
            app_root,
        }
    }

    /// Resolve the environment roots from config overrides, falling back to
    /// the platform base-directory variables the launcher itself uses.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let user_root = match &config.user_data_dir {
            Some(dir) => dir.clone(),
            None => base_dir("APPDATA")?.join(APP_DIR_NAME),
        };
        let app_root = match &config.app_data_dir {
            Some(dir) => dir.clone(),
            None => base_dir("LOCALAPPDATA")?.join(APP_DIR_NAME),
        };
        Ok(Self::new(user_root, app_root))
    }

    pub fn user_root(&self) -> &Path {
        &self.user_root
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// The launcher's global settings store.
    pub fn settings_file(&self) -> PathBuf {
        self.user_root.join("Settings").join("Settings.json")
    }

    /// Where plugin packages are installed.
    pub fn plugins_dir(&self) -> PathBuf {
        self.user_root.join("Plugins")
    }

    /// Where per-plugin settings files live.
    pub fn plugin_settings_dir(&self) -> PathBuf {
        self.user_root.join("Settings").join("Plugins")
    }

    /// Idempotently create the directory tree and reset the global settings
    /// file to an empty plugin map.
    ///
    /// Pre-existing directories are left untouched; the settings file is
    /// always rewritten so a run never inherits registrations from a
    /// previous one.
    pub fn provision(&self) -> Result<()> {
        for dir in USER_DIRS {
            fs::create_dir_all(self.user_root.join(dir))?;
        }
        for dir in APP_DIRS {
            fs::create_dir_all(self.app_root.join(dir))?;
        }
        fs::create_dir_all(self.plugin_settings_dir())?;

        let baseline = json!({ "PluginSettings": { "Plugins": {} } });
        fs::write(
            self.settings_file(),
            serde_json::to_string_pretty(&baseline)?,
        )?;
        debug!(
            "provisioned launcher environment at {}",
            self.user_root.display()
        );
        Ok(())
    }
}

fn base_dir(var: &str) -> Result<PathBuf> {
    std::env::var_os(var)
        .map(PathBuf::from)
        .ok_or_else(|| ConfigError::EnvVar(format!("{var} is not set")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_environment() -> (TempDir, HostEnvironment) {
        let root = TempDir::new().unwrap();
        let env = HostEnvironment::new(root.path().join("user"), root.path().join("app"));
        (root, env)
    }

    #[test]
    fn provision_creates_the_full_tree() {
        let (_root, env) = temp_environment();
        env.provision().unwrap();

        for dir in USER_DIRS {
            assert!(env.user_root().join(dir).is_dir(), "missing {dir}");
        }
        for dir in APP_DIRS {
            assert!(env.app_root().join(dir).is_dir(), "missing {dir}");
        }
        assert!(env.plugin_settings_dir().is_dir());
        assert!(env.settings_file().is_file());
    }

    #[test]
    fn provision_is_idempotent() {
        let (_root, env) = temp_environment();
        env.provision().unwrap();
        let listing = |dir: &Path| {
            let mut names: Vec<String> = fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        };
        let before = listing(env.user_root());

        env.provision().unwrap();
        assert_eq!(listing(env.user_root()), before);
    }

    #[test]
    fn provision_resets_the_global_settings_file() {
        let (_root, env) = temp_environment();
        env.provision().unwrap();
        fs::write(env.settings_file(), r#"{"PluginSettings":{"Plugins":{"stale":{}}}}"#).unwrap();

        env.provision().unwrap();
        let raw = fs::read_to_string(env.settings_file()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["PluginSettings"]["Plugins"], json!({}));
    }

    #[test]
    fn from_config_prefers_explicit_overrides() {
        let config = HarnessConfig {
            user_data_dir: Some(PathBuf::from("/tmp/user")),
            app_data_dir: Some(PathBuf::from("/tmp/app")),
            ..HarnessConfig::default()
        };
        let env = HostEnvironment::from_config(&config).unwrap();
        assert_eq!(env.user_root(), Path::new("/tmp/user"));
        assert_eq!(env.app_root(), Path::new("/tmp/app"));
    }
}
