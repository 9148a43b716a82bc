//! Plugin package materialization: locate the package manifest, derive
//! default settings from the settings template, and register the plugin in
//! the launcher's global settings store.

use crate::environment::HostEnvironment;
use crate::error::{Result, SettingsError};
use crate::manifest::PluginDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// File name of the package manifest inside an extracted plugin.
pub const PACKAGE_MANIFEST_FILE: &str = "plugin.json";

/// File name of the optional settings template inside an extracted plugin.
pub const SETTINGS_TEMPLATE_FILE: &str = "SettingsTemplate.yaml";

/// The subset of `plugin.json` the harness needs to run the plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageManifest {
    #[serde(rename = "ID")]
    pub id: String,
    pub execute_file_name: String,
    pub action_keyword: String,
}

/// Shape of the launcher's global settings file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(rename = "PluginSettings")]
    pub plugin_settings: PluginSettings,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PluginSettings {
    #[serde(rename = "Plugins")]
    pub plugins: BTreeMap<String, PluginRegistration>,
}

/// One registered plugin in the global settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub version: String,
    pub action_keywords: Vec<String>,
}

/// A plugin package ready to run.
#[derive(Debug)]
pub struct MaterializedPlugin {
    /// Directory containing the package manifest; also the working
    /// directory the plugin runs in.
    pub plugin_dir: PathBuf,
    /// Entry-point file name, relative to `plugin_dir`.
    pub execute_file: String,
    /// Defaults derived from the settings template, if one exists.
    pub default_settings: Option<Map<String, Value>>,
}

/// Find the package manifest anywhere under `root`.
///
/// Archives sometimes nest the package under a top-level directory, so the
/// search is recursive. When several manifests exist the shallowest wins,
/// with lexicographic path order breaking depth ties.
pub fn find_package_manifest(root: &Path) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file() && entry.file_name() == PACKAGE_MANIFEST_FILE
        })
        .map(|entry| entry.into_path())
        .collect();
    // sort_by_file_name already yields lexicographic order; a stable sort
    // on depth keeps that order within each depth.
    matches.sort_by_key(|path| path.components().count());
    matches
        .into_iter()
        .next()
        .ok_or_else(|| SettingsError::ManifestNotFound(root.to_path_buf()).into())
}

pub fn read_package_manifest(path: &Path) -> Result<PackageManifest> {
    let raw = fs::read_to_string(path)?;
    let manifest = serde_json::from_str(&raw).map_err(|e| SettingsError::ManifestParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(manifest)
}

/// One settings control in the template. Only `name` and `defaultValue`
/// matter here; presentation attributes are ignored.
#[derive(Debug, Deserialize)]
struct TemplateElement {
    attributes: TemplateAttributes,
}

#[derive(Debug, Deserialize)]
struct TemplateAttributes {
    name: Option<String>,
    #[serde(rename = "defaultValue")]
    default_value: Option<serde_yaml::Value>,
}

/// Flatten the settings template into a name-to-default map.
///
/// The template is a map of group name to a list of controls; grouping is
/// purely presentational and discarded. Controls without a name or without
/// a default contribute nothing. Returns `None` when no template exists.
pub fn derive_default_settings(plugin_dir: &Path) -> Result<Option<Map<String, Value>>> {
    let template_path = plugin_dir.join(SETTINGS_TEMPLATE_FILE);
    if !template_path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&template_path)?;
    let groups: BTreeMap<String, Vec<TemplateElement>> = serde_yaml::from_str(&raw)
        .map_err(|e| SettingsError::TemplateParse {
            path: template_path.clone(),
            reason: e.to_string(),
        })?;

    let mut defaults = Map::new();
    for element in groups.into_values().flatten() {
        let TemplateAttributes {
            name: Some(name),
            default_value: Some(value),
        } = element.attributes
        else {
            continue;
        };
        let value = serde_json::to_value(value).map_err(|e| SettingsError::TemplateParse {
            path: template_path.clone(),
            reason: e.to_string(),
        })?;
        defaults.insert(name, value);
    }
    Ok(Some(defaults))
}

/// Write the per-plugin settings file under the environment's plugin
/// settings directory.
pub fn write_plugin_settings(
    env: &HostEnvironment,
    plugin_name: &str,
    defaults: &Map<String, Value>,
) -> Result<()> {
    let dir = env.plugin_settings_dir().join(plugin_name);
    fs::create_dir_all(&dir)?;
    let path = dir.join("Settings.json");
    fs::write(&path, serde_json::to_string_pretty(defaults)?)?;
    debug!("wrote default settings to {}", path.display());
    Ok(())
}

/// Upsert a plugin registration in the global settings store, keyed by the
/// plugin's ID.
pub fn register_plugin(env: &HostEnvironment, registration: PluginRegistration) -> Result<()> {
    let path = env.settings_file();
    let raw = fs::read_to_string(&path)?;
    let mut settings: GlobalSettings = serde_json::from_str(&raw)
        .map_err(|e| SettingsError::GlobalSettings(e.to_string()))?;

    settings
        .plugin_settings
        .plugins
        .insert(registration.id.clone(), registration);
    fs::write(&path, serde_json::to_string_pretty(&settings)?)?;
    Ok(())
}

/// Turn an extracted package directory into a runnable plugin.
///
/// The identity registered in the global store comes from the package
/// manifest's ID; name and version come from the launcher manifest's
/// descriptor.
pub fn materialize(
    env: &HostEnvironment,
    descriptor: &PluginDescriptor,
    extract_dir: &Path,
) -> Result<MaterializedPlugin> {
    let manifest_path = find_package_manifest(extract_dir)?;
    let manifest = read_package_manifest(&manifest_path)?;
    let plugin_dir = manifest_path
        .parent()
        .unwrap_or(extract_dir)
        .to_path_buf();
    info!("plugin package rooted at {}", plugin_dir.display());

    let default_settings = derive_default_settings(&plugin_dir)?;
    if let Some(defaults) = &default_settings {
        write_plugin_settings(env, &descriptor.name, defaults)?;
    }

    register_plugin(
        env,
        PluginRegistration {
            id: manifest.id.clone(),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            action_keywords: vec![manifest.action_keyword.clone()],
        },
    )?;

    Ok(MaterializedPlugin {
        plugin_dir,
        execute_file: manifest.execute_file_name,
        default_settings,
    })
}
