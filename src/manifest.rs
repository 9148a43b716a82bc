//! Plugin manifest loading and candidate selection.
//!
//! The manifest is an ordered JSON array of plugin descriptors maintained
//! outside this harness; it is consumed read-only. Selection walks the
//! array from the most recently appended entry backwards, so the newest
//! untested plugin wins.

use crate::error::{ManifestError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// One entry of the launcher's plugin manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginDescriptor {
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub version: String,
    pub language: String,
    pub url_source_code: Option<String>,
    pub url_download: Option<String>,
    /// Presence marks the plugin as already verified; absence means untested.
    pub tested: Option<bool>,
}

/// Load the manifest from a local path or an http(s) URL.
pub async fn load(source: &str, client: &reqwest::Client) -> Result<Vec<PluginDescriptor>> {
    let raw = if source.starts_with("http://") || source.starts_with("https://") {
        debug!("fetching manifest from {source}");
        let response = client
            .get(source)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ManifestError::Fetch {
                url: source.to_string(),
                reason: e.to_string(),
            })?;
        response.text().await.map_err(|e| ManifestError::Fetch {
            url: source.to_string(),
            reason: e.to_string(),
        })?
    } else {
        std::fs::read_to_string(source).map_err(|e| ManifestError::Read {
            path: PathBuf::from(source),
            reason: e.to_string(),
        })?
    };

    let manifest: Vec<PluginDescriptor> =
        serde_json::from_str(&raw).map_err(|e| ManifestError::Parse(e.to_string()))?;
    Ok(manifest)
}

/// Outcome of scanning the manifest for a test candidate.
///
/// `UnsupportedHost` and `NoneUntested` are distinct terminal outcomes:
/// the former is a deliberate "nothing to do" (clean exit), the latter a
/// failure of the run.
#[derive(Debug, PartialEq)]
pub enum Selection<'a> {
    /// Newest untested descriptor in the target language, hosted on the
    /// supported platform.
    Candidate(&'a PluginDescriptor),
    /// An untested candidate exists but its source is not on the supported
    /// code-hosting platform.
    UnsupportedHost { name: String },
    /// Every descriptor in the target language is already tested.
    NoneUntested,
}

/// Pick the most recently appended descriptor matching the target language
/// with no `Tested` mark.
pub fn select_candidate<'a>(
    manifest: &'a [PluginDescriptor],
    language: &str,
    supported_host: &str,
) -> Selection<'a> {
    for descriptor in manifest.iter().rev() {
        if descriptor.language != language || descriptor.tested.is_some() {
            continue;
        }
        let on_supported_host = descriptor
            .url_source_code
            .as_deref()
            .is_some_and(|url| url.contains(supported_host));
        if !on_supported_host {
            return Selection::UnsupportedHost {
                name: descriptor.name.clone(),
            };
        }
        return Selection::Candidate(descriptor);
    }
    Selection::NoneUntested
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, tested: bool, source: &str) -> PluginDescriptor {
        PluginDescriptor {
            name: id.to_string(),
            id: id.to_string(),
            version: "1.0.0".to_string(),
            language: "python".to_string(),
            url_source_code: Some(source.to_string()),
            url_download: None,
            tested: tested.then_some(true),
        }
    }

    #[test]
    fn newest_untested_supported_plugin_wins() {
        let manifest = vec![
            descriptor("a", true, "https://github.com/x/a"),
            descriptor("b", false, "https://example.org/x/b"),
            descriptor("c", false, "https://github.com/x/c"),
        ];
        match select_candidate(&manifest, "python", "github.com") {
            Selection::Candidate(found) => assert_eq!(found.id, "c"),
            other => panic!("expected candidate, got {other:?}"),
        }
    }

    #[test]
    fn later_entry_beats_earlier_entry() {
        let manifest = vec![
            descriptor("c", false, "https://github.com/x/c"),
            descriptor("d", false, "https://github.com/x/d"),
        ];
        match select_candidate(&manifest, "python", "github.com") {
            Selection::Candidate(found) => assert_eq!(found.id, "d"),
            other => panic!("expected candidate, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_host_is_reported_not_skipped() {
        let manifest = vec![
            descriptor("c", false, "https://github.com/x/c"),
            descriptor("d", false, "https://gitlab.com/x/d"),
        ];
        assert_eq!(
            select_candidate(&manifest, "python", "github.com"),
            Selection::UnsupportedHost {
                name: "d".to_string()
            }
        );
    }

    #[test]
    fn missing_source_url_counts_as_unsupported_host() {
        let mut entry = descriptor("e", false, "");
        entry.url_source_code = None;
        let manifest = vec![entry];
        assert!(matches!(
            select_candidate(&manifest, "python", "github.com"),
            Selection::UnsupportedHost { .. }
        ));
    }

    #[test]
    fn all_tested_yields_no_candidate() {
        let manifest = vec![
            descriptor("a", true, "https://github.com/x/a"),
            descriptor("b", true, "https://github.com/x/b"),
        ];
        assert_eq!(
            select_candidate(&manifest, "python", "github.com"),
            Selection::NoneUntested
        );
    }

    #[test]
    fn other_languages_are_ignored() {
        let mut entry = descriptor("js", false, "https://github.com/x/js");
        entry.language = "javascript".to_string();
        let manifest = vec![entry];
        assert_eq!(
            select_candidate(&manifest, "python", "github.com"),
            Selection::NoneUntested
        );
    }

    #[test]
    fn descriptor_parses_manifest_wire_names() {
        let raw = r#"{
            "Name": "Example",
            "ID": "abc-123",
            "Version": "2.1.0",
            "Language": "python",
            "UrlSourceCode": "https://github.com/owner/repo",
            "Tested": true
        }"#;
        let descriptor: PluginDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.name, "Example");
        assert_eq!(descriptor.id, "abc-123");
        assert_eq!(descriptor.tested, Some(true));
        assert!(descriptor.url_download.is_none());
    }
}
