use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::AppPaths;

#[derive(Debug, Clone, Default)]
pub struct ContentRequest {
    /// Mod directory names under `mods/`, in load order.
    pub enabled_mods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ContentDiscoveryError {
    #[error("enabled mod list contains an empty mod id")]
    EmptyEnabledMod,
    #[error("mod '{mod_id}' is enabled more than once")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod '{mod_id}' not found at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub mod_load_index: u32,
    pub source_dir: PathBuf,
}

pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Vec<ModSource>, ContentDiscoveryError> {
    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ModSource {
        mod_id: "base".to_string(),
        mod_load_index: 0,
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for (idx, mod_id) in request.enabled_mods.iter().enumerate() {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentDiscoveryError::EmptyEnabledMod);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(ContentDiscoveryError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        ensure_dir_exists(trimmed, &mod_dir)?;
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            mod_load_index: (idx + 1) as u32,
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

fn ensure_dir_exists(mod_id: &str, path: &Path) -> Result<(), ContentDiscoveryError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ContentDiscoveryError::EnabledModMissing {
            mod_id: mod_id.to_string(),
            expected_dir: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn app_paths(root: &Path) -> AppPaths {
        AppPaths {
            root: root.to_path_buf(),
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
            saves_dir: root.join("saves"),
        }
    }

    #[test]
    fn base_is_first_then_enabled_order() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("assets").join("base")).expect("create base");
        fs::create_dir_all(root.join("mods").join("sparta")).expect("create mod sparta");
        fs::create_dir_all(root.join("mods").join("ionia")).expect("create mod ionia");
        let request = ContentRequest {
            enabled_mods: vec!["sparta".to_string(), " ionia ".to_string()],
        };

        let sources = discover_mod_sources(&app_paths(root), &request).expect("discover");
        let ids = sources
            .iter()
            .map(|source| (source.mod_id.as_str(), source.mod_load_index))
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![("base", 0), ("sparta", 1), ("ionia", 2)]);
    }

    #[test]
    fn missing_or_repeated_mods_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("mods").join("sparta")).expect("create mod");

        let missing = discover_mod_sources(
            &app_paths(root),
            &ContentRequest {
                enabled_mods: vec!["thebes".to_string()],
            },
        )
        .expect_err("missing mod");
        assert!(matches!(
            missing,
            ContentDiscoveryError::EnabledModMissing { .. }
        ));

        let repeated = discover_mod_sources(
            &app_paths(root),
            &ContentRequest {
                enabled_mods: vec!["sparta".to_string(), "sparta".to_string()],
            },
        )
        .expect_err("repeated mod");
        assert!(matches!(
            repeated,
            ContentDiscoveryError::DuplicateEnabledMod { .. }
        ));
    }
}
