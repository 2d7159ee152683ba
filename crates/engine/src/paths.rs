//! Project root discovery and the directories the runtime reads from.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub const ROOT_ENV_VAR: &str = "STRATEGOS_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub saves_dir: PathBuf,
}

impl AppPaths {
    /// Layout under an already-known root. Nothing is created.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
            saves_dir: root.join("saves"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{var} is not valid unicode: {value:?}")]
    NonUnicodeEnv {
        var: &'static str,
        value: std::ffi::OsString,
    },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("cannot create saves directory {path}: {source}")]
    CreateSavesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{var}={path} has no assets/base directory")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "no directory with assets/base found above {searched:?}; \
set {var} to the strategos checkout"
    )]
    RootNotFound {
        searched: Vec<PathBuf>,
        var: &'static str,
    },
}

/// Resolves the project root and makes sure the saves directory exists.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let paths = AppPaths::under(find_root()?);
    fs::create_dir_all(&paths.saves_dir).map_err(|source| StartupError::CreateSavesDir {
        path: paths.saves_dir.clone(),
        source,
    })?;
    debug!(root = %paths.root.display(), "app_paths_resolved");
    Ok(paths)
}

fn find_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let path = canonical(Path::new(&value));
            return if has_content(&path) {
                Ok(path)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path,
                })
            };
        }
        Err(env::VarError::NotUnicode(value)) => {
            return Err(StartupError::NonUnicodeEnv {
                var: ROOT_ENV_VAR,
                value,
            })
        }
        Err(env::VarError::NotPresent) => {}
    }

    let mut starts = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        starts.push(cwd);
    }
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    if let Some(dir) = exe.parent() {
        starts.push(dir.to_path_buf());
    }

    starts
        .iter()
        .find_map(|start| search_upward(start))
        .ok_or(StartupError::RootNotFound {
            searched: starts,
            var: ROOT_ENV_VAR,
        })
}

fn search_upward(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| has_content(dir))
        .map(canonical)
}

fn has_content(dir: &Path) -> bool {
    dir.join("assets").join("base").is_dir()
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn search_finds_nearest_ancestor_with_base_content() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("assets/base")).expect("assets");
        let nested = temp.path().join("target/debug/deps");
        fs::create_dir_all(&nested).expect("nested");

        let found = search_upward(&nested).expect("root");
        assert_eq!(found, canonical(temp.path()));
    }

    #[test]
    fn assets_without_base_is_not_a_root() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(!has_content(temp.path()));
    }

    #[test]
    fn layout_hangs_off_the_root() {
        let paths = AppPaths::under("/srv/strategos");
        assert_eq!(paths.saves_dir, PathBuf::from("/srv/strategos/saves"));
        assert_eq!(paths.mods_dir, PathBuf::from("/srv/strategos/mods"));
    }
}
