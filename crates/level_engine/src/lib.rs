use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod atomic_io;
pub mod codec;
pub mod config;
pub mod level;
pub mod pipeline;
pub mod runtime;

pub use codec::{
    classify_payload, decode_level_string, encode_level_string, DecodeConfig, DecodeError,
    Decompressor, EncodeError, PayloadKind,
};
pub use config::{EngineConfig, SimulationConfig, SourceLayout};
pub use level::{
    parse_body, parse_fields, parse_header, parse_objects, write_level_file, ExportError,
    FieldValue, FsStorage, GroupId, LevelDocument, LevelField, LevelHeader, LevelSource,
    LevelSourceResolver, LevelStorage, MemoryStorage, ObjectId, ObjectKind, ObjectRecord,
    ParseIssue, Vec2,
};
pub use pipeline::{build_runtime_level, LevelLoadError, LevelLoader, LoadedLevel};
pub use runtime::{
    Easing, EditQueueError, EditSender, LevelEdit, MoveCommand, MoveHandle, MoveScheduler,
    MoveState, PlacedObject, RuntimeLevel, SectionIndex, TickReport,
};

pub const ROOT_ENV_VAR: &str = "LEVEL_ENGINE_ROOT";

#[derive(Debug, Clone)]
pub struct LevelPaths {
    pub root: PathBuf,
    pub levels_dir: PathBuf,
    pub archive_path: PathBuf,
}

impl LevelPaths {
    pub fn from_root(root: PathBuf, layout: &SourceLayout) -> Self {
        Self {
            levels_dir: root.join(&layout.levels_dir),
            archive_path: root.join(&layout.archive_path),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{var} is set but does not point to a level data root: {path}\n\
A valid root must contain Cargo.toml and either levels/ or Custom/."
    )]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "Could not find a level data root by walking upward from: {start_dir}\n\
Expected a directory containing Cargo.toml and either levels/ or Custom/.\n\
Pass --root or set {env_var}, for example:\n\
export {env_var}=\"/path/to/levels-project\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Finds the level data root: an explicit path wins, then `LEVEL_ENGINE_ROOT`,
/// then the nearest marked ancestor of the running executable.
pub fn resolve_level_paths(
    explicit_root: Option<&Path>,
    layout: &SourceLayout,
) -> Result<LevelPaths, StartupError> {
    let root = match explicit_root {
        Some(root) => normalize_path(root),
        None => resolve_root()?,
    };
    Ok(LevelPaths::from_root(root, layout))
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_root_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path: normalized,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            find_marked_ancestor(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_marked_ancestor(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_root_marker(candidate))
        .map(normalize_path)
}

fn is_root_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_levels = path.join("levels").is_dir();
    let has_archive_dir = path.join("Custom").is_dir();

    cargo_toml && (has_levels || has_archive_dir)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn root_marker_requires_cargo_toml_and_level_dir() {
        let temp = TempDir::new().expect("temp");
        assert!(!is_root_marker(temp.path()));

        fs::create_dir_all(temp.path().join("levels")).expect("levels");
        assert!(!is_root_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo");
        assert!(is_root_marker(temp.path()));
    }

    #[test]
    fn marked_ancestor_is_found_from_nested_dir() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("Custom")).expect("custom");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo");
        let nested = temp.path().join("target").join("debug");
        fs::create_dir_all(&nested).expect("nested");

        let found = find_marked_ancestor(&nested).expect("found");
        assert_eq!(found, normalize_path(temp.path()));
    }

    #[test]
    fn explicit_root_builds_layout_paths() {
        let temp = TempDir::new().expect("temp");
        let paths = resolve_level_paths(Some(temp.path()), &SourceLayout::default())
            .expect("paths");
        assert_eq!(paths.root, normalize_path(temp.path()));
        assert_eq!(paths.levels_dir, paths.root.join("levels"));
        assert_eq!(
            paths.archive_path,
            paths.root.join("Custom").join("mainLevels.json")
        );
    }
}
