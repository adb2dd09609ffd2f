//! Locating and loading tap map files

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{MapError, ResolvedMap};

/// Environment variable overriding map discovery
pub const MAP_ENV_VAR: &str = "TAPMAP";

/// File name searched for in the working directory and its ancestors
pub const MAP_FILE_NAME: &str = "default.tapmap.yaml";

/// Find the map to load: the override if given, else the nearest
/// `default.tapmap.yaml` at or above `start`.
///
/// An override path is returned as-is, even if it does not exist, so that
/// loading it reports the missing file instead of silently searching.
pub fn find_map_file_from(start: &Path, override_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        debug!("Using {MAP_ENV_VAR}={}", path.display());
        return Some(path);
    }
    start
        .ancestors()
        .map(|dir| dir.join(MAP_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Read and resolve a map file
pub fn load_map_file(path: &Path) -> Result<ResolvedMap, MapError> {
    let content = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let map: ResolvedMap = content.parse()?;
    info!("Loaded {} mode(s) from {}", map.len(), path.display());
    Ok(map)
}
