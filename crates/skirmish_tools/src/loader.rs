//! Reading faction documents from disk.

use std::fs;
use std::path::{Path, PathBuf};

use skirmish_core::data::{parse_faction, FactionData};
use skirmish_core::simulation::MatchConfig;
use tracing::debug;

use crate::{Result, ToolError};

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Every `*.ron` file directly inside `dir`, sorted by name.
pub fn ron_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| ToolError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| ToolError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "ron") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse one faction file.
pub fn load_faction(path: &Path) -> Result<FactionData> {
    let text = read(path)?;
    let faction = parse_faction(&text, &path.display().to_string())?;
    debug!(path = %path.display(), faction = %faction.id, "Faction loaded");
    Ok(faction)
}

/// Parse every faction file in `dir`.
pub fn load_factions(dir: &Path) -> Result<Vec<FactionData>> {
    let files = ron_files(dir)?;
    if files.is_empty() {
        return Err(ToolError::NoFactions(dir.to_path_buf()));
    }
    files.iter().map(|path| load_faction(path)).collect()
}

/// Parse a match config file.
pub fn load_match_config(path: &Path) -> Result<MatchConfig> {
    let text = read(path)?;
    Ok(MatchConfig::from_ron(&text)?)
}
