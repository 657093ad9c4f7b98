//! Data validation utilities.
//!
//! Builds the same [`GameData`] registry a server builds at startup, so a
//! directory that validates here cannot fail the static-load check later.

use std::path::Path;

use skirmish_core::data::GameData;
use skirmish_core::simulation::MatchConfig;
use tracing::info;

use crate::loader::{load_factions, load_match_config};
use crate::Result;

/// Counts for one validated faction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactionSummary {
    /// Faction id.
    pub id: String,
    /// Unit types.
    pub units: usize,
    /// Building types.
    pub buildings: usize,
    /// Weapon templates.
    pub weapons: usize,
    /// Building-stat research entries.
    pub stat_research: usize,
    /// Unit-unlock tech nodes.
    pub unit_tech: usize,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// One entry per faction, in id order.
    pub factions: Vec<FactionSummary>,
    /// The match config, when the directory has one.
    pub match_config: Option<MatchConfig>,
}

/// Validate all data under `path`.
///
/// Factions are read from `path/factions` when that directory exists and
/// from `path` itself otherwise. A `match.ron` beside them is parsed too.
///
/// # Errors
///
/// Returns the first read, parse or integrity error.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport> {
    let factions_dir = path.join("factions");
    let factions_dir = if factions_dir.is_dir() { factions_dir } else { path.to_path_buf() };

    let data = GameData::new(load_factions(&factions_dir)?)?;
    let factions = data
        .factions()
        .map(|f| FactionSummary {
            id: f.id.to_string(),
            units: f.units.len(),
            buildings: f.buildings.len(),
            weapons: f.weapons.len(),
            stat_research: f.stat_research.len(),
            unit_tech: f.unit_tech.len(),
        })
        .collect();

    let config_path = path.join("match.ron");
    let match_config = if config_path.is_file() {
        Some(load_match_config(&config_path)?)
    } else {
        None
    };

    info!(dir = %factions_dir.display(), "Data validated");
    Ok(ValidationReport {
        factions,
        match_config,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::ToolError;
    use skirmish_core::error::GameError;
    use skirmish_test_utils::fixtures::{NEUTRAL_RON, SAMPLE_FACTION_RON};

    fn data_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let factions = dir.path().join("factions");
        fs::create_dir(&factions).unwrap();
        fs::write(factions.join("sample.ron"), SAMPLE_FACTION_RON).unwrap();
        fs::write(factions.join("neutral.ron"), NEUTRAL_RON).unwrap();
        dir
    }

    #[test]
    fn test_validates_sample_data() {
        let dir = data_dir();
        let report = validate_data_directory(dir.path()).unwrap();
        let ids: Vec<_> = report.factions.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["neutral", "sample"]);
        assert_eq!(report.factions[1].unit_tech, 3);
        assert!(report.match_config.is_none());
    }

    #[test]
    fn test_reads_match_config() {
        let dir = data_dir();
        fs::write(dir.path().join("match.ron"), "(seed: 9)").unwrap();
        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.match_config.unwrap().seed, 9);
    }

    #[test]
    fn test_duplicate_ids_across_files_fail() {
        let dir = data_dir();
        let copy = SAMPLE_FACTION_RON.replacen("id: \"sample\"", "id: \"copycat\"", 1);
        fs::write(dir.path().join("factions/copycat.ron"), copy).unwrap();
        assert!(matches!(
            validate_data_directory(dir.path()),
            Err(ToolError::Game(GameError::DuplicateId { .. }))
        ));
    }

    #[test]
    fn test_dangling_reference_fails() {
        let dir = data_dir();
        let broken = SAMPLE_FACTION_RON.replace("prerequisites: [\"hardened_rounds\"]", "prerequisites: [\"ghost\"]");
        fs::write(dir.path().join("factions/sample.ron"), broken).unwrap();
        assert!(matches!(
            validate_data_directory(dir.path()),
            Err(ToolError::Game(GameError::InvalidFactionData { .. }))
        ));
    }

    #[test]
    fn test_bundled_assets_validate() {
        let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/data");
        let report = validate_data_directory(&assets).unwrap();
        assert_eq!(report.factions.len(), 3);
        assert!(report.match_config.is_some());
    }
}
