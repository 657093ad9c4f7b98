//! Research tree rendering.

use std::collections::BTreeMap;
use std::fmt::Write;

use skirmish_core::data::FactionData;

/// Which research track an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Track {
    /// Building-stat research.
    Stat,
    /// Unit-unlock tech.
    UnitTech,
}

/// One research entry placed in prerequisite order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Research id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Track.
    pub track: Track,
    /// Length of the longest prerequisite chain below this entry.
    pub depth: usize,
    /// One-line summary of requirements and effects.
    pub detail: String,
}

struct Node<'a> {
    id: &'a str,
    name: &'a str,
    track: Track,
    prerequisites: &'a [String],
    detail: String,
}

fn nodes(faction: &FactionData) -> Vec<Node<'_>> {
    let stat = faction.stat_research.iter().map(|r| {
        let mut detail = format!("{} res, {}s, at {}", r.cost, r.duration_ms / 1000, r.required_building);
        if r.unlocks_research_slot {
            detail.push_str(", +1 research slot");
        }
        Node {
            id: &r.id,
            name: &r.name,
            track: Track::Stat,
            prerequisites: &r.prerequisites,
            detail,
        }
    });
    let tech = faction.unit_tech.iter().map(|t| {
        let mut detail = format!("{} res, {}s, tier {}", t.cost, t.duration_ms / 1000, t.required_tier);
        if let Some(building) = &t.required_building {
            let _ = write!(detail, ", at {building}");
        }
        if let Some(unit) = &t.unlocks_unit {
            let _ = write!(detail, ", unlocks {unit}");
        }
        if let Some(unit) = &t.replaces_unit {
            let _ = write!(detail, ", replaces {unit}");
        }
        if !t.exclusive_with.is_empty() {
            let _ = write!(detail, ", excludes {}", t.exclusive_with.join(" "));
        }
        Node {
            id: &t.id,
            name: &t.name,
            track: Track::UnitTech,
            prerequisites: &t.prerequisites,
            detail,
        }
    });
    stat.chain(tech).collect()
}

/// Every research entry of a faction, prerequisites first.
///
/// Within one pass entries keep declaration order. Entries whose
/// prerequisites can never be satisfied (unknown ids or cycles) are left
/// out; a validated faction has none.
#[must_use]
pub fn research_order(faction: &FactionData) -> Vec<TreeEntry> {
    let mut pending = nodes(faction);
    let mut depth: BTreeMap<String, usize> = BTreeMap::new();
    let mut ordered = Vec::new();

    loop {
        let (ready, blocked): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|n| n.prerequisites.iter().all(|p| depth.contains_key(p)));
        if ready.is_empty() {
            break;
        }
        for node in ready {
            let level = node
                .prerequisites
                .iter()
                .filter_map(|p| depth.get(p))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            ordered.push(TreeEntry {
                id: node.id.to_string(),
                name: node.name.to_string(),
                track: node.track,
                depth: level,
                detail: node.detail,
            });
        }
        for entry in &ordered[depth.len()..] {
            depth.insert(entry.id.clone(), entry.depth);
        }
        pending = blocked;
    }

    ordered
}

/// Human-readable research tree of a faction.
#[must_use]
pub fn render_tree(faction: &FactionData) -> String {
    let entries = research_order(faction);
    let mut out = format!("{} ({})\n", faction.display_name, faction.id);

    for (track, title) in [(Track::Stat, "Building-stat research"), (Track::UnitTech, "Unit tech")] {
        let _ = writeln!(out, "\n{title}");
        for entry in entries.iter().filter(|e| e.track == track) {
            let indent = "  ".repeat(entry.depth + 1);
            let _ = writeln!(out, "{indent}{} - {} ({})", entry.id, entry.name, entry.detail);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_test_utils::fixtures::sample_faction;

    fn position(entries: &[TreeEntry], id: &str) -> usize {
        entries.iter().position(|e| e.id == id).unwrap()
    }

    #[test]
    fn test_prerequisites_come_first() {
        let entries = research_order(&sample_faction());
        assert_eq!(entries.len(), 10);
        assert!(position(&entries, "hardened_rounds") < position(&entries, "tungsten_cores"));
        assert!(position(&entries, "parallel_labs") < position(&entries, "research_grid"));
        assert!(position(&entries, "armor_doctrine") < position(&entries, "heavy_armor"));
    }

    #[test]
    fn test_depth_follows_longest_chain() {
        let entries = research_order(&sample_faction());
        let depth = |id| entries[position(&entries, id)].depth;
        assert_eq!(depth("hardened_rounds"), 0);
        assert_eq!(depth("tungsten_cores"), 1);
        assert_eq!(depth("heavy_armor"), 1);
    }

    #[test]
    fn test_cyclic_entries_are_left_out() {
        let mut faction = sample_faction();
        faction.stat_research[0].prerequisites = vec!["tungsten_cores".to_string()];
        let entries = research_order(&faction);
        assert!(entries.iter().all(|e| e.id != "hardened_rounds" && e.id != "tungsten_cores"));
    }

    #[test]
    fn test_render_mentions_unlocks_and_exclusions() {
        let text = render_tree(&sample_faction());
        assert!(text.starts_with("Sample Expeditionary Force (sample)"));
        assert!(text.contains("unlocks heavy_tank, replaces tank"));
        assert!(text.contains("excludes air_doctrine"));
        assert!(text.contains("    tungsten_cores"));
    }
}
