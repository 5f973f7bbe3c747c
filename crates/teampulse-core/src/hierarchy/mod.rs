//! Team hierarchy resolution
//!
//! Builds a tree over a flat team list, computes depth/path relative to a
//! named root and filters by a persisted exclusion set.

pub mod exclusions;
pub mod resolver;
pub mod team;

pub use exclusions::{normalize_name, ExclusionSet};
pub use resolver::{resolve, select_at_depth, select_outside_root, sort_by_name};
pub use team::{ParentRef, Team};

use crate::config::HierarchyConfig;
use crate::error::{Error, Result};

/// Resolve `teams` under the configured root and pick the configured depth.
///
/// Returns every resolved team alongside the selection, since callers
/// working with "everything outside the root" need the full population.
pub fn teams_at_configured_depth(
    teams: Vec<Team>,
    config: &HierarchyConfig,
    root_override: Option<&str>,
    depth_override: Option<u32>,
) -> Result<(Vec<Team>, Vec<Team>)> {
    let root = root_override
        .or(config.root_name.as_deref())
        .ok_or_else(|| Error::config("No root team configured (hierarchy.root_name)"))?;
    let depth = depth_override.unwrap_or(config.depth);

    let resolved = resolve(teams, root)?;
    let exclusions = ExclusionSet::load_or_discover(&config.exclusion_file, &resolved, &config.excluded_names);
    let selected = select_at_depth(&resolved, depth, &exclusions, &config.excluded_names);

    log::info!(
        "[hierarchy] {} teams at depth {} under '{}' ({} excluded ids)",
        selected.len(),
        depth,
        root,
        exclusions.len()
    );
    Ok((resolved, selected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_teams_at_configured_depth() {
        let dir = TempDir::new().unwrap();
        let config = HierarchyConfig {
            root_name: Some("Org".to_string()),
            depth: 1,
            excluded_names: vec!["QA".to_string()],
            exclusion_file: dir.path().join("excluded.json"),
        };
        let teams = vec![
            Team::new("1", "Org", None),
            Team::new("2", "Web", Some("1")),
            Team::new("3", "qa", Some("1")),
            Team::new("4", "Other", None),
        ];

        let (all, selected) = teams_at_configured_depth(teams, &config, None, None).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Web");
        assert!(config.exclusion_file.exists());
    }

    #[test]
    fn test_missing_root_config() {
        let config = HierarchyConfig::default();
        let err = teams_at_configured_depth(Vec::new(), &config, None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
