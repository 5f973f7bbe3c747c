//! Persisted team exclusions
//!
//! Ids are discovered by name once and then stored as a sorted JSON array,
//! so later renames do not change which teams are excluded.

use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

use super::team::Team;
use crate::error::Result;

/// Trimmed, lowercased team name
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    ids: BTreeSet<String>,
}

impl ExclusionSet {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Read the side file. A missing or unreadable file yields an empty set.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));

        match parsed {
            Ok(Value::Array(items)) => Self::from_ids(items.iter().filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })),
            Ok(other) => {
                log::warn!(
                    "[exclusions] {} is not a JSON array ({}), ignoring",
                    path.display(),
                    other
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("[exclusions] Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the ids as a sorted JSON array
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let ids: Vec<&str> = self.ids().collect();
        std::fs::write(path, serde_json::to_string(&ids)?)?;
        Ok(())
    }

    /// Ids of teams whose normalized name is in `names`
    pub fn discover(teams: &[Team], names: &[String]) -> Self {
        let wanted: BTreeSet<String> = names.iter().map(|n| normalize_name(n)).collect();
        Self::from_ids(
            teams
                .iter()
                .filter(|t| wanted.contains(&normalize_name(&t.name)))
                .map(|t| t.id.clone()),
        )
    }

    /// The persisted set, or, when it is empty, ids discovered by name.
    ///
    /// Reads the file once and writes it at most once, only when discovery
    /// found something. A failed write is logged and the discovered set is
    /// still used for this run.
    pub fn load_or_discover(path: &Path, teams: &[Team], names: &[String]) -> Self {
        let persisted = Self::load(path);
        if !persisted.is_empty() {
            log::info!(
                "[exclusions] Using {} persisted ids from {}",
                persisted.len(),
                path.display()
            );
            return persisted;
        }

        let discovered = Self::discover(teams, names);
        if !discovered.is_empty() {
            match discovered.save(path) {
                Ok(()) => log::info!(
                    "[exclusions] Persisted {} discovered ids to {}",
                    discovered.len(),
                    path.display()
                ),
                Err(e) => log::warn!("[exclusions] Could not write {}: {}", path.display(), e),
            }
        }
        discovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Payments QA "), "payments qa");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(ExclusionSet::load(&dir.path().join("none.json")).is_empty());
    }

    #[test]
    fn test_load_accepts_numbers_and_strings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded.json");
        std::fs::write(&path, r#"["12", 34]"#).unwrap();

        let set = ExclusionSet::load(&path);
        assert!(set.contains("12"));
        assert!(set.contains("34"));
    }

    #[test]
    fn test_load_invalid_json_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ExclusionSet::load(&path).is_empty());

        std::fs::write(&path, r#"{"ids": [1]}"#).unwrap();
        assert!(ExclusionSet::load(&path).is_empty());
    }

    #[test]
    fn test_save_writes_sorted_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("excluded.json");
        ExclusionSet::from_ids(["b", "a", "c"]).save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"["a","b","c"]"#);
    }

    #[test]
    fn test_discovery_persists_then_survives_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded.json");
        let names = vec!["Payments QA".to_string()];

        let first_run = vec![Team::new("10", "payments qa ", None), Team::new("11", "Checkout", None)];
        let set = ExclusionSet::load_or_discover(&path, &first_run, &names);
        assert!(set.contains("10"));
        assert!(path.exists());

        // renamed upstream, still excluded by id
        let second_run = vec![Team::new("10", "Quality Guild", None), Team::new("11", "Checkout", None)];
        let set = ExclusionSet::load_or_discover(&path, &second_run, &names);
        assert!(set.contains("10"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_persisted_set_skips_rediscovery() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded.json");
        std::fs::write(&path, r#"["99"]"#).unwrap();

        let teams = vec![Team::new("10", "Payments QA", None)];
        let set = ExclusionSet::load_or_discover(&path, &teams, &["payments qa".to_string()]);
        assert!(set.contains("99"));
        assert!(!set.contains("10"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"["99"]"#);
    }

    #[test]
    fn test_nothing_discovered_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded.json");
        let set = ExclusionSet::load_or_discover(&path, &[Team::new("1", "Core", None)], &["qa".to_string()]);
        assert!(set.is_empty());
        assert!(!path.exists());
    }
}
