//! Depth and path computation relative to a named root

use std::collections::{HashMap, HashSet, VecDeque};

use super::exclusions::{normalize_name, ExclusionSet};
use super::team::Team;
use crate::error::{Error, Result};

/// Attach `depth`/`path` to every team, measured from the team named `root_name`.
///
/// The name index is last-write-wins: with duplicate names the later team
/// is taken as the root. Traversal is breadth-first with a visited set, so
/// cyclic parent pointers cannot loop; nodes reachable only through a cycle
/// keep `depth = None`.
pub fn resolve(mut teams: Vec<Team>, root_name: &str) -> Result<Vec<Team>> {
    let mut name_index: HashMap<&str, usize> = HashMap::new();
    let mut id_index: HashMap<&str, usize> = HashMap::new();
    for (idx, team) in teams.iter().enumerate() {
        id_index.insert(team.id.as_str(), idx);
        if team.has_name() {
            name_index.insert(team.name.as_str(), idx);
        }
    }

    let root_idx = *name_index
        .get(root_name)
        .ok_or_else(|| Error::not_found(format!("Parent team '{}' not found", root_name)))?;
    let root_id = teams[root_idx].id.clone();

    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, team) in teams.iter().enumerate() {
        if let Some(parent) = team.parent_id.as_deref() {
            if id_index.contains_key(parent) {
                children.entry(parent).or_default().push(idx);
            }
        }
    }

    let mut depth: HashMap<String, u32> = HashMap::new();
    let mut path: HashMap<String, Vec<String>> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    depth.insert(root_id.clone(), 0);
    path.insert(root_id.clone(), vec![root_name.to_string()]);
    visited.insert(root_id.clone());
    queue.push_back(root_id);

    while let Some(current) = queue.pop_front() {
        let current_depth = depth.get(&current).copied().unwrap_or_default();
        let current_path = path.get(&current).cloned().unwrap_or_default();

        for &child_idx in children.get(current.as_str()).map(Vec::as_slice).unwrap_or(&[]) {
            let child = &teams[child_idx];
            if !visited.insert(child.id.clone()) {
                continue;
            }

            let mut child_path = current_path.clone();
            if child.has_name() {
                child_path.push(child.name.clone());
            }

            depth.insert(child.id.clone(), current_depth + 1);
            path.insert(child.id.clone(), child_path);
            queue.push_back(child.id.clone());
        }
    }

    for team in teams.iter_mut() {
        team.depth = depth.get(&team.id).copied();
        team.path = path.get(&team.id).cloned().unwrap_or_default();
    }

    log::info!(
        "[hierarchy] {} of {} teams are under '{}'",
        visited.len(),
        teams.len(),
        root_name
    );
    Ok(teams)
}

/// Teams at exactly `depth`, minus excluded ids and names, sorted by name
pub fn select_at_depth(
    teams: &[Team],
    depth: u32,
    exclusions: &ExclusionSet,
    excluded_names: &[String],
) -> Vec<Team> {
    let excluded_names: HashSet<String> = excluded_names.iter().map(|n| normalize_name(n)).collect();

    let mut selected: Vec<Team> = teams
        .iter()
        .filter(|t| t.depth == Some(depth))
        .filter(|t| !exclusions.contains(&t.id))
        .filter(|t| !excluded_names.contains(&normalize_name(&t.name)))
        .cloned()
        .collect();

    sort_by_name(&mut selected);
    selected
}

/// Teams not reachable from the root, sorted by name
pub fn select_outside_root(teams: &[Team]) -> Vec<Team> {
    let mut selected: Vec<Team> = teams.iter().filter(|t| t.depth.is_none()).cloned().collect();
    sort_by_name(&mut selected);
    selected
}

/// Case-insensitive name order
pub fn sort_by_name(teams: &mut [Team]) {
    teams.sort_by_cached_key(|t| t.name.to_lowercase());
}
