//! Group keys with a canonical order

use serde::{Serialize, Serializer};
use std::cmp::Ordering;

use crate::periods::period_sort_key;

/// A grouping key.
///
/// Names order case-insensitively, periods chronologically (unrecognised
/// period labels such as `"No End Date"` sort last), composites
/// lexicographically by component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Name(String),
    Period(String),
    Composite(Vec<GroupKey>),
}

impl GroupKey {
    pub fn name(s: impl Into<String>) -> Self {
        GroupKey::Name(s.into())
    }

    pub fn period(s: impl Into<String>) -> Self {
        GroupKey::Period(s.into())
    }

    pub fn composite(parts: impl IntoIterator<Item = GroupKey>) -> Self {
        GroupKey::Composite(parts.into_iter().collect())
    }

    pub fn label(&self) -> String {
        match self {
            GroupKey::Name(s) | GroupKey::Period(s) => s.clone(),
            GroupKey::Composite(parts) => parts.iter().map(GroupKey::label).collect::<Vec<_>>().join(" / "),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            GroupKey::Name(_) => 0,
            GroupKey::Period(_) => 1,
            GroupKey::Composite(_) => 2,
        }
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupKey::Name(a), GroupKey::Name(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            (GroupKey::Period(a), GroupKey::Period(b)) => {
                let order = match (period_sort_key(a), period_sort_key(b)) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                order.then_with(|| a.cmp(b))
            }
            (GroupKey::Composite(a), GroupKey::Composite(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_case_insensitive() {
        let mut keys = vec![GroupKey::name("beta"), GroupKey::name("Alpha"), GroupKey::name("Gamma")];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(GroupKey::label).collect();
        assert_eq!(labels, vec!["Alpha", "beta", "Gamma"]);
    }

    #[test]
    fn test_periods_chronological_unknown_last() {
        let mut keys = vec![
            GroupKey::period("No End Date"),
            GroupKey::period("2025 Q1"),
            GroupKey::period("2024 Q10"),
            GroupKey::period("2024 Q2"),
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(GroupKey::label).collect();
        assert_eq!(labels, vec!["2024 Q2", "2024 Q10", "2025 Q1", "No End Date"]);
    }

    #[test]
    fn test_composite_order() {
        let a = GroupKey::composite([GroupKey::name("core"), GroupKey::period("2024 Q2")]);
        let b = GroupKey::composite([GroupKey::name("Core"), GroupKey::period("2024 Q1")]);
        let c = GroupKey::composite([GroupKey::name("api"), GroupKey::period("2025 Q1")]);
        let mut keys = vec![a.clone(), b.clone(), c.clone()];
        keys.sort();
        assert_eq!(keys, vec![c, b, a]);
    }
}
