//! Team records parsed from the provider's loosely shaped payload

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys holding an embedded parent object
const PARENT_OBJECT_KEYS: [&str; 3] = ["parent", "parentTeam", "parent_team"];
/// Keys holding a flattened parent id
const PARENT_ID_KEYS: [&str; 4] = ["parent_team_id", "parentTeamId", "parent_id", "parentId"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    /// Empty when the provider sent no name
    pub name: String,
    pub parent_id: Option<String>,
    /// Distance from the resolved root; `None` if unreachable
    pub depth: Option<u32>,
    /// Root-to-node name chain
    pub path: Vec<String>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: parent_id.map(str::to_string),
            depth: None,
            path: Vec::new(),
        }
    }

    /// Parse one team item; items without an id are skipped
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = id_of(value)?;
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(Self {
            id,
            name,
            parent_id: parent_id_of(value),
            depth: None,
            path: Vec::new(),
        })
    }

    /// Parse a page of items, dropping id-less entries
    pub fn from_values(values: &[Value]) -> Vec<Self> {
        values
            .iter()
            .filter_map(|v| {
                let team = Team::from_value(v);
                if team.is_none() {
                    log::warn!("[hierarchy] Skipping team without id: {}", v);
                }
                team
            })
            .collect()
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Where a team's parent reference was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// `parent`/`parentTeam`/`parent_team` object carrying an id
    Embedded(String),
    /// One of the flattened `*parent*id` keys
    Flat(String),
}

impl ParentRef {
    /// First matching shape wins: embedded object, then flattened keys
    pub fn extract(value: &Value) -> Option<Self> {
        let embedded = PARENT_OBJECT_KEYS
            .iter()
            .filter_map(|key| value.get(*key))
            .find(|v| truthy(v));

        if let Some(parent) = embedded {
            if parent.is_object() {
                return id_of(parent).map(ParentRef::Embedded);
            }
        }

        PARENT_ID_KEYS
            .iter()
            .filter_map(|key| value.get(*key))
            .find(|v| truthy(v))
            .and_then(scalar_to_string)
            .map(ParentRef::Flat)
    }

    pub fn into_id(self) -> String {
        match self {
            ParentRef::Embedded(id) | ParentRef::Flat(id) => id,
        }
    }
}

pub fn parent_id_of(value: &Value) -> Option<String> {
    ParentRef::extract(value).map(ParentRef::into_id)
}

/// `id`, falling back to `_id`; numbers are rendered as strings
pub fn id_of(value: &Value) -> Option<String> {
    ["id", "_id"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find(|v| truthy(v))
        .and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
