//! Storage keys and blob shapes for every layout ever written

use cm_core::types::{RecordId, Shelf};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current sharded index
pub const INDEX_KEY: &str = "commesse:v2:index";
/// Current per-record key prefix
pub const RECORD_PREFIX: &str = "commesse:v2:job:";
/// Current monolithic blob
pub const MONOLITH_KEY: &str = "commesse:v2:all";

pub const CURRENT_VERSION: u32 = 2;

/// Sharded layout of release 0.7
pub const V07_INDEX_KEY: &str = "IdeaLegnoApp_V0_7:index";
pub const V07_RECORD_PREFIX: &str = "IdeaLegnoApp_V0_7:job:";
/// Monolithic blob of release 1.6: `{commesse: [...]}`
pub const V16_KEY: &str = "IdeaLegnoApp_V1_6";
/// Monolithic blob of release 0.5: `{attivi, archivio | archivi}`
pub const V05_KEY: &str = "IdeaLegnoApp_V0_5_COMPLETE";

pub fn record_key(id: &str) -> String {
    format!("{}{}", RECORD_PREFIX, id)
}

pub fn v07_record_key(id: &str) -> String {
    format!("{}{}", V07_RECORD_PREFIX, id)
}

/// Ids per shelf in display order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShardIndex {
    pub version: u32,
    #[serde(default)]
    pub active_ids: Vec<RecordId>,
    #[serde(default)]
    pub archived_ids: Vec<RecordId>,
}

impl Default for ShardIndex {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            active_ids: Vec::new(),
            archived_ids: Vec::new(),
        }
    }
}

impl ShardIndex {
    pub fn ids(&self, shelf: Shelf) -> &[RecordId] {
        match shelf {
            Shelf::Active => &self.active_ids,
            Shelf::Archived => &self.archived_ids,
        }
    }

    pub fn shelf_of(&self, id: &str) -> Option<Shelf> {
        if self.active_ids.iter().any(|i| i == id) {
            Some(Shelf::Active)
        } else if self.archived_ids.iter().any(|i| i == id) {
            Some(Shelf::Archived)
        } else {
            None
        }
    }

    /// Place `id` on `shelf`: kept in position if already there, otherwise
    /// moved to the front.
    pub fn place(&mut self, id: &str, shelf: Shelf) {
        if self.shelf_of(id) == Some(shelf) {
            return;
        }
        self.forget(id);
        let list = match shelf {
            Shelf::Active => &mut self.active_ids,
            Shelf::Archived => &mut self.archived_ids,
        };
        list.insert(0, id.to_string());
    }

    pub fn forget(&mut self, id: &str) {
        self.active_ids.retain(|i| i != id);
        self.archived_ids.retain(|i| i != id);
    }
}

/// Single blob holding every record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonolithBlob {
    pub version: u32,
    #[serde(default)]
    pub active: Vec<Value>,
    #[serde(default)]
    pub archived: Vec<Value>,
}

impl Default for MonolithBlob {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            active: Vec::new(),
            archived: Vec::new(),
        }
    }
}

/// Index written by release 0.7; ids were numbers or strings
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct V07Index {
    #[serde(default)]
    pub attivi_ids: Vec<Value>,
    #[serde(default)]
    pub archivi_ids: Vec<Value>,
}

/// Blob written by release 0.5
#[derive(Debug, Clone, Deserialize, Default)]
pub struct V05Blob {
    #[serde(default)]
    pub attivi: Option<Vec<Value>>,
    #[serde(default)]
    pub archivio: Option<Vec<Value>>,
    #[serde(default)]
    pub archivi: Option<Vec<Value>>,
}

impl V05Blob {
    pub fn is_recognized(&self) -> bool {
        self.attivi.is_some() || self.archivio.is_some() || self.archivi.is_some()
    }
}

/// Blob written by release 1.6
#[derive(Debug, Clone, Deserialize, Default)]
pub struct V16Blob {
    #[serde(default)]
    pub commesse: Vec<Value>,
}

/// Id as stored: strings verbatim, numbers in decimal
pub fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_place_and_forget() {
        let mut index = ShardIndex::default();
        index.place("a", Shelf::Active);
        index.place("b", Shelf::Active);
        assert_eq!(index.active_ids, vec!["b", "a"]);

        index.place("a", Shelf::Active);
        assert_eq!(index.active_ids, vec!["b", "a"]);

        index.place("a", Shelf::Archived);
        assert_eq!(index.active_ids, vec!["b"]);
        assert_eq!(index.shelf_of("a"), Some(Shelf::Archived));

        index.forget("a");
        assert_eq!(index.shelf_of("a"), None);
    }

    #[test]
    fn test_index_wire_shape() {
        let value = serde_json::to_value(ShardIndex::default()).unwrap();
        assert_eq!(value, json!({"version": 2, "activeIds": [], "archivedIds": []}));
    }

    #[test]
    fn test_id_to_string() {
        assert_eq!(id_to_string(&json!(17)).as_deref(), Some("17"));
        assert_eq!(id_to_string(&json!("abc")).as_deref(), Some("abc"));
        assert_eq!(id_to_string(&json!(null)), None);
    }
}
