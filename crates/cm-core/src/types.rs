//! Common types used throughout Commesse

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque record identifier.
///
/// Historical data used both timestamp-derived strings and incrementing
/// integers; both are carried as their string form.
pub type RecordId = String;

/// Generate a fresh record identifier
pub fn new_record_id() -> RecordId {
    Uuid::new_v4().simple().to_string()
}

/// Current calendar date in the local time zone
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Partition of the record set a work order lives in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Shelf {
    #[default]
    Active,
    Archived,
}

impl Shelf {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Archived)
    }
}

impl std::fmt::Display for Shelf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_id_is_unique() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_shelf_serde() {
        assert_eq!(serde_json::to_string(&Shelf::Archived).unwrap(), "\"archived\"");
        assert!(Shelf::Archived.is_archived());
        assert!(!Shelf::default().is_archived());
    }
}
