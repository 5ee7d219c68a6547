//! Store error types

use cm_core::error::CmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage quota exceeded writing {key}: {requested} bytes requested, limit {limit}")]
    QuotaExceeded {
        key: String,
        requested: u64,
        limit: u64,
    },

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for CmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QuotaExceeded {
                key,
                requested,
                limit,
            } => CmError::QuotaExceeded {
                key,
                requested,
                limit,
            },
            other => CmError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_maps_to_core_error() {
        let err: CmError = StoreError::QuotaExceeded {
            key: "k".into(),
            requested: 10,
            limit: 5,
        }
        .into();
        assert_eq!(err.error_code(), "quota_exceeded");

        let err: CmError = StoreError::InvalidKey(String::new()).into();
        assert_eq!(err.error_code(), "storage_error");
    }
}
