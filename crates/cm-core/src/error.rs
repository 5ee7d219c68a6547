//! Core error types for Commesse

use std::collections::BTreeMap;
use thiserror::Error;

/// Core error type for all record operations
#[derive(Error, Debug)]
pub enum CmError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage quota exceeded writing {key}: {requested} bytes requested, limit {limit}")]
    QuotaExceeded {
        key: String,
        requested: u64,
        limit: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CmError {
    pub fn not_found(entity: &'static str, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            field: "id",
            value: value.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CmError::NotFound { .. } => "not_found",
            CmError::Validation(_) => "validation_failed",
            CmError::QuotaExceeded { .. } => "quota_exceeded",
            CmError::Storage(_) => "storage_error",
            CmError::Attachment(_) => "attachment_error",
            CmError::Config(_) => "configuration_error",
            CmError::Internal(_) => "internal_error",
        }
    }

    /// Process exit code used by the command-line front end
    pub fn exit_code(&self) -> i32 {
        match self {
            CmError::NotFound { .. } => 2,
            CmError::Validation(_) | CmError::Attachment(_) => 3,
            CmError::QuotaExceeded { .. } | CmError::Storage(_) => 4,
            CmError::Config(_) => 5,
            CmError::Internal(_) => 1,
        }
    }
}

/// Validation errors collection
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> Vec<error_messages>
    pub errors: BTreeMap<String, Vec<String>>,
    /// Base errors not tied to a specific field
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }

    /// Turn the collection into a result, failing when any error was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collect() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add("percentuale", "must be between 0 and 100");
        errors.add_base("work order is archived");

        assert!(errors.has_error("percentuale"));
        assert!(!errors.has_error("importo"));
        assert_eq!(
            errors.full_messages(),
            vec![
                "work order is archived".to_string(),
                "percentuale must be between 0 and 100".to_string(),
            ]
        );
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_merge() {
        let mut a = ValidationErrors::new();
        a.add("nome", "can't be blank");
        let mut b = ValidationErrors::new();
        b.add("nome", "is too long");
        a.merge(b);
        assert_eq!(a.get("nome").map(Vec::len), Some(2));
    }

    #[test]
    fn test_error_codes() {
        let err = CmError::not_found("WorkOrder", "abc");
        assert_eq!(err.error_code(), "not_found");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "Not found: WorkOrder with id=abc");
    }
}
