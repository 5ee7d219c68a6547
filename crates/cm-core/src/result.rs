//! Result type aliases

use crate::error::CmError;

/// Standard Result type for record operations
pub type CmResult<T> = Result<T, CmError>;
