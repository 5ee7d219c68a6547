//! # cm-core
//!
//! Core types, traits, and utilities for Commesse.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - Common error types
//! - Result type alias
//! - Core traits (Entity, Identifiable, Timestamped, Repository)
//! - Shared identifier and shelf types
//! - Configuration types

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::*;
pub use result::*;
pub use traits::*;
pub use types::*;
