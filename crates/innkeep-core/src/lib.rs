//! Innkeep Core Library
//!
//! This crate provides the domain models, error types, configuration and content
//! hashing shared by the media library maintenance components.

pub mod config;
pub mod error;
pub mod hash;
pub mod models;

// Re-export commonly used types
pub use config::{DedupConfig, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hash::ContentHash;
