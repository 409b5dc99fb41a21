//! Innkeep Database Layer
//!
//! This crate provides the store seam used by the media dedup routine: the
//! `MediaStore` / `ContentStore` traits, their Postgres repositories and
//! in-memory implementations for tests and rehearsals.

pub mod db;
pub mod memory;
pub mod store_traits;

// Re-exports: Postgres repositories
pub use db::{connect, migrate, ContentRepository, MediaAssetRepository};

// Re-exports: Transaction utilities
pub use db::transaction::TransactionGuard;

// Re-exports: In-memory stores
pub use memory::{MemoryContentStore, MemoryMediaStore};

// Re-exports: Store traits
pub use store_traits::{ContentStore, MediaStore};
