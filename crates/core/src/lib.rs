//! Core types and shared functionality for icoproxy.
//!
//! This crate provides:
//! - Metadata store and edge response cache (SQLite and in-memory backends)
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod store;

pub use config::{AppConfig, ConfigError, SourceOrder, StoreBackend};
pub use error::Error;
pub use store::{CachedResponse, FaviconMeta, MemoryStore, MetaStore, ResponseCache, SqliteStore};
