//! Core types and shared functionality for copyr.ai.
//!
//! This crate provides:
//! - Copyright term calculators and the country registry
//! - Work cache, search cache and user history on SQLite
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod copyright;
pub mod error;
pub mod models;

pub use cache::{CacheDb, CachedWork, NewWork};
pub use config::AppConfig;
pub use error::Error;
pub use models::{Authorship, CacheStatus, CopyrightStatus, WorkRecord, WorkType, WorkTypeHint};
