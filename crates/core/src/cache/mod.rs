//! SQLite-backed cache for analyzed works, search results and user history.
//!
//! This module provides a persistent cache using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Application-layer normalization and SHA-256 content hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Expiry, refresh marking and cleanup of stale works
//! - Duplicate detection and merge by content hash

pub mod connection;
pub mod dedup;
pub mod history;
pub mod migrations;
pub mod normalize;
pub mod search;
pub mod works;

pub use crate::Error;

pub use connection::CacheDb;
pub use dedup::ReconcileReport;
pub use history::{SearchHistoryEntry, UserProfile};
pub use normalize::{content_hash, normalize_author, normalize_title, query_hash};
pub use works::{CacheStatistics, CachedWork, NewWork};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::models::{CacheStatus, CopyrightStatus, WorkType};

/// Fixed-width UTC timestamp so stored values compare correctly as text.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

macro_rules! sql_text_enum {
    ($($ty:ty),+) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> tokio_rusqlite::rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
                }
            }
        )+
    };
}

sql_text_enum!(WorkType, CopyrightStatus, CacheStatus);
