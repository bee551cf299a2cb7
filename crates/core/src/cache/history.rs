//! User profiles and per-user search history.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Row};

use super::connection::CacheDb;
use super::timestamp;
use super::works::json_column;
use crate::Error;

/// Largest page of history returned by a single query.
pub const MAX_HISTORY_PAGE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub query_text: String,
    pub filters: Value,
    pub results: Value,
    pub result_count: i64,
    pub searched_at: String,
}

fn read_profile(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn read_entry(row: &Row<'_>) -> rusqlite::Result<SearchHistoryEntry> {
    Ok(SearchHistoryEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        query_text: row.get(2)?,
        filters: json_column(row, 3)?,
        results: json_column(row, 4)?,
        result_count: row.get(5)?,
        searched_at: row.get(6)?,
    })
}

impl CacheDb {
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Error> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<UserProfile>, Error> {
                let result = conn.query_row(
                    "SELECT id, email, full_name, avatar_url, created_at, updated_at
                     FROM user_profiles WHERE id = ?1",
                    params![user_id],
                    read_profile,
                );
                match result {
                    Ok(profile) => Ok(Some(profile)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Create a profile or update the fields that are provided.
    pub async fn upsert_profile(
        &self, user_id: &str, email: Option<&str>, full_name: Option<&str>, avatar_url: Option<&str>,
    ) -> Result<UserProfile, Error> {
        let user_id = user_id.to_string();
        let email = email.map(str::to_string);
        let full_name = full_name.map(str::to_string);
        let avatar_url = avatar_url.map(str::to_string);
        let now = timestamp(Utc::now());

        self.conn
            .call(move |conn| -> Result<UserProfile, Error> {
                conn.execute(
                    "INSERT INTO user_profiles (id, email, full_name, avatar_url, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        email = COALESCE(excluded.email, email),
                        full_name = COALESCE(excluded.full_name, full_name),
                        avatar_url = COALESCE(excluded.avatar_url, avatar_url),
                        updated_at = excluded.updated_at",
                    params![user_id, email, full_name, avatar_url, now],
                )?;
                let profile = conn.query_row(
                    "SELECT id, email, full_name, avatar_url, created_at, updated_at
                     FROM user_profiles WHERE id = ?1",
                    params![user_id],
                    read_profile,
                )?;
                Ok(profile)
            })
            .await
            .map_err(Error::from)
    }

    /// Record one search for a user.
    pub async fn add_search_history(
        &self, user_id: &str, query_text: &str, filters: &Value, results: &Value,
    ) -> Result<SearchHistoryEntry, Error> {
        if query_text.trim().is_empty() {
            return Err(Error::InvalidInput("query_text cannot be empty".into()));
        }

        let entry = SearchHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            query_text: query_text.to_string(),
            filters: filters.clone(),
            result_count: results.as_array().map(|r| r.len() as i64).unwrap_or(0),
            results: results.clone(),
            searched_at: timestamp(Utc::now()),
        };
        let row = entry.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO user_search_history
                        (id, user_id, query_text, filters, results, result_count, searched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        row.id,
                        row.user_id,
                        row.query_text,
                        serde_json::to_string(&row.filters)?,
                        serde_json::to_string(&row.results)?,
                        row.result_count,
                        row.searched_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(entry)
    }

    /// Most recent searches first, at most [`MAX_HISTORY_PAGE`].
    pub async fn search_history(&self, user_id: &str, limit: usize) -> Result<Vec<SearchHistoryEntry>, Error> {
        let user_id = user_id.to_string();
        let limit = limit.clamp(1, MAX_HISTORY_PAGE) as i64;
        self.conn
            .call(move |conn| -> Result<Vec<SearchHistoryEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, query_text, filters, results, result_count, searched_at
                     FROM user_search_history WHERE user_id = ?1
                     ORDER BY searched_at DESC, rowid DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![user_id, limit], read_entry)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one history entry owned by `user_id`.
    ///
    /// Returns false if no such entry exists for that user.
    pub async fn delete_search_history_item(&self, user_id: &str, entry_id: &str) -> Result<bool, Error> {
        let user_id = user_id.to_string();
        let entry_id = entry_id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM user_search_history WHERE id = ?1 AND user_id = ?2",
                    params![entry_id, user_id],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all history for a user. Returns the number of deleted entries.
    pub async fn clear_search_history(&self, user_id: &str) -> Result<u64, Error> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM user_search_history WHERE user_id = ?1", params![user_id])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USER: &str = "0b6c1f2e-52a1-4c55-9a43-7f1ad2c0e001";
    const OTHER: &str = "0b6c1f2e-52a1-4c55-9a43-7f1ad2c0e002";

    #[tokio::test]
    async fn test_profile_upsert_keeps_existing_fields() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_profile(USER).await.unwrap().is_none());

        db.upsert_profile(USER, Some("reader@example.com"), Some("Ada Reader"), None).await.unwrap();
        let updated = db.upsert_profile(USER, None, None, Some("https://img.example.com/a.png")).await.unwrap();

        assert_eq!(updated.email.as_deref(), Some("reader@example.com"));
        assert_eq!(updated.full_name.as_deref(), Some("Ada Reader"));
        assert_eq!(updated.avatar_url.as_deref(), Some("https://img.example.com/a.png"));
    }

    #[tokio::test]
    async fn test_history_lifecycle() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = db
            .add_search_history(USER, "author: Mark Twain", &json!({"work_type": "literary"}), &json!([{"id": 1}]))
            .await
            .unwrap();
        assert_eq!(first.result_count, 1);
        db.add_search_history(USER, "title: Emma", &json!({}), &json!([])).await.unwrap();
        db.add_search_history(OTHER, "title: Walden", &json!({}), &json!([])).await.unwrap();

        let history = db.search_history(USER, 20).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query_text, "title: Emma");

        assert!(!db.delete_search_history_item(OTHER, &first.id).await.unwrap());
        assert!(db.delete_search_history_item(USER, &first.id).await.unwrap());
        assert!(!db.delete_search_history_item(USER, &first.id).await.unwrap());

        assert_eq!(db.clear_search_history(USER).await.unwrap(), 1);
        assert!(db.search_history(USER, 20).await.unwrap().is_empty());
        assert_eq!(db.search_history(OTHER, 20).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_rejects_empty_query() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.add_search_history(USER, "   ", &json!({}), &json!([])).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
