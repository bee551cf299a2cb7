//! Search query cache operations.
//!
//! Memoizes a search as the ordered list of work ids it returned, keyed by
//! the hash of the normalized query text and work type filter.

use chrono::{Duration, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::normalize::query_hash;
use super::timestamp;
use super::works::{CachedWork, WORK_COLUMNS, read_work};
use crate::Error;

impl CacheDb {
    /// Insert or replace the cached result list for a query.
    pub async fn put_search_results(
        &self, query: &str, work_type: &str, work_ids: &[String], ttl_seconds: i64,
    ) -> Result<(), Error> {
        if ttl_seconds <= 0 {
            return Err(Error::InvalidInput("expires_at must be in the future".into()));
        }

        let key_hash = query_hash(query, work_type);
        let query = query.to_string();
        let work_type = work_type.to_lowercase();
        let results = serde_json::to_string(work_ids)?;
        let total = work_ids.len() as i64;
        let now = Utc::now();
        let created_at = timestamp(now);
        let expires_at = timestamp(now + Duration::seconds(ttl_seconds));

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_search_queries (
                        query_hash, query_text, work_type, results, total_results, created_at, expires_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(query_hash) DO UPDATE SET
                        query_text = excluded.query_text,
                        results = excluded.results,
                        total_results = excluded.total_results,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at",
                    params![key_hash, query, work_type, results, total, created_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Works for a cached query, in their original order.
    ///
    /// Returns None if the query was never cached or its entry has expired.
    /// Works deleted since caching are skipped.
    pub async fn get_cached_search(&self, query: &str, work_type: &str) -> Result<Option<Vec<CachedWork>>, Error> {
        let key_hash = query_hash(query, work_type);
        let now = timestamp(Utc::now());

        self.conn
            .call(move |conn| -> Result<Option<Vec<CachedWork>>, Error> {
                let result = conn.query_row(
                    "SELECT results FROM cache_search_queries WHERE query_hash = ?1 AND expires_at > ?2",
                    params![key_hash, now],
                    |row| row.get::<_, String>(0),
                );
                let ids: Vec<String> = match result {
                    Ok(json) => serde_json::from_str(&json)?,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let mut stmt = conn.prepare(&format!("SELECT {WORK_COLUMNS} FROM work_cache WHERE id = ?1"))?;
                let mut works = Vec::with_capacity(ids.len());
                for id in &ids {
                    match stmt.query_row(params![id], read_work) {
                        Ok(work) => works.push(work),
                        Err(rusqlite::Error::QueryReturnedNoRows) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(Some(works))
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired query cache entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_searches(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_search_queries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::works::tests::new_work;

    #[tokio::test]
    async fn test_put_and_get_cached_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let a = db.create_work(&new_work("Emma", "Austen, Jane", "loc", "1"), 3600).await.unwrap();
        let b = db.create_work(&new_work("Persuasion", "Austen, Jane", "loc", "2"), 3600).await.unwrap();

        db.put_search_results("Jane Austen", "literary", &[b.id.clone(), a.id.clone()], 3600)
            .await
            .unwrap();

        let works = db.get_cached_search("  jane austen ", "LITERARY").await.unwrap().unwrap();
        assert_eq!(works.len(), 2);
        assert_eq!(works[0].id, b.id);
        assert_eq!(works[1].id, a.id);
    }

    #[tokio::test]
    async fn test_get_cached_search_miss() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_cached_search("nothing", "auto").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_result_list_is_a_hit() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_search_results("obscure", "auto", &[], 3600).await.unwrap();
        let works = db.get_cached_search("obscure", "auto").await.unwrap();
        assert!(works.is_some_and(|w| w.is_empty()));
    }

    #[tokio::test]
    async fn test_expired_search_is_a_miss() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_search_results("mozart", "musical", &["x".to_string()], 3600).await.unwrap();

        let past = timestamp(Utc::now() - Duration::hours(1));
        db.conn
            .call(move |conn| conn.execute("UPDATE cache_search_queries SET expires_at = ?1", params![past]))
            .await
            .unwrap();

        assert!(db.get_cached_search("mozart", "musical").await.unwrap().is_none());
        assert_eq!(db.purge_expired_searches().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_non_positive_ttl() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.put_search_results("q", "auto", &[], -5).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
