//! Duplicate detection and merge by content hash.
//!
//! Duplicates appear when rows were written under older normalization rules
//! or imported in bulk. After [`CacheDb::merge_duplicate_works`] every
//! content hash occurs exactly once, and
//! [`CacheDb::enforce_unique_content_hash`] keeps it that way.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::normalize::{content_hash, normalize_author, normalize_title};
use super::works::{CachedWork, WORK_COLUMNS, merge_processed, read_work};
use crate::Error;

const UNIQUE_INDEX: &str = "idx_work_cache_content_hash_unique";

/// Outcome of a full hash reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub rehashed: u64,
    pub merged: u64,
}

/// Fold `dup` (and the alternates it already carried) into `keeper`'s processed data.
fn absorb(keeper: &CachedWork, processed: &Value, dup: &CachedWork) -> Value {
    let mut merged =
        merge_processed(processed, &keeper.source_key, &Value::Null, &dup.source_api, &dup.source_id, dup.confidence_score);

    if let Some(Value::Array(alternates)) = dup.processed_data.get("alternate_sources") {
        for alt in alternates {
            let api = alt.get("source_api").and_then(Value::as_str).unwrap_or_default();
            let id = alt.get("source_id").and_then(Value::as_str).unwrap_or_default();
            let confidence = alt.get("confidence_score").and_then(Value::as_f64).unwrap_or_default();
            if !api.is_empty() && !id.is_empty() {
                merged = merge_processed(&merged, &keeper.source_key, &Value::Null, api, id, confidence);
            }
        }
    }
    merged
}

fn merge_duplicates_in(tx: &rusqlite::Transaction<'_>) -> Result<u64, Error> {
    let hashes: Vec<String> = {
        let mut stmt = tx.prepare("SELECT content_hash FROM work_cache GROUP BY content_hash HAVING COUNT(*) > 1")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>()?
    };

    let mut removed = 0u64;
    for hash in hashes {
        let group: Vec<CachedWork> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {WORK_COLUMNS} FROM work_cache WHERE content_hash = ?1
                 ORDER BY confidence_score DESC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![hash], read_work)?;
            rows.collect::<Result<_, _>>()?
        };
        let Some((keeper, dups)) = group.split_first() else {
            continue;
        };

        let mut processed = keeper.processed_data.clone();
        let mut status = keeper.copyright_status;
        let mut pd_year = keeper.public_domain_year;
        let mut work_type = keeper.work_type;
        let mut expires_at = keeper.expires_at.clone();
        for dup in dups {
            processed = absorb(keeper, &processed, dup);
            status = status.or(dup.copyright_status);
            pd_year = pd_year.or(dup.public_domain_year);
            work_type = work_type.or(dup.work_type);
            if dup.expires_at > expires_at {
                expires_at = dup.expires_at.clone();
            }
            tx.execute("DELETE FROM work_cache WHERE id = ?1", params![dup.id])?;
            removed += 1;
        }

        tx.execute(
            "UPDATE work_cache SET processed_data = ?2, copyright_status = ?3, public_domain_year = ?4,
                work_type = ?5, expires_at = ?6
             WHERE id = ?1",
            params![keeper.id, serde_json::to_string(&processed)?, status, pd_year, work_type, expires_at],
        )?;
        tracing::debug!(keeper = %keeper.id, merged = dups.len(), "merged duplicate works");
    }

    Ok(removed)
}

impl CacheDb {
    /// Collapse rows sharing a content hash into the highest-confidence one.
    ///
    /// Returns the number of rows removed.
    pub async fn merge_duplicate_works(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let removed = merge_duplicates_in(&tx)?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(Error::from)
    }

    /// Merge duplicates, then add a unique index on content_hash.
    pub async fn enforce_unique_content_hash(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let removed = merge_duplicates_in(&tx)?;
                tx.execute_batch(&format!("CREATE UNIQUE INDEX IF NOT EXISTS {UNIQUE_INDEX} ON work_cache (content_hash)"))?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(Error::from)
    }

    /// Recompute normalized columns and content hashes for every row, then merge
    /// the duplicates this exposes and restore the unique index.
    pub async fn reconcile_content_hashes(&self) -> Result<ReconcileReport, Error> {
        self.conn
            .call(|conn| -> Result<ReconcileReport, Error> {
                let tx = conn.transaction()?;
                tx.execute_batch(&format!("DROP INDEX IF EXISTS {UNIQUE_INDEX}"))?;

                let rows: Vec<(String, String, Option<String>, Option<i32>, String)> = {
                    let mut stmt =
                        tx.prepare("SELECT id, title, author, publication_year, content_hash FROM work_cache")?;
                    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)))?;
                    rows.collect::<Result<_, _>>()?
                };

                let mut rehashed = 0u64;
                for (id, title, author, year, old_hash) in rows {
                    let hash = content_hash(&title, author.as_deref(), year);
                    tx.execute(
                        "UPDATE work_cache SET title_normalized = ?2, author_normalized = ?3, content_hash = ?4
                         WHERE id = ?1",
                        params![
                            id,
                            normalize_title(&title),
                            normalize_author(author.as_deref().unwrap_or_default()),
                            hash
                        ],
                    )?;
                    if hash != old_hash {
                        rehashed += 1;
                    }
                }

                let merged = merge_duplicates_in(&tx)?;
                tx.execute_batch(&format!("CREATE UNIQUE INDEX IF NOT EXISTS {UNIQUE_INDEX} ON work_cache (content_hash)"))?;
                tx.commit()?;
                Ok(ReconcileReport { rehashed, merged })
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::works::tests::new_work;
    use crate::models::CopyrightStatus;

    async fn counts(db: &CacheDb) -> (i64, i64) {
        db.conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*), COUNT(DISTINCT content_hash) FROM work_cache", [], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
            })
            .await
            .unwrap()
    }

    async fn overwrite_hash(db: &CacheDb, id: &str, hash: &str) {
        let (id, hash) = (id.to_string(), hash.to_string());
        db.conn
            .call(move |conn| conn.execute("UPDATE work_cache SET content_hash = ?2 WHERE id = ?1", params![id, hash]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_merge_duplicate_works_leaves_unique_hashes() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let keeper = {
            let mut w = new_work("Hamlet", "Shakespeare", "loc", "1");
            w.confidence_score = 0.9;
            w.copyright_status = None;
            db.create_work(&w, 3600).await.unwrap()
        };
        let dup_a = db.create_work(&new_work("Hamlet (legacy)", "Shakespeare", "hathitrust", "2"), 3600).await.unwrap();
        let dup_b = db.create_work(&new_work("Hamlet (import)", "Shakespeare", "musicbrainz", "3"), 3600).await.unwrap();
        db.create_work(&new_work("Emma", "Austen, Jane", "loc", "4"), 3600).await.unwrap();

        overwrite_hash(&db, &dup_a.id, &keeper.content_hash).await;
        overwrite_hash(&db, &dup_b.id, &keeper.content_hash).await;
        assert_eq!(counts(&db).await, (4, 2));

        assert_eq!(db.merge_duplicate_works().await.unwrap(), 2);
        let (total, distinct) = counts(&db).await;
        assert_eq!(total, distinct);
        assert_eq!(total, 2);

        let merged = db.get_work(&keeper.id).await.unwrap().unwrap();
        assert_eq!(merged.copyright_status, Some(CopyrightStatus::PublicDomain));
        let alternates = merged.processed_data["alternate_sources"].as_array().unwrap();
        assert_eq!(alternates.len(), 2);

        assert_eq!(db.merge_duplicate_works().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_rehashes_and_enforces_uniqueness() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let a = db.create_work(&new_work("Walden", "Thoreau, Henry David", "loc", "1"), 3600).await.unwrap();
        let b = db.create_work(&new_work("Emma", "Austen, Jane", "loc", "2"), 3600).await.unwrap();
        overwrite_hash(&db, &a.id, "stale-hash").await;

        let report = db.reconcile_content_hashes().await.unwrap();
        assert_eq!(report, ReconcileReport { rehashed: 1, merged: 0 });

        // the unique index now rejects a raw duplicate hash
        let b_id = b.id.clone();
        let hash = a.content_hash.clone();
        let result = db
            .conn
            .call(move |conn| conn.execute("UPDATE work_cache SET content_hash = ?2 WHERE id = ?1", params![b_id, hash]))
            .await;
        assert!(result.is_err());

        // normal writes still merge through the hash lookup
        let again = db.create_work(&new_work("The Walden", "Henry David Thoreau", "hathitrust", "9"), 3600).await.unwrap();
        assert_eq!(again.id, a.id);
    }

    #[tokio::test]
    async fn test_enforce_unique_content_hash_merges_first() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let a = db.create_work(&new_work("Emma", "Austen, Jane", "loc", "1"), 3600).await.unwrap();
        let b = db.create_work(&new_work("Persuasion", "Austen, Jane", "loc", "2"), 3600).await.unwrap();
        overwrite_hash(&db, &b.id, &a.content_hash).await;

        assert_eq!(db.enforce_unique_content_hash().await.unwrap(), 1);
        let (total, distinct) = counts(&db).await;
        assert_eq!((total, distinct), (1, 1));
    }
}
