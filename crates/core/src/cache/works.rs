//! Work cache CRUD operations.
//!
//! Works are keyed by `source_key` (`{api}:{id}`) and deduplicated by the
//! content hash of their normalized title, author and year. Inserting a
//! work whose hash already exists folds it into the existing row.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Row, types::Type};

use super::connection::CacheDb;
use super::normalize::{content_hash, normalize_author, normalize_title};
use super::timestamp;
use crate::Error;
use crate::models::{CacheStatus, CopyrightStatus, WorkType};

pub(crate) const WORK_COLUMNS: &str = "id, title, author, title_normalized, author_normalized, content_hash,
    publication_year, work_type, copyright_status, public_domain_year, source_api, source_id, source_key,
    raw_data, processed_data, confidence_score, cache_status, created_at, updated_at, expires_at";

/// A cached, analyzed work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedWork {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub title_normalized: String,
    pub author_normalized: String,
    pub content_hash: String,
    pub publication_year: Option<i32>,
    pub work_type: Option<WorkType>,
    pub copyright_status: Option<CopyrightStatus>,
    pub public_domain_year: Option<i32>,
    pub source_api: String,
    pub source_id: String,
    pub source_key: String,
    pub raw_data: Value,
    pub processed_data: Value,
    pub confidence_score: f64,
    pub cache_status: CacheStatus,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: String,
}

/// A work to be written to the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWork {
    pub title: String,
    pub author: Option<String>,
    pub publication_year: Option<i32>,
    pub work_type: Option<WorkType>,
    pub copyright_status: Option<CopyrightStatus>,
    pub public_domain_year: Option<i32>,
    pub source_api: String,
    pub source_id: String,
    pub raw_data: Value,
    pub processed_data: Value,
    pub confidence_score: f64,
}

impl NewWork {
    pub fn source_key(&self) -> String {
        source_key(&self.source_api, &self.source_id)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("work title cannot be empty".into()));
        }
        if self.source_api.trim().is_empty() || self.source_id.trim().is_empty() {
            return Err(Error::InvalidInput("source_api and source_id are required".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(Error::InvalidInput(format!("confidence {} outside 0..1", self.confidence_score)));
        }
        Ok(())
    }
}

/// Aggregate counts over the work cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheStatistics {
    pub total_works: i64,
    pub literary_works: i64,
    pub musical_works: i64,
    pub fresh_works: i64,
    pub expired_works: i64,
    /// Share of fresh rows, in percent.
    pub cache_hit_ratio: f64,
}

pub fn source_key(source_api: &str, source_id: &str) -> String {
    format!("{source_api}:{source_id}")
}

pub(crate) fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn read_work(row: &Row<'_>) -> rusqlite::Result<CachedWork> {
    Ok(CachedWork {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        title_normalized: row.get(3)?,
        author_normalized: row.get(4)?,
        content_hash: row.get(5)?,
        publication_year: row.get(6)?,
        work_type: row.get(7)?,
        copyright_status: row.get(8)?,
        public_domain_year: row.get(9)?,
        source_api: row.get(10)?,
        source_id: row.get(11)?,
        source_key: row.get(12)?,
        raw_data: json_column(row, 13)?,
        processed_data: json_column(row, 14)?,
        confidence_score: row.get(15)?,
        cache_status: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        expires_at: row.get(19)?,
    })
}

pub(crate) fn select_one(conn: &rusqlite::Connection, clause: &str, key: &str) -> Result<Option<CachedWork>, Error> {
    let sql = format!("SELECT {WORK_COLUMNS} FROM work_cache WHERE {clause} LIMIT 1");
    match conn.query_row(&sql, params![key], read_work) {
        Ok(work) => Ok(Some(work)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => Map::from_iter([("value".to_string(), other.clone())]),
    }
}

/// Fold another source's processed data into an existing row's.
///
/// Incoming keys overwrite existing ones, except `alternate_sources`, which
/// accumulates one entry per distinct source key.
pub(crate) fn merge_processed(
    existing: &Value, existing_key: &str, incoming: &Value, source_api: &str, source_id: &str, confidence: f64,
) -> Value {
    let mut merged = as_object(existing);
    let mut alternates = match merged.remove("alternate_sources") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    for (key, value) in as_object(incoming) {
        if key != "alternate_sources" {
            merged.insert(key, value);
        }
    }

    let incoming_key = source_key(source_api, source_id);
    let already_listed = alternates.iter().any(|alt| {
        let api = alt.get("source_api").and_then(Value::as_str).unwrap_or_default();
        let id = alt.get("source_id").and_then(Value::as_str).unwrap_or_default();
        source_key(api, id) == incoming_key
    });
    if incoming_key != existing_key && !already_listed {
        alternates.push(serde_json::json!({
            "source_api": source_api,
            "source_id": source_id,
            "confidence_score": confidence,
        }));
    }

    if !alternates.is_empty() {
        merged.insert("alternate_sources".into(), Value::Array(alternates));
    }
    Value::Object(merged)
}

impl CacheDb {
    /// Insert a work, or fold it into the row that already has its content hash.
    ///
    /// A row with the same source key but a different hash is overwritten
    /// in place. `ttl_seconds` must be positive.
    pub async fn create_work(&self, work: &NewWork, ttl_seconds: i64) -> Result<CachedWork, Error> {
        work.validate()?;
        if ttl_seconds <= 0 {
            return Err(Error::InvalidInput("expires_at must be in the future".into()));
        }

        let work = work.clone();
        let now = Utc::now();
        let created_at = timestamp(now);
        let expires_at = timestamp(now + Duration::seconds(ttl_seconds));
        let title_normalized = normalize_title(&work.title);
        let author_normalized = normalize_author(work.author.as_deref().unwrap_or_default());
        let hash = content_hash(&work.title, work.author.as_deref(), work.publication_year);
        let key = work.source_key();

        self.conn
            .call(move |conn| -> Result<CachedWork, Error> {
                let tx = conn.transaction()?;

                let by_hash = select_one(&tx, "content_hash = ?1 ORDER BY confidence_score DESC, created_at ASC", &hash)?;
                let id = if let Some(existing) = by_hash {
                    let processed = merge_processed(
                        &existing.processed_data,
                        &existing.source_key,
                        &work.processed_data,
                        &work.source_api,
                        &work.source_id,
                        work.confidence_score,
                    );
                    tx.execute(
                        "UPDATE work_cache SET
                            processed_data = ?2,
                            copyright_status = COALESCE(?3, copyright_status),
                            public_domain_year = COALESCE(?4, public_domain_year),
                            work_type = COALESCE(work_type, ?5),
                            confidence_score = MAX(confidence_score, ?6),
                            cache_status = 'fresh',
                            updated_at = ?7,
                            expires_at = ?8
                         WHERE id = ?1",
                        params![
                            &existing.id,
                            serde_json::to_string(&processed)?,
                            &work.copyright_status,
                            &work.public_domain_year,
                            &work.work_type,
                            work.confidence_score,
                            &created_at,
                            &expires_at,
                        ],
                    )?;
                    tracing::debug!(id = %existing.id, source = %key, "merged work into existing content hash");
                    existing.id
                } else {
                    let previous = select_one(&tx, "source_key = ?1", &key)?;
                    let id = match &previous {
                        Some(previous) => previous.id.clone(),
                        None => uuid::Uuid::new_v4().to_string(),
                    };
                    let raw_data = serde_json::to_string(&work.raw_data)?;
                    let processed_data = serde_json::to_string(&work.processed_data)?;
                    // Same source with new content means the record was corrected upstream.
                    let sql = if previous.is_some() {
                        "UPDATE work_cache SET
                            title = ?2, author = ?3, title_normalized = ?4, author_normalized = ?5,
                            content_hash = ?6, publication_year = ?7, work_type = ?8,
                            copyright_status = ?9, public_domain_year = ?10, source_api = ?11,
                            source_id = ?12, source_key = ?13, raw_data = ?14, processed_data = ?15,
                            confidence_score = ?16, cache_status = 'fresh', updated_at = ?17,
                            expires_at = ?18
                         WHERE id = ?1"
                    } else {
                        "INSERT INTO work_cache (
                            id, title, author, title_normalized, author_normalized, content_hash,
                            publication_year, work_type, copyright_status, public_domain_year,
                            source_api, source_id, source_key, raw_data, processed_data,
                            confidence_score, cache_status, created_at, updated_at, expires_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                                  ?16, 'fresh', ?17, ?17, ?18)"
                    };
                    tx.execute(
                        sql,
                        params![
                            &id,
                            &work.title,
                            &work.author,
                            &title_normalized,
                            &author_normalized,
                            &hash,
                            &work.publication_year,
                            &work.work_type,
                            &work.copyright_status,
                            &work.public_domain_year,
                            &work.source_api,
                            &work.source_id,
                            &key,
                            &raw_data,
                            &processed_data,
                            work.confidence_score,
                            &created_at,
                            &expires_at,
                        ],
                    )?;
                    id
                };

                let stored = select_one(&tx, "id = ?1", &id)?
                    .ok_or_else(|| Error::NotFound(format!("work {id} vanished during write")))?;
                tx.commit()?;
                Ok(stored)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn get_work(&self, id: &str) -> Result<Option<CachedWork>, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedWork>, Error> { select_one(conn, "id = ?1", &id) })
            .await
            .map_err(Error::from)
    }

    /// Highest-confidence work with the given content hash.
    pub async fn find_by_content_hash(&self, hash: &str) -> Result<Option<CachedWork>, Error> {
        let hash = hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedWork>, Error> {
                select_one(conn, "content_hash = ?1 ORDER BY confidence_score DESC, created_at ASC", &hash)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a fresh work by its source.
    ///
    /// An expired row is marked `expired` (kept for background refresh)
    /// and reported as a miss.
    pub async fn find_by_source_key(&self, source_api: &str, source_id: &str) -> Result<Option<CachedWork>, Error> {
        let key = source_key(source_api, source_id);
        let now = Utc::now();
        self.conn
            .call(move |conn| -> Result<Option<CachedWork>, Error> {
                let Some(work) = select_one(conn, "source_key = ?1", &key)? else {
                    return Ok(None);
                };
                if work.expires_at > timestamp(now) {
                    return Ok(Some(work));
                }
                conn.execute(
                    "UPDATE work_cache SET cache_status = 'expired', updated_at = ?2 WHERE id = ?1",
                    params![&work.id, timestamp(now)],
                )?;
                Ok(None)
            })
            .await
            .map_err(Error::from)
    }

    /// Match works by normalized title and/or author.
    ///
    /// When `title` and `author` are the same text (autocomplete), a row
    /// matches if either normalized column contains it.
    pub async fn search_by_content(
        &self, title: Option<&str>, author: Option<&str>, work_type: Option<WorkType>, limit: usize,
    ) -> Result<Vec<CachedWork>, Error> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let author = author.map(str::trim).filter(|a| !a.is_empty());

        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        match (title, author) {
            (None, None) => return Ok(Vec::new()),
            (Some(t), Some(a)) if t.eq_ignore_ascii_case(a) => {
                clauses.push("(title_normalized LIKE ?1 OR author_normalized LIKE ?2)".to_string());
                values.push(format!("%{}%", normalize_title(t)));
                values.push(format!("%{}%", normalize_author(a)));
            }
            (t, a) => {
                if let Some(t) = t {
                    values.push(format!("%{}%", normalize_title(t)));
                    clauses.push(format!("title_normalized LIKE ?{}", values.len()));
                }
                if let Some(a) = a {
                    values.push(format!("%{}%", normalize_author(a)));
                    clauses.push(format!("author_normalized LIKE ?{}", values.len()));
                }
            }
        }
        if let Some(wt) = work_type {
            values.push(wt.as_str().to_string());
            clauses.push(format!("work_type = ?{}", values.len()));
        }

        let sql = format!(
            "SELECT {WORK_COLUMNS} FROM work_cache WHERE {}
             ORDER BY confidence_score DESC, created_at DESC LIMIT {}",
            clauses.join(" AND "),
            limit
        );

        self.conn
            .call(move |conn| -> Result<Vec<CachedWork>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), read_work)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Most recently cached works, one per distinct title.
    pub async fn popular_works(
        &self, limit: usize, work_type: Option<WorkType>, status: Option<CopyrightStatus>,
    ) -> Result<Vec<CachedWork>, Error> {
        let fetch = limit.saturating_mul(3);
        self.conn
            .call(move |conn| -> Result<Vec<CachedWork>, Error> {
                let sql = format!(
                    "SELECT {WORK_COLUMNS} FROM work_cache
                     WHERE (?1 IS NULL OR work_type = ?1) AND (?2 IS NULL OR copyright_status = ?2)
                     ORDER BY created_at DESC LIMIT {fetch}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![&work_type, &status], read_work)?;

                let mut seen = HashSet::new();
                let mut works = Vec::new();
                for work in rows {
                    let work = work?;
                    if seen.insert(work.title.to_lowercase()) {
                        works.push(work);
                    }
                    if works.len() >= limit {
                        break;
                    }
                }
                Ok(works)
            })
            .await
            .map_err(Error::from)
    }

    /// Flag every row whose expiry has passed. Returns the number flagged.
    pub async fn mark_expired_works(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "UPDATE work_cache SET cache_status = 'expired', updated_at = ?1
                     WHERE expires_at <= ?1 AND cache_status != 'expired'",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn set_cache_status(&self, id: &str, status: CacheStatus) -> Result<bool, Error> {
        let id = id.to_string();
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "UPDATE work_cache SET cache_status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, status, now],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Works flagged `expired`, oldest expiry first.
    pub async fn expired_works(&self, limit: usize) -> Result<Vec<CachedWork>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<CachedWork>, Error> {
                let sql = format!(
                    "SELECT {WORK_COLUMNS} FROM work_cache WHERE cache_status = 'expired'
                     ORDER BY expires_at ASC LIMIT {limit}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], read_work)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete works that expired more than `days` days ago.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_expired_works(&self, days: i64) -> Result<u64, Error> {
        let cutoff = timestamp(Utc::now() - Duration::days(days));
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM work_cache WHERE expires_at < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn statistics(&self) -> Result<CacheStatistics, Error> {
        self.conn
            .call(|conn| -> Result<CacheStatistics, Error> {
                let stats = conn.query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(work_type = 'literary'), 0),
                            COALESCE(SUM(work_type = 'musical'), 0),
                            COALESCE(SUM(cache_status = 'fresh'), 0),
                            COALESCE(SUM(cache_status = 'expired'), 0)
                     FROM work_cache",
                    [],
                    |row| {
                        Ok(CacheStatistics {
                            total_works: row.get(0)?,
                            literary_works: row.get(1)?,
                            musical_works: row.get(2)?,
                            fresh_works: row.get(3)?,
                            expired_works: row.get(4)?,
                            cache_hit_ratio: 0.0,
                        })
                    },
                )?;
                let ratio = if stats.total_works > 0 {
                    stats.fresh_works as f64 / stats.total_works as f64 * 100.0
                } else {
                    0.0
                };
                Ok(CacheStatistics { cache_hit_ratio: ratio, ..stats })
            })
            .await
            .map_err(Error::from)
    }
}
