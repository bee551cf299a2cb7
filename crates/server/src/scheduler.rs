//! Background cache maintenance.
//!
//! Three periodic jobs share one task: re-analyzing expired works, deleting
//! old entries, and warming the cache with popular searches. All of them
//! stop when the cancellation token fires.

use std::time::Duration;

use copyr_client::{group_similar_works, merge_work_sources};
use copyr_core::{CachedWork, NewWork, WorkTypeHint};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::AppState;
use crate::error::ApiError;
use crate::pipeline::resolve_work;

/// Expired works re-analyzed per refresh run.
pub const REFRESH_BATCH: usize = 50;
/// Catalog hits analyzed per prepopulated query.
const PREPOPULATE_LIMIT: usize = 5;

pub const POPULAR_SEARCHES: [&str; 8] =
    ["Shakespeare", "Mozart", "Beethoven", "Mark Twain", "Charles Dickens", "Bach", "Jane Austen", "Chopin"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub works_deleted: u64,
    pub searches_purged: u64,
    pub works_marked_expired: u64,
}

pub struct Scheduler {
    state: AppState,
    cancel: CancellationToken,
}

fn ticker(secs: u64) -> tokio::time::Interval {
    let period = Duration::from_secs(secs.max(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Renewed cache entry for an expired work.
fn refreshed_entry(work: &CachedWork, record: &copyr_core::WorkRecord) -> NewWork {
    let mut processed = match &work.processed_data {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    processed.insert("notes".into(), Value::String(record.notes.clone()));
    processed.insert("refreshed_at".into(), Value::String(record.queried_at.to_rfc3339()));
    if record.confidence_score > 0.0 {
        processed.insert("confidence_score".into(), record.confidence_score.into());
    }

    NewWork {
        title: work.title.clone(),
        author: work.author.clone(),
        publication_year: work.publication_year.or(record.publication_year),
        work_type: work.work_type.or(record.work_type),
        copyright_status: Some(record.status),
        public_domain_year: record.enters_public_domain.or(work.public_domain_year),
        source_api: work.source_api.clone(),
        source_id: work.source_id.clone(),
        raw_data: work.raw_data.clone(),
        processed_data: Value::Object(processed),
        confidence_score: if record.confidence_score > 0.0 {
            record.confidence_score.clamp(0.0, 1.0)
        } else {
            work.confidence_score
        },
    }
}

impl Scheduler {
    pub fn new(state: AppState, cancel: CancellationToken) -> Self {
        Self { state, cancel }
    }

    /// Run until cancelled.
    pub async fn run(self) {
        let config = &self.state.config;
        let mut refresh = ticker(config.refresh_interval_secs);
        let mut cleanup = ticker(config.cleanup_interval_secs);
        let mut prepopulate = ticker(config.prepopulate_interval_secs);
        tracing::info!(
            refresh_secs = config.refresh_interval_secs,
            cleanup_secs = config.cleanup_interval_secs,
            prepopulate_secs = config.prepopulate_interval_secs,
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = refresh.tick() => match self.refresh_expired_works().await {
                    Ok(report) => tracing::info!(refreshed = report.refreshed, failed = report.failed, "refreshed expired works"),
                    Err(e) => tracing::error!(error = %e, "refresh job failed"),
                },
                _ = cleanup.tick() => match self.cleanup_old_entries().await {
                    Ok(report) => tracing::info!(
                        works_deleted = report.works_deleted,
                        searches_purged = report.searches_purged,
                        "cleaned up cache"
                    ),
                    Err(e) => tracing::error!(error = %e, "cleanup job failed"),
                },
                _ = prepopulate.tick() => {
                    let cached = self.prepopulate_popular_searches().await;
                    tracing::info!(cached, "prepopulated popular searches");
                }
            }
        }
        tracing::info!("scheduler stopped");
    }

    /// Re-analyze up to [`REFRESH_BATCH`] expired works and renew their expiry.
    pub async fn refresh_expired_works(&self) -> Result<RefreshReport, ApiError> {
        let state = &self.state;
        state.db.mark_expired_works().await?;
        let expired = state.db.expired_works(REFRESH_BATCH).await?;
        let mut report = RefreshReport::default();

        for work in &expired {
            if self.cancel.is_cancelled() {
                break;
            }
            let author = work.author.as_deref().unwrap_or_default();
            let record = match state.analyzer.analyze_work(&work.title, author, WorkTypeHint::Auto, None).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(id = %work.id, title = %work.title, error = %e, "failed to refresh work");
                    report.failed += 1;
                    continue;
                }
            };
            match state.db.create_work(&refreshed_entry(work, &record), state.config.work_cache_ttl_secs).await {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    tracing::warn!(id = %work.id, error = %e, "failed to store refreshed work");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Delete long-expired works and searches, then flag newly expired works.
    pub async fn cleanup_old_entries(&self) -> Result<CleanupReport, ApiError> {
        let db = &self.state.db;
        Ok(CleanupReport {
            works_deleted: db.delete_expired_works(self.state.config.cleanup_after_days).await?,
            searches_purged: db.purge_expired_searches().await?,
            works_marked_expired: db.mark_expired_works().await?,
        })
    }

    /// Search the catalogs for [`POPULAR_SEARCHES`] and cache the results.
    ///
    /// Returns the number of queries whose results were cached.
    pub async fn prepopulate_popular_searches(&self) -> usize {
        let state = &self.state;
        let country = state.config.default_country.as_str();
        let mut cached = 0;

        for query in POPULAR_SEARCHES {
            if self.cancel.is_cancelled() {
                break;
            }
            let found = state.clients.search_all_sources(None, Some(query), None, PREPOPULATE_LIMIT * 2).await;
            let mut work_ids = Vec::new();
            for work in group_similar_works(found.works).into_iter().filter_map(merge_work_sources).take(PREPOPULATE_LIMIT) {
                let resolved = resolve_work(&state.analyzer, &state.db, &work, country, state.config.work_cache_ttl_secs).await;
                work_ids.extend(resolved.work_id);
            }
            if work_ids.is_empty() {
                tracing::debug!(query, "nothing to prepopulate");
                continue;
            }
            let query_text = format!("author: {query}");
            match state.db.put_search_results(&query_text, "any", &work_ids, state.config.search_cache_ttl_secs).await {
                Ok(()) => cached += 1,
                Err(e) => tracing::warn!(query, error = %e, "failed to cache popular search"),
            }
        }
        cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use copyr_client::{AnalyzeError, CopyrightAnalyzer, CountryAnalyzer};
    use copyr_core::copyright::{CopyrightCalculator, CopyrightInfo, UsCopyrightCalculator};
    use copyr_core::{AppConfig, CacheDb, CacheStatus, CopyrightStatus, WorkRecord, WorkType};
    use serde_json::json;

    struct FixedAnalyzer;

    #[async_trait]
    impl CountryAnalyzer for FixedAnalyzer {
        fn country_code(&self) -> &'static str {
            "US"
        }

        fn supported_sources(&self) -> Vec<&'static str> {
            vec!["library_of_congress"]
        }

        fn copyright_info(&self) -> CopyrightInfo {
            UsCopyrightCalculator::new().info()
        }

        async fn analyze_work(&self, title: &str, author: &str, _hint: WorkTypeHint) -> Result<WorkRecord, AnalyzeError> {
            let mut record = WorkRecord::unknown(title, author, "US", "Refreshed");
            record.status = CopyrightStatus::PublicDomain;
            record.enters_public_domain = Some(1923);
            record.confidence_score = 0.9;
            Ok(record)
        }
    }

    async fn state() -> AppState {
        let config = AppConfig {
            loc_base_url: "http://127.0.0.1:9/loc".into(),
            hathitrust_base_url: "http://127.0.0.1:9/hathi".into(),
            musicbrainz_base_url: "http://127.0.0.1:9/mb".into(),
            loc_min_interval_ms: 0,
            hathitrust_min_interval_ms: 0,
            musicbrainz_min_interval_ms: 0,
            timeout_ms: 500,
            ..AppConfig::default()
        };
        let db = CacheDb::open_in_memory().await.unwrap();
        let analyzer = CopyrightAnalyzer::with_analyzers(vec![Box::new(FixedAnalyzer)], "US");
        AppState::with_analyzer(config, db, analyzer).unwrap()
    }

    fn work(title: &str) -> NewWork {
        NewWork {
            title: title.into(),
            author: Some("Jane Austen".into()),
            publication_year: Some(1815),
            work_type: Some(WorkType::Literary),
            copyright_status: Some(CopyrightStatus::Unknown),
            source_api: "library_of_congress".into(),
            source_id: title.to_lowercase(),
            processed_data: json!({"source_links": {"primary_source": "https://lccn.loc.gov/1"}}),
            confidence_score: 0.4,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_renews_expired_works() {
        let state = state().await;
        let stored = state.db.create_work(&work("Emma"), 3600).await.unwrap();
        state.db.set_cache_status(&stored.id, CacheStatus::Expired).await.unwrap();

        let scheduler = Scheduler::new(state.clone(), CancellationToken::new());
        let report = scheduler.refresh_expired_works().await.unwrap();
        assert_eq!(report, RefreshReport { refreshed: 1, failed: 0 });

        let renewed = state.db.get_work(&stored.id).await.unwrap().unwrap();
        assert_eq!(renewed.cache_status, CacheStatus::Fresh);
        assert_eq!(renewed.copyright_status, Some(CopyrightStatus::PublicDomain));
        assert_eq!(renewed.confidence_score, 0.9);
        assert!(state.db.expired_works(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_stops_when_cancelled() {
        let state = state().await;
        let stored = state.db.create_work(&work("Persuasion"), 3600).await.unwrap();
        state.db.set_cache_status(&stored.id, CacheStatus::Expired).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = Scheduler::new(state, cancel).refresh_expired_works().await.unwrap();
        assert_eq!(report, RefreshReport::default());
    }

    #[tokio::test]
    async fn test_cleanup_on_fresh_cache_removes_nothing() {
        let state = state().await;
        state.db.create_work(&work("Emma"), 3600).await.unwrap();
        let report = Scheduler::new(state.clone(), CancellationToken::new()).cleanup_old_entries().await.unwrap();
        assert_eq!(report, CleanupReport::default());
        assert_eq!(state.db.statistics().await.unwrap().total_works, 1);
    }

    #[tokio::test]
    async fn test_prepopulate_with_unreachable_sources_caches_nothing() {
        let state = state().await;
        let cached = Scheduler::new(state, CancellationToken::new()).prepopulate_popular_searches().await;
        assert_eq!(cached, 0);
    }

    #[tokio::test]
    async fn test_run_exits_on_cancel() {
        let state = state().await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Scheduler::new(state, cancel.clone()).run());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
