//! Metadata source clients and copyright analysis for copyr.ai.
//!
//! This crate provides the Library of Congress, HathiTrust and MusicBrainz
//! clients, metadata normalization, the per-country work analyzers and
//! multi-source search shared by the server and CLI.

pub mod aggregate;
pub mod analyzer;
pub mod error;
pub mod hathitrust;
pub mod loc;
pub mod metadata;
pub mod musicbrainz;

mod http;
mod rate_limit;

use std::time::Duration;

use copyr_core::AppConfig;

pub use aggregate::{AggregateResults, AggregatedWork, SourceWork, filter_by_work_type, group_similar_works, merge_work_sources};
pub use analyzer::{BatchItem, CopyrightAnalyzer, CountryAnalyzer, UsAnalyzer};
pub use error::{AnalyzeError, SourceError};
pub use hathitrust::HathiTrustClient;
pub use http::SourceConfig;
pub use loc::LocClient;
pub use musicbrainz::MusicBrainzClient;

/// One client per metadata source, each with its own rate limiter.
#[derive(Debug, Clone)]
pub struct SourceClients {
    pub loc: LocClient,
    pub hathitrust: HathiTrustClient,
    pub musicbrainz: MusicBrainzClient,
}

impl SourceClients {
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let source = |base_url: &str, interval_ms: u64| {
            SourceConfig::new(base_url, config.timeout(), config.user_agent.clone(), Duration::from_millis(interval_ms))
        };
        Ok(Self {
            loc: LocClient::new(&source(&config.loc_base_url, config.loc_min_interval_ms))?,
            hathitrust: HathiTrustClient::new(&source(&config.hathitrust_base_url, config.hathitrust_min_interval_ms))?,
            musicbrainz: MusicBrainzClient::new(&source(&config.musicbrainz_base_url, config.musicbrainz_min_interval_ms))?,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Clients whose three sources all point at `base_url`, without spacing.
    pub(crate) fn clients_at(base_url: &str) -> SourceClients {
        let config = AppConfig {
            loc_base_url: format!("{base_url}/loc"),
            hathitrust_base_url: format!("{base_url}/hathi"),
            musicbrainz_base_url: format!("{base_url}/mb"),
            loc_min_interval_ms: 0,
            hathitrust_min_interval_ms: 0,
            musicbrainz_min_interval_ms: 0,
            timeout_ms: 5000,
            ..AppConfig::default()
        };
        SourceClients::from_config(&config).unwrap()
    }
}
