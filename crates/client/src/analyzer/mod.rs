//! Country-aware copyright analysis.
//!
//! A [`CountryAnalyzer`] gathers metadata for a work from the sources that
//! matter in its jurisdiction and applies that country's term rules.
//! [`CopyrightAnalyzer`] dispatches to the analyzer for a country code.

pub mod us;

pub use us::UsAnalyzer;

use std::collections::HashMap;

use async_trait::async_trait;
use copyr_core::copyright::{CopyrightInfo, country_info};
use copyr_core::{Error, WorkRecord, WorkTypeHint};
use serde::{Deserialize, Serialize};

use crate::SourceClients;
use crate::error::AnalyzeError;

/// One entry of a batch analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub work_type: WorkTypeHint,
    #[serde(default)]
    pub country: Option<String>,
}

#[async_trait]
pub trait CountryAnalyzer: Send + Sync {
    fn country_code(&self) -> &'static str;

    /// Names of the metadata sources this analyzer consults.
    fn supported_sources(&self) -> Vec<&'static str>;

    fn copyright_info(&self) -> CopyrightInfo;

    async fn analyze_work(&self, title: &str, author: &str, hint: WorkTypeHint) -> Result<WorkRecord, AnalyzeError>;

    /// Analyze works one after another; a failed work becomes an Unknown record.
    async fn analyze_batch(&self, items: &[BatchItem]) -> Vec<WorkRecord> {
        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            tracing::info!(index = i + 1, total = items.len(), title = %item.title, "analyzing batch item");
            match self.analyze_work(&item.title, &item.author, item.work_type).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(title = %item.title, error = %e, "batch item failed");
                    records.push(WorkRecord::unknown(
                        &item.title,
                        &item.author,
                        self.country_code(),
                        format!("Analysis failed: {e}"),
                    ));
                }
            }
        }
        records
    }
}

/// Dispatches analysis to the analyzer registered for a country.
pub struct CopyrightAnalyzer {
    analyzers: HashMap<&'static str, Box<dyn CountryAnalyzer>>,
    default_country: String,
}

impl CopyrightAnalyzer {
    /// Analyzer with every supported country registered.
    pub fn new(clients: SourceClients, default_country: &str) -> Self {
        let mut analyzers: HashMap<&'static str, Box<dyn CountryAnalyzer>> = HashMap::new();
        analyzers.insert("US", Box::new(UsAnalyzer::new(clients)));
        Self { analyzers, default_country: default_country.to_uppercase() }
    }

    /// Analyzer with an explicit set of country analyzers.
    pub fn with_analyzers(analyzers: Vec<Box<dyn CountryAnalyzer>>, default_country: &str) -> Self {
        let analyzers = analyzers.into_iter().map(|a| (a.country_code(), a)).collect();
        Self { analyzers, default_country: default_country.to_uppercase() }
    }

    /// Resolve a country code, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedCountry` when no analyzer is registered.
    pub fn analyzer_for(&self, country: Option<&str>) -> Result<&dyn CountryAnalyzer, Error> {
        let requested = country.map(str::trim).filter(|c| !c.is_empty()).unwrap_or(self.default_country.as_str());
        country_info(requested)
            .and_then(|info| self.analyzers.get(info.code))
            .map(|a| a.as_ref())
            .ok_or_else(|| {
                let mut supported: Vec<&str> = self.analyzers.keys().copied().collect();
                supported.sort_unstable();
                Error::UnsupportedCountry { country: requested.to_string(), supported: supported.join(", ") }
            })
    }

    pub async fn analyze_work(
        &self, title: &str, author: &str, hint: WorkTypeHint, country: Option<&str>,
    ) -> Result<WorkRecord, AnalyzeError> {
        self.analyzer_for(country)?.analyze_work(title, author, hint).await
    }

    /// Analyze a batch; items naming an unsupported country become Unknown records.
    pub async fn analyze_batch(&self, items: &[BatchItem]) -> Vec<WorkRecord> {
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let record = match self.analyzer_for(item.country.as_deref()) {
                Ok(analyzer) => analyzer.analyze_batch(std::slice::from_ref(item)).await.pop(),
                Err(e) => Some(WorkRecord::unknown(
                    &item.title,
                    &item.author,
                    item.country.as_deref().unwrap_or(self.default_country.as_str()),
                    format!("Analysis failed: {e}"),
                )),
            };
            records.extend(record);
        }
        records
    }

    pub fn copyright_info(&self, country: Option<&str>) -> Result<CopyrightInfo, Error> {
        Ok(self.analyzer_for(country)?.copyright_info())
    }

    pub fn supported_sources(&self, country: Option<&str>) -> Result<Vec<&'static str>, Error> {
        Ok(self.analyzer_for(country)?.supported_sources())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyr_core::copyright::{CopyrightCalculator, UsCopyrightCalculator};
    use copyr_core::CopyrightStatus;

    /// Analyzer that fails for one title and succeeds otherwise.
    struct FlakyAnalyzer;

    #[async_trait]
    impl CountryAnalyzer for FlakyAnalyzer {
        fn country_code(&self) -> &'static str {
            "US"
        }

        fn supported_sources(&self) -> Vec<&'static str> {
            vec!["fixture"]
        }

        fn copyright_info(&self) -> CopyrightInfo {
            UsCopyrightCalculator::with_current_year(2025).info()
        }

        async fn analyze_work(&self, title: &str, author: &str, _hint: WorkTypeHint) -> Result<WorkRecord, AnalyzeError> {
            if title == "Broken" {
                return Err(Error::InvalidInput("fixture failure".into()).into());
            }
            let mut record = WorkRecord::unknown(title, author, "US", "");
            record.status = CopyrightStatus::PublicDomain;
            Ok(record)
        }
    }

    fn item(title: &str, country: Option<&str>) -> BatchItem {
        BatchItem {
            title: title.into(),
            author: "Someone".into(),
            work_type: WorkTypeHint::Auto,
            country: country.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_batch_turns_failures_into_unknown_records() {
        let analyzer = CopyrightAnalyzer::with_analyzers(vec![Box::new(FlakyAnalyzer)], "US");
        let records =
            analyzer.analyze_batch(&[item("Emma", None), item("Broken", None), item("Walden", Some("FR"))]).await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, CopyrightStatus::PublicDomain);
        assert_eq!(records[1].status, CopyrightStatus::Unknown);
        assert!(records[1].notes.starts_with("Analysis failed: VALIDATION_ERROR"));
        assert!(records[2].notes.contains("not supported"));
        assert_eq!(records[2].country, "FR");
    }

    #[tokio::test]
    async fn test_dispatch_is_case_insensitive_and_rejects_unknown_countries() {
        let analyzer = CopyrightAnalyzer::with_analyzers(vec![Box::new(FlakyAnalyzer)], "US");
        assert!(analyzer.analyze_work("Emma", "Austen", WorkTypeHint::Auto, Some("us")).await.is_ok());
        assert_eq!(analyzer.supported_sources(None).unwrap(), vec!["fixture"]);

        let err = analyzer.copyright_info(Some("GB")).err().unwrap();
        assert!(matches!(err, Error::UnsupportedCountry { ref supported, .. } if supported == "US"));
    }

    #[test]
    fn test_batch_item_defaults() {
        let item: BatchItem = serde_json::from_str(r#"{"title": "Emma", "author": "Jane Austen"}"#).unwrap();
        assert_eq!(item.work_type, WorkTypeHint::Auto);
        assert!(item.country.is_none());
    }
}
