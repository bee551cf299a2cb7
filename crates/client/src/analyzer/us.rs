//! United States analyzer.
//!
//! Library of Congress (followed by HathiTrust when the match carries an
//! OCLC number) runs concurrently with the MusicBrainz work and artist
//! lookups. A failing source is logged and left out of the merge.

use async_trait::async_trait;
use copyr_core::copyright::{CopyrightCalculator, CopyrightInfo, UsCopyrightCalculator};
use copyr_core::{Error, WorkRecord, WorkTypeHint};

use super::CountryAnalyzer;
use crate::SourceClients;
use crate::error::{AnalyzeError, SourceError};
use crate::hathitrust::HathiResult;
use crate::loc::LocSearchResult;
use crate::loc::query::is_generic_author;
use crate::metadata::{MergeInputs, create_work_record, merge_sources};

pub struct UsAnalyzer {
    clients: SourceClients,
    calculator: UsCopyrightCalculator,
}

fn ok_or_log<T>(source: &'static str, result: Result<T, SourceError>) -> Option<T> {
    result.map_err(|e| tracing::warn!(source, error = %e, "metadata source failed")).ok()
}

impl UsAnalyzer {
    pub fn new(clients: SourceClients) -> Self {
        Self { clients, calculator: UsCopyrightCalculator::new() }
    }

    /// Analyzer with a fixed calculator, for reproducible results.
    pub fn with_calculator(clients: SourceClients, calculator: UsCopyrightCalculator) -> Self {
        Self { clients, calculator }
    }

    async fn catalog_lookup(&self, title: &str, author: &str) -> (Option<LocSearchResult>, Option<HathiResult>) {
        let Some(loc) = ok_or_log("library_of_congress", self.clients.loc.search_books(title, author).await) else {
            return (None, None);
        };
        tracing::debug!(total = loc.total_records, "library of congress results");

        let oclc = loc.best_match.as_ref().and_then(|m| m.oclc.clone());
        let hathi = match oclc {
            Some(oclc) => ok_or_log("hathitrust", self.clients.hathitrust.volumes_by_oclc(&oclc).await),
            None => {
                tracing::debug!("skipping hathitrust, no oclc number");
                None
            }
        };
        (Some(loc), hathi)
    }

    /// Drop years the calculator would reject instead of failing the analysis.
    fn checked_years(&self, publication: Option<i32>, death: Option<i32>) -> (Option<i32>, Option<i32>) {
        let publication = match self.calculator.validate_years(publication, None) {
            Ok(()) => publication,
            Err(e) => {
                tracing::warn!(error = %e, "discarding publication year");
                None
            }
        };
        let death = match self.calculator.validate_years(publication, death) {
            Ok(()) => death,
            Err(e) => {
                tracing::warn!(error = %e, "discarding death year");
                None
            }
        };
        (publication, death)
    }
}

#[async_trait]
impl CountryAnalyzer for UsAnalyzer {
    fn country_code(&self) -> &'static str {
        "US"
    }

    fn supported_sources(&self) -> Vec<&'static str> {
        vec!["library_of_congress", "hathitrust", "musicbrainz"]
    }

    fn copyright_info(&self) -> CopyrightInfo {
        self.calculator.info()
    }

    async fn analyze_work(&self, title: &str, author: &str, hint: WorkTypeHint) -> Result<WorkRecord, AnalyzeError> {
        let (title, author) = (title.trim(), author.trim());
        if title.is_empty() && author.is_empty() {
            return Err(Error::InvalidInput("title or author is required".into()).into());
        }
        tracing::info!(title, author, work_type = %hint, "analyzing work");

        let works_lookup = async {
            if hint.includes_music() && !title.is_empty() {
                ok_or_log("musicbrainz", self.clients.musicbrainz.search_works(title, author).await)
            } else {
                None
            }
        };
        let artist_lookup = async {
            if is_generic_author(author) {
                None
            } else {
                ok_or_log("musicbrainz", self.clients.musicbrainz.search_artists(author).await)
            }
        };
        let ((loc, hathi), mb_works, mb_artist) =
            tokio::join!(self.catalog_lookup(title, author), works_lookup, artist_lookup);

        let mut merged = merge_sources(&MergeInputs {
            loc: loc.as_ref(),
            hathitrust: hathi.as_ref(),
            musicbrainz_work: mb_works.as_ref(),
            musicbrainz_artist: mb_artist.as_ref(),
            search_title: title,
            search_author: author,
            hint,
        });
        (merged.publication_year, merged.author_death_year) =
            self.checked_years(merged.publication_year, merged.author_death_year);
        tracing::debug!(
            title = %merged.title,
            author = %merged.author_name,
            publication_year = ?merged.publication_year,
            death_year = ?merged.author_death_year,
            "merged metadata"
        );

        let assessment =
            self.calculator.calculate_status(merged.publication_year, merged.author_death_year, merged.authorship);
        tracing::info!(status = %assessment.status, enters_public_domain = ?assessment.enters_public_domain, "analysis complete");

        Ok(create_work_record(title, author, self.country_code(), &merged, assessment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hathitrust::response::tests::BRIEF_FIXTURE;
    use crate::loc::mods::tests::SRU_FIXTURE;
    use crate::musicbrainz::response::tests::ARTISTS_FIXTURE;
    use crate::test_support::clients_at;
    use copyr_core::{CopyrightStatus, WorkType};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_literary_analysis_merges_catalog_sources() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/loc").match_query(Matcher::Any).with_status(200).with_body(SRU_FIXTURE).create_async().await;
        let hathi = server
            .mock("GET", "/hathi/oclc:1234567")
            .with_status(200)
            .with_body(BRIEF_FIXTURE)
            .create_async()
            .await;
        server
            .mock("GET", "/mb/artist")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"artists": []}"#)
            .create_async()
            .await;
        let works = server.mock("GET", "/mb/work").match_query(Matcher::Any).expect(0).create_async().await;

        let analyzer = UsAnalyzer::with_calculator(clients_at(&server.url()), UsCopyrightCalculator::with_current_year(2025));
        let record = analyzer.analyze_work("The Great Gatsby", "Fitzgerald", WorkTypeHint::Literary).await.unwrap();

        hathi.assert_async().await;
        works.assert_async().await;
        assert_eq!(record.title, "The great Gatsby");
        assert_eq!(record.author_name, "F. Scott Fitzgerald");
        assert_eq!(record.publication_year, Some(1925));
        assert_eq!(record.year_of_death, Some(1940));
        assert_eq!(record.work_type, Some(WorkType::Literary));
        assert_eq!(record.status, CopyrightStatus::PublicDomain);
        assert_eq!(record.enters_public_domain, Some(2020));
        assert!(record.source_links.contains_key("loc"));
        assert!(record.source_links.contains_key("hathitrust"));
    }

    #[tokio::test]
    async fn test_failed_sources_still_produce_a_record() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/loc").match_query(Matcher::Any).with_status(500).create_async().await;
        server.mock("GET", "/mb/work").match_query(Matcher::Any).with_status(503).create_async().await;
        server
            .mock("GET", "/mb/artist")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(ARTISTS_FIXTURE)
            .create_async()
            .await;

        let analyzer = UsAnalyzer::with_calculator(clients_at(&server.url()), UsCopyrightCalculator::with_current_year(2025));
        let record = analyzer.analyze_work("Fur Elise", "Ludwig van Beethoven", WorkTypeHint::Auto).await.unwrap();

        assert_eq!(record.title, "Fur Elise");
        assert_eq!(record.year_of_death, Some(1827));
        assert_eq!(record.status, CopyrightStatus::Unknown);
        assert_eq!(record.confidence_score, 0.0);
    }

    #[tokio::test]
    async fn test_blank_request_is_rejected() {
        let analyzer = UsAnalyzer::new(clients_at("http://127.0.0.1:9"));
        let result = analyzer.analyze_work(" ", "", WorkTypeHint::Auto).await;
        assert!(matches!(result, Err(AnalyzeError::Core(Error::InvalidInput(_)))));
    }
}
