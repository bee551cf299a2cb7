//! HathiTrust Digital Library client.
//!
//! The brief volumes API is identifier based: lookups go by OCLC number,
//! ISBN or LCCN, usually taken from a Library of Congress match. Rights
//! codes on the returned volumes indicate US public domain status.

pub mod response;

pub use response::{RightsSummary, Volume, VolumeData};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::http::{SourceConfig, SourceHttp};
use response::BriefResponse;

/// Identifier kinds accepted by the brief API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    Oclc,
    Isbn,
    Lccn,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdType::Oclc => "oclc",
            IdType::Isbn => "isbn",
            IdType::Lccn => "lccn",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oclc" => Ok(IdType::Oclc),
            "isbn" => Ok(IdType::Isbn),
            "lccn" => Ok(IdType::Lccn),
            other => Err(SourceError::InvalidQuery(format!("Unsupported identifier type: {other}"))),
        }
    }
}

/// Result of one identifier lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HathiResult {
    /// None when HathiTrust holds no volumes for the identifier.
    pub data: Option<VolumeData>,
    pub confidence: f64,
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct HathiTrustClient {
    http: SourceHttp,
    base_url: String,
}

impl HathiTrustClient {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self { http: SourceHttp::new(config, "hathitrust", "application/json")?, base_url: config.base_url.clone() })
    }

    /// Look up volumes by an identifier type given as text.
    pub async fn volumes_by_identifier(&self, id_type: &str, identifier: &str) -> Result<HathiResult, SourceError> {
        self.volumes(id_type.parse()?, identifier).await
    }

    pub async fn volumes_by_oclc(&self, oclc: &str) -> Result<HathiResult, SourceError> {
        self.volumes(IdType::Oclc, oclc).await
    }

    pub async fn volumes_by_isbn(&self, isbn: &str) -> Result<HathiResult, SourceError> {
        self.volumes(IdType::Isbn, isbn).await
    }

    async fn volumes(&self, id_type: IdType, identifier: &str) -> Result<HathiResult, SourceError> {
        let identifier: String = identifier.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        if identifier.is_empty() {
            return Err(SourceError::InvalidQuery(format!("{id_type} identifier cannot be empty")));
        }

        let encoded: String = url::form_urlencoded::byte_serialize(identifier.as_bytes()).collect();
        let url = format!("{}/{id_type}:{encoded}", self.base_url);
        let body = self.http.get_text(&url, &[]).await?;

        let response: BriefResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Parse(format!("invalid HathiTrust JSON: {e}")))?;
        let data = response.into_volume_data();
        let confidence = if data.is_some() { 0.9 } else { 0.1 };
        tracing::debug!(%id_type, identifier, volumes = data.as_ref().map_or(0, |d| d.volumes.len()), "hathitrust lookup");

        Ok(HathiResult { data, confidence, source_url: url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::time::Duration;

    fn client(url: String) -> HathiTrustClient {
        HathiTrustClient::new(&SourceConfig::new(url, Duration::from_secs(5), "copyr-test/0.1", Duration::ZERO)).unwrap()
    }

    #[tokio::test]
    async fn test_volumes_by_oclc() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/oclc:1234567")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response::tests::BRIEF_FIXTURE)
            .create_async()
            .await;

        let result = client(server.url()).volumes_by_oclc("1234567").await.unwrap();
        mock.assert_async().await;
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.data.unwrap().volumes.len(), 3);
        assert!(result.source_url.ends_with("/oclc:1234567"));
    }

    #[tokio::test]
    async fn test_isbn_is_cleaned_and_empty_result_has_low_confidence() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/isbn:9780743273565")
            .with_status(200)
            .with_body(r#"{"records": {}, "items": []}"#)
            .create_async()
            .await;

        let result = client(server.url()).volumes_by_isbn("978-0-7432-7356-5").await.unwrap();
        assert!(result.data.is_none());
        assert_eq!(result.confidence, 0.1);
    }

    #[tokio::test]
    async fn test_unsupported_identifier_type() {
        let result = client("http://127.0.0.1:9".into()).volumes_by_identifier("issn", "1234").await;
        assert!(matches!(result, Err(SourceError::InvalidQuery(msg)) if msg == "Unsupported identifier type: issn"));
    }

    #[tokio::test]
    async fn test_rate_limited_status() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/oclc:1").with_status(429).create_async().await;
        let result = client(server.url()).volumes_by_oclc("1").await;
        assert!(matches!(result, Err(SourceError::RateLimited)));
    }
}
