//! Domain types shared by the analyzer, cache and REST layers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Broad category of a creative work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Literary,
    Musical,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Literary => "literary",
            WorkType::Musical => "musical",
        }
    }

    /// Display category used by the frontend cards.
    pub fn category(&self) -> &'static str {
        match self {
            WorkType::Literary => "Literature",
            WorkType::Musical => "Music",
        }
    }
}

/// Work type requested by a caller; `Auto` lets the sources decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkTypeHint {
    Literary,
    Musical,
    #[default]
    Auto,
}

impl WorkTypeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkTypeHint::Literary => "literary",
            WorkTypeHint::Musical => "musical",
            WorkTypeHint::Auto => "auto",
        }
    }

    /// Concrete work type, if one was requested.
    pub fn work_type(&self) -> Option<WorkType> {
        match self {
            WorkTypeHint::Literary => Some(WorkType::Literary),
            WorkTypeHint::Musical => Some(WorkType::Musical),
            WorkTypeHint::Auto => None,
        }
    }

    /// Whether music sources should be consulted.
    pub fn includes_music(&self) -> bool {
        matches!(self, WorkTypeHint::Musical | WorkTypeHint::Auto)
    }
}

/// Legal authorship class that selects the copyright term rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorship {
    #[default]
    Individual,
    WorkForHire,
    Anonymous,
    Pseudonymous,
}

impl Authorship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authorship::Individual => "individual",
            Authorship::WorkForHire => "work_for_hire",
            Authorship::Anonymous => "anonymous",
            Authorship::Pseudonymous => "pseudonymous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyrightStatus {
    #[serde(rename = "Public Domain")]
    PublicDomain,
    #[serde(rename = "Under Copyright")]
    UnderCopyright,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl CopyrightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyrightStatus::PublicDomain => "Public Domain",
            CopyrightStatus::UnderCopyright => "Under Copyright",
            CopyrightStatus::Unknown => "Unknown",
        }
    }
}

/// Freshness of a cached row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Fresh,
    Stale,
    Expired,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Stale => "stale",
            CacheStatus::Expired => "expired",
        }
    }
}

macro_rules! impl_str_enum {
    ($ty:ty, $what:literal, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| Error::InvalidInput(format!(concat!("invalid ", $what, ": {}"), s)))
            }
        }
    };
}

impl_str_enum!(WorkType, "work type", [WorkType::Literary, WorkType::Musical]);
impl_str_enum!(WorkTypeHint, "work type", [WorkTypeHint::Literary, WorkTypeHint::Musical, WorkTypeHint::Auto]);
impl_str_enum!(
    Authorship,
    "authorship",
    [Authorship::Individual, Authorship::WorkForHire, Authorship::Anonymous, Authorship::Pseudonymous]
);
impl_str_enum!(
    CopyrightStatus,
    "copyright status",
    [CopyrightStatus::PublicDomain, CopyrightStatus::UnderCopyright, CopyrightStatus::Unknown]
);
impl_str_enum!(CacheStatus, "cache status", [CacheStatus::Fresh, CacheStatus::Stale, CacheStatus::Expired]);

/// Result of analyzing one work against a country's copyright rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRecord {
    pub title: String,
    pub author_name: String,
    pub publication_year: Option<i32>,
    pub published: bool,
    pub country: String,
    pub year_of_death: Option<i32>,
    pub work_type: Option<WorkType>,
    pub authorship: Authorship,
    pub status: CopyrightStatus,
    pub enters_public_domain: Option<i32>,
    /// Source name to catalog URL.
    pub source_links: BTreeMap<String, String>,
    pub notes: String,
    pub queried_at: DateTime<Utc>,
    pub confidence_score: f64,
    pub work_type_confidence: Option<f64>,
    pub classification_source: Option<String>,
}

impl WorkRecord {
    /// Record for a work that could not be analyzed.
    pub fn unknown(title: &str, author: &str, country: &str, notes: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            author_name: author.to_string(),
            publication_year: None,
            published: true,
            country: country.to_string(),
            year_of_death: None,
            work_type: None,
            authorship: Authorship::Individual,
            status: CopyrightStatus::Unknown,
            enters_public_domain: None,
            source_links: BTreeMap::new(),
            notes: notes.into(),
            queried_at: Utc::now(),
            confidence_score: 0.0,
            work_type_confidence: None,
            classification_source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_display_names() {
        let json = serde_json::to_string(&CopyrightStatus::PublicDomain).unwrap();
        assert_eq!(json, "\"Public Domain\"");
        let parsed: CopyrightStatus = "under copyright".parse().unwrap();
        assert_eq!(parsed, CopyrightStatus::UnderCopyright);
    }

    #[test]
    fn test_work_type_hint_parsing() {
        assert_eq!("AUTO".parse::<WorkTypeHint>().unwrap(), WorkTypeHint::Auto);
        assert_eq!("musical".parse::<WorkTypeHint>().unwrap().work_type(), Some(WorkType::Musical));
        assert!("film".parse::<WorkTypeHint>().is_err());
    }

    #[test]
    fn test_authorship_round_trips_snake_case() {
        let json = serde_json::to_string(&Authorship::WorkForHire).unwrap();
        assert_eq!(json, "\"work_for_hire\"");
        assert_eq!("work_for_hire".parse::<Authorship>().unwrap(), Authorship::WorkForHire);
    }

    #[test]
    fn test_unknown_record() {
        let record = WorkRecord::unknown("Hamlet", "Shakespeare", "US", "Analysis failed: timeout");
        assert_eq!(record.status, CopyrightStatus::Unknown);
        assert_eq!(record.confidence_score, 0.0);
        assert!(record.published);
        assert!(record.source_links.is_empty());
    }
}
