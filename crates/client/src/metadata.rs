//! Metadata normalization and multi-source merge.
//!
//! Library of Congress data is preferred for bibliographic fields,
//! HathiTrust fills missing titles and years and contributes rights codes,
//! and MusicBrainz supplies music titles, composers and life span years.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::Utc;
use copyr_core::copyright::Assessment;
use copyr_core::{Authorship, WorkRecord, WorkType, WorkTypeHint};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::hathitrust::{HathiResult, RightsSummary};
use crate::loc::LocSearchResult;
use crate::musicbrainz::{ArtistSearchResult, WorkSearchResult};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static PARENTHETICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("parenthetical pattern is valid"));
static HONORIFIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(jr|sr|iii|ii|iv|phd|dr|prof)\b\.?").expect("honorific pattern is valid"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").expect("year pattern is valid"));
static LIFE_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\??\s*-\s*(\d{4})").expect("life span pattern is valid"));

const CORPORATE_INDICATORS: &[&str] =
    &["company", "corporation", "inc.", "ltd.", "llc", "university", "press", "government"];
const ANONYMOUS_INDICATORS: &[&str] = &["anonymous", "unknown", "various", "anon."];

/// Source weights for the combined confidence score.
fn source_weight(source: &str) -> f64 {
    match source {
        "loc" => 0.4,
        "hathitrust" | "musicbrainz" => 0.3,
        _ => 0.2,
    }
}

fn collapse(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// "Twain, Mark (1835-1910)" becomes "Mark Twain".
pub fn normalize_author_name(name: &str) -> String {
    let mut name = collapse(name);
    if name.is_empty() {
        return name;
    }

    if let Some((last, first)) = name.split_once(',')
        && !first.contains(',')
    {
        name = format!("{} {}", first.trim(), last.trim());
    }
    let name = PARENTHETICAL_RE.replace_all(&name, "");
    let name = HONORIFIC_RE.replace_all(&name, "");
    collapse(name.trim_matches([',', ' ']))
}

/// First four-digit year between 1500 and 2099 in `text`.
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR_RE.captures(text).and_then(|c| c[1].parse().ok())
}

/// Death year from a catalog date string such as `1896-1940` or `d. 1940`.
pub fn extract_death_year(dates: &str) -> Option<i32> {
    let lower = dates.to_lowercase();
    if let Some(caps) = LIFE_SPAN_RE.captures(&lower) {
        return caps[2].parse().ok();
    }
    if lower.contains("d.") || lower.contains("died") {
        return extract_year(&lower);
    }
    None
}

/// Legal authorship class inferred from the author name.
pub fn determine_authorship(author_name: &str) -> Authorship {
    let name = author_name.to_lowercase();
    if CORPORATE_INDICATORS.iter().any(|i| name.contains(i)) {
        Authorship::WorkForHire
    } else if ANONYMOUS_INDICATORS.iter().any(|i| name.contains(i)) {
        Authorship::Anonymous
    } else {
        Authorship::Individual
    }
}

/// Source responses available for one work.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeInputs<'a> {
    pub loc: Option<&'a LocSearchResult>,
    pub hathitrust: Option<&'a HathiResult>,
    pub musicbrainz_work: Option<&'a WorkSearchResult>,
    pub musicbrainz_artist: Option<&'a ArtistSearchResult>,
    pub search_title: &'a str,
    pub search_author: &'a str,
    pub hint: WorkTypeHint,
}

/// Normalized metadata for one work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedMetadata {
    pub title: String,
    pub author_name: String,
    pub publication_year: Option<i32>,
    pub author_death_year: Option<i32>,
    /// Country of the matched artist, when MusicBrainz knows it.
    pub author_country: Option<String>,
    pub authorship: Authorship,
    pub work_type: Option<WorkType>,
    pub work_type_confidence: Option<f64>,
    pub classification_source: Option<String>,
    pub confidence_sources: BTreeMap<String, f64>,
    pub source_links: BTreeMap<String, String>,
    pub hathi_rights: Option<RightsSummary>,
}

fn title_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if !(a.contains(&b) || b.contains(&a)) {
        return 0.0;
    }
    let (short, long) = (a.chars().count().min(b.chars().count()), a.chars().count().max(b.chars().count()));
    if long == 0 { 0.0 } else { short as f64 / long as f64 }
}

/// The listed author closest to the requested one, else the first.
fn select_author<'a>(authors: &'a [String], target: &str) -> Option<&'a String> {
    let target = target.to_lowercase();
    authors
        .iter()
        .find(|author| {
            let normalized = normalize_author_name(author).to_lowercase();
            !target.is_empty()
                && (normalized.contains(&target)
                    || target.contains(&normalized)
                    || author.to_lowercase().contains(&target.replace(' ', ", ")))
        })
        .or_else(|| authors.first())
}

/// Merge all available source data into one metadata view.
pub fn merge_sources(inputs: &MergeInputs<'_>) -> MergedMetadata {
    let mut merged = MergedMetadata::default();

    if let Some(loc) = inputs.loc
        && let Some(best) = &loc.best_match
    {
        if !best.title.is_empty() && (title_similarity(&best.title, inputs.search_title) > 0.6 || loc.confidence > 0.7) {
            merged.title = best.title.clone();
        }
        if let Some(author) = select_author(&best.authors, inputs.search_author) {
            merged.author_name = normalize_author_name(author);
        }
        merged.publication_year = best.publication_year;
        merged.author_death_year = best.author_death_year;
        if let Some(url) = &best.url {
            merged.source_links.insert("loc".into(), url.clone());
        }
        if let Some(work_type) = best.work_type {
            merged.work_type = Some(work_type);
            merged.work_type_confidence = Some(best.work_type_confidence);
            merged.classification_source = Some(best.classification_source.clone());
        }
        merged.confidence_sources.insert("loc".into(), loc.confidence);
    }

    if let Some(hathi) = inputs.hathitrust
        && let Some(data) = &hathi.data
        && let Some(volume) = &data.best_volume
    {
        let loc_confidence = merged.confidence_sources.get("loc").copied().unwrap_or_default();
        if !volume.title.is_empty() && (merged.title.is_empty() || hathi.confidence > loc_confidence) {
            merged.title = volume.title.clone();
        }
        if merged.publication_year.is_none() {
            merged.publication_year = extract_year(&volume.publication_date);
        }
        if !volume.url.is_empty() {
            merged.source_links.insert("hathitrust".into(), volume.url.clone());
        }
        merged.hathi_rights = Some(data.rights_summary.clone());
        merged.confidence_sources.insert("hathitrust".into(), hathi.confidence);
    }

    if let Some(mb) = inputs.musicbrainz_work
        && let Some(best) = &mb.best_match
    {
        if merged.title.is_empty() && !best.title.is_empty() {
            merged.title = best.title.clone();
        }
        if merged.author_name.is_empty()
            && let Some(composer) = best.composers.first()
        {
            merged.author_name = normalize_author_name(&composer.name);
            merged.author_death_year = merged.author_death_year.or(composer.death_year);
        }
        if merged.publication_year.is_none() {
            merged.publication_year = best.earliest_release_year;
        }
        merged.source_links.insert("musicbrainz".into(), best.url.clone());
        if merged.work_type.is_none() {
            merged.work_type = Some(WorkType::Musical);
            merged.work_type_confidence = Some(mb.confidence);
            merged.classification_source = Some("musicbrainz".into());
        }
        merged.confidence_sources.insert("musicbrainz".into(), mb.confidence);
    }

    if let Some(artists) = inputs.musicbrainz_artist
        && let Some(artist) = &artists.best_match
    {
        // a matched artist's life span beats the catalog's date part
        if artist.death_year.is_some() {
            merged.author_death_year = artist.death_year;
        }
        merged.author_country = artist.country.clone();
    }

    if let Some(work_type) = inputs.hint.work_type() {
        merged.work_type = Some(work_type);
        merged.work_type_confidence = Some(1.0);
        merged.classification_source = Some("user_specified".into());
    }

    let authorship_name = if merged.author_name.is_empty() { inputs.search_author } else { &merged.author_name };
    merged.authorship = determine_authorship(authorship_name);
    merged
}

/// Weighted average of per-source confidences.
pub fn weighted_confidence(sources: &BTreeMap<String, f64>) -> f64 {
    let (total, weight) = sources.iter().fold((0.0, 0.0), |(total, weight), (source, confidence)| {
        let w = source_weight(source);
        (total + confidence * w, weight + w)
    });
    if weight > 0.0 { total / weight } else { 0.0 }
}

/// Final record from merged metadata and a term assessment.
pub fn create_work_record(
    title: &str, author: &str, country: &str, merged: &MergedMetadata, assessment: Assessment,
) -> WorkRecord {
    WorkRecord {
        title: if merged.title.is_empty() { title.to_string() } else { merged.title.clone() },
        author_name: if merged.author_name.is_empty() { author.to_string() } else { merged.author_name.clone() },
        publication_year: merged.publication_year,
        published: true,
        country: country.to_string(),
        year_of_death: merged.author_death_year,
        work_type: merged.work_type,
        authorship: merged.authorship,
        status: assessment.status,
        enters_public_domain: assessment.enters_public_domain,
        source_links: merged.source_links.clone(),
        notes: assessment.notes,
        queried_at: Utc::now(),
        confidence_score: weighted_confidence(&merged.confidence_sources),
        work_type_confidence: merged.work_type_confidence,
        classification_source: merged.classification_source.clone(),
    }
}
