//! SRU / MODS response parsing.
//!
//! The SRU envelope wraps each catalog record in
//! `srw:record/srw:recordData/mods:mods`. Only the fields needed for
//! copyright analysis are extracted; everything else is ignored.

use std::sync::LazyLock;

use copyr_core::WorkType;
use regex::Regex;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::metadata::{extract_death_year, extract_year};

const SRW_NS: &str = "http://www.loc.gov/zing/srw/";
const MODS_NS: &str = "http://www.loc.gov/mods/v3";

/// Label stored with every LoC classification.
pub const CLASSIFICATION_SOURCE: &str = "LOC_professional_cataloging";

static OCLC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:oclc|ocolc)\D*(\d+)").expect("oclc pattern is valid"));

const MUSIC_GENRES: &[&str] = &[
    "music", "score", "song", "opera", "symphony", "sonata", "concerto", "composition", "musical", "hymn",
];
const LITERARY_GENRES: &[&str] = &[
    "fiction", "novel", "poetry", "poem", "drama", "play", "essay", "biography", "literature", "short stor",
];
const MUSIC_FORMS: &[&str] = &["score", "sound recording", "audio", "sheet music"];

/// One catalog record, reduced to the fields the analyzer uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocRecord {
    pub title: String,
    pub authors: Vec<String>,
    /// Death year of the first author, from the MODS name date part.
    pub author_death_year: Option<i32>,
    pub publication_year: Option<i32>,
    pub date_issued: Option<String>,
    pub lccn: Option<String>,
    pub oclc: Option<String>,
    pub record_id: Option<String>,
    pub url: Option<String>,
    pub work_type: Option<WorkType>,
    pub work_type_confidence: f64,
    pub classification_source: String,
    pub genres: Vec<String>,
    pub subjects: Vec<String>,
}

/// Parsed SRU response.
#[derive(Debug, Clone, Default)]
pub struct SruPage {
    pub total_records: u64,
    pub records: Vec<LocRecord>,
}

fn child<'a, 'input>(node: Node<'a, 'input>, ns: &str, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name((ns, name)))
}

fn children<'a, 'input>(node: Node<'a, 'input>, ns: &'a str, name: &'a str) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| n.has_tag_name((ns, name)))
}

fn text_of(node: Node<'_, '_>) -> Option<String> {
    let parts: Vec<&str> = node.descendants().filter(|n| n.is_text()).filter_map(|n| n.text()).collect();
    let text = parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() { None } else { Some(text) }
}

fn parse_title(mods: Node<'_, '_>) -> String {
    let Some(info) = child(mods, MODS_NS, "titleInfo") else {
        return String::new();
    };
    let non_sort = child(info, MODS_NS, "nonSort").and_then(text_of).unwrap_or_default();
    let title = child(info, MODS_NS, "title").and_then(text_of).unwrap_or_default();
    let joined = if non_sort.is_empty() { title } else { format!("{non_sort} {title}") };
    joined.trim_end_matches(['/', ' ', ':', ';', ',']).to_string()
}

/// Personal names with their `type="date"` part split out.
fn parse_names(mods: Node<'_, '_>) -> (Vec<String>, Option<i32>) {
    let mut authors = Vec::new();
    let mut death_year = None;

    for name in children(mods, MODS_NS, "name") {
        if name.attribute("type").is_some_and(|t| t != "personal") {
            continue;
        }
        let mut parts = Vec::new();
        let mut dates = None;
        for part in children(name, MODS_NS, "namePart") {
            match part.attribute("type") {
                Some("date") => dates = text_of(part),
                _ => parts.extend(text_of(part)),
            }
        }
        let full = parts.join(", ").trim_end_matches(',').trim().to_string();
        if full.is_empty() {
            continue;
        }
        if authors.is_empty() {
            death_year = dates.as_deref().and_then(extract_death_year);
        }
        authors.push(full);
    }
    (authors, death_year)
}

fn parse_identifiers(mods: Node<'_, '_>) -> (Option<String>, Option<String>, Option<String>) {
    let mut lccn = None;
    let mut oclc = None;
    for id in children(mods, MODS_NS, "identifier") {
        let Some(value) = text_of(id) else { continue };
        match id.attribute("type") {
            Some("lccn") if lccn.is_none() => lccn = Some(value.replace(' ', "")),
            Some("oclc") if oclc.is_none() => oclc = Some(value.trim_start_matches(|c: char| !c.is_ascii_digit()).to_string()),
            _ => {}
        }
    }

    let record_info = child(mods, MODS_NS, "recordInfo");
    let record_id = record_info.and_then(|r| child(r, MODS_NS, "recordIdentifier")).and_then(text_of);

    if oclc.is_none() {
        let candidates = record_info
            .into_iter()
            .flat_map(|r| children(r, MODS_NS, "recordIdentifier"))
            .chain(children(mods, MODS_NS, "identifier"))
            .filter_map(text_of);
        oclc = candidates.filter_map(|t| OCLC_RE.captures(&t).map(|c| c[1].to_string())).next();
    }

    (lccn, oclc, record_id)
}

fn collect_texts(mods: Node<'_, '_>, name: &'static str) -> Vec<String> {
    children(mods, MODS_NS, name).filter_map(text_of).collect()
}

fn any_keyword(haystack: &[String], keywords: &[&str]) -> bool {
    haystack.iter().any(|h| {
        let h = h.to_lowercase();
        keywords.iter().any(|k| h.contains(k))
    })
}

/// Classify from catalog fields, strongest signal first.
pub fn classify(type_of_resource: Option<&str>, genres: &[String], subjects: &[String], forms: &[String]) -> (WorkType, f64) {
    if let Some(kind) = type_of_resource.map(str::to_lowercase) {
        if kind.contains("notated music") || kind.contains("sound recording-musical") {
            return (WorkType::Musical, 0.95);
        }
        if kind == "text" && !any_keyword(genres, MUSIC_GENRES) {
            return (WorkType::Literary, 0.95);
        }
    }
    if any_keyword(genres, MUSIC_GENRES) {
        return (WorkType::Musical, 0.90);
    }
    if any_keyword(genres, LITERARY_GENRES) {
        return (WorkType::Literary, 0.90);
    }
    if any_keyword(subjects, MUSIC_GENRES) {
        return (WorkType::Musical, 0.80);
    }
    if any_keyword(subjects, LITERARY_GENRES) {
        return (WorkType::Literary, 0.80);
    }
    if any_keyword(forms, MUSIC_FORMS) {
        return (WorkType::Musical, 0.75);
    }
    (WorkType::Literary, 0.70)
}

fn parse_mods(mods: Node<'_, '_>) -> LocRecord {
    let (authors, author_death_year) = parse_names(mods);
    let (lccn, oclc, record_id) = parse_identifiers(mods);

    let date_issued = child(mods, MODS_NS, "originInfo").and_then(|o| child(o, MODS_NS, "dateIssued")).and_then(text_of);
    let publication_year = date_issued.as_deref().and_then(extract_year);

    let genres = collect_texts(mods, "genre");
    let subjects = collect_texts(mods, "subject");
    let forms: Vec<String> = children(mods, MODS_NS, "physicalDescription")
        .flat_map(|p| children(p, MODS_NS, "form"))
        .filter_map(text_of)
        .collect();
    let type_of_resource = child(mods, MODS_NS, "typeOfResource").and_then(text_of);
    let (work_type, confidence) = classify(type_of_resource.as_deref(), &genres, &subjects, &forms);

    let url = match (&lccn, &record_id) {
        (Some(lccn), _) => Some(format!("https://lccn.loc.gov/{lccn}")),
        (None, Some(id)) => Some(format!("https://catalog.loc.gov/vwebv/holdingsInfo?bibId={id}")),
        (None, None) => None,
    };

    LocRecord {
        title: parse_title(mods),
        authors,
        author_death_year,
        publication_year,
        date_issued,
        lccn,
        oclc,
        record_id,
        url,
        work_type: Some(work_type),
        work_type_confidence: confidence,
        classification_source: CLASSIFICATION_SOURCE.to_string(),
        genres,
        subjects,
    }
}

/// Parse an SRU searchRetrieve response body.
///
/// # Errors
///
/// Returns `SourceError::Parse` if the body is not well-formed XML.
pub fn parse_sru(xml: &str) -> Result<SruPage, SourceError> {
    let doc = Document::parse(xml).map_err(|e| SourceError::Parse(format!("invalid SRU XML: {e}")))?;
    let root = doc.root_element();

    let total_records = root
        .descendants()
        .find(|n| n.has_tag_name((SRW_NS, "numberOfRecords")))
        .and_then(|n| n.text())
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(0);

    let records = root
        .descendants()
        .filter(|n| n.has_tag_name((MODS_NS, "mods")))
        .map(parse_mods)
        .filter(|r| !r.title.is_empty())
        .collect();

    Ok(SruPage { total_records, records })
}
