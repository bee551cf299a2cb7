//! HathiTrust brief volumes API response types and normalization.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Raw response from `/volumes/brief/json/{type}:{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct BriefResponse {
    #[serde(default)]
    pub records: HashMap<String, BriefRecord>,
    #[serde(default)]
    pub items: Vec<BriefItem>,
}

/// Catalog record metadata.
#[derive(Debug, Default, Deserialize)]
pub struct BriefRecord {
    #[serde(default, rename = "recordURL")]
    pub record_url: Option<String>,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default, rename = "publishDates")]
    pub publish_dates: Vec<String>,
}

/// One digitized volume.
#[derive(Debug, Default, Deserialize)]
pub struct BriefItem {
    #[serde(default, rename = "fromRecord")]
    pub from_record: String,
    pub htid: String,
    #[serde(default, rename = "itemURL")]
    pub item_url: Option<String>,
    #[serde(default, rename = "rightsCode")]
    pub rights_code: Option<String>,
    #[serde(default, rename = "usRightsString")]
    pub us_rights: Option<String>,
}

/// Normalized volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub item_id: String,
    pub title: String,
    pub publication_date: String,
    pub rights: String,
    /// US access level, `Full view` or `Limited (search-only)`.
    pub access: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RightsSummary {
    pub most_common_rights: String,
    pub rights_distribution: BTreeMap<String, u32>,
    pub interpretation: BTreeMap<String, String>,
}

/// Volumes for one identifier lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeData {
    pub volumes: Vec<Volume>,
    pub rights_summary: RightsSummary,
    pub best_volume: Option<Volume>,
}

fn rights_meaning(code: &str) -> Option<&'static str> {
    Some(match code.to_lowercase().as_str() {
        "pd" => "Public Domain - free to use",
        "pdus" => "Public Domain in US - free to use in US",
        "ic" => "In Copyright - restricted access",
        "ic-world" => "In Copyright worldwide - restricted access",
        "und" => "Undetermined copyright status",
        "cc" => "Creative Commons license",
        "opb" => "Open access book",
        _ => return None,
    })
}

pub fn summarize_rights(volumes: &[Volume]) -> RightsSummary {
    let mut distribution: BTreeMap<String, u32> = BTreeMap::new();
    for volume in volumes {
        let code = if volume.rights.is_empty() { "unknown" } else { volume.rights.as_str() };
        *distribution.entry(code.to_string()).or_default() += 1;
    }

    // ties go to the code that sorts first
    let most_common_rights = distribution
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(code, _)| code.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let interpretation = distribution
        .iter()
        .map(|(code, count)| {
            let meaning = rights_meaning(code).map(str::to_string).unwrap_or_else(|| format!("Unknown rights code: {code}"));
            (code.clone(), format!("{meaning} ({count} volumes)"))
        })
        .collect();

    RightsSummary { most_common_rights, rights_distribution: distribution, interpretation }
}

/// Preference score: public domain first, then full view, then later publication.
pub fn score_volume(volume: &Volume) -> i64 {
    let rights = volume.rights.to_lowercase();
    let mut score = 0;
    if rights.contains("pd") || rights.contains("public") {
        score += 100;
    }
    if volume.access.eq_ignore_ascii_case("full view") || volume.access == "allow" {
        score += 50;
    }
    if !volume.publication_date.is_empty()
        && volume.publication_date.chars().all(|c| c.is_ascii_digit())
        && let Ok(year) = volume.publication_date.parse::<i64>()
    {
        score += year / 100;
    }
    score
}

impl BriefResponse {
    /// None when the lookup matched no volumes.
    pub fn into_volume_data(self) -> Option<VolumeData> {
        if self.items.is_empty() {
            return None;
        }

        let volumes: Vec<Volume> = self
            .items
            .into_iter()
            .map(|item| {
                let record = self.records.get(&item.from_record);
                let record_url = record.and_then(|r| r.record_url.clone());
                Volume {
                    title: record.and_then(|r| r.titles.first().cloned()).unwrap_or_default(),
                    publication_date: record.and_then(|r| r.publish_dates.first().cloned()).unwrap_or_default(),
                    rights: item.rights_code.unwrap_or_default(),
                    access: item.us_rights.unwrap_or_default(),
                    url: item
                        .item_url
                        .or(record_url)
                        .unwrap_or_else(|| format!("https://babel.hathitrust.org/cgi/pt?id={}", item.htid)),
                    item_id: item.htid,
                }
            })
            .collect();

        let rights_summary = summarize_rights(&volumes);
        let best_volume = volumes.iter().max_by_key(|v| score_volume(v)).cloned();
        Some(VolumeData { volumes, rights_summary, best_volume })
    }
}
