//! MusicBrainz JSON response types and normalization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct WorkSearchResponse {
    #[serde(default)]
    pub works: Vec<ApiWork>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiWork {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub relations: Vec<ApiRelation>,
    #[serde(default)]
    pub tags: Vec<ApiTag>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiRelation {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub artist: Option<ApiArtist>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiTag {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LifeSpan {
    #[serde(default)]
    pub begin: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiArtist {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "sort-name")]
    pub sort_name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, rename = "life-span")]
    pub life_span: Option<LifeSpan>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArtistSearchResponse {
    #[serde(default)]
    pub artists: Vec<ApiArtist>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordingSearchResponse {
    #[serde(default)]
    pub recordings: Vec<ApiRecording>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiRecording {
    #[serde(default, rename = "first-release-date")]
    pub first_release_date: Option<String>,
    #[serde(default)]
    pub releases: Vec<ApiRelease>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiRelease {
    #[serde(default)]
    pub date: Option<String>,
}

/// Composer credited on a work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composer {
    pub id: String,
    pub name: String,
    pub sort_name: String,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
}

/// Normalized musical work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbWork {
    pub id: String,
    pub title: String,
    pub kind: Option<String>,
    pub language: Option<String>,
    pub composers: Vec<Composer>,
    pub tags: Vec<String>,
    pub earliest_release_year: Option<i32>,
    pub url: String,
}

/// Normalized artist with life span years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbArtist {
    pub id: String,
    pub name: String,
    pub sort_name: String,
    pub kind: Option<String>,
    pub country: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub url: String,
}

/// Leading `YYYY` of a MusicBrainz partial date.
pub fn date_year(date: Option<&str>) -> Option<i32> {
    let date = date?;
    date.get(..4).filter(|y| y.chars().all(|c| c.is_ascii_digit())).and_then(|y| y.parse().ok())
}

fn life_years(span: Option<&LifeSpan>) -> (Option<i32>, Option<i32>) {
    span.map_or((None, None), |s| (date_year(s.begin.as_deref()), date_year(s.end.as_deref())))
}

impl From<ApiWork> for MbWork {
    fn from(work: ApiWork) -> Self {
        let composers = work
            .relations
            .into_iter()
            .filter(|r| r.kind == "composer")
            .filter_map(|r| r.artist)
            .map(|a| {
                let (birth_year, death_year) = life_years(a.life_span.as_ref());
                Composer { id: a.id, name: a.name, sort_name: a.sort_name, birth_year, death_year }
            })
            .collect();

        MbWork {
            url: format!("https://musicbrainz.org/work/{}", work.id),
            id: work.id,
            title: work.title,
            kind: work.kind,
            language: work.language,
            composers,
            tags: work.tags.into_iter().map(|t| t.name).filter(|t| !t.is_empty()).collect(),
            earliest_release_year: None,
        }
    }
}

impl From<ApiArtist> for MbArtist {
    fn from(artist: ApiArtist) -> Self {
        let (birth_year, death_year) = life_years(artist.life_span.as_ref());
        MbArtist {
            url: format!("https://musicbrainz.org/artist/{}", artist.id),
            id: artist.id,
            name: artist.name,
            sort_name: artist.sort_name,
            kind: artist.kind,
            country: artist.country,
            birth_year,
            death_year,
        }
    }
}

impl RecordingSearchResponse {
    /// Earliest year across recording first-release dates and release dates.
    pub fn earliest_year(&self) -> Option<i32> {
        self.recordings
            .iter()
            .flat_map(|r| {
                std::iter::once(r.first_release_date.as_deref()).chain(r.releases.iter().map(|rel| rel.date.as_deref()))
            })
            .filter_map(date_year)
            .min()
    }
}
