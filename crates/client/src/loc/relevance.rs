//! Relevance ranking of catalog matches against the requested title and author.

use super::mods::LocRecord;
use super::query::is_generic_author;

const MIN_TITLE_SCORE: f64 = 20.0;
const MIN_AUTHOR_SCORE: f64 = 15.0;

/// Share of the longer string covered by the shorter one.
fn length_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = (a.chars().count().min(b.chars().count()), a.chars().count().max(b.chars().count()));
    if long == 0 { 0.0 } else { short as f64 / long as f64 }
}

fn strip_punctuation(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .trim()
        .to_string()
}

fn significant_words(text: &str) -> std::collections::HashSet<&str> {
    text.split_whitespace().filter(|w| w.chars().count() > 2).collect()
}

/// Title similarity on a 0..=100 scale. Inputs are expected lowercased.
pub fn score_title(target: &str, candidate: &str) -> f64 {
    if target.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let (clean_target, clean_candidate) = (strip_punctuation(target), strip_punctuation(candidate));
    if clean_target == clean_candidate {
        return 100.0;
    }

    if clean_candidate.contains(&clean_target) || clean_target.contains(&clean_candidate) {
        let ratio = length_ratio(&clean_target, &clean_candidate);
        return if ratio > 0.3 { 80.0 * ratio } else { 0.0 };
    }

    let (a, b) = (significant_words(target), significant_words(candidate));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(&b).count() as f64 / a.union(&b).count() as f64;
    if overlap > 0.3 { 60.0 * overlap } else { 0.0 }
}

/// Best author similarity over the candidate's authors, 0..=110.
///
/// The first listed author gets a 10% bonus.
pub fn score_author(target: &str, authors: &[String]) -> f64 {
    if target.is_empty() || authors.is_empty() {
        return 0.0;
    }
    if is_generic_author(target) {
        return 50.0;
    }

    let mut best: f64 = 0.0;
    for (i, author) in authors.iter().enumerate() {
        let author = author.to_lowercase();
        let author = author.trim();
        let mut score = if target == author {
            100.0
        } else if author.contains(target) || target.contains(author) {
            let ratio = length_ratio(target, author);
            if ratio > 0.4 { 70.0 * ratio } else { 0.0 }
        } else if let Some((last, first)) = author.split_once(',') {
            let (last, first) = (last.trim(), first.split(',').next().unwrap_or_default().trim());
            if !last.is_empty() && target.contains(last) {
                if !first.is_empty() && target.contains(first) { 85.0 } else { 60.0 }
            } else {
                0.0
            }
        } else {
            0.0
        };

        if i == 0 && score > 0.0 {
            score *= 1.1;
        }
        best = best.max(score);
    }
    best
}

/// Overall relevance, or zero when the match falls below the threshold.
pub fn relevance(record: &LocRecord, target_title: &str, target_author: &str) -> f64 {
    let title_score = score_title(target_title, &record.title.to_lowercase());
    let author_score = score_author(target_author, &record.authors);
    let year_bonus = if record.publication_year.is_some() { 5.0 } else { 0.0 };

    let specific_author = !is_generic_author(target_author) && target_author.chars().count() > 2;
    let relevant = if specific_author {
        title_score >= MIN_TITLE_SCORE || author_score >= MIN_AUTHOR_SCORE
    } else {
        title_score >= MIN_TITLE_SCORE
    };

    if relevant { title_score + author_score + year_bonus } else { 0.0 }
}

/// Relevant matches, most relevant first.
pub fn rank(records: &[LocRecord], title: &str, author: &str) -> Vec<LocRecord> {
    let (title, author) = (title.trim().to_lowercase(), author.trim().to_lowercase());
    let mut scored: Vec<(f64, &LocRecord)> = records
        .iter()
        .map(|r| (relevance(r, &title, &author), r))
        .filter(|(score, _)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, r)| r.clone()).collect()
}

/// Confidence that the best match is the requested work.
pub fn confidence(has_matches: bool, best: Option<&LocRecord>, title: &str, author: &str) -> f64 {
    if !has_matches {
        return 0.0;
    }
    let Some(best) = best else {
        return 0.1;
    };

    let mut confidence: f64 = 0.6;
    let (best_title, target_title) = (best.title.to_lowercase(), title.to_lowercase());
    if best_title.contains(&target_title) || target_title.contains(&best_title) {
        confidence += 0.2;
    }

    if !is_generic_author(author) {
        let target = author.to_lowercase();
        let found = best.authors.iter().any(|a| {
            let a = a.to_lowercase();
            a.contains(&target) || target.contains(&a)
        });
        confidence += if found { 0.2 } else { -0.3 };
    }
    confidence.clamp(0.0, 1.0)
}
