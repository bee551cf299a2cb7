//! CQL query construction for the Library of Congress SRU endpoint.

use crate::error::SourceError;

/// Placeholder author values sent by clients that did not fill the field.
const GENERIC_AUTHORS: &[&str] = &["unknown", "string", "author"];

/// Records requested per search.
pub const MAX_RECORDS: u32 = 20;

/// Whether an author value carries no information.
pub fn is_generic_author(author: &str) -> bool {
    let author = author.trim();
    author.is_empty() || GENERIC_AUTHORS.iter().any(|g| author.eq_ignore_ascii_case(g))
}

fn escape(term: &str) -> String {
    term.trim().replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build `dc.title="…" AND dc.creator="…"`, skipping empty or generic terms.
pub fn build_cql(title: &str, author: &str) -> Result<String, SourceError> {
    let mut terms = Vec::new();
    if !title.trim().is_empty() {
        terms.push(format!("dc.title=\"{}\"", escape(title)));
    }
    if !is_generic_author(author) {
        terms.push(format!("dc.creator=\"{}\"", escape(author)));
    }

    if terms.is_empty() {
        return Err(SourceError::InvalidQuery("No valid search terms provided".into()));
    }
    Ok(terms.join(" AND "))
}

/// SRU searchRetrieve parameters requesting MODS records.
pub fn sru_params(cql: String) -> Vec<(&'static str, String)> {
    vec![
        ("version", "1.1".into()),
        ("operation", "searchRetrieve".into()),
        ("query", cql),
        ("maximumRecords", MAX_RECORDS.to_string()),
        ("recordSchema", "mods".into()),
    ]
}
