//! United States copyright terms (Title 17 USC §§302-305).
//!
//! Works published before 1923 are public domain. Works published 1923-1977
//! carry a 95-year term from publication. From 1978 individual works run for
//! the author's life plus 70 years; works made for hire, anonymous and
//! pseudonymous works run 95 years from publication.

use std::collections::BTreeMap;

use chrono::Datelike;

use super::{Assessment, CopyrightCalculator, CopyrightInfo};
use crate::Error;
use crate::models::{Authorship, CopyrightStatus};

/// Works published before this year are in the public domain.
const PUBLIC_DOMAIN_CUTOFF: i32 = 1923;

/// First year governed by the 1976 Act's life-based terms.
const MODERN_ACT_YEAR: i32 = 1978;

const PUBLICATION_TERM: i32 = 95;
const LIFE_TERM: i32 = 70;

/// Earliest plausible year for a catalogued printed work.
const EARLIEST_YEAR: i32 = 1400;

const RULE_PRE_1923: &str = "Works published before 1923 are in the public domain";
const RULE_1923_1977: &str = "Works published 1923-1977: 95 years from publication (with renewal)";
const RULE_INDIVIDUAL: &str = "Works by individual authors (1978+): Life of author + 70 years";
const RULE_WORK_FOR_HIRE: &str = "Works for hire, anonymous, or pseudonymous (1978+): 95 years from publication or 120 years from creation (whichever is shorter)";

#[derive(Debug, Clone)]
pub struct UsCopyrightCalculator {
    current_year: i32,
}

impl Default for UsCopyrightCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl UsCopyrightCalculator {
    /// Calculator anchored at the current UTC year.
    pub fn new() -> Self {
        Self { current_year: chrono::Utc::now().year() }
    }

    /// Calculator anchored at a fixed year.
    pub fn with_current_year(current_year: i32) -> Self {
        Self { current_year }
    }

    fn term_from_publication(&self, year: i32, authorship: Authorship) -> Assessment {
        let pd_year = year + PUBLICATION_TERM;
        if self.current_year >= pd_year {
            let notes = if year < MODERN_ACT_YEAR {
                format!("Published {year}. 95-year term expired.")
            } else {
                format!("Published {year} as {}. 95-year term expired.", describe(authorship))
            };
            return Assessment { status: CopyrightStatus::PublicDomain, enters_public_domain: Some(pd_year), notes };
        }

        let notes = match (year < MODERN_ACT_YEAR, authorship) {
            (true, Authorship::Individual) => {
                format!("Published {year}. Term is 95 years under §304; PD Jan 1, {pd_year} per §305.")
            }
            _ => format!("Published {year} as {}. Term is 95 years; PD Jan 1, {pd_year}.", describe(authorship)),
        };
        Assessment { status: CopyrightStatus::UnderCopyright, enters_public_domain: Some(pd_year), notes }
    }
}

fn describe(authorship: Authorship) -> &'static str {
    match authorship {
        Authorship::Individual => "individual work",
        Authorship::WorkForHire => "work for hire",
        Authorship::Anonymous => "anonymous work",
        Authorship::Pseudonymous => "pseudonymous work",
    }
}

impl CopyrightCalculator for UsCopyrightCalculator {
    fn country_code(&self) -> &'static str {
        "US"
    }

    fn current_year(&self) -> i32 {
        self.current_year
    }

    fn calculate_status(
        &self, publication_year: Option<i32>, death_year: Option<i32>, authorship: Authorship,
    ) -> Assessment {
        let Some(year) = publication_year else {
            return Assessment {
                status: CopyrightStatus::Unknown,
                enters_public_domain: None,
                notes: "Publication year unknown".into(),
            };
        };

        if year < PUBLIC_DOMAIN_CUTOFF {
            return Assessment {
                status: CopyrightStatus::PublicDomain,
                enters_public_domain: Some(PUBLIC_DOMAIN_CUTOFF),
                notes: "Published before 1923. In public domain since 1923.".into(),
            };
        }

        if year < MODERN_ACT_YEAR {
            return self.term_from_publication(year, authorship);
        }

        match (authorship, death_year) {
            (Authorship::Individual, Some(death)) => {
                let pd_year = death + LIFE_TERM;
                if self.current_year >= pd_year {
                    Assessment {
                        status: CopyrightStatus::PublicDomain,
                        enters_public_domain: Some(pd_year),
                        notes: format!("Author died {death}. Life + 70 years expired."),
                    }
                } else {
                    Assessment {
                        status: CopyrightStatus::UnderCopyright,
                        enters_public_domain: Some(pd_year),
                        notes: format!(
                            "Published {year} by individual author. Author died {death}. \
                             Term is life + 70 years; PD Jan 1, {pd_year}."
                        ),
                    }
                }
            }
            (Authorship::Individual, None) => {
                let estimate = year + PUBLICATION_TERM;
                Assessment {
                    status: CopyrightStatus::UnderCopyright,
                    enters_public_domain: Some(estimate),
                    notes: format!(
                        "Published {year} by individual author. Death year unknown; \
                         estimated PD {estimate} (conservative)."
                    ),
                }
            }
            _ => self.term_from_publication(year, authorship),
        }
    }

    fn is_likely_public_domain(&self, publication_year: Option<i32>, death_year: Option<i32>) -> bool {
        let Some(year) = publication_year else {
            return false;
        };
        if year < PUBLIC_DOMAIN_CUTOFF {
            return true;
        }
        if let Some(death) = death_year
            && year >= MODERN_ACT_YEAR
        {
            return self.current_year - death > LIFE_TERM;
        }
        year <= self.current_year - PUBLICATION_TERM
    }

    fn term_explanation(&self, publication_year: Option<i32>, authorship: Authorship) -> String {
        match publication_year {
            None => "Cannot determine copyright term without publication year".into(),
            Some(y) if y < PUBLIC_DOMAIN_CUTOFF => RULE_PRE_1923.into(),
            Some(y) if y < MODERN_ACT_YEAR => RULE_1923_1977.into(),
            Some(_) if authorship == Authorship::Individual => RULE_INDIVIDUAL.into(),
            Some(_) => RULE_WORK_FOR_HIRE.into(),
        }
    }

    fn validate_years(&self, publication_year: Option<i32>, death_year: Option<i32>) -> Result<(), Error> {
        if let Some(year) = publication_year
            && !(EARLIEST_YEAR..=self.current_year + 5).contains(&year)
        {
            return Err(Error::InvalidInput(format!("implausible publication year: {year}")));
        }

        if let Some(death) = death_year {
            if !(EARLIEST_YEAR..=self.current_year).contains(&death) {
                return Err(Error::InvalidInput(format!("implausible death year: {death}")));
            }
            if let Some(year) = publication_year
                && death < year - 100
            {
                return Err(Error::InvalidInput(format!(
                    "death year {death} is more than a century before publication in {year}"
                )));
            }
        }

        Ok(())
    }

    fn info(&self) -> CopyrightInfo {
        let rules = BTreeMap::from([
            ("pre_1923".to_string(), RULE_PRE_1923.to_string()),
            ("1923_1977".to_string(), RULE_1923_1977.to_string()),
            ("1978_plus_individual".to_string(), RULE_INDIVIDUAL.to_string()),
            ("1978_plus_work_for_hire".to_string(), RULE_WORK_FOR_HIRE.to_string()),
        ]);

        CopyrightInfo {
            country: "United States".into(),
            country_code: "US".into(),
            laws: vec!["Title 17 USC §304".into(), "Title 17 USC §305".into()],
            rules,
            note: "Calculations are specific to US copyright law and may not apply to other jurisdictions".into(),
            current_year: self.current_year,
            calculator: "UsCopyrightCalculator".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc() -> UsCopyrightCalculator {
        UsCopyrightCalculator::with_current_year(2025)
    }

    #[test]
    fn test_unknown_without_publication_year() {
        let result = calc().calculate_status(None, Some(1900), Authorship::Individual);
        assert_eq!(result.status, CopyrightStatus::Unknown);
        assert_eq!(result.enters_public_domain, None);
        assert_eq!(result.notes, "Publication year unknown");
    }

    #[test]
    fn test_pre_1923_is_public_domain() {
        let result = calc().calculate_status(Some(1851), None, Authorship::Individual);
        assert_eq!(result.status, CopyrightStatus::PublicDomain);
        assert_eq!(result.enters_public_domain, Some(1923));
    }

    #[test]
    fn test_1923_1977_term_expired() {
        // 1929 + 95 = 2024 <= 2025
        let result = calc().calculate_status(Some(1929), Some(1961), Authorship::Individual);
        assert_eq!(result.status, CopyrightStatus::PublicDomain);
        assert_eq!(result.enters_public_domain, Some(2024));
        assert!(result.notes.contains("95-year term expired"));
    }

    #[test]
    fn test_1923_1977_term_running_ignores_death_year() {
        let result = calc().calculate_status(Some(1950), Some(1955), Authorship::Individual);
        assert_eq!(result.status, CopyrightStatus::UnderCopyright);
        assert_eq!(result.enters_public_domain, Some(2045));
        assert!(result.notes.contains("§304"));
    }

    #[test]
    fn test_pd_boundary_year_is_public_domain() {
        let result = UsCopyrightCalculator::with_current_year(2045).calculate_status(
            Some(1950),
            None,
            Authorship::WorkForHire,
        );
        assert_eq!(result.status, CopyrightStatus::PublicDomain);
    }

    #[test]
    fn test_modern_individual_life_plus_70() {
        let result = calc().calculate_status(Some(1980), Some(1990), Authorship::Individual);
        assert_eq!(result.status, CopyrightStatus::UnderCopyright);
        assert_eq!(result.enters_public_domain, Some(2060));
        assert!(result.notes.contains("life + 70"));
    }

    #[test]
    fn test_modern_individual_unknown_death_is_conservative() {
        let result = calc().calculate_status(Some(1985), None, Authorship::Individual);
        assert_eq!(result.status, CopyrightStatus::UnderCopyright);
        assert_eq!(result.enters_public_domain, Some(2080));
        assert!(result.notes.contains("conservative"));
    }

    #[test]
    fn test_modern_work_for_hire() {
        let result = calc().calculate_status(Some(1990), None, Authorship::WorkForHire);
        assert_eq!(result.status, CopyrightStatus::UnderCopyright);
        assert_eq!(result.enters_public_domain, Some(2085));
        assert!(result.notes.contains("work for hire"));
    }

    #[test]
    fn test_is_likely_public_domain() {
        let c = calc();
        assert!(!c.is_likely_public_domain(None, None));
        assert!(c.is_likely_public_domain(Some(1900), None));
        assert!(c.is_likely_public_domain(Some(1929), None));
        assert!(!c.is_likely_public_domain(Some(1931), None));
        assert!(!c.is_likely_public_domain(Some(1980), Some(1990)));
        assert!(c.is_likely_public_domain(Some(1978), Some(1950)));
    }

    #[test]
    fn test_term_explanation_brackets() {
        let c = calc();
        assert_eq!(c.term_explanation(Some(1900), Authorship::Individual), RULE_PRE_1923);
        assert_eq!(c.term_explanation(Some(1950), Authorship::Anonymous), RULE_1923_1977);
        assert_eq!(c.term_explanation(Some(1990), Authorship::Individual), RULE_INDIVIDUAL);
        assert_eq!(c.term_explanation(Some(1990), Authorship::Pseudonymous), RULE_WORK_FOR_HIRE);
        assert!(c.term_explanation(None, Authorship::Individual).contains("without publication year"));
    }

    #[test]
    fn test_validate_years() {
        let c = calc();
        assert!(c.validate_years(Some(1925), Some(1960)).is_ok());
        assert!(c.validate_years(Some(1200), None).is_err());
        assert!(c.validate_years(Some(2031), None).is_err());
        assert!(c.validate_years(Some(2030), None).is_ok());
        assert!(c.validate_years(None, Some(2026)).is_err());
        assert!(c.validate_years(Some(1950), Some(1800)).is_err());
    }

    #[test]
    fn test_info() {
        let info = calc().info();
        assert_eq!(info.country_code, "US");
        assert_eq!(info.laws.len(), 2);
        assert_eq!(info.rules.len(), 4);
        assert_eq!(info.current_year, 2025);
    }
}
