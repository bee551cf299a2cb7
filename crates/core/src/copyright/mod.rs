//! Country-specific copyright term calculation.
//!
//! Each supported country provides a [`CopyrightCalculator`]. Calculators are
//! pure: the current year is fixed at construction so results are
//! reproducible within a request and testable across years.

pub mod registry;
pub mod us;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::models::{Authorship, CopyrightStatus};

pub use registry::{CountryInfo, calculator_for, country_info, is_country_supported, supported_countries};
pub use us::UsCopyrightCalculator;

/// Outcome of applying a country's term rules to one work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub status: CopyrightStatus,
    /// First year the work is (or will be) free to use; terms run to Dec 31.
    pub enters_public_domain: Option<i32>,
    pub notes: String,
}

/// Static description of a country's copyright regime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyrightInfo {
    pub country: String,
    pub country_code: String,
    pub laws: Vec<String>,
    pub rules: BTreeMap<String, String>,
    pub note: String,
    pub current_year: i32,
    pub calculator: String,
}

/// Copyright term rules for a single jurisdiction.
pub trait CopyrightCalculator: Send + Sync {
    /// ISO 3166-1 alpha-2 code of the jurisdiction.
    fn country_code(&self) -> &'static str;

    /// Year used as "now" for every calculation.
    fn current_year(&self) -> i32;

    fn calculate_status(
        &self, publication_year: Option<i32>, death_year: Option<i32>, authorship: Authorship,
    ) -> Assessment;

    /// Quick screen without building the full explanation.
    fn is_likely_public_domain(&self, publication_year: Option<i32>, death_year: Option<i32>) -> bool;

    fn term_explanation(&self, publication_year: Option<i32>, authorship: Authorship) -> String;

    /// Reject years that cannot belong to a real published work.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` naming the offending year.
    fn validate_years(&self, publication_year: Option<i32>, death_year: Option<i32>) -> Result<(), Error>;

    fn info(&self) -> CopyrightInfo;
}
