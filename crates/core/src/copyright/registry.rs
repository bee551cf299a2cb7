//! Supported jurisdictions and calculator lookup.

use serde::Serialize;

use super::{CopyrightCalculator, UsCopyrightCalculator};
use crate::Error;

/// A supported country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountryInfo {
    pub code: &'static str,
    pub name: &'static str,
}

const COUNTRIES: &[CountryInfo] = &[CountryInfo { code: "US", name: "United States" }];

pub fn supported_countries() -> &'static [CountryInfo] {
    COUNTRIES
}

/// Case-insensitive support check.
pub fn is_country_supported(code: &str) -> bool {
    country_info(code).is_some()
}

pub fn country_info(code: &str) -> Option<CountryInfo> {
    let code = code.trim();
    COUNTRIES.iter().copied().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Build the calculator for a country.
///
/// # Errors
///
/// Returns `Error::UnsupportedCountry` listing the supported codes.
pub fn calculator_for(code: &str) -> Result<Box<dyn CopyrightCalculator>, Error> {
    match country_info(code).map(|c| c.code) {
        Some("US") => Ok(Box::new(UsCopyrightCalculator::new())),
        _ => Err(Error::UnsupportedCountry { country: code.to_string(), supported: supported_codes() }),
    }
}

fn supported_codes() -> String {
    COUNTRIES.iter().map(|c| c.code).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_countries() {
        let countries = supported_countries();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].name, "United States");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(is_country_supported("us"));
        assert!(is_country_supported(" US "));
        assert!(!is_country_supported("GB"));
        assert_eq!(country_info("Us").map(|c| c.code), Some("US"));
    }

    #[test]
    fn test_calculator_for() {
        let calc = calculator_for("us").unwrap();
        assert_eq!(calc.country_code(), "US");

        let err = calculator_for("DE").err().unwrap();
        assert!(matches!(err, Error::UnsupportedCountry { ref supported, .. } if supported == "US"));
    }
}
