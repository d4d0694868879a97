use std::error::Error;
use std::fmt;
use std::str::FromStr;

use polars::prelude::*;

/// Method names accepted by [`CorrectionMethod::from_str`], matching R's
/// `p.adjust.methods`.
pub const VALID_METHODS: [&str; 8] = [
    "holm",
    "hochberg",
    "hommel",
    "bonferroni",
    "BH",
    "BY",
    "fdr",
    "none",
];

/// Multiple-testing correction applied to the p-value column before
/// significance markers are derived.
///
/// `fdr` parses to [`CorrectionMethod::BenjaminiHochberg`]; the two names are
/// synonyms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMethod {
    Holm,
    Hochberg,
    Hommel,
    Bonferroni,
    BenjaminiHochberg,
    BenjaminiYekutieli,
    None,
}

impl CorrectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionMethod::Holm => "holm",
            CorrectionMethod::Hochberg => "hochberg",
            CorrectionMethod::Hommel => "hommel",
            CorrectionMethod::Bonferroni => "bonferroni",
            CorrectionMethod::BenjaminiHochberg => "BH",
            CorrectionMethod::BenjaminiYekutieli => "BY",
            CorrectionMethod::None => "none",
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionMethod {
    type Err = PolarsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "holm" => Ok(CorrectionMethod::Holm),
            "hochberg" => Ok(CorrectionMethod::Hochberg),
            "hommel" => Ok(CorrectionMethod::Hommel),
            "bonferroni" => Ok(CorrectionMethod::Bonferroni),
            "BH" | "fdr" => Ok(CorrectionMethod::BenjaminiHochberg),
            "BY" => Ok(CorrectionMethod::BenjaminiYekutieli),
            "none" => Ok(CorrectionMethod::None),
            other => Err(PolarsError::InvalidOperation(
                format!(
                    "unknown correction method `{}`; valid methods are: {}",
                    other,
                    VALID_METHODS.join(", ")
                )
                .into(),
            )),
        }
    }
}

/// Wrap a foreign error into a `PolarsError` so plotting and file I/O can
/// stay inside `PolarsResult`.
pub fn polars_err(e: Box<dyn Error>) -> PolarsError {
    PolarsError::ComputeError(format!("{}", e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_valid_names_parse() {
        for name in VALID_METHODS {
            assert!(
                name.parse::<CorrectionMethod>().is_ok(),
                "`{}` should parse",
                name
            );
        }
    }

    #[test]
    fn test_fdr_is_bh_alias() {
        let fdr: CorrectionMethod = "fdr".parse().unwrap();
        let bh: CorrectionMethod = "BH".parse().unwrap();
        assert_eq!(fdr, bh);
    }

    #[test]
    fn test_unknown_method_message_lists_valid_names() {
        let err = "not_a_method".parse::<CorrectionMethod>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not_a_method"));
        for name in VALID_METHODS {
            assert!(msg.contains(name), "message should mention `{}`", name);
        }
    }

    #[test]
    fn test_method_names_are_case_sensitive() {
        assert!("Holm".parse::<CorrectionMethod>().is_err());
        assert!("bh".parse::<CorrectionMethod>().is_err());
    }
}
