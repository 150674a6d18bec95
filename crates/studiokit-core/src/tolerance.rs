//! Tolerance-based numeric comparison used to grade numeric answers.
//!
//! A tolerance is either a percentage (`"10%"`) or an absolute bound
//! (`"10.0"`, `10.0`). The `relative` flag scales the tolerance by the larger
//! magnitude of the two compared values, so a relative `"10%"` against an
//! expected `100.0` accepts `111.0` (bound `11.1`) but not `112.0`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ToleranceError;

/// Tolerance applied when a problem does not author one.
///
/// This string always selects relative comparison, whatever `relative` flag
/// the caller passes alongside it.
pub const DEFAULT_TOLERANCE: &str = "0.001%";

/// A parsed tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ToleranceSpec {
    /// Percentage, stored as written (`10%` is `Percentage(10.0)`).
    Percentage(f64),
    /// Absolute bound, or a plain fraction when compared relatively.
    Absolute(f64),
}

impl Default for ToleranceSpec {
    fn default() -> Self {
        ToleranceSpec::Percentage(0.001)
    }
}

impl ToleranceSpec {
    /// Parse a tolerance string: a numeral, optionally followed by `%`.
    pub fn parse(input: &str) -> Result<Self, ToleranceError> {
        let trimmed = input.trim();
        let (numeral, is_percentage) = match trimmed.strip_suffix('%') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        if numeral.is_empty() {
            return Err(ToleranceError::parse(input, "missing numeral"));
        }

        let value: f64 = numeral
            .parse()
            .map_err(|e| ToleranceError::parse(input, format!("{e}")))?;

        if !value.is_finite() {
            return Err(ToleranceError::parse(input, "tolerance must be finite"));
        }
        if value < 0.0 {
            return Err(ToleranceError::parse(input, "tolerance must not be negative"));
        }

        Ok(if is_percentage {
            ToleranceSpec::Percentage(value)
        } else {
            ToleranceSpec::Absolute(value)
        })
    }

    /// Effective bound on `|actual - expected|` for the given values.
    pub fn bound(&self, actual: f64, expected: f64, relative: bool) -> f64 {
        let base = match *self {
            ToleranceSpec::Percentage(p) => {
                let fraction = p * 0.01;
                if relative {
                    fraction
                } else {
                    fraction * expected.abs()
                }
            }
            ToleranceSpec::Absolute(t) => t,
        };

        if relative {
            base * actual.abs().max(expected.abs())
        } else {
            base
        }
    }
}

impl FromStr for ToleranceSpec {
    type Err = ToleranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToleranceSpec::parse(s)
    }
}

impl From<f64> for ToleranceSpec {
    fn from(value: f64) -> Self {
        ToleranceSpec::Absolute(value)
    }
}

impl fmt::Display for ToleranceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToleranceSpec::Percentage(p) => write!(f, "{p}%"),
            ToleranceSpec::Absolute(t) => write!(f, "{t}"),
        }
    }
}

/// Tolerance as authored in a problem definition: text or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToleranceInput {
    Number(f64),
    Text(String),
}

impl Default for ToleranceInput {
    fn default() -> Self {
        ToleranceInput::Text(DEFAULT_TOLERANCE.to_string())
    }
}

impl ToleranceInput {
    /// Resolve into a spec and the relative flag that actually applies.
    pub fn resolve(&self, relative: bool) -> Result<(ToleranceSpec, bool), ToleranceError> {
        match self {
            ToleranceInput::Number(value) => {
                if !value.is_finite() || *value < 0.0 {
                    return Err(ToleranceError::parse(
                        &value.to_string(),
                        "tolerance must be a finite, non-negative number",
                    ));
                }
                Ok((ToleranceSpec::Absolute(*value), relative))
            }
            ToleranceInput::Text(text) => {
                let spec = ToleranceSpec::parse(text)?;
                Ok((spec, relative || text.trim() == DEFAULT_TOLERANCE))
            }
        }
    }

    /// Compare `actual` against `expected` under this tolerance.
    pub fn compare(&self, actual: f64, expected: f64, relative: bool) -> Result<bool, ToleranceError> {
        let (spec, relative) = self.resolve(relative)?;
        Ok(compare_with_tolerance(actual, expected, spec, relative))
    }
}

impl fmt::Display for ToleranceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToleranceInput::Number(n) => write!(f, "{n}"),
            ToleranceInput::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Compare with the default tolerance (`0.001%`, relative).
pub fn compare(actual: f64, expected: f64) -> bool {
    compare_with_tolerance(actual, expected, ToleranceSpec::default(), true)
}

/// Compare against a tolerance string, as authored.
pub fn compare_str(
    actual: f64,
    expected: f64,
    tolerance: &str,
    relative: bool,
) -> Result<bool, ToleranceError> {
    ToleranceInput::Text(tolerance.to_string()).compare(actual, expected, relative)
}

/// Decide whether `actual` is within `tolerance` of `expected`.
///
/// Boundary equality passes. When either value is infinite the values must be
/// equal, since an infinite bound would otherwise accept anything. NaN never
/// passes.
pub fn compare_with_tolerance(
    actual: f64,
    expected: f64,
    tolerance: ToleranceSpec,
    relative: bool,
) -> bool {
    if actual.is_infinite() || expected.is_infinite() {
        return actual == expected;
    }

    let bound = tolerance.bound(actual, expected, relative);
    let passed = (actual - expected).abs() <= bound;
    tracing::trace!(actual, expected, %tolerance, relative, bound, passed, "tolerance comparison");
    passed
}
