//! Parameter metadata for tunable scorers
//!
//! This module describes the named knobs of the shape detector and the
//! technical rule set, enabling:
//! - `key=value` overrides from the command line
//! - Parameter documentation (`cwhscore params`)
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use cwhscore::params::Tunable;
//! use cwhscore::shape::CupHandleParams;
//!
//! for param in CupHandleParams::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let overrides = HashMap::from([("depth_max", 0.5)]);
//! let params = CupHandleParams::default().with_params(&overrides).unwrap();
//! assert_eq!(params.depth_max, 0.5);
//! ```

use std::collections::HashMap;

use crate::{Result, ScoreError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ParamType {
  /// Fraction, typically 0.0..=1.0
  Ratio,
  /// Bar count (positive integer)
  Period,
  /// Free real threshold, e.g. an RSI or ADX level
  Level,
  /// On/off switch, written as 0/1 or false/true
  Flag,
}

/// Metadata for a single tunable parameter
#[derive(Debug, Clone, serde::Serialize)]
pub struct ParamMeta {
  /// Parameter name (e.g., "depth_max")
  pub name: &'static str,
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Accepted range and suggested override step: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  pub const fn level(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Level, default, range, description }
  }

  pub const fn flag(name: &'static str, default: bool, description: &'static str) -> Self {
    let default = if default { 1.0 } else { 0.0 };
    Self { name, param_type: ParamType::Flag, default, range: (0.0, 1.0, 1.0), description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(ScoreError::InvalidValue("parameter must be finite"));
    }
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(ScoreError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio | ParamType::Level => Ok(()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(ScoreError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Flag => {
        if value != 0.0 && value != 1.0 {
          return Err(ScoreError::InvalidValue("Flag must be 0 or 1"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// TUNABLE TRAIT
// ============================================================

/// Parameter sets that can be listed and overridden by name.
pub trait Tunable: Sized + Clone {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Current value of a parameter, `None` for an unknown name.
  fn get_param(&self, name: &str) -> Option<f64>;

  /// Assign one already-validated value.
  fn set_param(&mut self, name: &str, value: f64) -> Result<()>;

  /// Cross-field consistency checks.
  fn validate(&self) -> Result<()> {
    Ok(())
  }

  /// Copy of `self` with the given overrides applied and validated.
  ///
  /// Parameters not named keep their current value.
  fn with_params(&self, params: &HashMap<&str, f64>) -> Result<Self> {
    let mut out = self.clone();
    for (&name, &value) in params {
      find_meta::<Self>(name)?.validate(value)?;
      out.set_param(name, value)?;
    }
    out.validate()?;
    Ok(out)
  }
}

/// Look up a parameter's metadata by name.
pub fn find_meta<P: Tunable>(name: &str) -> Result<&'static ParamMeta> {
  P::param_meta()
    .iter()
    .find(|m| m.name == name)
    .ok_or_else(|| ScoreError::InvalidConfig(format!("unknown parameter `{name}`")))
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Period-typed value as a bar count
#[inline]
pub fn as_period(value: f64) -> usize {
  value as usize
}

/// Flag-typed value as a bool
#[inline]
pub fn as_flag(value: f64) -> bool {
  value != 0.0
}

/// Parse a `key=value` override; `true`/`false` are read as 1/0.
pub fn parse_assignment(s: &str) -> Result<(String, f64)> {
  let (key, raw) = s
    .split_once('=')
    .ok_or_else(|| ScoreError::InvalidConfig(format!("expected key=value, got `{s}`")))?;
  let key = key.trim();
  if key.is_empty() {
    return Err(ScoreError::InvalidConfig(format!("missing parameter name in `{s}`")));
  }
  let raw = raw.trim();
  let value = match raw.to_ascii_lowercase().as_str() {
    "true" => 1.0,
    "false" => 0.0,
    _ => raw
      .parse::<f64>()
      .map_err(|_| ScoreError::InvalidConfig(format!("`{raw}` is not a number")))?,
  };
  Ok((key.to_string(), value))
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_meta_constructors() {
    let meta = ParamMeta::ratio("test_ratio", 0.5, (0.3, 0.7, 0.1), "Test ratio parameter");
    assert_eq!(meta.param_type, ParamType::Ratio);
    assert_eq!(meta.default, 0.5);

    let flag = ParamMeta::flag("switch", true, "Test flag");
    assert_eq!(flag.param_type, ParamType::Flag);
    assert_eq!(flag.default, 1.0);
  }

  #[test]
  fn test_validate_by_type() {
    let ratio = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.1), "Test");
    assert!(ratio.validate(0.3).is_ok());
    assert!(ratio.validate(0.8).is_err());
    assert!(ratio.validate(f64::NAN).is_err());

    let period = ParamMeta::period("test", 14.0, (10.0, 20.0, 2.0), "Test");
    assert!(period.validate(14.0).is_ok());
    assert!(period.validate(14.5).is_err());

    let flag = ParamMeta::flag("test", false, "Test");
    assert!(flag.validate(1.0).is_ok());
    assert!(flag.validate(0.5).is_err());
  }

  #[test]
  fn test_parse_assignment() {
    assert_eq!(parse_assignment("depth_max=0.35").unwrap(), ("depth_max".to_string(), 0.35));
    assert_eq!(parse_assignment(" flag = TRUE ").unwrap(), ("flag".to_string(), 1.0));
    assert_eq!(parse_assignment("flag=false").unwrap().1, 0.0);
    assert!(parse_assignment("depth_max").is_err());
    assert!(parse_assignment("=1").is_err());
    assert!(parse_assignment("x=abc").is_err());
  }

  #[test]
  fn test_value_helpers() {
    assert_eq!(as_period(20.0), 20);
    assert!(as_flag(1.0));
    assert!(!as_flag(0.0));
  }
}
