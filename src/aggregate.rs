//! Combining the three sub-scores into the bounded total.

use serde::{Deserialize, Serialize};

use crate::{Result, ScoreError};

/// Upper bound of the composite score
pub const TOTAL_CAP: f64 = 100.0;

/// Clamp a raw signed sum into `[0, max]`.
#[inline]
pub fn clamp_band(raw: i64, max: u32) -> u32 {
    // fits in u32 after the clamp
    raw.clamp(0, i64::from(max)) as u32
}

/// Points available to each signal source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBands {
    /// Awarded in full when the shape is detected
    pub shape_weight: f64,
    pub technical_max: u32,
    pub pattern_max: u32,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            shape_weight: 50.0,
            technical_max: 30,
            pattern_max: 20,
        }
    }
}

impl ScoreBands {
    pub fn validate(&self) -> Result<()> {
        if !self.shape_weight.is_finite() || !(0.0..=TOTAL_CAP).contains(&self.shape_weight) {
            return Err(ScoreError::OutOfRange {
                field: "shape_weight",
                value: self.shape_weight,
                min: 0.0,
                max: TOTAL_CAP,
            });
        }
        Ok(())
    }
}

/// Sums the sub-scores and caps the result at [`TOTAL_CAP`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAggregator {
    shape_weight: f64,
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self {
            shape_weight: ScoreBands::default().shape_weight,
        }
    }
}

impl ScoreAggregator {
    pub fn new(shape_weight: f64) -> Result<Self> {
        ScoreBands {
            shape_weight,
            ..ScoreBands::default()
        }
        .validate()?;
        Ok(Self { shape_weight })
    }

    #[inline]
    pub fn shape_weight(&self) -> f64 {
        self.shape_weight
    }

    /// Points the shape contributes.
    #[inline]
    pub fn shape_score(&self, shape_detected: bool) -> f64 {
        if shape_detected {
            self.shape_weight
        } else {
            0.0
        }
    }

    /// `min(shape + technical + pattern, 100)`, never below 0. No rounding.
    pub fn aggregate(&self, shape_detected: bool, technical_score: u32, pattern_score: u32) -> f64 {
        let total = self.shape_score(shape_detected) + f64::from(technical_score) + f64::from(pattern_score);
        total.clamp(0.0, TOTAL_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_band() {
        assert_eq!(clamp_band(-7, 20), 0);
        assert_eq!(clamp_band(13, 20), 13);
        assert_eq!(clamp_band(25, 20), 20);
        assert_eq!(clamp_band(i64::MAX, u32::MAX), u32::MAX);
    }

    #[test]
    fn test_aggregate_caps_at_hundred() {
        let agg = ScoreAggregator::default();
        assert_eq!(agg.aggregate(true, 30, 20), 100.0);
        assert_eq!(agg.aggregate(true, 30, 25), 100.0);
        assert_eq!(agg.aggregate(false, 12, 4), 16.0);
        assert_eq!(agg.aggregate(true, 0, 0), 50.0);
    }

    #[test]
    fn test_custom_weight() {
        let agg = ScoreAggregator::new(40.0).unwrap();
        assert_eq!(agg.aggregate(true, 10, 5), 55.0);
        assert!(ScoreAggregator::new(120.0).is_err());
        assert!(ScoreAggregator::new(f64::NAN).is_err());
    }
}
