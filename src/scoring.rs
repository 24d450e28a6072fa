//! The single synchronous entry point: one series in, one breakdown out.

use serde::Serialize;

use crate::aggregate::ScoreAggregator;
use crate::config::ScoringConfig;
use crate::pattern::PatternScorer;
use crate::shape::{CupHandleDetector, ShapeVerdict};
use crate::technical::TechnicalScorer;
use crate::{Result, Series, SignalOutcome};

/// Per-instrument score and the labels behind it.
///
/// `total_score == min(shape_score + technical_score + pattern_score, 100)`,
/// with each sub-score already clamped to its own band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub shape_score: f64,
    pub shape_detected: bool,
    pub technical_score: u32,
    pub technical_signals: Vec<String>,
    pub pattern_score: u32,
    pub pattern_signals: Vec<String>,
    pub total_score: f64,
}

/// A breakdown plus every per-signal outcome and the shape verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedScore {
    pub breakdown: ScoreBreakdown,
    pub shape: ShapeVerdict,
    pub technical: Vec<SignalOutcome>,
    pub patterns: Vec<SignalOutcome>,
}

/// Runs the shape detector and both scorers with one configuration.
///
/// Holds no mutable state, so one instance is shared across scan workers.
#[derive(Debug, Clone)]
pub struct Scorer {
    shape: CupHandleDetector,
    technical: TechnicalScorer,
    patterns: PatternScorer,
    aggregator: ScoreAggregator,
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shape: CupHandleDetector::new(config.shape.clone())?,
            technical: TechnicalScorer::new(config.technical_table.clone(), config.technical.clone())?,
            patterns: PatternScorer::new(config.pattern_table.clone(), config.pattern_window)?,
            aggregator: ScoreAggregator::new(config.bands.shape_weight)?,
            config,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            shape: CupHandleDetector::default(),
            technical: TechnicalScorer::default(),
            patterns: PatternScorer::default(),
            aggregator: ScoreAggregator::default(),
            config: ScoringConfig::default(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score_instrument(&self, series: &Series) -> ScoreBreakdown {
        self.score_detailed(series).breakdown
    }

    pub fn score_detailed(&self, series: &Series) -> DetailedScore {
        let bands = &self.config.bands;
        let verdict = self.shape.evaluate(series);
        let shape_detected = verdict.is_detected();
        let technical = self.technical.score(series, &self.config.indicators, bands.technical_max);
        let patterns = self.patterns.score(series, &self.config.patterns, bands.pattern_max);

        let breakdown = ScoreBreakdown {
            shape_score: self.aggregator.shape_score(shape_detected),
            shape_detected,
            technical_score: technical.score,
            pattern_score: patterns.score,
            total_score: self.aggregator.aggregate(shape_detected, technical.score, patterns.score),
            technical_signals: technical.labels,
            pattern_signals: patterns.labels,
        };
        DetailedScore {
            breakdown,
            shape: verdict,
            technical: technical.outcomes,
            patterns: patterns.outcomes,
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn rising(n: usize) -> Series {
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(c - 0.5, c + 1.0, c - 1.0, c, 1000.0 + i as f64)
            })
            .collect();
        Series::new(bars).unwrap()
    }

    #[test]
    fn test_scorer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Scorer>();
    }

    #[test]
    fn test_empty_series_scores_zero() {
        let breakdown = Scorer::with_defaults().score_instrument(&Series::empty());
        assert!(!breakdown.shape_detected);
        assert_eq!(breakdown.total_score, 0.0);
        assert!(breakdown.technical_signals.is_empty());
    }

    #[test]
    fn test_total_is_capped_sum() {
        let b = Scorer::with_defaults().score_instrument(&rising(120));
        assert!(!b.shape_detected);
        let expected = (b.shape_score + f64::from(b.technical_score) + f64::from(b.pattern_score)).min(100.0);
        assert_eq!(b.total_score, expected);
        assert!(b.technical_score <= 30);
        assert!(b.technical_score > 0);
    }

    #[test]
    fn test_detailed_matches_breakdown() {
        let scorer = Scorer::with_defaults();
        let series = rising(80);
        let detailed = scorer.score_detailed(&series);
        assert_eq!(detailed.breakdown, scorer.score_instrument(&series));
        assert_eq!(detailed.technical.len(), 10);
        assert_eq!(detailed.patterns.len(), 11);
        assert!(!detailed.shape.is_detected());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScoringConfig::default();
        config.technical.macd_fast = 30;
        assert!(Scorer::new(config).is_err());
    }
}
