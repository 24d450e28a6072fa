//! # cwhscore - swing-trade scoring for equities
//!
//! Scores an instrument's recent price/volume history for short-term trading
//! attractiveness by combining three independent signal sources:
//!
//! - a cup-with-handle chart-shape detector ([`shape`]),
//! - a configurable set of technical indicator rules ([`technical`]),
//! - weighted candlestick pattern recognition ([`pattern`]).
//!
//! The sub-scores are clipped to their own bands and summed into a total capped
//! at 100 ([`aggregate`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use cwhscore::prelude::*;
//!
//! let bars: Vec<Candle> = (0..60)
//!     .map(|i| {
//!         let c = 100.0 + i as f64 * 0.5;
//!         Candle::new(c - 0.2, c + 0.5, c - 0.5, c, 10_000.0)
//!     })
//!     .collect();
//! let series = Series::new(bars).unwrap();
//!
//! let scorer = Scorer::new(ScoringConfig::default()).unwrap();
//! let breakdown = scorer.score_instrument(&series);
//! assert!(breakdown.total_score <= 100.0);
//! ```

pub mod aggregate;
pub mod config;
pub mod detectors;
pub mod directory;
pub mod export;
pub mod history;
pub mod indicators;
pub mod logging;
pub mod params;
pub mod pattern;
pub mod scan;
pub mod scoring;
pub mod shape;
pub mod technical;

pub mod prelude {
    pub use crate::{
        // Aggregation
        aggregate::{ScoreAggregator, ScoreBands},
        // Configuration
        config::{load_config, Config, ScanConfig, ScoreProfile, ScoringConfig},
        // Candlestick recognizers
        detectors::{BuiltinRecognizer, CandleContext, Recognizer},
        // Collaborators
        directory::{CsvDirectory, Instrument, InstrumentDirectory, InstrumentFilter},
        export::{write_csv, ScanRecord},
        history::{CsvHistoryProvider, FetchError, HistoryProvider, Lookback},
        // Parameters
        params::{ParamMeta, ParamType, Tunable},
        // Scorers
        pattern::{PatternEntry, PatternScorer, PatternTable},
        scan::{ScanOutcome, ScanResult, Scanner, SkipReason, SkippedInstrument},
        scoring::{DetailedScore, ScoreBreakdown, Scorer},
        shape::{CupHandleDetector, CupHandleParams, ShapeRejection, ShapeVerdict},
        technical::{TechnicalParams, TechnicalRule, TechnicalScorer, TechnicalTable},
        // Core types
        Candle,
        Direction,
        OHLCVExt,
        Result,
        ScoreError,
        Series,
        SignalOutcome,
        SubScore,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ScoreError>;

/// Errors raised while validating inputs or evaluating a single signal.
///
/// Scorers never return these to their caller: a failing signal is recorded as
/// [`SignalOutcome::Skipped`] with the error as its reason.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Bars out of chronological order at index {index}")]
    UnorderedSeries { index: usize },

    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    #[error("Numeric failure: {0}")]
    NumericFailure(&'static str),
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn body_top(&self) -> f64 {
        self.open().max(self.close())
    }

    #[inline]
    fn body_bottom(&self) -> f64 {
        self.open().min(self.close())
    }

    /// TA-Lib candle colour: close >= open counts as white.
    #[inline]
    fn is_white(&self) -> bool {
        self.close() >= self.open()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(ScoreError::InvalidBar {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) || !self.volume().is_finite() {
            return Err(ScoreError::InvalidBar {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Err(ScoreError::InvalidBar {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.volume() < 0.0 {
            return Err(ScoreError::InvalidBar {
                index: 0,
                reason: "negative volume",
            });
        }
        if self.high() < self.low() {
            return Err(ScoreError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// BARS AND SERIES
// ============================================================

/// A single daily bar.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    /// Seconds since the Unix epoch, when known.
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp: None,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

/// Validated, chronologically ordered bar history for one instrument.
///
/// Never mutated after construction; every scorer borrows it immutably.
/// An empty series is valid and means "no data".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    bars: Vec<Candle>,
}

impl Series {
    /// Build a series, validating every bar and the timestamp ordering.
    ///
    /// Timestamps are optional, but the ones present must be strictly
    /// increasing, even when untimed bars sit between them.
    pub fn new(bars: Vec<Candle>) -> Result<Self> {
        let mut last_seen: Option<i64> = None;
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                ScoreError::InvalidBar { reason, .. } => ScoreError::InvalidBar { index: i, reason },
                other => other,
            })?;
            if let Some(ts) = bar.timestamp {
                if last_seen.is_some_and(|prev| ts <= prev) {
                    return Err(ScoreError::UnorderedSeries { index: i });
                }
                last_seen = Some(ts);
            }
        }
        Ok(Self { bars })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn bars(&self) -> &[Candle] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Candle> {
        self.bars.last()
    }

    /// The trailing `n` bars (all of them when the series is shorter).
    pub fn tail(&self, n: usize) -> &[Candle] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

impl AsRef<[Candle]> for Series {
    fn as_ref(&self) -> &[Candle] {
        &self.bars
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

// ============================================================
// SIGNALS
// ============================================================

/// Direction of a recognised candlestick pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

/// Result of evaluating one indicator rule or one candlestick pattern.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalOutcome {
    /// The signal was computed; `points` is what it contributed (0 unless triggered).
    Evaluated {
        name: String,
        label: String,
        triggered: bool,
        points: i32,
    },
    /// The signal could not be computed and contributed nothing.
    Skipped {
        name: String,
        #[serde(serialize_with = "serialize_reason")]
        reason: ScoreError,
    },
}

impl SignalOutcome {
    pub fn name(&self) -> &str {
        match self {
            SignalOutcome::Evaluated { name, .. } | SignalOutcome::Skipped { name, .. } => name,
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self, SignalOutcome::Evaluated { triggered: true, .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SignalOutcome::Skipped { .. })
    }

    /// Points contributed to the raw (unclamped) sum.
    pub fn points(&self) -> i32 {
        match self {
            SignalOutcome::Evaluated {
                triggered: true,
                points,
                ..
            } => *points,
            _ => 0,
        }
    }
}

fn serialize_reason<S: serde::Serializer>(
    reason: &ScoreError,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(reason)
}

/// Bounded score of one scorer plus what produced it.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SubScore {
    pub score: u32,
    /// Labels of triggered signals, in evaluation order.
    pub labels: Vec<String>,
    pub outcomes: Vec<SignalOutcome>,
}

impl SubScore {
    /// Sum triggered points and clamp the total into `[0, max_score]`.
    pub(crate) fn from_outcomes(outcomes: Vec<SignalOutcome>, max_score: u32) -> Self {
        let labels = outcomes
            .iter()
            .filter_map(|o| match o {
                SignalOutcome::Evaluated {
                    label,
                    triggered: true,
                    ..
                } => Some(label.clone()),
                _ => None,
            })
            .collect();
        let raw: i64 = outcomes.iter().map(|o| i64::from(o.points())).sum();
        Self {
            score: aggregate::clamp_band(raw, max_score),
            labels,
            outcomes,
        }
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(o, h, l, c, 1000.0)
    }

    #[test]
    fn test_ohlcv_ext() {
        let b = bar(100.0, 110.0, 90.0, 105.0);
        assert_eq!(b.body(), 5.0);
        assert_eq!(b.range(), 20.0);
        assert_eq!(b.upper_shadow(), 5.0);
        assert_eq!(b.lower_shadow(), 10.0);
        assert!(b.is_bullish());
        assert!(b.is_white());
        assert!(!b.is_bearish());
    }

    #[test]
    fn test_series_rejects_bad_bar_with_index() {
        let bars = vec![bar(100.0, 101.0, 99.0, 100.5), bar(100.0, 99.0, 101.0, 100.0)];
        assert_eq!(
            Series::new(bars),
            Err(ScoreError::InvalidBar {
                index: 1,
                reason: "high < low"
            })
        );
    }

    #[test]
    fn test_series_rejects_non_positive_price() {
        let bars = vec![bar(0.0, 1.0, 0.0, 0.5)];
        assert!(matches!(
            Series::new(bars),
            Err(ScoreError::InvalidBar { index: 0, .. })
        ));
    }

    #[test]
    fn test_series_rejects_duplicate_timestamps() {
        let bars = vec![
            bar(100.0, 101.0, 99.0, 100.5).with_timestamp(10),
            bar(100.0, 101.0, 99.0, 100.5).with_timestamp(10),
        ];
        assert_eq!(Series::new(bars), Err(ScoreError::UnorderedSeries { index: 1 }));
    }

    #[test]
    fn test_series_checks_order_across_untimed_bars() {
        let bars = vec![
            bar(100.0, 101.0, 99.0, 100.5).with_timestamp(10),
            bar(100.0, 101.0, 99.0, 100.5),
            bar(100.0, 101.0, 99.0, 100.5).with_timestamp(5),
        ];
        assert_eq!(Series::new(bars), Err(ScoreError::UnorderedSeries { index: 2 }));

        let bars = vec![
            bar(100.0, 101.0, 99.0, 100.5).with_timestamp(10),
            bar(100.0, 101.0, 99.0, 100.5),
            bar(100.0, 101.0, 99.0, 100.5).with_timestamp(20),
        ];
        assert!(Series::new(bars).is_ok());
    }

    #[test]
    fn test_series_accessors() {
        let bars: Vec<Candle> = (0..5)
            .map(|i| bar(10.0 + i as f64, 12.0 + i as f64, 9.0 + i as f64, 11.0 + i as f64))
            .collect();
        let series = Series::new(bars).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(10).len(), 5);
        assert_eq!(series.closes(), vec![11.0, 12.0, 13.0, 14.0, 15.0]);
        assert_eq!(series.last().map(|b| b.close), Some(15.0));
        assert!(Series::empty().is_empty());
    }

    #[test]
    fn test_sub_score_clamps_and_keeps_order() {
        let outcomes = vec![
            SignalOutcome::Evaluated {
                name: "B".into(),
                label: "b".into(),
                triggered: true,
                points: 4,
            },
            SignalOutcome::Skipped {
                name: "X".into(),
                reason: ScoreError::UnknownSignal("X".into()),
            },
            SignalOutcome::Evaluated {
                name: "A".into(),
                label: "a".into(),
                triggered: true,
                points: 3,
            },
            SignalOutcome::Evaluated {
                name: "C".into(),
                label: "c".into(),
                triggered: false,
                points: 9,
            },
        ];
        let sub = SubScore::from_outcomes(outcomes, 5);
        assert_eq!(sub.score, 5);
        assert_eq!(sub.labels, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(sub.outcomes.len(), 4);
    }

    #[test]
    fn test_skipped_outcome_serializes_reason_as_text() {
        let outcome = SignalOutcome::Skipped {
            name: "ADX".into(),
            reason: ScoreError::InsufficientData { need: 28, got: 10 },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "Insufficient data: need 28 bars, got 10");
    }
}
