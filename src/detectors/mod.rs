//! Candlestick pattern recognizers
//!
//! The eleven TA-Lib compatible recognizers the pattern scorer weighs.
//! Each one inspects a single bar index (plus the bars leading into it) and
//! reports the direction of the pattern completing there, if any.
//!
//! # Pattern Categories
//!
//! - **Single-bar (3)**: Hammer, Dragonfly Doji, Shooting Star
//! - **Two-bar (4)**: Engulfing, Piercing, Dark Cloud Cover, Matching Low
//! - **Three/four-bar (4)**: Morning/Evening Star, Three White Soldiers, Three-Line Strike

use std::str::FromStr;

use crate::{Direction, ScoreError, OHLCV};

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple recognizer types.
macro_rules! impl_with_defaults {
  ($($recognizer:ty),* $(,)?) => {
    $(impl $recognizer {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod single_bar;
pub mod three_bar;
pub mod two_bar;

pub use helpers::*;
pub use single_bar::*;
pub use three_bar::*;
pub use two_bar::*;

// ============================================================
// CANDLE CONTEXT
// ============================================================

/// Trailing candle averages at one bar (TA-Lib compatible).
///
/// Averages cover the bars *before* the one they belong to; bar 0 falls back
/// to its own values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CandleContext {
    /// Average real body over TA_CANDLEAVGPERIOD = 10 bars
    pub avg_body: f64,
    /// Average high-low range over 10 bars
    pub avg_range: f64,
    /// Average high-low range over 5 bars (Near, Far and Equal settings)
    pub avg_range_5: f64,
}

impl CandleContext {
    /// Precompute the context for every bar.
    pub fn compute_all<T: OHLCV>(bars: &[T]) -> Vec<CandleContext> {
        (0..bars.len())
            .map(|i| CandleContext {
                avg_body: trailing_avg_body(bars, i, AVG_PERIOD),
                avg_range: trailing_avg_range(bars, i, AVG_PERIOD),
                avg_range_5: trailing_avg_range(bars, i, NEAR_PERIOD),
            })
            .collect()
    }
}

// ============================================================
// RECOGNIZER TRAIT
// ============================================================

/// A single candlestick pattern.
pub trait Recognizer: Send + Sync {
    /// TA-Lib function name, e.g. `CDLHAMMER`
    const NAME: &'static str;

    /// Bars the pattern spans (the completing bar included).
    fn min_bars(&self) -> usize;

    /// Direction of the pattern completing at `index`, if present.
    ///
    /// `ctx` must come from [`CandleContext::compute_all`] over the same bars.
    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &[CandleContext],
    ) -> Option<Direction>;
}

// ============================================================
// BUILTIN RECOGNIZERS - generated via macro
// ============================================================

/// Macro to generate the BuiltinRecognizer enum and its name lookup
macro_rules! define_recognizers {
    (
        $(
            $variant:ident($recognizer:ty)
        ),* $(,)?
    ) => {
        /// All builtin recognizers - static dispatch by enum
        #[derive(Debug, Clone)]
        pub enum BuiltinRecognizer {
            $($variant($recognizer)),*
        }

        impl BuiltinRecognizer {
            /// Every recognised TA-Lib name.
            pub const NAMES: &'static [&'static str] = &[
                $(<$recognizer as Recognizer>::NAME),*
            ];

            /// Look up a recognizer by TA-Lib name (`CDLHAMMER`, `CDL_HAMMER`, `hammer`).
            pub fn from_name(name: &str) -> Option<Self> {
                let key = canonical_name(name);
                $(
                    if key == <$recognizer as Recognizer>::NAME {
                        return Some(Self::$variant(<$recognizer>::default()));
                    }
                )*
                None
            }

            #[inline]
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$recognizer as Recognizer>::NAME),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(r) => Recognizer::min_bars(r)),*
                }
            }

            #[inline]
            pub fn recognize<T: OHLCV>(
                &self,
                bars: &[T],
                index: usize,
                ctx: &[CandleContext],
            ) -> Option<Direction> {
                match self {
                    $(Self::$variant(r) => Recognizer::recognize(r, bars, index, ctx)),*
                }
            }
        }
    };
}

define_recognizers! {
    // Single bar
    Hammer(HammerRecognizer),
    DragonflyDoji(DragonflyDojiRecognizer),
    ShootingStar(ShootingStarRecognizer),

    // Two bar
    Engulfing(EngulfingRecognizer),
    Piercing(PiercingRecognizer),
    DarkCloudCover(DarkCloudCoverRecognizer),
    MatchingLow(MatchingLowRecognizer),

    // Three and four bar
    MorningStar(MorningStarRecognizer),
    EveningStar(EveningStarRecognizer),
    ThreeWhiteSoldiers(ThreeWhiteSoldiersRecognizer),
    ThreeLineStrike(ThreeLineStrikeRecognizer),
}

impl BuiltinRecognizer {
    /// Run over a whole series. Output is aligned with `bars`.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<Option<Direction>> {
        let ctx = CandleContext::compute_all(bars);
        self.scan_with(bars, &ctx)
    }

    /// Like [`scan`](Self::scan) but reusing precomputed contexts.
    pub fn scan_with<T: OHLCV>(&self, bars: &[T], ctx: &[CandleContext]) -> Vec<Option<Direction>> {
        let need = self.min_bars();
        (0..bars.len())
            .map(|i| {
                if i + 1 < need {
                    None
                } else {
                    self.recognize(bars, i, ctx)
                }
            })
            .collect()
    }
}

impl FromStr for BuiltinRecognizer {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ScoreError::UnknownSignal(s.to_string()))
    }
}

/// Normalise a pattern name to the TA-Lib function form: upper case, no
/// separators, `CDL` prefix.
pub fn canonical_name(name: &str) -> String {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if key.starts_with("CDL") {
        key
    } else {
        format!("CDL{key}")
    }
}
