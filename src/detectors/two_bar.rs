//! Two-bar recognizers
//!
//! CDLENGULFING, CDLPIERCING, CDLDARKCLOUDCOVER, CDLMATCHINGLOW

use super::helpers::{self, *};
use super::{CandleContext, Recognizer};
use crate::{Direction, OHLCVExt, OHLCV};

/// Borrow the bar at `index` and the one before it.
#[inline]
fn pair<T>(bars: &[T], index: usize) -> Option<(&T, &T)> {
    Some((bars.get(index.checked_sub(1)?)?, bars.get(index)?))
}

/// CDLENGULFING - Engulfing (TA-Lib compatible, bidirectional)
///
/// TA-Lib accepts the engulf when at most one end of the bodies coincides.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngulfingRecognizer;

impl Recognizer for EngulfingRecognizer {
    const NAME: &'static str = "CDLENGULFING";

    fn min_bars(&self) -> usize {
        2
    }

    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &[CandleContext],
    ) -> Option<Direction> {
        let (prev, curr) = pair(bars, index)?;

        // TA_CANDLECOLOR: close >= open is white
        if curr.is_white() && !prev.is_white() {
            let engulfs = (curr.close() >= prev.open() && curr.open() < prev.close())
                || (curr.close() > prev.open() && curr.open() <= prev.close());
            if engulfs {
                return Some(Direction::Bullish);
            }
        }

        if !curr.is_white() && prev.is_white() {
            let engulfs = (curr.open() >= prev.close() && curr.close() < prev.open())
                || (curr.open() > prev.close() && curr.close() <= prev.open());
            if engulfs {
                return Some(Direction::Bearish);
            }
        }

        None
    }
}

/// CDLPIERCING - Piercing Line (TA-Lib compatible)
#[derive(Debug, Clone, Copy)]
pub struct PiercingRecognizer {
    pub body_long_factor: f64,
    /// Fraction of the first body the second close must climb back into
    pub penetration: f64,
}

impl Default for PiercingRecognizer {
    fn default() -> Self {
        Self {
            body_long_factor: helpers::BODY_LONG_FACTOR,
            penetration: 0.5,
        }
    }
}

impl Recognizer for PiercingRecognizer {
    const NAME: &'static str = "CDLPIERCING";

    fn min_bars(&self) -> usize {
        2
    }

    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &[CandleContext],
    ) -> Option<Direction> {
        let (prev, curr) = pair(bars, index)?;
        let (prev_ctx, curr_ctx) = pair(ctx, index)?;

        if prev.is_white() || !curr.is_white() {
            return None;
        }

        let prev_body = prev.body();
        let long_bodies = is_body_long(prev_body, prev_ctx.avg_body, prev.range(), self.body_long_factor)
            && is_body_long(curr.body(), curr_ctx.avg_body, curr.range(), self.body_long_factor);
        if !long_bodies {
            return None;
        }

        // opens below the prior low, closes inside the prior body above its midpoint
        let hit = curr.open() < prev.low()
            && curr.close() < prev.open()
            && curr.close() > prev.close() + prev_body * self.penetration;

        hit.then_some(Direction::Bullish)
    }
}

/// CDLDARKCLOUDCOVER - Dark Cloud Cover (TA-Lib compatible)
#[derive(Debug, Clone, Copy)]
pub struct DarkCloudCoverRecognizer {
    pub body_long_factor: f64,
    pub penetration: f64,
}

impl Default for DarkCloudCoverRecognizer {
    fn default() -> Self {
        Self {
            body_long_factor: helpers::BODY_LONG_FACTOR,
            penetration: 0.5,
        }
    }
}

impl Recognizer for DarkCloudCoverRecognizer {
    const NAME: &'static str = "CDLDARKCLOUDCOVER";

    fn min_bars(&self) -> usize {
        2
    }

    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &[CandleContext],
    ) -> Option<Direction> {
        let (prev, curr) = pair(bars, index)?;
        let prev_ctx = ctx.get(index - 1)?;

        if !prev.is_white() || curr.is_white() {
            return None;
        }

        // only the first candle needs a long body
        let prev_body = prev.body();
        if !is_body_long(prev_body, prev_ctx.avg_body, prev.range(), self.body_long_factor) {
            return None;
        }

        let hit = curr.open() > prev.high()
            && curr.close() > prev.open()
            && curr.close() < prev.close() - prev_body * self.penetration;

        hit.then_some(Direction::Bearish)
    }
}

/// CDLMATCHINGLOW - Matching Low (TA-Lib compatible)
#[derive(Debug, Clone, Copy)]
pub struct MatchingLowRecognizer {
    pub equal_factor: f64,
}

impl Default for MatchingLowRecognizer {
    fn default() -> Self {
        Self {
            equal_factor: helpers::EQUAL_FACTOR,
        }
    }
}

impl Recognizer for MatchingLowRecognizer {
    const NAME: &'static str = "CDLMATCHINGLOW";

    fn min_bars(&self) -> usize {
        2
    }

    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &[CandleContext],
    ) -> Option<Direction> {
        let (prev, curr) = pair(bars, index)?;
        let prev_ctx = ctx.get(index - 1)?;

        if !prev.is_bearish() || !curr.is_bearish() {
            return None;
        }

        // Equal is measured at the first bar of the pair
        let tolerance = prev_ctx.avg_range_5 * self.equal_factor;
        ((prev.close() - curr.close()).abs() <= tolerance).then_some(Direction::Bullish)
    }
}

impl_with_defaults!(
    EngulfingRecognizer,
    PiercingRecognizer,
    DarkCloudCoverRecognizer,
    MatchingLowRecognizer,
);
