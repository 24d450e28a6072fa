//! Single-bar recognizers
//!
//! CDLHAMMER, CDLDRAGONFLYDOJI, CDLSHOOTINGSTAR

use super::helpers::{self, *};
use super::{CandleContext, Recognizer};
use crate::{Direction, OHLCVExt, OHLCV};

/// CDLHAMMER - Hammer (TA-Lib compatible)
///
/// Small body at the low end of the bar, long lower shadow, almost no upper
/// shadow, with the body at or below the prior bar's low.
#[derive(Debug, Clone, Copy)]
pub struct HammerRecognizer {
    pub body_short_factor: f64,
    pub shadow_veryshort_factor: f64,
    pub near_factor: f64,
}

impl Default for HammerRecognizer {
    fn default() -> Self {
        Self {
            body_short_factor: helpers::BODY_SHORT_FACTOR,
            shadow_veryshort_factor: helpers::SHADOW_VERYSHORT_FACTOR,
            near_factor: helpers::NEAR_FACTOR,
        }
    }
}

impl Recognizer for HammerRecognizer {
    const NAME: &'static str = "CDLHAMMER";

    fn min_bars(&self) -> usize {
        2
    }

    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &[CandleContext],
    ) -> Option<Direction> {
        let prev = bars.get(index.checked_sub(1)?)?;
        let bar = bars.get(index)?;
        let here = ctx.get(index)?;
        let before = ctx.get(index - 1)?;

        let body = bar.body();
        let range = bar.range();

        let shaped = is_body_short(body, here.avg_body, range, self.body_short_factor)
            && is_shadow_long(bar.lower_shadow(), body)
            && is_shadow_very_short(bar.upper_shadow(), here.avg_range, range, self.shadow_veryshort_factor);
        if !shaped {
            return None;
        }

        // body at or below the prior low, with Near slack measured at i-1
        if bar.body_bottom() > prev.low() + before.avg_range_5 * self.near_factor {
            return None;
        }

        Some(Direction::Bullish)
    }
}

/// CDLDRAGONFLYDOJI - Dragonfly Doji (TA-Lib compatible)
#[derive(Debug, Clone, Copy)]
pub struct DragonflyDojiRecognizer {
    pub doji_factor: f64,
    pub shadow_veryshort_factor: f64,
}

impl Default for DragonflyDojiRecognizer {
    fn default() -> Self {
        Self {
            doji_factor: helpers::DOJI_FACTOR,
            shadow_veryshort_factor: helpers::SHADOW_VERYSHORT_FACTOR,
        }
    }
}

impl Recognizer for DragonflyDojiRecognizer {
    const NAME: &'static str = "CDLDRAGONFLYDOJI";

    fn min_bars(&self) -> usize {
        1
    }

    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &[CandleContext],
    ) -> Option<Direction> {
        let bar = bars.get(index)?;
        let here = ctx.get(index)?;
        let range = bar.range();
        let factor = self.shadow_veryshort_factor;

        // TA-Lib checks the lower shadow against ShadowVeryShort, not ShadowVeryLong
        let hit = is_doji(bar.body(), here.avg_range, range, self.doji_factor)
            && is_shadow_very_short(bar.upper_shadow(), here.avg_range, range, factor)
            && shadow_exceeds_very_short(bar.lower_shadow(), here.avg_range, range, factor);

        hit.then_some(Direction::Bullish)
    }
}

/// CDLSHOOTINGSTAR - Shooting Star (TA-Lib compatible)
///
/// Gaps up from the prior body, small body, long upper shadow, almost no
/// lower shadow.
#[derive(Debug, Clone, Copy)]
pub struct ShootingStarRecognizer {
    pub body_short_factor: f64,
    pub shadow_veryshort_factor: f64,
}

impl Default for ShootingStarRecognizer {
    fn default() -> Self {
        Self {
            body_short_factor: helpers::BODY_SHORT_FACTOR,
            shadow_veryshort_factor: helpers::SHADOW_VERYSHORT_FACTOR,
        }
    }
}

impl Recognizer for ShootingStarRecognizer {
    const NAME: &'static str = "CDLSHOOTINGSTAR";

    fn min_bars(&self) -> usize {
        2
    }

    fn recognize<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &[CandleContext],
    ) -> Option<Direction> {
        let prev = bars.get(index.checked_sub(1)?)?;
        let bar = bars.get(index)?;
        let here = ctx.get(index)?;

        if !real_body_gap_up(bar, prev) {
            return None;
        }

        let body = bar.body();
        let range = bar.range();
        let hit = is_body_short(body, here.avg_body, range, self.body_short_factor)
            && is_shadow_long(bar.upper_shadow(), body)
            && is_shadow_very_short(bar.lower_shadow(), here.avg_range, range, self.shadow_veryshort_factor);

        hit.then_some(Direction::Bearish)
    }
}

impl_with_defaults!(HammerRecognizer, DragonflyDojiRecognizer, ShootingStarRecognizer);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    /// Ten ordinary bars: body 2, range 4, drifting down.
    fn lead_in() -> Vec<Candle> {
        (0..10)
            .map(|i| {
                let o = 120.0 - i as f64;
                Candle::new(o, o + 1.0, o - 3.0, o - 2.0, 1000.0)
            })
            .collect()
    }

    fn run<R: Recognizer>(r: &R, bars: &[Candle]) -> Option<Direction> {
        let ctx = CandleContext::compute_all(bars);
        r.recognize(bars, bars.len() - 1, &ctx)
    }

    #[test]
    fn test_hammer_after_decline() {
        let mut bars = lead_in();
        let prev_low = bars[9].low;
        // body 0.5 at the top, lower shadow 3, upper shadow 0.1
        bars.push(Candle::new(prev_low, prev_low + 0.6, prev_low - 3.0, prev_low + 0.5, 1000.0));
        assert_eq!(run(&HammerRecognizer::with_defaults(), &bars), Some(Direction::Bullish));
    }

    #[test]
    fn test_hammer_rejects_long_upper_shadow() {
        let mut bars = lead_in();
        let prev_low = bars[9].low;
        bars.push(Candle::new(prev_low, prev_low + 2.0, prev_low - 3.0, prev_low + 0.5, 1000.0));
        assert_eq!(run(&HammerRecognizer::with_defaults(), &bars), None);
    }

    #[test]
    fn test_hammer_needs_prior_bar() {
        let bars = vec![Candle::new(10.0, 10.1, 7.0, 10.05, 1.0)];
        assert_eq!(run(&HammerRecognizer::with_defaults(), &bars), None);
    }

    #[test]
    fn test_dragonfly_doji() {
        let mut bars = lead_in();
        bars.push(Candle::new(100.0, 100.05, 97.0, 100.02, 1000.0));
        assert_eq!(run(&DragonflyDojiRecognizer::with_defaults(), &bars), Some(Direction::Bullish));
    }

    #[test]
    fn test_dragonfly_rejects_flat_bar() {
        let mut bars = lead_in();
        bars.push(Candle::new(100.0, 100.05, 99.99, 100.02, 1000.0));
        assert_eq!(run(&DragonflyDojiRecognizer::with_defaults(), &bars), None);
    }

    #[test]
    fn test_shooting_star_after_gap_up() {
        let mut bars = lead_in();
        let top = bars[9].body_top();
        // gaps above the prior body, body 0.5, upper shadow 3, lower 0.1
        bars.push(Candle::new(top + 1.0, top + 4.5, top + 0.9, top + 1.5, 1000.0));
        assert_eq!(run(&ShootingStarRecognizer::with_defaults(), &bars), Some(Direction::Bearish));
    }

    #[test]
    fn test_shooting_star_requires_gap() {
        let mut bars = lead_in();
        let bottom = bars[9].body_bottom();
        bars.push(Candle::new(bottom + 0.5, bottom + 4.0, bottom + 0.4, bottom + 1.0, 1000.0));
        assert_eq!(run(&ShootingStarRecognizer::with_defaults(), &bars), None);
    }
}
