//! Common helper functions for candlestick recognition
//!
//! TA-Lib compatible thresholds and comparison functions shared by the
//! recognizer modules.

use crate::{OHLCVExt, OHLCV};

// ============================================================
// TA-Lib THRESHOLDS (from ta_global.c)
// ============================================================

/// TA_CANDLEAVGPERIOD for BodyLong, BodyShort, BodyDoji and ShadowVeryShort
pub const AVG_PERIOD: usize = 10;
/// Period for Near, Far and Equal
pub const NEAR_PERIOD: usize = 5;

/// Body is doji-like: body <= avg_range * DOJI_FACTOR
pub const DOJI_FACTOR: f64 = 0.1;
/// Body is short: body < avg_body * BODY_SHORT_FACTOR
pub const BODY_SHORT_FACTOR: f64 = 1.0;
/// Body is long: body > avg_body * BODY_LONG_FACTOR
pub const BODY_LONG_FACTOR: f64 = 1.0;
/// Shadow very short: shadow < avg_range * SHADOW_VERYSHORT_FACTOR
pub const SHADOW_VERYSHORT_FACTOR: f64 = 0.1;
pub const EQUAL_FACTOR: f64 = 0.05;
pub const NEAR_FACTOR: f64 = 0.2;
pub const FAR_FACTOR: f64 = 0.6;

// Fallback ratio thresholds for flat history (average is zero)
pub const DOJI_RATIO: f64 = 0.1;
pub const BODY_SHORT_RATIO: f64 = 0.3;
pub const BODY_LONG_RATIO: f64 = 0.7;
pub const SHADOW_SHORT_RATIO: f64 = 0.1;

// ============================================================
// COMPARISONS
// ============================================================

/// TA-Lib BodyDoji. A zero body is always a doji.
#[inline]
pub fn is_doji(body: f64, avg_range: f64, range: f64, factor: f64) -> bool {
    if body <= 0.0 {
        return true;
    }
    if avg_range > 0.0 {
        body <= avg_range * factor
    } else {
        range > 0.0 && body / range <= DOJI_RATIO
    }
}

/// TA-Lib BodyShort
#[inline]
pub fn is_body_short(body: f64, avg_body: f64, range: f64, factor: f64) -> bool {
    if avg_body > 0.0 {
        body < avg_body * factor
    } else {
        range > 0.0 && body / range <= BODY_SHORT_RATIO
    }
}

/// TA-Lib BodyLong
#[inline]
pub fn is_body_long(body: f64, avg_body: f64, range: f64, factor: f64) -> bool {
    if avg_body > 0.0 {
        body > avg_body * factor
    } else {
        range > 0.0 && body / range >= BODY_LONG_RATIO
    }
}

/// TA-Lib ShadowLong: RangeType=RealBody, Period=0, so the bar's own body is
/// the yardstick.
#[inline]
pub fn is_shadow_long(shadow: f64, body: f64) -> bool {
    shadow > body
}

/// TA-Lib ShadowVeryShort
#[inline]
pub fn is_shadow_very_short(shadow: f64, avg_range: f64, range: f64, factor: f64) -> bool {
    if avg_range > 0.0 {
        shadow < avg_range * factor
    } else {
        range > 0.0 && shadow / range <= SHADOW_SHORT_RATIO
    }
}

/// Inverse of [`is_shadow_very_short`]: the shadow is meaningfully long.
#[inline]
pub fn shadow_exceeds_very_short(shadow: f64, avg_range: f64, range: f64, factor: f64) -> bool {
    let threshold = avg_range * factor;
    if threshold > 0.0 {
        shadow > threshold
    } else if range > 0.0 {
        shadow / range > SHADOW_SHORT_RATIO
    } else {
        false
    }
}

/// TA_REALBODYGAPUP: `second`'s body sits entirely above `first`'s.
#[inline]
pub fn real_body_gap_up<T: OHLCV>(second: &T, first: &T) -> bool {
    second.body_bottom() > first.body_top()
}

/// TA_REALBODYGAPDOWN: `second`'s body sits entirely below `first`'s.
#[inline]
pub fn real_body_gap_down<T: OHLCV>(second: &T, first: &T) -> bool {
    second.body_top() < first.body_bottom()
}

// ============================================================
// TRAILING AVERAGES
// ============================================================

/// Trailing average body over the `period` bars before `at`.
/// Bar 0 has no history and uses its own body.
#[inline]
pub fn trailing_avg_body<T: OHLCV>(bars: &[T], at: usize, period: usize) -> f64 {
    trailing_avg(bars, at, period, |b| b.body())
}

/// Trailing average high-low range over the `period` bars before `at`.
#[inline]
pub fn trailing_avg_range<T: OHLCV>(bars: &[T], at: usize, period: usize) -> f64 {
    trailing_avg(bars, at, period, |b| b.range())
}

fn trailing_avg<T: OHLCV>(bars: &[T], at: usize, period: usize, f: impl Fn(&T) -> f64) -> f64 {
    let Some(bar) = bars.get(at) else {
        return 0.0;
    };
    if at == 0 || period == 0 {
        return f(bar);
    }
    let slice = &bars[at.saturating_sub(period)..at];
    slice.iter().map(&f).sum::<f64>() / slice.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    #[test]
    fn test_flat_history_falls_back_to_ratios() {
        // zero averages: judged against the bar's own range
        assert!(is_body_long(8.0, 0.0, 10.0, BODY_LONG_FACTOR));
        assert!(!is_body_long(5.0, 0.0, 10.0, BODY_LONG_FACTOR));
        assert!(is_body_short(2.0, 0.0, 10.0, BODY_SHORT_FACTOR));
        assert!(is_doji(0.0, 0.0, 0.0, DOJI_FACTOR));
        assert!(!shadow_exceeds_very_short(0.0, 0.0, 0.0, SHADOW_VERYSHORT_FACTOR));
    }

    #[test]
    fn test_body_gaps() {
        let low = Candle::new(10.0, 11.5, 9.5, 11.0, 1.0);
        let high = Candle::new(12.0, 13.0, 11.0, 12.5, 1.0);
        assert!(real_body_gap_up(&high, &low));
        assert!(real_body_gap_down(&low, &high));
        assert!(!real_body_gap_up(&low, &high));
    }

    #[test]
    fn test_trailing_average_window() {
        let bars: Vec<Candle> = (1..=12)
            .map(|i| Candle::new(10.0, 10.0 + i as f64, 10.0, 10.0 + i as f64, 1.0))
            .collect();
        // bodies 1..=12, average of the 10 bars before index 11 = mean(2..=11)
        assert_eq!(trailing_avg_body(&bars, 11, 10), 6.5);
        assert_eq!(trailing_avg_range(&bars, 2, 5), 1.5);
        assert_eq!(trailing_avg_body(&bars, 0, 10), 1.0);
        assert_eq!(trailing_avg_body(&bars, 99, 10), 0.0);
    }
}
