//! Technical indicators over price/volume slices.
//!
//! Every function is pure and returns a line aligned 1:1 with its input:
//! `out[i]` belongs to bar `i`, and bars inside the warm-up period hold
//! `f64::NAN`. Inputs that are too short (or a zero period) yield an all-NaN
//! line rather than an error, so callers that only read the trailing value
//! never have to special-case short history.
//!
//! Smoothing follows Wilder (1978) for RSI, ATR and ADX; EMA is seeded with
//! the SMA of its first `period` defined values; Bollinger bands use the
//! population standard deviation.

/// Indicator output aligned with the bars it was computed from.
pub type IndicatorLine = Vec<f64>;

// ============================================================
// ACCESSORS
// ============================================================

/// Value at the most recent bar, `None` when it is still in warm-up.
#[inline]
pub fn latest(line: &[f64]) -> Option<f64> {
    line.last().copied().filter(|v| v.is_finite())
}

/// Value at the bar before the most recent one, `None` when undefined.
#[inline]
pub fn previous(line: &[f64]) -> Option<f64> {
    line.len()
        .checked_sub(2)
        .and_then(|i| line.get(i).copied())
        .filter(|v| v.is_finite())
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// ============================================================
// MOVING AVERAGES
// ============================================================

/// Simple moving average. A window containing NaN yields NaN.
pub fn sma(values: &[f64], period: usize) -> IndicatorLine {
    rolling_mean(values, period)
}

/// Rolling arithmetic mean over `window` values, NaN until the window fills.
pub fn rolling_mean(values: &[f64], window: usize) -> IndicatorLine {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }

    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().all(|v| v.is_finite()) {
            out[i] = slice.iter().sum::<f64>() / window as f64;
        }
    }
    out
}

/// Exponential moving average with multiplier `2 / (period + 1)`.
///
/// Leading NaN values are skipped, so an EMA of an indicator line (the MACD
/// signal) starts once `period` defined values are available.
pub fn ema(values: &[f64], period: usize) -> IndicatorLine {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 {
        return out;
    }

    let start = match values.iter().position(|v| v.is_finite()) {
        Some(s) => s,
        None => return out,
    };
    if n - start < period {
        return out;
    }

    let seed_end = start + period;
    let seed = &values[start..seed_end];
    if !seed.iter().all(|v| v.is_finite()) {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = seed.iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = prev;

    for i in seed_end..n {
        prev = values[i] * k + prev * (1.0 - k);
        out[i] = prev;
    }
    out
}

// ============================================================
// MOMENTUM
// ============================================================

/// MACD line and its signal line.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd: IndicatorLine,
    pub signal: IndicatorLine,
}

/// MACD(fast, slow, signal): `EMA(fast) - EMA(slow)`, signal = EMA of that.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_line = ema(closes, fast);
    let slow_line = ema(closes, slow);

    let macd: Vec<f64> = fast_line
        .iter()
        .zip(&slow_line)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&macd, signal);

    Macd {
        macd,
        signal: signal_line,
    }
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first value appears at index `period`. A window with no movement at
/// all reads 50; one with gains but no losses reads 100.
pub fn rsi(closes: &[f64], period: usize) -> IndicatorLine {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_from_averages(avg_gain, avg_loss);

    let p = period as f64;
    for i in (period + 1)..n {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = rsi_from_averages(avg_gain, avg_loss);
    }
    out
}

/// A window with no movement at all reads 0, as TA-Lib does.
#[inline]
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let total = avg_gain + avg_loss;
    if total == 0.0 {
        0.0
    } else {
        100.0 * avg_gain / total
    }
}

// ============================================================
// VOLATILITY
// ============================================================

/// Upper, middle and lower Bollinger bands.
#[derive(Debug, Clone, PartialEq)]
pub struct Bollinger {
    pub upper: IndicatorLine,
    pub middle: IndicatorLine,
    pub lower: IndicatorLine,
}

/// Bollinger bands: SMA(period) ± `width` population standard deviations.
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Bollinger {
    let n = closes.len();
    let middle = sma(closes, period);
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    for i in 0..n {
        let mid = middle[i];
        if !mid.is_finite() {
            continue;
        }
        let window = &closes[i + 1 - period..=i];
        let var = window.iter().map(|v| (v - mid).powi(2)).sum::<f64>() / period as f64;
        let sd = var.sqrt();
        upper[i] = mid + width * sd;
        lower[i] = mid - width * sd;
    }

    Bollinger {
        upper,
        middle,
        lower,
    }
}

/// True range; the first bar has no previous close and uses high - low.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> IndicatorLine {
    let n = high.len().min(low.len()).min(close.len());
    (0..n)
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                hl
            } else {
                let pc = close[i - 1];
                hl.max((high[i] - pc).abs()).max((low[i] - pc).abs())
            }
        })
        .collect()
}

/// Average True Range (Wilder). First value at index `period`, seeded with
/// the mean true range of bars `1..=period`.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorLine {
    let tr = true_range(high, low, close);
    let n = tr.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return out;
    }

    let p = period as f64;
    let mut value = tr[1..=period].iter().sum::<f64>() / p;
    out[period] = value;
    for i in (period + 1)..n {
        value = (value * (p - 1.0) + tr[i]) / p;
        out[i] = value;
    }
    out
}

// ============================================================
// TREND
// ============================================================

/// Average Directional Index (Wilder). First value at index `2 * period - 1`.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorLine {
    let tr = true_range(high, low, close);
    let n = tr.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period * 2 {
        return out;
    }

    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let p = period as f64;
    let mut s_tr: f64 = tr[1..=period].iter().sum();
    let mut s_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut s_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = vec![f64::NAN; n];
    for i in period..n {
        if i > period {
            s_tr = s_tr - s_tr / p + tr[i];
            s_plus = s_plus - s_plus / p + plus_dm[i];
            s_minus = s_minus - s_minus / p + minus_dm[i];
        }
        dx[i] = if s_tr > 0.0 {
            let plus_di = 100.0 * s_plus / s_tr;
            let minus_di = 100.0 * s_minus / s_tr;
            let sum = plus_di + minus_di;
            if sum > 0.0 {
                100.0 * (plus_di - minus_di).abs() / sum
            } else {
                0.0
            }
        } else {
            0.0
        };
    }

    let first = period * 2 - 1;
    let mut value = dx[period..=first].iter().sum::<f64>() / p;
    out[first] = value;
    for i in (first + 1)..n {
        value = (value * (p - 1.0) + dx[i]) / p;
        out[i] = value;
    }
    out
}

/// Parabolic SAR with `acceleration` as both start and step, capped at
/// `maximum`. Undefined at bar 0.
pub fn parabolic_sar(high: &[f64], low: &[f64], acceleration: f64, maximum: f64) -> IndicatorLine {
    let n = high.len().min(low.len());
    let mut out = vec![f64::NAN; n];
    if n < 2 {
        return out;
    }

    let mut rising = high[1] > high[0];
    let mut af = acceleration;
    let mut ep = if rising { high[0] } else { low[0] };
    let mut sar = if rising { low[0] } else { high[0] };

    for i in 1..n {
        sar += af * (ep - sar);

        if rising {
            // SAR never rises above the two prior lows
            sar = sar.min(low[i - 1]);
            if i >= 2 {
                sar = sar.min(low[i - 2]);
            }
            if low[i] < sar {
                rising = false;
                sar = ep;
                ep = low[i];
                af = acceleration;
            } else if high[i] > ep {
                ep = high[i];
                af = (af + acceleration).min(maximum);
            }
        } else {
            sar = sar.max(high[i - 1]);
            if i >= 2 {
                sar = sar.max(high[i - 2]);
            }
            if high[i] > sar {
                rising = true;
                sar = ep;
                ep = high[i];
                af = acceleration;
            } else if low[i] < ep {
                ep = low[i];
                af = (af + acceleration).min(maximum);
            }
        }

        out[i] = sar;
    }
    out
}

// ============================================================
// VOLUME
// ============================================================

/// On-Balance Volume, starting from the first bar's volume.
pub fn obv(close: &[f64], volume: &[f64]) -> IndicatorLine {
    let n = close.len().min(volume.len());
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }

    let mut total = volume[0];
    out.push(total);
    for i in 1..n {
        if close[i] > close[i - 1] {
            total += volume[i];
        } else if close[i] < close[i - 1] {
            total -= volume[i];
        }
        out.push(total);
    }
    out
}

/// First difference; `out[0]` is NaN.
pub fn diff(values: &[f64]) -> IndicatorLine {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_enough(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sma_alignment() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&v, 3);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_eq!(&out[2..], &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_short_input_is_all_nan() {
        let v = [1.0, 2.0];
        assert!(sma(&v, 5).iter().all(|x| x.is_nan()));
        assert!(ema(&v, 5).iter().all(|x| x.is_nan()));
        assert!(rsi(&v, 14).iter().all(|x| x.is_nan()));
        assert!(sma(&v, 0).iter().all(|x| x.is_nan()));
        assert_eq!(latest(&sma(&v, 5)), None);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let v = [2.0, 4.0, 6.0, 8.0];
        let out = ema(&v, 3);
        assert!(close_enough(out[2], 4.0));
        // k = 0.5
        assert!(close_enough(out[3], 6.0));
    }

    #[test]
    fn test_ema_skips_leading_nan() {
        let v = [f64::NAN, f64::NAN, 1.0, 1.0, 1.0];
        let out = ema(&v, 2);
        assert!(out[2].is_nan());
        assert!(close_enough(out[3], 1.0));
        assert!(close_enough(out[4], 1.0));
    }

    #[test]
    fn test_macd_flat_prices_is_zero() {
        let v = vec![50.0; 60];
        let m = macd(&v, 12, 26, 9);
        assert!(m.signal[32].is_nan());
        assert!(close_enough(m.macd[59], 0.0));
        assert!(close_enough(m.signal[59], 0.0));
    }

    #[test]
    fn test_macd_rising_prices_line_above_zero() {
        let v: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let m = macd(&v, 12, 26, 9);
        assert!(latest(&m.macd).unwrap() > 0.0);
    }

    #[test]
    fn test_rsi_extremes() {
        let up: Vec<f64> = (0..20).map(|i| i as f64 + 1.0).collect();
        assert_eq!(latest(&rsi(&up, 14)), Some(100.0));

        let down: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert!(close_enough(latest(&rsi(&down, 14)).unwrap(), 0.0));

        let flat = vec![10.0; 20];
        assert_eq!(latest(&rsi(&flat, 14)), Some(0.0));
    }

    #[test]
    fn test_rsi_first_value_at_period() {
        let v: Vec<f64> = (0..20).map(|i| (i % 3) as f64 + 10.0).collect();
        let out = rsi(&v, 14);
        assert!(out[13].is_nan());
        assert!(out[14].is_finite());
    }

    #[test]
    fn test_bollinger_flat_prices_collapse() {
        let v = vec![10.0; 25];
        let b = bollinger(&v, 20, 2.0);
        assert!(close_enough(b.upper[24], 10.0));
        assert!(close_enough(b.lower[24], 10.0));
        assert!(b.middle[18].is_nan());
    }

    #[test]
    fn test_bollinger_population_std() {
        let v = [1.0, 3.0];
        let b = bollinger(&v, 2, 1.0);
        assert!(close_enough(b.middle[1], 2.0));
        assert!(close_enough(b.upper[1], 3.0));
        assert!(close_enough(b.lower[1], 1.0));
    }

    #[test]
    fn test_atr_constant_range() {
        let high = vec![11.0; 20];
        let low = vec![9.0; 20];
        let close = vec![10.0; 20];
        let out = atr(&high, &low, &close, 14);
        assert!(out[13].is_nan());
        assert!(close_enough(out[14], 2.0));
        assert!(close_enough(out[19], 2.0));
    }

    #[test]
    fn test_adx_strong_trend() {
        let close: Vec<f64> = (0..40).map(|i| 100.0 + 2.0 * i as f64).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        let out = adx(&high, &low, &close, 14);
        assert!(out[26].is_nan());
        assert!(out[27].is_finite());
        assert!(latest(&out).unwrap() > 25.0);
    }

    #[test]
    fn test_adx_too_short() {
        let v = vec![1.0; 27];
        assert!(adx(&v, &v, &v, 14).iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_parabolic_sar_below_price_in_uptrend() {
        let close: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
        let sar = parabolic_sar(&high, &low, 0.02, 0.2);
        assert!(sar[0].is_nan());
        assert!(latest(&sar).unwrap() < close[29]);
    }

    #[test]
    fn test_parabolic_sar_above_price_in_downtrend() {
        let close: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
        let sar = parabolic_sar(&high, &low, 0.02, 0.2);
        assert!(latest(&sar).unwrap() > close[29]);
    }

    #[test]
    fn test_obv_accumulates() {
        let close = [10.0, 11.0, 10.5, 10.5, 12.0];
        let volume = [100.0, 200.0, 50.0, 70.0, 30.0];
        assert_eq!(obv(&close, &volume), vec![100.0, 300.0, 250.0, 250.0, 280.0]);
    }

    #[test]
    fn test_diff_and_accessors() {
        let d = diff(&[1.0, 4.0, 2.0]);
        assert!(d[0].is_nan());
        assert_eq!(&d[1..], &[3.0, -2.0]);
        assert_eq!(latest(&d), Some(-2.0));
        assert_eq!(previous(&d), Some(3.0));
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 3.0]), Some(2.0));
    }

    #[test]
    fn test_rolling_mean_nan_window() {
        let v = [f64::NAN, 2.0, 4.0, 6.0];
        let out = rolling_mean(&v, 2);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 3.0);
        assert_eq!(out[3], 5.0);
    }
}
