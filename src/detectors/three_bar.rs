//! Three- and four-bar recognizers
//!
//! CDLMORNINGSTAR, CDLEVENINGSTAR, CDL3WHITESOLDIERS, CDL3LINESTRIKE

use super::helpers::{self, *};
use super::{CandleContext, Recognizer};
use crate::{Direction, OHLCVExt, OHLCV};

/// Borrow the bars `index - n + 1 ..= index`.
#[inline]
fn window<T>(bars: &[T], index: usize, n: usize) -> Option<&[T]> {
  let start = (index + 1).checked_sub(n)?;
  bars.get(start..=index)
}

/// CDLMORNINGSTAR - Morning Star (TA-Lib compatible)
#[derive(Debug, Clone)]
pub struct MorningStarRecognizer {
  pub body_long_factor: f64,
  pub body_short_factor: f64,
  /// optInPenetration: how far into the first body the third close must reach
  pub penetration: f64,
}

impl Default for MorningStarRecognizer {
  fn default() -> Self {
    Self {
      body_long_factor: helpers::BODY_LONG_FACTOR,
      body_short_factor: helpers::BODY_SHORT_FACTOR,
      penetration: 0.3,
    }
  }
}

impl Recognizer for MorningStarRecognizer {
  const NAME: &'static str = "CDLMORNINGSTAR";

  fn min_bars(&self) -> usize {
    3
  }

  fn recognize<T: OHLCV>(
    &self,
    bars: &[T],
    index: usize,
    ctx: &[CandleContext],
  ) -> Option<Direction> {
    let [first, star, third] = window(bars, index, 3)? else {
      return None;
    };
    let [c1, c2, c3] = window(ctx, index, 3)? else {
      return None;
    };

    if first.is_white() || !third.is_white() {
      return None;
    }

    let first_body = first.body();
    if !is_body_long(first_body, c1.avg_body, first.range(), self.body_long_factor) {
      return None;
    }
    if !is_body_short(star.body(), c2.avg_body, star.range(), self.body_short_factor) {
      return None;
    }
    if !real_body_gap_down(star, first) {
      return None;
    }
    // third body must beat BodyShort
    if third.body() <= c3.avg_body * self.body_short_factor {
      return None;
    }

    (third.close() > first.close() + first_body * self.penetration).then_some(Direction::Bullish)
  }
}

/// CDLEVENINGSTAR - Evening Star (TA-Lib compatible)
#[derive(Debug, Clone)]
pub struct EveningStarRecognizer {
  pub body_long_factor: f64,
  pub body_short_factor: f64,
  pub penetration: f64,
}

impl Default for EveningStarRecognizer {
  fn default() -> Self {
    Self {
      body_long_factor: helpers::BODY_LONG_FACTOR,
      body_short_factor: helpers::BODY_SHORT_FACTOR,
      penetration: 0.3,
    }
  }
}

impl Recognizer for EveningStarRecognizer {
  const NAME: &'static str = "CDLEVENINGSTAR";

  fn min_bars(&self) -> usize {
    3
  }

  fn recognize<T: OHLCV>(
    &self,
    bars: &[T],
    index: usize,
    ctx: &[CandleContext],
  ) -> Option<Direction> {
    let [first, star, third] = window(bars, index, 3)? else {
      return None;
    };
    let [c1, c2, c3] = window(ctx, index, 3)? else {
      return None;
    };

    if !first.is_white() || third.is_white() {
      return None;
    }

    let first_body = first.body();
    if !is_body_long(first_body, c1.avg_body, first.range(), self.body_long_factor) {
      return None;
    }
    if !is_body_short(star.body(), c2.avg_body, star.range(), self.body_short_factor) {
      return None;
    }
    if !real_body_gap_up(star, first) {
      return None;
    }
    if third.body() <= c3.avg_body * self.body_short_factor {
      return None;
    }

    (third.close() < first.close() - first_body * self.penetration).then_some(Direction::Bearish)
  }
}

/// CDL3WHITESOLDIERS - Three Advancing White Soldiers (TA-Lib compatible)
#[derive(Debug, Clone)]
pub struct ThreeWhiteSoldiersRecognizer {
  pub shadow_veryshort_factor: f64,
  pub near_factor: f64,
  pub far_factor: f64,
  pub body_short_factor: f64,
}

impl Default for ThreeWhiteSoldiersRecognizer {
  fn default() -> Self {
    Self {
      shadow_veryshort_factor: helpers::SHADOW_VERYSHORT_FACTOR,
      near_factor: helpers::NEAR_FACTOR,
      far_factor: helpers::FAR_FACTOR,
      body_short_factor: helpers::BODY_SHORT_FACTOR,
    }
  }
}

impl Recognizer for ThreeWhiteSoldiersRecognizer {
  const NAME: &'static str = "CDL3WHITESOLDIERS";

  fn min_bars(&self) -> usize {
    3
  }

  fn recognize<T: OHLCV>(
    &self,
    bars: &[T],
    index: usize,
    ctx: &[CandleContext],
  ) -> Option<Direction> {
    let soldiers = window(bars, index, 3)?;
    let contexts = window(ctx, index, 3)?;

    if !soldiers.iter().all(|b| b.is_bullish()) {
      return None;
    }

    // every soldier closes near its high
    let short_tops = soldiers
      .iter()
      .zip(contexts)
      .all(|(b, c)| b.upper_shadow() < c.avg_range * self.shadow_veryshort_factor);
    if !short_tops {
      return None;
    }

    for k in 1..3 {
      let (prev, curr, prev_ctx) = (&soldiers[k - 1], &soldiers[k], &contexts[k - 1]);
      let near = prev_ctx.avg_range_5 * self.near_factor;
      let far = prev_ctx.avg_range_5 * self.far_factor;

      // higher close, open inside (or just above) the previous body
      if curr.close() <= prev.close() || curr.open() <= prev.open() || curr.open() > prev.close() + near {
        return None;
      }
      // bodies may not shrink by Far or more
      if curr.body() <= prev.body() - far {
        return None;
      }
    }

    let last = &soldiers[2];
    // the last soldier must not be short
    (last.body() > contexts[2].avg_body * self.body_short_factor).then_some(Direction::Bullish)
  }
}

/// CDL3LINESTRIKE - Three-Line Strike (TA-Lib compatible, bidirectional)
///
/// Three same-colour bars stepping in one direction, then a fourth bar of the
/// opposite colour that wipes them out.
#[derive(Debug, Clone)]
pub struct ThreeLineStrikeRecognizer {
  pub near_factor: f64,
}

impl Default for ThreeLineStrikeRecognizer {
  fn default() -> Self {
    Self {
      near_factor: helpers::NEAR_FACTOR,
    }
  }
}

impl Recognizer for ThreeLineStrikeRecognizer {
  const NAME: &'static str = "CDL3LINESTRIKE";

  fn min_bars(&self) -> usize {
    4
  }

  fn recognize<T: OHLCV>(
    &self,
    bars: &[T],
    index: usize,
    ctx: &[CandleContext],
  ) -> Option<Direction> {
    let [first, second, third, strike] = window(bars, index, 4)? else {
      return None;
    };
    let [c1, c2, _, _] = window(ctx, index, 4)? else {
      return None;
    };

    let white = first.is_white();
    if second.is_white() != white || third.is_white() != white || strike.is_white() == white {
      return None;
    }

    // bars 2 and 3 open within (or Near) the previous body
    let opens_near = |prev: &T, curr: &T, c: &CandleContext| {
      let near = c.avg_range_5 * self.near_factor;
      curr.open() >= prev.body_bottom() - near && curr.open() <= prev.body_top() + near
    };
    if !opens_near(first, second, c1) || !opens_near(second, third, c2) {
      return None;
    }

    if white {
      let hit = second.close() > first.close()
        && third.close() > second.close()
        && strike.open() > third.close()
        && strike.close() < first.open();
      hit.then_some(Direction::Bullish)
    } else {
      let hit = second.close() < first.close()
        && third.close() < second.close()
        && strike.open() < third.close()
        && strike.close() > first.open();
      hit.then_some(Direction::Bearish)
    }
  }
}

impl_with_defaults!(
  MorningStarRecognizer,
  EveningStarRecognizer,
  ThreeWhiteSoldiersRecognizer,
  ThreeLineStrikeRecognizer,
);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Candle;

  fn c(o: f64, h: f64, l: f64, cl: f64) -> Candle {
    Candle::new(o, h, l, cl, 1000.0)
  }

  /// Ten small bars (body 1, range 2) around 100.
  fn quiet() -> Vec<Candle> {
    (0..10)
      .map(|i| if i % 2 == 0 { c(100.0, 100.5, 98.5, 99.0) } else { c(99.0, 100.5, 98.5, 100.0) })
      .collect()
  }

  fn last<R: Recognizer>(r: &R, bars: &[Candle]) -> Option<Direction> {
    let ctx = CandleContext::compute_all(bars);
    r.recognize(bars, bars.len() - 1, &ctx)
  }

  #[test]
  fn test_morning_star() {
    let mut bars = quiet();
    bars.push(c(100.0, 100.2, 96.8, 97.0)); // long black
    bars.push(c(96.0, 96.3, 95.5, 96.2)); // small star below the first body
    bars.push(c(96.5, 99.6, 96.4, 99.5)); // strong white into the first body
    assert_eq!(last(&MorningStarRecognizer::with_defaults(), &bars), Some(Direction::Bullish));
  }

  #[test]
  fn test_morning_star_needs_gap() {
    let mut bars = quiet();
    bars.push(c(100.0, 100.2, 96.8, 97.0));
    bars.push(c(97.2, 97.5, 96.9, 97.4)); // star overlaps the first body
    bars.push(c(96.5, 99.6, 96.4, 99.5));
    assert_eq!(last(&MorningStarRecognizer::with_defaults(), &bars), None);
  }

  #[test]
  fn test_evening_star() {
    let mut bars = quiet();
    bars.push(c(99.0, 102.2, 98.8, 102.0)); // long white
    bars.push(c(102.8, 103.2, 102.6, 103.0)); // star above the first body
    bars.push(c(102.5, 102.6, 99.4, 99.5)); // strong black into the first body
    assert_eq!(last(&EveningStarRecognizer::with_defaults(), &bars), Some(Direction::Bearish));
  }

  #[test]
  fn test_three_white_soldiers() {
    let mut bars = quiet();
    bars.push(c(99.0, 101.05, 98.9, 101.0));
    bars.push(c(100.5, 102.55, 100.4, 102.5));
    bars.push(c(102.0, 104.05, 101.9, 104.0));
    assert_eq!(last(&ThreeWhiteSoldiersRecognizer::with_defaults(), &bars), Some(Direction::Bullish));
  }

  #[test]
  fn test_three_white_soldiers_rejects_long_upper_shadow() {
    let mut bars = quiet();
    bars.push(c(99.0, 101.05, 98.9, 101.0));
    bars.push(c(100.5, 103.5, 100.4, 102.5));
    bars.push(c(102.0, 104.05, 101.9, 104.0));
    assert_eq!(last(&ThreeWhiteSoldiersRecognizer::with_defaults(), &bars), None);
  }

  #[test]
  fn test_three_white_soldiers_last_body_at_average_is_short() {
    let mut bars = quiet();
    bars.push(c(99.0, 100.0625, 98.9, 100.0));
    bars.push(c(99.5, 100.5625, 99.4, 100.5));
    let mut exact = bars.clone();
    exact.push(c(100.0, 101.0625, 99.9, 101.0));
    assert_eq!(last(&ThreeWhiteSoldiersRecognizer::with_defaults(), &exact), None);

    bars.push(c(100.0, 101.5625, 99.9, 101.5));
    assert_eq!(last(&ThreeWhiteSoldiersRecognizer::with_defaults(), &bars), Some(Direction::Bullish));
  }

  #[test]
  fn test_bullish_three_line_strike() {
    let mut bars = quiet();
    bars.push(c(99.0, 100.6, 98.9, 100.5));
    bars.push(c(100.3, 101.6, 100.2, 101.5));
    bars.push(c(101.3, 102.6, 101.2, 102.5));
    bars.push(c(102.8, 102.9, 98.7, 98.8));
    assert_eq!(last(&ThreeLineStrikeRecognizer::with_defaults(), &bars), Some(Direction::Bullish));
  }

  #[test]
  fn test_bearish_three_line_strike() {
    let mut bars = quiet();
    bars.push(c(101.0, 101.1, 99.4, 99.5));
    bars.push(c(99.7, 99.8, 98.4, 98.5));
    bars.push(c(98.7, 98.8, 97.4, 97.5));
    bars.push(c(97.2, 101.3, 97.1, 101.2));
    assert_eq!(last(&ThreeLineStrikeRecognizer::with_defaults(), &bars), Some(Direction::Bearish));
  }
}
