use crate::data::{StrategyDataSlice, StrategyRuntimeContext};
use crate::strategy::framework::{AlphaInsight, AlphaModel, InsightDirection};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// 30s, 1m, 5m, 15m, 1h, 1d
pub const DEFAULT_TIMEFRAMES_SECS: [i64; 6] = [30, 60, 300, 900, 3_600, 86_400];

/// Candle aggregated from mark prices inside one timeframe bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub bucket_start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub samples: u32,
}

impl Candle {
    fn start(bucket_start: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
            samples: 1,
        }
    }

    fn push(&mut self, price: Decimal) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.samples += 1;
    }

    pub fn is_bull(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bear(&self) -> bool {
        self.close < self.open
    }
}

/// Cross-timeframe agreement after the latest update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeframeAlignment {
    pub has_all_timeframes: bool,
    pub bullish_entry: bool,
    pub bearish_entry: bool,
    pub exit_long: bool,
    pub exit_short: bool,
}

#[derive(Debug, Default)]
struct SymbolCandles {
    current: HashMap<i64, Candle>,
    completed: HashMap<i64, Candle>,
    last_direction: Option<InsightDirection>,
}

/// Multi-timeframe candle alignment alpha
///
/// Algorithm:
/// 1. Fold every mark price into a running candle per timeframe
/// 2. When a bucket rolls over, its candle becomes the "completed" one
/// 3. Entry: every completed candle agrees (all bull -> Up, all bear -> Down)
/// 4. Exit: the three shortest completed candles turn against the last
///    emitted direction -> Flat
///
/// An insight is only emitted when the direction changes.
pub struct MultiTimeframeCandleAlpha {
    timeframes_secs: Vec<i64>,
    exit_timeframes: usize,
    state: DashMap<String, SymbolCandles>,
}

impl MultiTimeframeCandleAlpha {
    pub fn new(timeframes_secs: &[i64]) -> Self {
        let mut timeframes_secs: Vec<i64> = timeframes_secs.iter().map(|s| (*s).max(1)).collect();
        timeframes_secs.sort_unstable();
        timeframes_secs.dedup();

        Self {
            exit_timeframes: timeframes_secs.len().min(3),
            timeframes_secs,
            state: DashMap::new(),
        }
    }

    /// Fold one mark price and return the resulting alignment
    pub fn update_price(&self, symbol: &str, timestamp_utc: DateTime<Utc>, price: Decimal) -> TimeframeAlignment {
        if symbol.trim().is_empty() || price <= Decimal::ZERO {
            return TimeframeAlignment::default();
        }

        let mut entry = self.state.entry(symbol.trim().to_uppercase()).or_default();
        let candles = entry.value_mut();

        for &tf in &self.timeframes_secs {
            let bucket = align_to_bucket(timestamp_utc, tf);
            match candles.current.get_mut(&tf) {
                Some(current) if current.bucket_start == bucket => current.push(price),
                Some(current) => {
                    let finished = *current;
                    *current = Candle::start(bucket, price);
                    candles.completed.insert(tf, finished);
                }
                None => {
                    candles.current.insert(tf, Candle::start(bucket, price));
                }
            }
        }

        self.alignment(&candles.completed)
    }

    pub fn completed_candle(&self, symbol: &str, timeframe_secs: i64) -> Option<Candle> {
        self.state
            .get(&symbol.trim().to_uppercase())
            .and_then(|c| c.completed.get(&timeframe_secs).copied())
    }

    fn alignment(&self, completed: &HashMap<i64, Candle>) -> TimeframeAlignment {
        let candles: Option<Vec<&Candle>> = self.timeframes_secs.iter().map(|tf| completed.get(tf)).collect();
        let Some(candles) = candles else {
            return TimeframeAlignment::default();
        };
        if candles.is_empty() {
            return TimeframeAlignment::default();
        }

        let short = &candles[..self.exit_timeframes];
        TimeframeAlignment {
            has_all_timeframes: true,
            bullish_entry: candles.iter().all(|c| c.is_bull()),
            bearish_entry: candles.iter().all(|c| c.is_bear()),
            exit_long: short.iter().all(|c| c.is_bear()),
            exit_short: short.iter().all(|c| c.is_bull()),
        }
    }

    fn horizon(&self) -> Duration {
        let longest = self.timeframes_secs.last().copied().unwrap_or(60);
        Duration::seconds(longest)
    }
}

impl Default for MultiTimeframeCandleAlpha {
    fn default() -> Self {
        Self::new(&DEFAULT_TIMEFRAMES_SECS)
    }
}

impl AlphaModel for MultiTimeframeCandleAlpha {
    fn update(&self, data_slice: &StrategyDataSlice, context: &StrategyRuntimeContext) -> Vec<AlphaInsight> {
        let Some(mark) = data_slice.mark_price() else {
            return Vec::new();
        };

        let alignment = self.update_price(&context.symbol, data_slice.timestamp_utc, mark);
        if !alignment.has_all_timeframes {
            return Vec::new();
        }

        let key = context.symbol.trim().to_uppercase();
        let Some(mut candles) = self.state.get_mut(&key) else {
            return Vec::new();
        };

        let last = candles.last_direction;
        let next = if alignment.bullish_entry {
            Some(InsightDirection::Up)
        } else if alignment.bearish_entry {
            Some(InsightDirection::Down)
        } else if (last == Some(InsightDirection::Up) && alignment.exit_long)
            || (last == Some(InsightDirection::Down) && alignment.exit_short)
        {
            Some(InsightDirection::Flat)
        } else {
            None
        };

        match next {
            Some(direction) if Some(direction) != last => {
                candles.last_direction = Some(direction);
                vec![AlphaInsight {
                    timestamp_utc: data_slice.timestamp_utc,
                    symbol: context.symbol.clone(),
                    direction,
                    confidence: 1.0,
                    horizon: self.horizon(),
                    source: "mtf_candle".to_string(),
                }]
            }
            _ => Vec::new(),
        }
    }
}

fn align_to_bucket(timestamp_utc: DateTime<Utc>, bucket_secs: i64) -> DateTime<Utc> {
    let secs = timestamp_utc.timestamp();
    let aligned = secs - secs.rem_euclid(bucket_secs.max(1));
    DateTime::<Utc>::from_timestamp(aligned, 0).unwrap_or(timestamp_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RunMode, TickField, TopTick};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::path::PathBuf;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 12, 14, 0, 0).unwrap()
    }

    fn context() -> StrategyRuntimeContext {
        StrategyRuntimeContext {
            mode: RunMode::StrategyReplay,
            account: "DU123".into(),
            symbol: "SPY".into(),
            model_code: None,
            run_started_utc: t0(),
            output_directory: PathBuf::from("out"),
            session_start_utc: None,
            session_end_utc: None,
            scheduled_interval_seconds: 60,
        }
    }

    fn slice_at(ts: DateTime<Utc>, price: Decimal) -> StrategyDataSlice {
        let mut slice = StrategyDataSlice::empty(ts, RunMode::StrategyReplay);
        slice.top_ticks.push(TopTick {
            timestamp_utc: ts,
            field: TickField::Last,
            price,
            size: dec!(1),
            source: "test".into(),
        });
        slice
    }

    #[test]
    fn test_align_to_bucket() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 12, 14, 7, 42).unwrap();
        assert_eq!(align_to_bucket(ts, 300), Utc.with_ymd_and_hms(2024, 3, 12, 14, 5, 0).unwrap());
        assert_eq!(align_to_bucket(ts, 30), Utc.with_ymd_and_hms(2024, 3, 12, 14, 7, 30).unwrap());
    }

    #[test]
    fn test_candle_rolls_into_completed() {
        let alpha = MultiTimeframeCandleAlpha::new(&[60]);

        alpha.update_price("spy", t0(), dec!(100));
        alpha.update_price("spy", t0() + Duration::seconds(20), dec!(103));
        alpha.update_price("spy", t0() + Duration::seconds(40), dec!(99));
        assert!(alpha.completed_candle("SPY", 60).is_none());

        let alignment = alpha.update_price("SPY", t0() + Duration::seconds(60), dec!(101));
        let candle = alpha.completed_candle("SPY", 60).unwrap();
        assert_eq!(candle.open, dec!(100));
        assert_eq!(candle.high, dec!(103));
        assert_eq!(candle.low, dec!(99));
        assert_eq!(candle.close, dec!(99));
        assert_eq!(candle.samples, 3);
        assert!(alignment.has_all_timeframes);
        assert!(alignment.bearish_entry);
    }

    #[test]
    fn test_ignores_bad_prices() {
        let alpha = MultiTimeframeCandleAlpha::new(&[60]);
        assert_eq!(alpha.update_price("SPY", t0(), dec!(0)), TimeframeAlignment::default());
        assert_eq!(alpha.update_price("", t0(), dec!(10)), TimeframeAlignment::default());
    }

    #[test]
    fn test_emits_on_direction_change_only() {
        let alpha = MultiTimeframeCandleAlpha::new(&[30, 60]);
        let ctx = context();

        // Rising prices through two 60s buckets
        let mut insights = Vec::new();
        for (i, price) in [100, 101, 102, 103, 104, 105].iter().enumerate() {
            let ts = t0() + Duration::seconds(20 * i as i64);
            insights.extend(alpha.update(&slice_at(ts, Decimal::from(*price)), &ctx));
        }
        insights.extend(alpha.update(&slice_at(t0() + Duration::seconds(120), dec!(106)), &ctx));

        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].direction, InsightDirection::Up);
        assert_eq!(insights[0].horizon, Duration::seconds(60));

        // No new completed candle, no new insight
        let again = alpha.update(&slice_at(t0() + Duration::seconds(121), dec!(107)), &ctx);
        assert!(again.is_empty());
    }

    #[test]
    fn test_no_insight_without_mark_price() {
        let alpha = MultiTimeframeCandleAlpha::default();
        let slice = StrategyDataSlice::empty(t0(), RunMode::StrategyReplay);
        assert!(alpha.update(&slice, &context()).is_empty());
    }
}
