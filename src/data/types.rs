use crate::error::{StrategyError, StrategyResult};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Side that moves a position by a signed quantity delta
    pub fn from_delta(delta: Decimal) -> Option<Self> {
        if delta > Decimal::ZERO {
            Some(Side::Buy)
        } else if delta < Decimal::ZERO {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn requires_limit_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Day,
    Gtc,
    Ioc,
}

/// Where a run is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    Paper,
    #[default]
    StrategyReplay,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::Live => "live",
            RunMode::Paper => "paper",
            RunMode::StrategyReplay => "strategy_replay",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickField {
    Bid,
    Ask,
    Last,
    Volume,
}

/// Top-of-book tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTick {
    pub timestamp_utc: DateTime<Utc>,
    pub field: TickField,
    pub price: Decimal,
    pub size: Decimal,
    pub source: String,
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub timestamp_utc: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRow {
    pub account: String,
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummaryRow {
    pub account: String,
    pub tag: String,
    pub value: String,
    pub currency: String,
}

/// Broker-neutral order lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub timestamp_utc: DateTime<Utc>,
    pub event_type: String,
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub status: String,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub avg_fill_price: Decimal,
    pub account: String,
    pub reason: String,
}

/// Everything a strategy sees at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDataSlice {
    pub timestamp_utc: DateTime<Utc>,
    pub mode: RunMode,
    #[serde(default)]
    pub top_ticks: Vec<TopTick>,
    #[serde(default)]
    pub historical_bars: Vec<HistoricalBar>,
    #[serde(default)]
    pub positions: Vec<PositionRow>,
    #[serde(default)]
    pub account_summary: Vec<AccountSummaryRow>,
    #[serde(default)]
    pub order_events: Vec<OrderEvent>,
}

impl StrategyDataSlice {
    pub fn empty(timestamp_utc: DateTime<Utc>, mode: RunMode) -> Self {
        Self {
            timestamp_utc,
            mode,
            top_ticks: vec![],
            historical_bars: vec![],
            positions: vec![],
            account_summary: vec![],
            order_events: vec![],
        }
    }

    /// Best available mark price
    ///
    /// Preference: last trade, then bid/ask mid, then the close of the last bar.
    pub fn mark_price(&self) -> Option<Decimal> {
        if let Some(last) = self.last_tick_price(TickField::Last) {
            return Some(last);
        }

        if let (Some(bid), Some(ask)) = (
            self.last_tick_price(TickField::Bid),
            self.last_tick_price(TickField::Ask),
        ) {
            return Some((bid + ask) / Decimal::TWO);
        }

        self.historical_bars.last().map(|bar| bar.close)
    }

    fn last_tick_price(&self, field: TickField) -> Option<Decimal> {
        self.top_ticks
            .iter()
            .rev()
            .filter(|t| t.field == field)
            .map(|t| t.price)
            .find(|p| *p > Decimal::ZERO)
    }

    /// Net position quantity reported for `symbol` (case-insensitive)
    pub fn position_quantity(&self, symbol: &str) -> Option<Decimal> {
        let mut found = None;
        for row in self.positions.iter().filter(|p| p.symbol.eq_ignore_ascii_case(symbol)) {
            *found.get_or_insert(Decimal::ZERO) += row.quantity;
        }
        found
    }
}

/// Ambient state handed to every lifecycle callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRuntimeContext {
    pub mode: RunMode,
    pub account: String,
    pub symbol: String,
    pub model_code: Option<String>,
    pub run_started_utc: DateTime<Utc>,
    pub output_directory: PathBuf,
    pub session_start_utc: Option<NaiveTime>,
    pub session_end_utc: Option<NaiveTime>,
    pub scheduled_interval_seconds: u32,
}

impl StrategyRuntimeContext {
    /// Stable identity of one run, used to key per-run scheduler state
    pub fn run_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.run_started_utc.to_rfc3339(),
            self.mode,
            self.account,
            self.symbol
        )
    }
}

/// A proposed trading action produced from replayed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOrderIntent {
    pub timestamp_utc: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    pub expire_at_utc: Option<DateTime<Utc>>,
    pub source: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub parent_order_id: Option<String>,
    #[serde(default)]
    pub oco_group: Option<String>,
}

impl ReplayOrderIntent {
    pub fn market(
        timestamp_utc: DateTime<Utc>,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_utc,
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Day,
            expire_at_utc: None,
            source: source.into(),
            order_id: None,
            parent_order_id: None,
            oco_group: None,
        }
    }

    pub fn limit(
        timestamp_utc: DateTime<Utc>,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        limit_price: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(timestamp_utc, symbol, side, quantity, source)
        }
    }

    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self.order_type = match self.order_type {
            OrderType::Limit | OrderType::StopLimit => OrderType::StopLimit,
            OrderType::Market | OrderType::Stop => OrderType::Stop,
        };
        self
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    pub fn with_expiry(mut self, expire_at_utc: DateTime<Utc>) -> Self {
        self.expire_at_utc = Some(expire_at_utc);
        self
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_parent(mut self, parent_order_id: impl Into<String>) -> Self {
        self.parent_order_id = Some(parent_order_id.into());
        self
    }

    pub fn with_oco_group(mut self, oco_group: impl Into<String>) -> Self {
        self.oco_group = Some(oco_group.into());
        self
    }

    /// Check the intent is internally consistent
    pub fn validate(&self) -> StrategyResult<()> {
        let reject = |reason: String| StrategyError::InvalidIntent {
            symbol: self.symbol.clone(),
            reason,
        };

        if self.symbol.trim().is_empty() {
            return Err(reject("symbol is empty".into()));
        }

        if self.quantity <= Decimal::ZERO {
            return Err(reject(format!("quantity {} must be positive", self.quantity)));
        }

        if self.order_type.requires_limit_price() {
            match self.limit_price {
                Some(price) if price > Decimal::ZERO => {}
                other => {
                    return Err(reject(format!(
                        "{:?} order needs a positive limit price, got {:?}",
                        self.order_type, other
                    )))
                }
            }
        }

        if self.order_type.requires_stop_price() {
            match self.stop_price {
                Some(price) if price > Decimal::ZERO => {}
                other => {
                    return Err(reject(format!(
                        "{:?} order needs a positive stop price, got {:?}",
                        self.order_type, other
                    )))
                }
            }
        }

        if let Some(expiry) = self.expire_at_utc {
            if expiry < self.timestamp_utc {
                return Err(reject(format!(
                    "expiry {} precedes intent timestamp {}",
                    expiry, self.timestamp_utc
                )));
            }
        }

        Ok(())
    }

    /// Whether an order submitted at `submitted_at` is dead by `now`
    ///
    /// An explicit expiry always wins. Otherwise GTC lives forever and
    /// DAY/IOC orders die once the UTC date rolls over.
    pub fn is_expired(&self, submitted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if let Some(expiry) = self.expire_at_utc {
            if expiry <= now {
                return true;
            }
        }

        match self.time_in_force {
            TimeInForce::Gtc => false,
            TimeInForce::Day | TimeInForce::Ioc => submitted_at.date_naive() < now.date_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 12, h, m, 0).unwrap()
    }

    fn tick(field: TickField, price: Decimal) -> TopTick {
        TopTick {
            timestamp_utc: ts(15, 0),
            field,
            price,
            size: dec!(100),
            source: "test".into(),
        }
    }

    fn bar(close: Decimal) -> HistoricalBar {
        HistoricalBar {
            timestamp_utc: ts(15, 0),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
        }
    }

    #[test]
    fn test_mark_price_prefers_last_trade() {
        let mut slice = StrategyDataSlice::empty(ts(15, 0), RunMode::StrategyReplay);
        slice.top_ticks = vec![
            tick(TickField::Bid, dec!(99)),
            tick(TickField::Ask, dec!(101)),
            tick(TickField::Last, dec!(100.5)),
        ];
        slice.historical_bars = vec![bar(dec!(98))];

        assert_eq!(slice.mark_price(), Some(dec!(100.5)));
    }

    #[test]
    fn test_mark_price_falls_back_to_mid_then_bar() {
        let mut slice = StrategyDataSlice::empty(ts(15, 0), RunMode::StrategyReplay);
        slice.top_ticks = vec![
            tick(TickField::Bid, dec!(99)),
            tick(TickField::Ask, dec!(101)),
            tick(TickField::Last, dec!(0)),
        ];
        assert_eq!(slice.mark_price(), Some(dec!(100)));

        slice.top_ticks = vec![tick(TickField::Bid, dec!(99))];
        slice.historical_bars = vec![bar(dec!(97)), bar(dec!(98))];
        assert_eq!(slice.mark_price(), Some(dec!(98)));

        slice.historical_bars.clear();
        assert_eq!(slice.mark_price(), None);
    }

    #[test]
    fn test_position_quantity_sums_rows() {
        let mut slice = StrategyDataSlice::empty(ts(15, 0), RunMode::Paper);
        assert_eq!(slice.position_quantity("SPY"), None);

        slice.positions = vec![
            PositionRow { account: "A".into(), symbol: "spy".into(), quantity: dec!(10), average_cost: dec!(500) },
            PositionRow { account: "B".into(), symbol: "SPY".into(), quantity: dec!(-4), average_cost: dec!(501) },
            PositionRow { account: "A".into(), symbol: "QQQ".into(), quantity: dec!(7), average_cost: dec!(400) },
        ];
        assert_eq!(slice.position_quantity("SPY"), Some(dec!(6)));
    }

    #[test]
    fn test_run_key_is_stable() {
        let ctx = StrategyRuntimeContext {
            mode: RunMode::StrategyReplay,
            account: "DU123".into(),
            symbol: "SPY".into(),
            model_code: None,
            run_started_utc: ts(13, 30),
            output_directory: PathBuf::from("out"),
            session_start_utc: None,
            session_end_utc: None,
            scheduled_interval_seconds: 60,
        };

        assert_eq!(ctx.run_key(), "2024-03-12T13:30:00+00:00|strategy_replay|DU123|SPY");
        assert_eq!(ctx.run_key(), ctx.clone().run_key());
    }

    #[test]
    fn test_intent_validation() {
        let market = ReplayOrderIntent::market(ts(15, 0), "SPY", Side::Buy, dec!(10), "test");
        assert!(market.validate().is_ok());

        let zero = ReplayOrderIntent::market(ts(15, 0), "SPY", Side::Buy, dec!(0), "test");
        assert!(zero.validate().is_err());

        let mut limit = ReplayOrderIntent::limit(ts(15, 0), "SPY", Side::Sell, dec!(5), dec!(500), "test");
        assert!(limit.validate().is_ok());
        limit.limit_price = None;
        assert!(limit.validate().is_err());

        let stop = ReplayOrderIntent::market(ts(15, 0), "SPY", Side::Sell, dec!(5), "test")
            .with_stop_price(dec!(490));
        assert_eq!(stop.order_type, OrderType::Stop);
        assert!(stop.validate().is_ok());

        let stop_limit = ReplayOrderIntent::limit(ts(15, 0), "SPY", Side::Sell, dec!(5), dec!(489), "test")
            .with_stop_price(dec!(490));
        assert_eq!(stop_limit.order_type, OrderType::StopLimit);

        let stale = market.clone().with_expiry(ts(14, 0));
        assert!(stale.validate().is_err());
    }

    #[test]
    fn test_intent_expiry() {
        let submitted = ts(15, 0);
        let next_day = submitted + chrono::Duration::days(1);

        let day = ReplayOrderIntent::market(submitted, "SPY", Side::Buy, dec!(1), "test");
        assert!(!day.is_expired(submitted, ts(20, 0)));
        assert!(day.is_expired(submitted, next_day));

        let gtc = day.clone().with_time_in_force(TimeInForce::Gtc);
        assert!(!gtc.is_expired(submitted, next_day));

        let gtd = gtc.with_expiry(ts(16, 0));
        assert!(!gtd.is_expired(submitted, ts(15, 59)));
        assert!(gtd.is_expired(submitted, ts(16, 0)));
    }

    #[test]
    fn test_intent_json_shape() {
        let intent = ReplayOrderIntent::market(ts(15, 0), "SPY", Side::Buy, dec!(10), "test");
        let json = serde_json::to_value(&intent).unwrap();

        assert_eq!(json["side"], "BUY");
        assert_eq!(json["order_type"], "MARKET");
        assert_eq!(json["time_in_force"], "DAY");
    }
}
