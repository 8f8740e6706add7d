use crate::data::{ReplayOrderIntent, Side, StrategyDataSlice, StrategyRuntimeContext};
use crate::strategy::ReplayOrderSignalSource;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Expected price direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightDirection {
    Up,
    Down,
    Flat,
}

/// Alpha model output: a directional view on one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaInsight {
    pub timestamp_utc: DateTime<Utc>,
    pub symbol: String,
    pub direction: InsightDirection,
    pub confidence: f64,
    pub horizon: Duration,
    pub source: String,
}

/// Desired signed position for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTarget {
    pub timestamp_utc: DateTime<Utc>,
    pub symbol: String,
    pub target_quantity: Decimal,
    pub source: String,
}

/// Position state the pipeline believes it holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp_utc: DateTime<Utc>,
    pub symbol: String,
    pub position_quantity: Decimal,
    pub mark_price: Option<Decimal>,
}

pub trait AlphaModel: Send + Sync {
    fn update(&self, data_slice: &StrategyDataSlice, context: &StrategyRuntimeContext) -> Vec<AlphaInsight>;
}

pub trait PortfolioConstructionModel: Send + Sync {
    fn create_targets(
        &self,
        insights: &[AlphaInsight],
        portfolio: &PortfolioSnapshot,
        context: &StrategyRuntimeContext,
    ) -> Vec<PortfolioTarget>;
}

pub trait RiskManagementModel: Send + Sync {
    fn apply(
        &self,
        targets: Vec<PortfolioTarget>,
        portfolio: &PortfolioSnapshot,
        context: &StrategyRuntimeContext,
    ) -> Vec<PortfolioTarget>;
}

pub trait ExecutionModel: Send + Sync {
    fn execute(
        &self,
        targets: &[PortfolioTarget],
        portfolio: &PortfolioSnapshot,
        context: &StrategyRuntimeContext,
        data_slice: &StrategyDataSlice,
    ) -> Vec<ReplayOrderIntent>;
}

#[derive(Debug, Default, Clone)]
pub struct NullAlphaModel;

impl AlphaModel for NullAlphaModel {
    fn update(&self, _: &StrategyDataSlice, _: &StrategyRuntimeContext) -> Vec<AlphaInsight> {
        Vec::new()
    }
}

#[derive(Debug, Default, Clone)]
pub struct NullPortfolioConstructionModel;

impl PortfolioConstructionModel for NullPortfolioConstructionModel {
    fn create_targets(&self, _: &[AlphaInsight], _: &PortfolioSnapshot, _: &StrategyRuntimeContext) -> Vec<PortfolioTarget> {
        Vec::new()
    }
}

/// Passes targets through untouched
#[derive(Debug, Default, Clone)]
pub struct NullRiskManagementModel;

impl RiskManagementModel for NullRiskManagementModel {
    fn apply(&self, targets: Vec<PortfolioTarget>, _: &PortfolioSnapshot, _: &StrategyRuntimeContext) -> Vec<PortfolioTarget> {
        targets
    }
}

#[derive(Debug, Default, Clone)]
pub struct NullExecutionModel;

impl ExecutionModel for NullExecutionModel {
    fn execute(
        &self,
        _: &[PortfolioTarget],
        _: &PortfolioSnapshot,
        _: &StrategyRuntimeContext,
        _: &StrategyDataSlice,
    ) -> Vec<ReplayOrderIntent> {
        Vec::new()
    }
}

/// Up -> +quantity, Down -> -quantity, Flat -> 0
///
/// When several insights name the same symbol the last one wins.
#[derive(Debug, Clone)]
pub struct FixedQuantityPortfolioModel {
    quantity: Decimal,
}

impl FixedQuantityPortfolioModel {
    pub fn new(quantity: Decimal) -> Self {
        Self { quantity: quantity.abs() }
    }
}

impl PortfolioConstructionModel for FixedQuantityPortfolioModel {
    fn create_targets(
        &self,
        insights: &[AlphaInsight],
        _portfolio: &PortfolioSnapshot,
        _context: &StrategyRuntimeContext,
    ) -> Vec<PortfolioTarget> {
        let mut targets: Vec<PortfolioTarget> = Vec::new();

        for insight in insights {
            let target_quantity = match insight.direction {
                InsightDirection::Up => self.quantity,
                InsightDirection::Down => -self.quantity,
                InsightDirection::Flat => Decimal::ZERO,
            };

            let target = PortfolioTarget {
                timestamp_utc: insight.timestamp_utc,
                symbol: insight.symbol.clone(),
                target_quantity,
                source: insight.source.clone(),
            };

            match targets.iter_mut().find(|t| t.symbol.eq_ignore_ascii_case(&insight.symbol)) {
                Some(existing) => *existing = target,
                None => targets.push(target),
            }
        }

        targets
    }
}

/// Clamps every target to `[-max_abs_quantity, max_abs_quantity]`
#[derive(Debug, Clone)]
pub struct MaxPositionRiskModel {
    max_abs_quantity: Decimal,
}

impl MaxPositionRiskModel {
    pub fn new(max_abs_quantity: Decimal) -> Self {
        Self { max_abs_quantity: max_abs_quantity.abs() }
    }
}

impl RiskManagementModel for MaxPositionRiskModel {
    fn apply(
        &self,
        targets: Vec<PortfolioTarget>,
        _portfolio: &PortfolioSnapshot,
        _context: &StrategyRuntimeContext,
    ) -> Vec<PortfolioTarget> {
        targets
            .into_iter()
            .map(|mut t| {
                let clamped = t.target_quantity.clamp(-self.max_abs_quantity, self.max_abs_quantity);
                if clamped != t.target_quantity {
                    debug!(symbol = %t.symbol, requested = %t.target_quantity, %clamped, "target clamped");
                    t.target_quantity = clamped;
                }
                t
            })
            .collect()
    }
}

/// Market order for the gap between target and current position
///
/// Only targets for the portfolio's own symbol are executable; zero
/// deltas produce nothing.
#[derive(Debug, Clone)]
pub struct MarketOrderExecutionModel {
    source: String,
}

impl MarketOrderExecutionModel {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}

impl ExecutionModel for MarketOrderExecutionModel {
    fn execute(
        &self,
        targets: &[PortfolioTarget],
        portfolio: &PortfolioSnapshot,
        _context: &StrategyRuntimeContext,
        data_slice: &StrategyDataSlice,
    ) -> Vec<ReplayOrderIntent> {
        targets
            .iter()
            .filter(|t| {
                let ours = t.symbol.eq_ignore_ascii_case(&portfolio.symbol);
                if !ours {
                    debug!(symbol = %t.symbol, portfolio = %portfolio.symbol, "target outside portfolio skipped");
                }
                ours
            })
            .filter_map(|t| {
                let delta = t.target_quantity - portfolio.position_quantity;
                let side = Side::from_delta(delta)?;
                Some(ReplayOrderIntent::market(
                    data_slice.timestamp_utc,
                    portfolio.symbol.clone(),
                    side,
                    delta.abs(),
                    self.source.clone(),
                ))
            })
            .collect()
    }
}

/// Alpha -> portfolio construction -> risk -> execution
///
/// Position truth comes from the slice's position rows when present.
/// Between reports the pipeline assumes its own intents were filled, so a
/// target is not re-ordered on every slice.
pub struct FrameworkSignalSource {
    alpha: Box<dyn AlphaModel>,
    portfolio_construction: Box<dyn PortfolioConstructionModel>,
    risk: Box<dyn RiskManagementModel>,
    execution: Box<dyn ExecutionModel>,
    working_positions: Mutex<HashMap<String, Decimal>>,
}

impl FrameworkSignalSource {
    pub fn new(
        alpha: impl AlphaModel + 'static,
        portfolio_construction: impl PortfolioConstructionModel + 'static,
        risk: impl RiskManagementModel + 'static,
        execution: impl ExecutionModel + 'static,
    ) -> Self {
        Self {
            alpha: Box::new(alpha),
            portfolio_construction: Box::new(portfolio_construction),
            risk: Box::new(risk),
            execution: Box::new(execution),
            working_positions: Mutex::new(HashMap::new()),
        }
    }

    /// Pipeline where every stage is a null model
    pub fn null() -> Self {
        Self::new(
            NullAlphaModel,
            NullPortfolioConstructionModel,
            NullRiskManagementModel,
            NullExecutionModel,
        )
    }

    /// Position the pipeline currently assumes for `symbol`
    pub fn working_position(&self, symbol: &str) -> Decimal {
        let positions = self.working_positions.lock().unwrap_or_else(|e| e.into_inner());
        positions.get(&symbol.to_uppercase()).copied().unwrap_or(Decimal::ZERO)
    }

    fn snapshot(&self, data_slice: &StrategyDataSlice, context: &StrategyRuntimeContext) -> PortfolioSnapshot {
        let key = context.symbol.to_uppercase();
        let mut positions = self.working_positions.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(reported) = data_slice.position_quantity(&context.symbol) {
            positions.insert(key.clone(), reported);
        }

        PortfolioSnapshot {
            timestamp_utc: data_slice.timestamp_utc,
            symbol: context.symbol.clone(),
            position_quantity: positions.get(&key).copied().unwrap_or(Decimal::ZERO),
            mark_price: data_slice.mark_price(),
        }
    }

    fn assume_filled(&self, intents: &[ReplayOrderIntent]) {
        let mut positions = self.working_positions.lock().unwrap_or_else(|e| e.into_inner());
        for intent in intents {
            let signed = match intent.side {
                Side::Buy => intent.quantity,
                Side::Sell => -intent.quantity,
            };
            *positions.entry(intent.symbol.to_uppercase()).or_insert(Decimal::ZERO) += signed;
        }
    }
}

impl ReplayOrderSignalSource for FrameworkSignalSource {
    fn replay_order_intents(
        &self,
        data_slice: &StrategyDataSlice,
        context: &StrategyRuntimeContext,
    ) -> Vec<ReplayOrderIntent> {
        let portfolio = self.snapshot(data_slice, context);

        let insights = self.alpha.update(data_slice, context);
        if insights.is_empty() {
            return Vec::new();
        }

        let targets = self.portfolio_construction.create_targets(&insights, &portfolio, context);
        let targets = self.risk.apply(targets, &portfolio, context);
        let intents = self.execution.execute(&targets, &portfolio, context, data_slice);

        debug!(
            insights = insights.len(),
            targets = targets.len(),
            intents = intents.len(),
            position = %portfolio.position_quantity,
            "framework pipeline evaluated"
        );

        self.assume_filled(&intents);
        intents
    }
}
