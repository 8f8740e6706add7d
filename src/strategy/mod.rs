pub mod candle_alpha;
pub mod framework;
pub mod runtime;
pub mod scheduler;
pub mod signal_source;

pub use candle_alpha::{Candle, MultiTimeframeCandleAlpha, TimeframeAlignment};
pub use framework::{
    AlphaInsight, AlphaModel, ExecutionModel, FixedQuantityPortfolioModel, FrameworkSignalSource,
    InsightDirection, MarketOrderExecutionModel, MaxPositionRiskModel, PortfolioConstructionModel,
    PortfolioSnapshot, PortfolioTarget, RiskManagementModel,
};
pub use runtime::{NullStrategyRuntime, StrategyRuntime};
pub use scheduler::{DeterministicEventScheduler, ScheduledEvent, StrategyEventScheduler};
pub use signal_source::{CompositeSignalSource, NullSignalSource, ReplayOrderSignalSource};
