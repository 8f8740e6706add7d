pub mod calendar;
pub mod cancel;
pub mod data;
pub mod error;
pub mod replay;
pub mod strategy;
pub mod utils;

// Re-export commonly used types
pub use calendar::{
    AlwaysOpenCalendar, CalendarRegistry, ExchangeCalendarService, ExchangeSessionWindow,
    UsEquitiesCalendar, ALWAYS_OPEN, US_EQUITIES,
};
pub use cancel::{CancelSource, CancelToken};
pub use data::{
    ReplayOrderIntent, RunMode, Side, StrategyDataSlice, StrategyRuntimeContext, TimeInForce,
};
pub use error::{StrategyError, StrategyResult};
pub use replay::{load_slices, ReplayClock, ReplayReport, ReplayRunner};
pub use strategy::{
    DeterministicEventScheduler, FrameworkSignalSource, MultiTimeframeCandleAlpha,
    NullSignalSource, NullStrategyRuntime, ReplayOrderSignalSource, ScheduledEvent,
    StrategyEventScheduler, StrategyRuntime,
};
pub use utils::Config;
