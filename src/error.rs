use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the strategy framework
#[derive(Debug, Error)]
pub enum StrategyError {
    /// A lifecycle call observed its cancellation token
    #[error("operation cancelled: {0}")]
    Cancelled(&'static str),

    #[error("replay clock cannot move backwards: {current} -> {requested}")]
    ClockRegression {
        current: DateTime<Utc>,
        requested: DateTime<Utc>,
    },

    #[error("invalid order intent for {symbol}: {reason}")]
    InvalidIntent { symbol: String, reason: String },

    #[error("replay input: {0}")]
    ReplayInput(String),

    #[error("unknown calendar: {0}")]
    UnknownCalendar(String),

    #[error("configuration: {0}")]
    Config(String),

    /// Failure reported by a strategy runtime implementation
    #[error("runtime: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StrategyError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StrategyError::Cancelled(_))
    }
}

pub type StrategyResult<T> = Result<T, StrategyError>;
