use crate::calendar::{CalendarRegistry, ExchangeCalendarService};
use crate::data::{RunMode, StrategyRuntimeContext};
use crate::error::{StrategyError, StrategyResult};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config/replay.toml";
pub const ENV_PREFIX: &str = "STRATEGY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub framework: FrameworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub mode: RunMode,
    pub account: String,
    pub symbol: String,
    #[serde(default)]
    pub model_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Empty disables session gating
    #[serde(default)]
    pub calendar_id: String,
    /// "HH:MM" or "HH:MM:SS", UTC
    #[serde(default)]
    pub session_start_utc: Option<String>,
    #[serde(default)]
    pub session_end_utc: Option<String>,
    #[serde(default = "default_interval_seconds")]
    pub scheduled_interval_seconds: u32,
    #[serde(default)]
    pub skip_closed_sessions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub input_path: String,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// "mtf_candle" or "none"
    #[serde(default = "default_alpha")]
    pub alpha: String,
    #[serde(default = "default_order_quantity")]
    pub order_quantity: Decimal,
    #[serde(default)]
    pub max_position: Option<Decimal>,
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub output: String,
    #[serde(default)]
    pub file_path: String,
}

fn default_interval_seconds() -> u32 {
    60
}

fn default_max_rows() -> usize {
    100_000
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output/replay")
}

fn default_alpha() -> String {
    "mtf_candle".to_string()
}

fn default_order_quantity() -> Decimal {
    Decimal::ONE
}

fn default_source() -> String {
    "framework".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            calendar_id: String::new(),
            session_start_utc: None,
            session_end_utc: None,
            scheduled_interval_seconds: default_interval_seconds(),
            skip_closed_sessions: false,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            max_rows: default_max_rows(),
            output_directory: default_output_directory(),
        }
    }
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            order_quantity: default_order_quantity(),
            max_position: None,
            source: default_source(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "pretty".to_string(),
            file_path: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply `STRATEGY__SECTION__KEY` overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> StrategyResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StrategyError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| StrategyError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| StrategyError::Config(e.to_string()))
    }

    /// Parse TOML text directly, without environment overrides
    pub fn from_toml_str(contents: &str) -> StrategyResult<Self> {
        toml::from_str(contents).map_err(|e| StrategyError::Config(e.to_string()))
    }

    /// Load from environment variable or default path
    pub fn load() -> StrategyResult<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(path)
    }

    /// Reject configurations the replay cannot run with
    pub fn validate(&self) -> StrategyResult<()> {
        let fail = |msg: String| Err(StrategyError::Config(msg));

        if self.general.account.trim().is_empty() {
            return fail("general.account must not be empty".into());
        }
        if self.general.symbol.trim().is_empty() {
            return fail("general.symbol must not be empty".into());
        }
        if self.session.scheduled_interval_seconds == 0 {
            return fail("session.scheduled_interval_seconds must be positive".into());
        }

        let (start, end) = self.session_times()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return fail(format!("session start {} must precede session end {}", start, end));
            }
        }

        let calendar_id = self.session.calendar_id.trim();
        if !calendar_id.is_empty()
            && CalendarRegistry::with_builtin()
                .try_get_session_window(calendar_id, Utc::now())
                .is_none()
        {
            return Err(StrategyError::UnknownCalendar(calendar_id.to_string()));
        }
        if self.session.skip_closed_sessions && calendar_id.is_empty() {
            return fail("session.skip_closed_sessions needs session.calendar_id".into());
        }

        if self.framework.order_quantity <= Decimal::ZERO {
            return fail("framework.order_quantity must be positive".into());
        }
        if let Some(max) = self.framework.max_position {
            if max < Decimal::ZERO {
                return fail("framework.max_position must not be negative".into());
            }
        }
        if !matches!(self.framework.alpha.as_str(), "mtf_candle" | "none") {
            return fail(format!("unknown framework.alpha '{}'", self.framework.alpha));
        }

        if !matches!(self.logging.output.as_str(), "pretty" | "json") {
            return fail(format!("logging.output must be 'pretty' or 'json', got '{}'", self.logging.output));
        }

        Ok(())
    }

    /// Build the context handed to every strategy callback
    pub fn runtime_context(&self, run_started_utc: DateTime<Utc>) -> StrategyResult<StrategyRuntimeContext> {
        let (session_start_utc, session_end_utc) = self.session_times()?;

        Ok(StrategyRuntimeContext {
            mode: self.general.mode,
            account: self.general.account.trim().to_string(),
            symbol: self.general.symbol.trim().to_uppercase(),
            model_code: self
                .general
                .model_code
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            run_started_utc,
            output_directory: self.replay.output_directory.clone(),
            session_start_utc,
            session_end_utc,
            scheduled_interval_seconds: self.session.scheduled_interval_seconds.max(1),
        })
    }

    fn session_times(&self) -> StrategyResult<(Option<NaiveTime>, Option<NaiveTime>)> {
        Ok((
            parse_session_time("session.session_start_utc", self.session.session_start_utc.as_deref())?,
            parse_session_time("session.session_end_utc", self.session.session_end_utc.as_deref())?,
        ))
    }
}

fn parse_session_time(key: &str, value: Option<&str>) -> StrategyResult<Option<NaiveTime>> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(Some)
        .map_err(|_| StrategyError::Config(format!("{} '{}' is not HH:MM[:SS]", key, raw)))
}
