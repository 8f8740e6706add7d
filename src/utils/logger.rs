use crate::error::{StrategyError, StrategyResult};
use crate::utils::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system
///
/// `RUST_LOG` wins over `level` when set. Fails if the log file cannot be
/// opened or a global subscriber is already installed.
pub fn init_logger(level: &str, json_output: bool, log_file: Option<&Path>) -> StrategyResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let file = log_file.map(open_log_file).transpose()?;

    let result = match (json_output, file) {
        // JSON formatting for machine-readable replay logs
        (true, Some(file)) => registry.with(fmt::layer().json().with_writer(Mutex::new(file))).try_init(),
        (true, None) => registry.with(fmt::layer().json()).try_init(),
        // Pretty formatting for development
        (false, Some(file)) => registry
            .with(fmt::layer().pretty().with_ansi(false).with_writer(Mutex::new(file)))
            .try_init(),
        (false, None) => registry.with(fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| StrategyError::Config(format!("logger: {}", e)))
}

fn open_log_file(path: &Path) -> StrategyResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Initialize logger from config
pub fn init_from_config(config: &LoggingConfig) -> StrategyResult<()> {
    let json = config.output == "json";
    let log_file = if !config.file_path.is_empty() {
        Some(Path::new(&config.file_path))
    } else {
        None
    };

    init_logger(&config.level, json, log_file)
}
