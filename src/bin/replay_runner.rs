use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use strategy_replay::replay::{rows_to_slices, ReplayInputRow};
use strategy_replay::strategy::{
    FixedQuantityPortfolioModel, MarketOrderExecutionModel, MaxPositionRiskModel,
};
use strategy_replay::strategy::framework::{NullAlphaModel, NullRiskManagementModel};
use strategy_replay::utils::init_from_config;
use strategy_replay::{
    load_slices, CancelSource, CancelToken, Config, FrameworkSignalSource,
    MultiTimeframeCandleAlpha, ReplayRunner, StrategyDataSlice, StrategyResult, StrategyRuntime,
    StrategyRuntimeContext,
};
use tracing::{debug, info};

/// Replay a historical dataset through the strategy lifecycle
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to $CONFIG_FILE or config/replay.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON replay dataset, overrides replay.input_path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Maximum rows to replay, overrides replay.max_rows
    #[arg(long)]
    max_rows: Option<usize>,

    /// Replay N synthetic one-minute bars instead of reading a dataset
    #[arg(long)]
    synthetic: Option<usize>,

    /// Report directory, overrides replay.output_directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Runtime that traces every lifecycle call
#[derive(Default)]
struct TracingRuntime {
    slices_seen: usize,
}

#[async_trait]
impl StrategyRuntime for TracingRuntime {
    async fn initialize(&mut self, context: &StrategyRuntimeContext, cancel: &CancelToken) -> StrategyResult<()> {
        cancel.check("initialize")?;
        info!("✅ Strategy initialized for run {}", context.run_key());
        Ok(())
    }

    async fn on_scheduled_event(
        &mut self,
        event_name: &str,
        _context: &StrategyRuntimeContext,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        cancel.check("on_scheduled_event")?;
        info!("⏰ {} (after {} slices)", event_name, self.slices_seen);
        Ok(())
    }

    async fn on_data(&mut self, data_slice: &StrategyDataSlice, cancel: &CancelToken) -> StrategyResult<()> {
        cancel.check("on_data")?;
        self.slices_seen += 1;
        debug!(
            "Slice {} at {} mark={:?}",
            self.slices_seen,
            data_slice.timestamp_utc,
            data_slice.mark_price()
        );
        Ok(())
    }

    async fn on_shutdown(
        &mut self,
        _context: &StrategyRuntimeContext,
        exit_code: i32,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        cancel.check("on_shutdown")?;
        info!("👋 Strategy shut down with exit code {}", exit_code);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // 1. Configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if let Some(input) = &args.input {
        config.replay.input_path = input.to_string_lossy().into_owned();
    }
    if let Some(max_rows) = args.max_rows {
        config.replay.max_rows = max_rows;
    }
    if let Some(output) = &args.output {
        config.replay.output_directory = output.clone();
    }
    config.validate()?;

    init_from_config(&config.logging)?;

    // 2. Data
    let slices = match args.synthetic {
        Some(bars) => {
            info!("🎲 Generating {} synthetic bars for {}", bars, config.general.symbol);
            rows_to_slices(generate_synthetic_rows(&config.general.symbol, bars)?, config.replay.max_rows)?
        }
        None => load_slices(&config.replay.input_path, config.replay.max_rows)?,
    };

    let run_started = slices.first().map(|s| s.timestamp_utc).unwrap_or_else(Utc::now);
    let context = config.runtime_context(run_started)?;

    // 3. Strategy wiring
    let execution = MarketOrderExecutionModel::new(config.framework.source.clone());
    let portfolio = FixedQuantityPortfolioModel::new(config.framework.order_quantity);
    let signals = match (config.framework.alpha.as_str(), config.framework.max_position) {
        ("none", Some(max)) => FrameworkSignalSource::new(NullAlphaModel, portfolio, MaxPositionRiskModel::new(max), execution),
        ("none", None) => FrameworkSignalSource::new(NullAlphaModel, portfolio, NullRiskManagementModel, execution),
        (_, Some(max)) => FrameworkSignalSource::new(
            MultiTimeframeCandleAlpha::default(),
            portfolio,
            MaxPositionRiskModel::new(max),
            execution,
        ),
        (_, None) => FrameworkSignalSource::new(
            MultiTimeframeCandleAlpha::default(),
            portfolio,
            NullRiskManagementModel,
            execution,
        ),
    };

    let mut runner = ReplayRunner::new(TracingRuntime::default())
        .with_signal_source(signals)
        .with_session_filter(config.session.calendar_id.clone(), config.session.skip_closed_sessions);

    // 4. Ctrl-C cancels the run; shutdown still executes
    let cancel = Arc::new(CancelSource::new());
    let token = cancel.token();
    let on_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received, cancelling replay");
            on_signal.cancel();
        }
    });

    let report = runner.run(&context, &slices, &token).await?;

    // 5. Results
    report.print_summary();
    let path = report.write_json(&context.output_directory, context.run_started_utc)?;
    println!("Results saved to: {}", path.display());

    std::process::exit(report.exit_code);
}

/// Random-walk one-minute bars starting at a US equities open
fn generate_synthetic_rows(symbol: &str, bars: usize) -> anyhow::Result<Vec<ReplayInputRow>> {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    let mut timestamp: DateTime<Utc> = Utc
        .with_ymd_and_hms(2024, 3, 11, 13, 30, 0)
        .single()
        .context("invalid synthetic start")?;
    let mut price = Decimal::from(500);
    let mut rows = Vec::with_capacity(bars);

    for _ in 0..bars {
        let open = price;
        let change = Decimal::from(rng.gen_range(-50i64..=50)) / Decimal::from(100);
        let close = (open + change).max(Decimal::ONE);
        let wick = Decimal::from(rng.gen_range(0i64..=20)) / Decimal::from(100);

        rows.push(ReplayInputRow {
            timestamp_utc: Some(timestamp),
            symbol: symbol.to_string(),
            open,
            high: open.max(close) + wick,
            low: (open.min(close) - wick).max(Decimal::ONE),
            close,
            volume: Decimal::from(rng.gen_range(100i64..5_000)),
        });

        price = close;
        timestamp += Duration::minutes(1);
    }

    Ok(rows)
}
