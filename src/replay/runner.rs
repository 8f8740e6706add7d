use crate::calendar::{CalendarRegistry, ExchangeCalendarService};
use crate::cancel::CancelToken;
use crate::data::{ReplayOrderIntent, StrategyDataSlice, StrategyRuntimeContext};
use crate::error::{StrategyError, StrategyResult};
use crate::replay::clock::ReplayClock;
use crate::strategy::{
    DeterministicEventScheduler, NullSignalSource, ReplayOrderSignalSource, StrategyEventScheduler,
    StrategyRuntime,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_INTENT_SOURCE: &str = "strategy";

/// Outcome of one replay run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub run_key: String,
    pub slices_processed: usize,
    pub slices_skipped: usize,
    pub events_fired: usize,
    pub intents: Vec<ReplayOrderIntent>,
    pub intents_dropped: usize,
    pub first_slice_utc: Option<DateTime<Utc>>,
    pub last_slice_utc: Option<DateTime<Utc>>,
    pub exit_code: i32,
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplayReport {
    fn new(run_key: String) -> Self {
        Self {
            run_key,
            slices_processed: 0,
            slices_skipped: 0,
            events_fired: 0,
            intents: vec![],
            intents_dropped: 0,
            first_slice_utc: None,
            last_slice_utc: None,
            exit_code: 0,
            cancelled: false,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════╗");
        println!("║         STRATEGY REPLAY RESULTS                ║");
        println!("╚════════════════════════════════════════════════╝");
        println!();
        println!("Run:               {}", self.run_key);
        println!("Slices processed:  {}", self.slices_processed);
        println!("Slices skipped:    {}", self.slices_skipped);
        println!("Events fired:      {}", self.events_fired);
        println!("Intents emitted:   {}", self.intents.len());
        println!("Intents dropped:   {}", self.intents_dropped);
        println!("Exit code:         {}", self.exit_code);
        if self.cancelled {
            println!("Run was cancelled");
        }
        if let Some(err) = &self.error {
            println!("Error:             {}", err);
        }
    }

    /// Write the report as pretty JSON into `directory`
    pub fn write_json<P: AsRef<Path>>(&self, directory: P, run_started_utc: DateTime<Utc>) -> StrategyResult<PathBuf> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        let path = directory.join(format!(
            "replay-report-{}.json",
            run_started_utc.format("%Y%m%dT%H%M%SZ")
        ));
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// Drives a `StrategyRuntime` over replayed slices
///
/// Per slice:
/// 1. Advance the replay clock
/// 2. Deliver due scheduled events
/// 3. Skip the rest if the configured session is closed
/// 4. Deliver the slice
/// 5. Collect normalized order intents from the signal source
pub struct ReplayRunner<R: StrategyRuntime> {
    runtime: R,
    signal_source: Arc<dyn ReplayOrderSignalSource>,
    scheduler: Arc<dyn StrategyEventScheduler>,
    calendar: Arc<dyn ExchangeCalendarService>,
    calendar_id: Option<String>,
    skip_closed_sessions: bool,
    next_order_id: u64,
}

impl<R: StrategyRuntime> ReplayRunner<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            signal_source: Arc::new(NullSignalSource),
            scheduler: Arc::new(DeterministicEventScheduler::new()),
            calendar: Arc::new(CalendarRegistry::with_builtin()),
            calendar_id: None,
            skip_closed_sessions: false,
            next_order_id: 0,
        }
    }

    pub fn with_signal_source<S: ReplayOrderSignalSource + 'static>(mut self, source: S) -> Self {
        self.signal_source = Arc::new(source);
        self
    }

    pub fn with_scheduler<S: StrategyEventScheduler + 'static>(mut self, scheduler: S) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    pub fn with_calendar<C: ExchangeCalendarService + 'static>(mut self, calendar: C) -> Self {
        self.calendar = Arc::new(calendar);
        self
    }

    /// Gate slices on `calendar_id` sessions when `skip_closed_sessions` is set
    pub fn with_session_filter(mut self, calendar_id: impl Into<String>, skip_closed_sessions: bool) -> Self {
        let id = calendar_id.into();
        self.calendar_id = if id.trim().is_empty() { None } else { Some(id) };
        self.skip_closed_sessions = skip_closed_sessions;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    /// Run the full lifecycle over `slices`
    ///
    /// Strategy failures and cancellation end the loop with exit code 1 and
    /// are reported in the returned `ReplayReport`. `on_shutdown` always runs,
    /// with a fresh token so a cancelled run can still clean up.
    pub async fn run(
        &mut self,
        context: &StrategyRuntimeContext,
        slices: &[StrategyDataSlice],
        cancel: &CancelToken,
    ) -> StrategyResult<ReplayReport> {
        let mut report = ReplayReport::new(context.run_key());
        self.next_order_id = 0;
        self.scheduler.reset(context);

        info!(
            "🚀 Starting strategy replay: {} slices, mode={}, account={}, symbol={}",
            slices.len(),
            context.mode,
            context.account,
            context.symbol
        );

        let outcome = match self.runtime.initialize(context, cancel).await {
            Ok(()) => self.replay_slices(context, slices, cancel, &mut report).await,
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            report.exit_code = 1;
            report.cancelled = e.is_cancelled();
            if report.cancelled {
                warn!("🛑 Replay cancelled: {}", e);
            } else {
                error!("❌ Replay failed: {}", e);
            }
            report.error = Some(e.to_string());
        }

        let shutdown_token = CancelToken::never();
        if let Err(e) = self
            .runtime
            .on_shutdown(context, report.exit_code, &shutdown_token)
            .await
        {
            warn!("Strategy shutdown failed: {}", e);
            report.exit_code = 1;
            report.error.get_or_insert_with(|| e.to_string());
        }

        info!(
            "🏁 Replay finished: processed={}, skipped={}, events={}, intents={}, exit_code={}",
            report.slices_processed,
            report.slices_skipped,
            report.events_fired,
            report.intents.len(),
            report.exit_code
        );

        Ok(report)
    }

    async fn replay_slices(
        &mut self,
        context: &StrategyRuntimeContext,
        slices: &[StrategyDataSlice],
        cancel: &CancelToken,
        report: &mut ReplayReport,
    ) -> StrategyResult<()> {
        let start = slices.first().map_or(context.run_started_utc, |s| s.timestamp_utc);
        self.resolve_calendar(start)?;

        let mut clock = ReplayClock::new(start);

        for slice in slices {
            cancel.check("replay")?;

            // 1. Time only moves forward
            let now = clock.advance_to(slice.timestamp_utc)?;
            report.first_slice_utc.get_or_insert(now);
            report.last_slice_utc = Some(now);

            // 2. Timers fire on every slice, open session or not
            for event in self.scheduler.due_events(context, now) {
                debug!("⏰ Scheduled event {} at {}", event, now);
                self.runtime
                    .on_scheduled_event(event.as_str(), context, cancel)
                    .await?;
                report.events_fired += 1;
            }

            // 3. Session gate
            if self.skip_closed_sessions && !self.session_open(now)? {
                report.slices_skipped += 1;
                debug!("Skipping slice at {} outside session", now);
                continue;
            }

            // 4. Data
            self.runtime.on_data(slice, cancel).await?;
            report.slices_processed += 1;

            // 5. Intents
            for intent in self.signal_source.replay_order_intents(slice, context) {
                match self.normalize_intent(intent) {
                    Some(intent) => report.intents.push(intent),
                    None => report.intents_dropped += 1,
                }
            }
        }

        Ok(())
    }

    /// A configured calendar must resolve, whether or not it gates slices
    fn resolve_calendar(&self, at: DateTime<Utc>) -> StrategyResult<()> {
        match self.calendar_id.as_deref() {
            Some(id) if self.calendar.try_get_session_window(id, at).is_none() => {
                Err(StrategyError::UnknownCalendar(id.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn session_open(&self, now: DateTime<Utc>) -> StrategyResult<bool> {
        let Some(calendar_id) = self.calendar_id.as_deref() else {
            return Ok(true);
        };

        self.calendar
            .try_get_session_window(calendar_id, now)
            .map(|window| window.contains(now))
            .ok_or_else(|| StrategyError::UnknownCalendar(calendar_id.to_string()))
    }

    fn normalize_intent(&mut self, mut intent: ReplayOrderIntent) -> Option<ReplayOrderIntent> {
        if intent.quantity <= Decimal::ZERO {
            debug!("Dropping non-positive intent for {}: {}", intent.symbol, intent.quantity);
            return None;
        }

        if intent.source.trim().is_empty() {
            intent.source = DEFAULT_INTENT_SOURCE.to_string();
        }

        if let Err(e) = intent.validate() {
            warn!("⚠️  Dropping order intent: {}", e);
            return None;
        }

        if intent.order_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            self.next_order_id += 1;
            intent.order_id = Some(format!("replay-{}", self.next_order_id));
        }

        Some(intent)
    }
}
