use crate::data::StrategyRuntimeContext;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named timer delivered through `StrategyRuntime::on_scheduled_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledEvent {
    Interval,
    BeforeOpen,
    AfterClose,
}

impl ScheduledEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledEvent::Interval => "interval",
            ScheduledEvent::BeforeOpen => "before_open",
            ScheduledEvent::AfterClose => "after_close",
        }
    }
}

impl fmt::Display for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait StrategyEventScheduler: Send + Sync {
    /// Events due at `now`, in delivery order
    fn due_events(&self, context: &StrategyRuntimeContext, now: DateTime<Utc>) -> Vec<ScheduledEvent>;

    /// Forget all state for one run so it can be replayed from the start
    fn reset(&self, _context: &StrategyRuntimeContext) {}
}

/// Scheduler driven purely by the supplied instants
///
/// State is keyed by run key, so one scheduler can serve several runs.
/// Replaying the same instants always yields the same events.
#[derive(Debug, Default)]
pub struct DeterministicEventScheduler {
    last_interval_slot: DashMap<String, i64>,
    fired_once: DashSet<(String, ScheduledEvent)>,
}

impl DeterministicEventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn interval_due(&self, key: &str, context: &StrategyRuntimeContext, now: DateTime<Utc>) -> bool {
        let elapsed = (now - context.run_started_utc).num_seconds().max(0);
        let slot = elapsed / i64::from(context.scheduled_interval_seconds.max(1));

        let mut last = self.last_interval_slot.entry(key.to_string()).or_insert(-1);
        if slot > *last {
            *last = slot;
            true
        } else {
            false
        }
    }

    fn once(&self, key: &str, event: ScheduledEvent) -> bool {
        self.fired_once.insert((key.to_string(), event))
    }
}

impl StrategyEventScheduler for DeterministicEventScheduler {
    fn due_events(&self, context: &StrategyRuntimeContext, now: DateTime<Utc>) -> Vec<ScheduledEvent> {
        let key = context.run_key();
        let time_of_day = now.time();
        let mut events = Vec::new();

        if self.interval_due(&key, context, now) {
            events.push(ScheduledEvent::Interval);
        }

        if let Some(start) = context.session_start_utc {
            if time_of_day < start && self.once(&key, ScheduledEvent::BeforeOpen) {
                events.push(ScheduledEvent::BeforeOpen);
            }
        }

        if let Some(end) = context.session_end_utc {
            if time_of_day >= end && self.once(&key, ScheduledEvent::AfterClose) {
                events.push(ScheduledEvent::AfterClose);
            }
        }

        events
    }

    fn reset(&self, context: &StrategyRuntimeContext) {
        let key = context.run_key();
        self.last_interval_slot.remove(&key);
        self.fired_once.retain(|(run, _)| run != &key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RunMode;
    use chrono::{Duration, NaiveTime, TimeZone};
    use std::path::PathBuf;

    fn context(interval: u32) -> StrategyRuntimeContext {
        StrategyRuntimeContext {
            mode: RunMode::StrategyReplay,
            account: "DU123".into(),
            symbol: "SPY".into(),
            model_code: None,
            run_started_utc: Utc.with_ymd_and_hms(2024, 3, 12, 13, 0, 0).unwrap(),
            output_directory: PathBuf::from("out"),
            session_start_utc: NaiveTime::from_hms_opt(13, 30, 0),
            session_end_utc: NaiveTime::from_hms_opt(20, 0, 0),
            scheduled_interval_seconds: interval,
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ScheduledEvent::Interval.as_str(), "interval");
        assert_eq!(ScheduledEvent::BeforeOpen.to_string(), "before_open");
        assert_eq!(ScheduledEvent::AfterClose.as_str(), "after_close");
    }

    #[test]
    fn test_first_call_fires_interval_and_before_open() {
        let scheduler = DeterministicEventScheduler::new();
        let ctx = context(60);

        let events = scheduler.due_events(&ctx, ctx.run_started_utc);
        assert_eq!(events, vec![ScheduledEvent::Interval, ScheduledEvent::BeforeOpen]);

        // Same slot, before_open already fired
        let events = scheduler.due_events(&ctx, ctx.run_started_utc + Duration::seconds(30));
        assert!(events.is_empty());
    }

    #[test]
    fn test_interval_fires_once_per_slot() {
        let scheduler = DeterministicEventScheduler::new();
        let mut ctx = context(60);
        ctx.session_start_utc = None;
        ctx.session_end_utc = None;

        let fired: usize = (0..300)
            .step_by(15)
            .map(|s| scheduler.due_events(&ctx, ctx.run_started_utc + Duration::seconds(s)).len())
            .sum();
        assert_eq!(fired, 5);
    }

    #[test]
    fn test_instants_before_run_start_map_to_slot_zero() {
        let scheduler = DeterministicEventScheduler::new();
        let mut ctx = context(60);
        ctx.session_start_utc = None;

        let early = ctx.run_started_utc - Duration::minutes(10);
        assert_eq!(scheduler.due_events(&ctx, early), vec![ScheduledEvent::Interval]);
        assert!(scheduler.due_events(&ctx, ctx.run_started_utc).is_empty());
    }

    #[test]
    fn test_after_close_fires_once() {
        let scheduler = DeterministicEventScheduler::new();
        let ctx = context(3_600);
        let close = Utc.with_ymd_and_hms(2024, 3, 12, 20, 0, 0).unwrap();

        let events = scheduler.due_events(&ctx, close);
        assert_eq!(events, vec![ScheduledEvent::Interval, ScheduledEvent::AfterClose]);

        let later = scheduler.due_events(&ctx, close + Duration::minutes(5));
        assert!(later.is_empty());
    }

    #[test]
    fn test_zero_interval_treated_as_one_second() {
        let scheduler = DeterministicEventScheduler::new();
        let mut ctx = context(0);
        ctx.session_start_utc = None;

        assert_eq!(scheduler.due_events(&ctx, ctx.run_started_utc).len(), 1);
        assert_eq!(scheduler.due_events(&ctx, ctx.run_started_utc + Duration::seconds(1)).len(), 1);
    }

    #[test]
    fn test_runs_are_isolated_and_reset() {
        let scheduler = DeterministicEventScheduler::new();
        let ctx = context(60);
        let mut other = context(60);
        other.account = "DU999".into();

        assert_eq!(scheduler.due_events(&ctx, ctx.run_started_utc).len(), 2);
        assert_eq!(scheduler.due_events(&other, other.run_started_utc).len(), 2);

        scheduler.reset(&ctx);
        assert_eq!(scheduler.due_events(&ctx, ctx.run_started_utc).len(), 2);
        assert!(scheduler.due_events(&other, other.run_started_utc).is_empty());
    }
}
