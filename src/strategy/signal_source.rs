use crate::data::{ReplayOrderIntent, StrategyDataSlice, StrategyRuntimeContext};
use std::sync::Arc;

/// Turns a data slice into the order intents it implies
///
/// Implementations always return a collection; "no signal" is an empty `Vec`.
pub trait ReplayOrderSignalSource: Send + Sync {
    fn replay_order_intents(
        &self,
        data_slice: &StrategyDataSlice,
        context: &StrategyRuntimeContext,
    ) -> Vec<ReplayOrderIntent>;
}

impl<T: ReplayOrderSignalSource + ?Sized> ReplayOrderSignalSource for Arc<T> {
    fn replay_order_intents(
        &self,
        data_slice: &StrategyDataSlice,
        context: &StrategyRuntimeContext,
    ) -> Vec<ReplayOrderIntent> {
        (**self).replay_order_intents(data_slice, context)
    }
}

impl<T: ReplayOrderSignalSource + ?Sized> ReplayOrderSignalSource for Box<T> {
    fn replay_order_intents(
        &self,
        data_slice: &StrategyDataSlice,
        context: &StrategyRuntimeContext,
    ) -> Vec<ReplayOrderIntent> {
        (**self).replay_order_intents(data_slice, context)
    }
}

/// Source that never emits intents
#[derive(Debug, Default, Clone)]
pub struct NullSignalSource;

impl ReplayOrderSignalSource for NullSignalSource {
    fn replay_order_intents(
        &self,
        _data_slice: &StrategyDataSlice,
        _context: &StrategyRuntimeContext,
    ) -> Vec<ReplayOrderIntent> {
        Vec::new()
    }
}

/// Concatenates the output of several sources, in registration order
#[derive(Default, Clone)]
pub struct CompositeSignalSource {
    sources: Vec<Arc<dyn ReplayOrderSignalSource>>,
}

impl CompositeSignalSource {
    pub fn new() -> Self {
        Self { sources: vec![] }
    }

    pub fn with_source<S: ReplayOrderSignalSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ReplayOrderSignalSource for CompositeSignalSource {
    fn replay_order_intents(
        &self,
        data_slice: &StrategyDataSlice,
        context: &StrategyRuntimeContext,
    ) -> Vec<ReplayOrderIntent> {
        self.sources
            .iter()
            .flat_map(|s| s.replay_order_intents(data_slice, context))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RunMode, Side};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::path::PathBuf;

    struct FixedSource(&'static str);

    impl ReplayOrderSignalSource for FixedSource {
        fn replay_order_intents(
            &self,
            data_slice: &StrategyDataSlice,
            context: &StrategyRuntimeContext,
        ) -> Vec<ReplayOrderIntent> {
            vec![ReplayOrderIntent::market(
                data_slice.timestamp_utc,
                context.symbol.clone(),
                Side::Buy,
                dec!(1),
                self.0,
            )]
        }
    }

    fn inputs() -> (StrategyDataSlice, StrategyRuntimeContext) {
        let now = Utc.with_ymd_and_hms(2024, 3, 12, 15, 0, 0).unwrap();
        let ctx = StrategyRuntimeContext {
            mode: RunMode::StrategyReplay,
            account: "DU123".into(),
            symbol: "SPY".into(),
            model_code: None,
            run_started_utc: now,
            output_directory: PathBuf::from("out"),
            session_start_utc: None,
            session_end_utc: None,
            scheduled_interval_seconds: 60,
        };
        (StrategyDataSlice::empty(now, RunMode::StrategyReplay), ctx)
    }

    #[test]
    fn test_null_source_returns_empty_collection() {
        let (slice, ctx) = inputs();
        assert!(NullSignalSource.replay_order_intents(&slice, &ctx).is_empty());
    }

    #[test]
    fn test_composite_preserves_order() {
        let (slice, ctx) = inputs();
        let composite = CompositeSignalSource::new()
            .with_source(FixedSource("first"))
            .with_source(NullSignalSource)
            .with_source(FixedSource("second"));

        let intents = composite.replay_order_intents(&slice, &ctx);
        let sources: Vec<_> = intents.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(sources, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_composite_returns_empty_collection() {
        let (slice, ctx) = inputs();
        let composite = CompositeSignalSource::new();
        assert!(composite.is_empty());
        assert!(composite.replay_order_intents(&slice, &ctx).is_empty());
    }
}
