use crate::cancel::CancelToken;
use crate::data::{StrategyDataSlice, StrategyRuntimeContext};
use crate::error::StrategyResult;
use async_trait::async_trait;

/// Strategy lifecycle contract
///
/// 1. `initialize` - once, before any data or scheduled events
/// 2. `on_scheduled_event` - when a named timer fires
/// 3. `on_data` - for each new data slice
/// 4. `on_shutdown` - once at termination, with the process exit code
///
/// Every hook takes its own cancellation token, so each one can be
/// cancelled independently of the others.
#[async_trait]
pub trait StrategyRuntime: Send {
    async fn initialize(
        &mut self,
        context: &StrategyRuntimeContext,
        cancel: &CancelToken,
    ) -> StrategyResult<()>;

    async fn on_scheduled_event(
        &mut self,
        event_name: &str,
        context: &StrategyRuntimeContext,
        cancel: &CancelToken,
    ) -> StrategyResult<()>;

    async fn on_data(
        &mut self,
        data_slice: &StrategyDataSlice,
        cancel: &CancelToken,
    ) -> StrategyResult<()>;

    async fn on_shutdown(
        &mut self,
        context: &StrategyRuntimeContext,
        exit_code: i32,
        cancel: &CancelToken,
    ) -> StrategyResult<()>;
}

/// Runtime that does nothing
///
/// Still honours cancellation: a hook called with an already-cancelled
/// token returns `StrategyError::Cancelled`.
#[derive(Debug, Default, Clone)]
pub struct NullStrategyRuntime;

#[async_trait]
impl StrategyRuntime for NullStrategyRuntime {
    async fn initialize(
        &mut self,
        _context: &StrategyRuntimeContext,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        cancel.check("initialize")
    }

    async fn on_scheduled_event(
        &mut self,
        _event_name: &str,
        _context: &StrategyRuntimeContext,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        cancel.check("on_scheduled_event")
    }

    async fn on_data(
        &mut self,
        _data_slice: &StrategyDataSlice,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        cancel.check("on_data")
    }

    async fn on_shutdown(
        &mut self,
        _context: &StrategyRuntimeContext,
        _exit_code: i32,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        cancel.check("on_shutdown")
    }
}

#[async_trait]
impl<R: StrategyRuntime + ?Sized> StrategyRuntime for Box<R> {
    async fn initialize(
        &mut self,
        context: &StrategyRuntimeContext,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        (**self).initialize(context, cancel).await
    }

    async fn on_scheduled_event(
        &mut self,
        event_name: &str,
        context: &StrategyRuntimeContext,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        (**self).on_scheduled_event(event_name, context, cancel).await
    }

    async fn on_data(
        &mut self,
        data_slice: &StrategyDataSlice,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        (**self).on_data(data_slice, cancel).await
    }

    async fn on_shutdown(
        &mut self,
        context: &StrategyRuntimeContext,
        exit_code: i32,
        cancel: &CancelToken,
    ) -> StrategyResult<()> {
        (**self).on_shutdown(context, exit_code, cancel).await
    }
}
