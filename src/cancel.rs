use crate::error::{StrategyError, StrategyResult};
use tokio::sync::watch;

/// Owning side of a cancellation signal
///
/// Dropping the source without calling `cancel()` leaves every token
/// un-cancelled forever.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Hand out a token observing this source
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Signal cancellation to every token. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap, cloneable view of a cancellation signal passed to every lifecycle call
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// Token that can never be cancelled
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Fail fast with `StrategyError::Cancelled` tagged with `operation`
    pub fn check(&self, operation: &'static str) -> StrategyResult<()> {
        if self.is_cancelled() {
            return Err(StrategyError::Cancelled(operation));
        }
        Ok(())
    }

    /// Resolve once cancellation is signalled
    ///
    /// Pends forever for `never()` tokens and for tokens whose source was
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = match &self.rx {
            Some(rx) => rx.clone(),
            None => return std::future::pending().await,
        };

        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
