// ── Bounded retry executor ──
//
// Runs a fallible async operation a fixed number of extra times, with an
// optional settle check after each success. There is no backoff here; a
// settle check that needs to wait does its own sleeping.

use std::future::Future;

use tracing::{error, info, warn};

use crate::error::CoreError;

/// Lifecycle callbacks for one [`RetryExecutor`] invocation.
pub trait RetryHooks {
    /// An attempt failed and another will follow. `remaining` is the retry
    /// budget *before* the next attempt consumes one.
    fn on_retry(&mut self, error: &CoreError, remaining: u32);

    /// An attempt succeeded after at least one failure.
    fn on_recovered(&mut self, remaining: u32);

    /// The last attempt failed. The executor reports the error here and
    /// then returns `None`; it does not raise it further.
    fn on_exhausted(&mut self, error: CoreError);
}

/// Hooks that only log, for operations whose failure needs no cleanup.
#[derive(Debug, Clone, Copy)]
pub struct LogHooks<'a> {
    pub operation: &'a str,
}

impl RetryHooks for LogHooks<'_> {
    fn on_retry(&mut self, error: &CoreError, remaining: u32) {
        warn!(operation = self.operation, remaining, error = %error, "attempt failed, retrying");
    }

    fn on_recovered(&mut self, remaining: u32) {
        info!(operation = self.operation, remaining, "recovered after retry");
    }

    fn on_exhausted(&mut self, error: CoreError) {
        error!(operation = self.operation, error = %error, "retries exhausted");
    }
}

/// One attempt's view of the retry budget. Each retry gets a fresh value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attempt {
    remaining: u32,
    is_retry: bool,
}

impl Attempt {
    fn first(retries: u32) -> Self {
        Self {
            remaining: retries,
            is_retry: false,
        }
    }

    /// The attempt after this one fails, or `None` if the budget is spent.
    fn next(self) -> Option<Self> {
        (self.remaining > 0).then(|| Self {
            remaining: self.remaining - 1,
            is_retry: true,
        })
    }
}

/// Bounded, sequential retry with lifecycle callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryExecutor {
    retries: u32,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETRIES)
    }
}

impl RetryExecutor {
    pub const DEFAULT_RETRIES: u32 = 3;

    /// `retries` extra attempts after the first, so at most `retries + 1` calls.
    pub fn new(retries: u32) -> Self {
        Self { retries }
    }

    /// Run `op` until it succeeds or the budget is spent.
    pub async fn run<T, Op, Fut, H>(&self, op: Op, hooks: &mut H) -> Option<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
        H: RetryHooks,
    {
        self.run_settled(
            op,
            |value| std::future::ready(Ok(Some(value))),
            || CoreError::Internal("settle check rejected an unchecked value".into()),
            hooks,
        )
        .await
    }

    /// Run `op`, then `settle` on its output. The settle check answers
    /// `Ok(Some(final))` when the expected state was observed, `Ok(None)`
    /// when it was not (the attempt then fails with `not_settled()`), or an
    /// error of its own. Either failure consumes one retry.
    pub async fn run_settled<T, U, Op, Fut, S, SFut, E, H>(
        &self,
        mut op: Op,
        mut settle: S,
        not_settled: E,
        hooks: &mut H,
    ) -> Option<U>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
        S: FnMut(T) -> SFut,
        SFut: Future<Output = Result<Option<U>, CoreError>>,
        E: Fn() -> CoreError,
        H: RetryHooks,
    {
        let mut attempt = Attempt::first(self.retries);
        loop {
            let outcome = match op().await {
                Ok(value) => match settle(value).await {
                    Ok(Some(settled)) => Ok(settled),
                    Ok(None) => Err(not_settled()),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => {
                    if attempt.is_retry {
                        hooks.on_recovered(attempt.remaining);
                    }
                    return Some(value);
                }
                Err(e) => match attempt.next() {
                    Some(next) => {
                        hooks.on_retry(&e, attempt.remaining);
                        attempt = next;
                    }
                    None => {
                        hooks.on_exhausted(e);
                        return None;
                    }
                },
            }
        }
    }
}
