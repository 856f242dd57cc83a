//! Cancellable quiet-period timer used for free-text filter inputs.

use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Identifies one scheduled firing. Only the most recently issued token of a
/// [`Debouncer`] is ever accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebounceToken(u64);

pub struct Debouncer {
    quiet: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            generation: 0,
            pending: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Cancels any pending timer and arms a new one. `fire` runs once the
    /// quiet period elapses without another call to `schedule` or `cancel`.
    pub fn schedule<F, Fut>(&mut self, fire: F) -> DebounceToken
    where
        F: FnOnce(DebounceToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let token = DebounceToken(self.generation);
        let quiet = self.quiet;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            fire(token).await;
        }));
        token
    }

    /// Returns true when a timer was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Claims a firing. A timer can race a later `schedule`/`cancel` (it may
    /// already be past its sleep when aborted), so the receiver must check
    /// the token before acting on it.
    pub fn accept(&mut self, token: DebounceToken) -> bool {
        if token.0 != self.generation || self.pending.is_none() {
            return false;
        }
        // Dropping the handle detaches the task that is delivering this token.
        self.pending = None;
        true
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
