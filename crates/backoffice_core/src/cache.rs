//! Fetch de-duplication and invalidation keyed by [`CacheKey`].
//!
//! One instance lives per console session. Concurrent reads of the same key
//! share one in-flight load; completed results are only reused inside the
//! configured staleness window (zero by default, i.e. always fetch fresh).
//!
//! A key keeps a slot only while it has a load in flight, a value inside the
//! staleness window, or a live subscriber. With a zero window results are
//! published but never retained.

use std::{collections::HashMap, future::Future, time::Duration};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use tokio::{
    sync::{watch, Mutex},
    time::Instant,
};
use tracing::{debug, trace};

use crate::query::CacheKey;

type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Inflight<V, E>
where
    V: Clone,
    E: Clone,
{
    generation: u64,
    load: SharedLoad<V, E>,
}

struct Stored<V> {
    value: V,
    fetched_at: Instant,
}

struct Slot<V, E>
where
    V: Clone,
    E: Clone,
{
    inflight: Option<Inflight<V, E>>,
    stored: Option<Stored<V>>,
    /// Loads started at or before this generation were invalidated.
    invalidated_through: u64,
    published_generation: u64,
    publisher: watch::Sender<Option<V>>,
}

impl<V: Clone, E: Clone> Slot<V, E> {
    /// Loads detached from an earlier slot for the same key carry a
    /// generation at or below `created_after`, so their results are ignored.
    fn new(created_after: u64) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            inflight: None,
            stored: None,
            invalidated_through: created_after,
            published_generation: created_after,
            publisher,
        }
    }

    fn is_idle(&self, stale_after: Duration) -> bool {
        self.inflight.is_none()
            && self
                .stored
                .as_ref()
                .map_or(true, |stored| stored.fetched_at.elapsed() >= stale_after)
            && self.publisher.receiver_count() == 0
    }
}

struct CacheState<V, E>
where
    V: Clone,
    E: Clone,
{
    slots: HashMap<CacheKey, Slot<V, E>>,
    next_generation: u64,
}

pub struct RemoteDataCache<V, E>
where
    V: Clone,
    E: Clone,
{
    stale_after: Duration,
    inner: Mutex<CacheState<V, E>>,
}

impl<V, E> RemoteDataCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// `stale_after = Duration::ZERO` never reuses a completed result.
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            inner: Mutex::new(CacheState {
                slots: HashMap::new(),
                next_generation: 0,
            }),
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Returns a fresh stored value, joins an identical in-flight load, or
    /// starts `loader`. `loader` is only called when a new load is needed.
    pub async fn fetch<F, Fut>(&self, key: &CacheKey, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (generation, load) = {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            let created_after = state.next_generation;
            let slot = state
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(created_after));

            if let Some(stored) = &slot.stored {
                if stored.fetched_at.elapsed() < self.stale_after {
                    trace!(%key, "cache hit");
                    return Ok(stored.value.clone());
                }
            }

            match &slot.inflight {
                Some(inflight) => {
                    debug!(%key, generation = inflight.generation, "coalesced onto in-flight load");
                    (inflight.generation, inflight.load.clone())
                }
                None => {
                    state.next_generation += 1;
                    let generation = state.next_generation;
                    let load = loader().boxed().shared();
                    slot.inflight = Some(Inflight {
                        generation,
                        load: load.clone(),
                    });
                    trace!(%key, generation, "starting load");
                    (generation, load)
                }
            }
        };

        let outcome = load.await;
        self.settle(key, generation, &outcome).await;
        outcome
    }

    /// Every coalesced caller settles; only the first one for a generation
    /// does any work.
    async fn settle(&self, key: &CacheKey, generation: u64, outcome: &Result<V, E>) {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        if let Some(slot) = state.slots.get_mut(key) {
            if slot
                .inflight
                .as_ref()
                .is_some_and(|inflight| inflight.generation == generation)
            {
                slot.inflight = None;
            }
            if let Ok(value) = outcome {
                if generation <= slot.invalidated_through {
                    debug!(%key, generation, "dropping result of invalidated load");
                } else if generation > slot.published_generation {
                    slot.published_generation = generation;
                    if !self.stale_after.is_zero() {
                        slot.stored = Some(Stored {
                            value: value.clone(),
                            fetched_at: Instant::now(),
                        });
                    }
                    slot.publisher.send_replace(Some(value.clone()));
                    trace!(%key, generation, "published");
                }
            }
        }
        self.prune(state);
    }

    /// Drops slots nothing can read from any more.
    fn prune(&self, state: &mut CacheState<V, E>) {
        let before = state.slots.len();
        state
            .slots
            .retain(|_, slot| !slot.is_idle(self.stale_after));
        let pruned = before - state.slots.len();
        if pruned > 0 {
            trace!(pruned, remaining = state.slots.len(), "pruned idle slots");
        }
    }

    /// Forces the next read of every key starting with `prefix` to load
    /// again. In-flight loads for those keys are detached: their callers
    /// still get the result, but it is not stored or published. Returns the
    /// number of keys touched.
    pub async fn invalidate(&self, prefix: &str) -> usize {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        let current = state.next_generation;
        let mut touched = 0;
        for (key, slot) in state
            .slots
            .iter_mut()
            .filter(|(key, _)| key.starts_with(prefix))
        {
            let had_stored = slot.stored.take().is_some();
            let had_inflight = slot.inflight.take().is_some();
            slot.invalidated_through = current;
            if had_stored || had_inflight {
                trace!(%key, "invalidated");
                touched += 1;
            }
        }
        self.prune(state);
        debug!(prefix, touched, "cache invalidated");
        touched
    }

    /// Receiver that sees every value published for `key` from now on.
    pub async fn subscribe(&self, key: &CacheKey) -> watch::Receiver<Option<V>> {
        let mut guard = self.inner.lock().await;
        let created_after = guard.next_generation;
        guard
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(created_after))
            .publisher
            .subscribe()
    }

    /// Last value still held for `key`: a stored one, or the latest value
    /// published to a live subscriber.
    pub async fn peek(&self, key: &CacheKey) -> Option<V> {
        let guard = self.inner.lock().await;
        let slot = guard.slots.get(key)?;
        match &slot.stored {
            Some(stored) => Some(stored.value.clone()),
            None if slot.published_generation > slot.invalidated_through => {
                slot.publisher.borrow().clone()
            }
            None => None,
        }
    }

    #[cfg(test)]
    pub(crate) async fn slot_count(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_loading(&self, key: &CacheKey) -> bool {
        let guard = self.inner.lock().await;
        guard
            .slots
            .get(key)
            .is_some_and(|slot| slot.inflight.is_some())
    }

    /// Drops everything, including subscriber channels.
    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        let dropped = guard.slots.len();
        guard.slots.clear();
        debug!(dropped, "cache cleared");
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
