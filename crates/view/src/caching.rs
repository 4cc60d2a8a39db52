//! Length memoization on top of any [`View`].

use crate::error::Result;
use crate::notify::{Invalidate, Notifier};
use crate::sequence::View;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Slot {
    len: Option<u64>,
    // Bumped on every invalidation so that a length computed before an
    // invalidation is never stored after it.
    generation: u64,
}

/// The shared half of a [`CachingView`]: the only thing a [`Notifier`] ever
/// holds (weakly) on the view's behalf.
#[derive(Debug, Default)]
struct LengthCache(Mutex<Slot>);
impl LengthCache {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> (Option<u64>, u64) {
        let slot = self.lock();
        (slot.len, slot.generation)
    }

    fn store(&self, generation: u64, len: u64) {
        let mut slot = self.lock();
        if slot.generation == generation {
            slot.len = Some(len);
        }
    }
}
impl Invalidate for LengthCache {
    fn invalidate(&self) {
        let mut slot = self.lock();
        slot.len = None;
        slot.generation = slot.generation.wrapping_add(1);
    }
}

/// A [`View`] that memoizes its length.
///
/// Only the length is cached. Pages are always fetched fresh from the wrapped
/// view, because the count is consulted on every boundary check while page
/// content must never be stale.
///
/// The cache is dropped by [`reset_cache`](Self::reset_cache), either
/// explicitly or through a [`Notifier`] the view was subscribed to. The
/// subscription is weak: dropping the view ends it.
#[derive(Debug)]
pub struct CachingView<V> {
    inner: V,
    cache: Arc<LengthCache>,
}
impl<V> CachingView<V> {
    pub fn new(inner: V) -> Self {
        Self { inner, cache: Arc::default() }
    }

    /// Wrap `inner` and subscribe the new view's cache to `notifier`.
    pub fn subscribed(inner: V, notifier: &Notifier) -> Self {
        let view = Self::new(inner);
        view.subscribe(notifier);
        view
    }

    /// Invalidate the cached length whenever `notifier` fires.
    pub fn subscribe(&self, notifier: &Notifier) {
        notifier.subscribe(&self.cache);
    }

    /// Forget the memoized length. Idempotent; pages already returned are
    /// unaffected.
    pub fn reset_cache(&self) {
        self.cache.invalidate();
    }

    /// The memoized length, if one is currently held.
    pub fn cached_len(&self) -> Option<u64> {
        self.cache.snapshot().0
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }
}

impl<V: View> View for CachingView<V> {
    type Item = V::Item;

    async fn get_slice(&self, start: u64, count: u64, stride: u64) -> Result<Vec<Self::Item>> {
        self.inner.get_slice(start, count, stride).await
    }

    async fn get_len(&self) -> Result<u64> {
        self.inner.get_len().await
    }

    async fn len(&self) -> Result<u64> {
        let (cached, generation) = self.cache.snapshot();
        if let Some(len) = cached {
            return Ok(len);
        }
        let len = self.inner.get_len().await?;
        tracing::trace!(len, "view length computed");
        self.cache.store(generation, len);
        Ok(len)
    }
}
