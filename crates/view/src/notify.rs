//! Weak publish/subscribe for change notifications.
//!
//! A repository owns one [`Notifier`] and fires it after every committed
//! write. Views subscribe to it without the repository ever knowing how many
//! exist: the notifier only holds [`Weak`] handles, so a view that its caller
//! has dropped simply stops being delivered to and is pruned on the next
//! [`fire`](Notifier::fire).

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Something that holds derived state and can be told to throw it away.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self);
}

/// A change notifier holding weak subscriptions.
///
/// Delivery is synchronous: when [`fire`](Self::fire) returns, every live
/// subscriber has been invalidated. The order of delivery is unspecified.
#[derive(Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<Weak<dyn Invalidate>>>,
}
impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` without extending its lifetime.
    pub fn subscribe<S: Invalidate + 'static>(&self, subscriber: &Arc<S>) {
        let subscriber: Weak<S> = Arc::downgrade(subscriber);
        let subscriber: Weak<dyn Invalidate> = subscriber;
        let mut subscribers = self.lock();
        // Views are created per read call and may never see a fire; prune
        // before growing so the list tracks the number of live views.
        if subscribers.len() == subscribers.capacity() {
            subscribers.retain(|s| s.strong_count() > 0);
        }
        subscribers.push(subscriber);
    }

    /// Invalidate every live subscriber, returning how many were reached.
    ///
    /// Subscribers that have been dropped are pruned silently. A subscriber
    /// that panics is logged and skipped; the remaining subscribers are still
    /// invalidated.
    pub fn fire(&self) -> usize {
        // Upgrade under the lock, deliver outside of it: a subscriber is free
        // to subscribe or fire again from within `invalidate()`.
        let live: Vec<Arc<dyn Invalidate>> = {
            let mut subscribers = self.lock();
            subscribers.retain(|s| s.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        let mut delivered = 0;
        for subscriber in &live {
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber.invalidate())) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!("change subscriber panicked during invalidation; skipping it"),
            }
        }
        tracing::trace!(delivered, "change notification delivered");
        delivered
    }

    /// Number of subscribers that are still alive.
    pub fn subscriber_count(&self) -> usize {
        self.lock().iter().filter(|s| s.strong_count() > 0).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Weak<dyn Invalidate>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("subscribers", &self.subscriber_count()).finish()
    }
}
