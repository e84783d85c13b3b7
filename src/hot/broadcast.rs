//! # Multicast event channel.
//!
//! [`Broadcast`] delivers every emitted value to all subscribers attached at
//! emission time. There is no replay: a value emitted with nobody subscribed
//! is gone, and late subscribers only see later emissions.
//!
//! ## Architecture
//! ```text
//! emit(v) ──► emit_lock ──► for each cursor (subscription order):
//!                             push(v.clone()) into its OverflowBuffer
//!                               ├─ Suspend    : wait for room (slowest subscriber paces emit)
//!                               ├─ DropOldest : evict that cursor's oldest pending value
//!                               └─ DropNewest : skip the value for that cursor
//! ```
//!
//! ## Rules
//! - Emits are serialized, so all subscribers observe the same order.
//! - Subscriber A being slow never delays subscriber B's receipt of a value
//!   already delivered to B.
//! - `close()` ends every subscription once its pending values are drained;
//!   emitting afterwards fails with [`FlowError::Closed`].

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::{Close, Subscription};
use crate::error::FlowError;
use crate::events::Bus;
use crate::flows::{ColdFlow, Emitter};
use crate::hot::registry::{Cursor, Detach, Registry, StreamMeta};
use crate::policies::{OverflowPolicy, Pushed};

/// Default per-subscriber buffer capacity of a broadcast channel.
pub(crate) const DEFAULT_BROADCAST_CAPACITY: usize = 64;

struct BroadcastInner<T> {
    meta: StreamMeta,
    capacity: usize,
    policy: OverflowPolicy,
    registry: Mutex<Registry<T>>,
    emit_lock: tokio::sync::Mutex<()>,
}

impl<T: Send> Detach for BroadcastInner<T> {
    fn detach(&self, id: u64) {
        if let Some(buffer) = self.registry.lock().remove(id) {
            buffer.abort();
        }
    }
}

impl<T: Send> Close for BroadcastInner<T> {
    fn close(&self) {
        if self.registry.lock().close() {
            self.meta.closed();
        }
    }
}

/// Hot channel that fans every emitted value out to the current subscribers.
pub struct Broadcast<T> {
    inner: Arc<BroadcastInner<T>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("Broadcast")
            .field("name", &self.inner.meta.name)
            .field("capacity", &self.inner.capacity)
            .field("policy", &self.inner.policy)
            .field("subscribers", &registry.len())
            .field("closed", &registry.is_closed())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    /// Creates a channel; every subscriber gets a buffer of `capacity` governed by `policy`.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self::with_options("broadcast", capacity, policy, None)
    }

    /// Creates a named channel (the name shows up in logs and events).
    pub fn named(name: impl Into<Arc<str>>, capacity: usize, policy: OverflowPolicy) -> Self {
        Self::with_options(name, capacity, policy, None)
    }

    pub(crate) fn with_options(
        name: impl Into<Arc<str>>,
        capacity: usize,
        policy: OverflowPolicy,
        bus: Option<Bus>,
    ) -> Self {
        Self {
            inner: Arc::new(BroadcastInner {
                meta: StreamMeta::new(name, bus),
                capacity: capacity.max(1),
                policy,
                registry: Mutex::new(Registry::new()),
                emit_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Delivers `value` to every current subscriber.
    ///
    /// Returns how many subscribers accepted the value (`Ok(0)` when nobody is
    /// subscribed). Under [`OverflowPolicy::Suspend`] this waits until every
    /// subscriber buffer had room. Fails with [`FlowError::Closed`] when the
    /// channel is closed before or during the emit.
    pub async fn emit(&self, value: T) -> Result<usize, FlowError> {
        let _serial = self.inner.emit_lock.lock().await;
        let targets = {
            let registry = self.inner.registry.lock();
            if registry.is_closed() {
                return Err(FlowError::Closed);
            }
            registry.targets()
        };
        if targets.is_empty() {
            self.inner.meta.emission_dropped();
            return Ok(0);
        }

        let mut delivered = 0usize;
        let mut interrupted = false;
        for (id, buffer) in targets {
            match buffer.push(value.clone()).await {
                Ok(Pushed::Queued) => delivered += 1,
                Ok(Pushed::DroppedOldest) => {
                    delivered += 1;
                    self.inner.meta.value_dropped(id, buffer.policy());
                }
                Ok(Pushed::DroppedNewest) => {
                    self.inner.meta.value_dropped(id, buffer.policy());
                }
                // cursor detached or stream closed while waiting
                Err(_) => interrupted = true,
            }
        }
        if interrupted && self.inner.registry.lock().is_closed() {
            return Err(FlowError::Closed);
        }
        Ok(delivered)
    }

    /// Attaches a new cursor that sees every value emitted from now on.
    pub fn cursor(&self) -> Cursor<T> {
        let (id, buffer) =
            self.inner
                .registry
                .lock()
                .attach(self.inner.capacity, self.inner.policy, None);
        Cursor::new(id, buffer, self.inner.clone())
    }

    /// Cold view: every collection attaches its own cursor.
    pub fn flow(&self) -> ColdFlow<T> {
        let channel = self.clone();
        ColdFlow::new(self.name().to_string(), move |em: Emitter<T>| {
            let mut cursor = channel.cursor();
            async move {
                while let Some(v) = cursor.next().await {
                    em.emit(v).await?;
                }
                Ok::<(), FlowError>(())
            }
        })
    }

    /// Receives every later emission on a new task.
    ///
    /// The cursor is attached before this call returns, so an emit that follows
    /// is guaranteed to reach it.
    pub fn subscribe<F, Fut>(&self, f: F) -> Subscription
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        Subscription::spawn(
            self.name(),
            CancellationToken::new(),
            None,
            self.flow().start().sequential(f),
        )
    }

    /// Number of attached cursors.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Ends every subscription after its pending values; later emits fail.
    pub fn close(&self) {
        Close::close(self.inner.as_ref());
    }

    /// True once [`close`](Self::close) was called or the owning scope closed.
    pub fn is_closed(&self) -> bool {
        self.inner.registry.lock().is_closed()
    }

    /// Stream name.
    pub fn name(&self) -> &str {
        &self.inner.meta.name
    }

    pub(crate) fn closer(&self) -> Weak<dyn Close> {
        Arc::downgrade(&self.inner) as Weak<dyn Close>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    use crate::core::SubscriptionState;

    /// Collector that records (value, finished_at) after `work` per value.
    fn slow_sink(
        bus: &Broadcast<u32>,
        work: Duration,
        start: Instant,
    ) -> (Subscription, Arc<Mutex<Vec<(u32, Duration)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let sub = bus.subscribe(move |v| {
            let sink = sink.clone();
            async move {
                sleep(work).await;
                sink.lock().push((v, start.elapsed()));
                Ok(())
            }
        });
        (sub, log)
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_lost() {
        let squares = Broadcast::named("squares", 8, OverflowPolicy::Suspend);
        assert_eq!(squares.emit(1u32).await, Ok(0));

        let mut cursor = squares.cursor();
        assert_eq!(squares.emit(4).await, Ok(1));
        assert_eq!(cursor.next().await, Some(4));
        assert_eq!(cursor.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_is_paced_by_slowest_subscriber() {
        let start = Instant::now();
        let squares = Broadcast::named("squares", 1, OverflowPolicy::Suspend);
        let (fast, fast_log) = slow_sink(&squares, Duration::from_millis(100), start);
        let (slow, slow_log) = slow_sink(&squares, Duration::from_secs(1), start);

        for v in 0..4u32 {
            assert_eq!(squares.emit(v * v).await, Ok(2));
        }
        squares.close();
        assert_eq!(fast.join().await, SubscriptionState::Completed);
        assert_eq!(slow.join().await, SubscriptionState::Completed);

        let fast_values: Vec<u32> = fast_log.lock().iter().map(|(v, _)| *v).collect();
        let slow_values: Vec<u32> = slow_log.lock().iter().map(|(v, _)| *v).collect();
        assert_eq!(fast_values, vec![0, 1, 4, 9]);
        assert_eq!(slow_values, vec![0, 1, 4, 9]);
        // the slow subscriber works back to back once the producer is ahead
        let slow_times: Vec<Duration> = slow_log.lock().iter().map(|(_, t)| *t).collect();
        assert_eq!(slow_times[3], Duration::from_secs(4));
        // the fast subscriber is never behind the slow one
        for (f, s) in fast_log.lock().iter().zip(slow_log.lock().iter()) {
            assert!(f.1 <= s.1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_oldest_slow_subscriber_sees_newest() {
        let start = Instant::now();
        let squares = Broadcast::named("squares", 1, OverflowPolicy::DropOldest);
        let (fast, fast_log) = slow_sink(&squares, Duration::ZERO, start);
        let (slow, slow_log) = slow_sink(&squares, Duration::from_secs(10), start);

        for v in 1..=5u32 {
            squares.emit(v).await.unwrap();
            sleep(Duration::from_millis(100)).await;
        }
        squares.close();
        assert_eq!(fast.join().await, SubscriptionState::Completed);
        assert_eq!(slow.join().await, SubscriptionState::Completed);

        let fast_values: Vec<u32> = fast_log.lock().iter().map(|(v, _)| *v).collect();
        let slow_values: Vec<u32> = slow_log.lock().iter().map(|(v, _)| *v).collect();
        assert_eq!(fast_values, vec![1, 2, 3, 4, 5]);
        // 1 is in the callback, 2..4 are evicted by newer values
        assert_eq!(slow_values, vec![1, 5]);
    }

    #[tokio::test]
    async fn test_drop_newest_skips_for_full_cursor_only() {
        let events = Broadcast::named("events", 1, OverflowPolicy::DropNewest);
        let mut reader = events.cursor();
        let mut idle = events.cursor();

        assert_eq!(events.emit("a").await, Ok(2));
        assert_eq!(reader.next().await, Some("a"));
        // idle still holds "a": only the reader accepts "b"
        assert_eq!(events.emit("b").await, Ok(1));
        assert_eq!(reader.next().await, Some("b"));
        assert_eq!(idle.next().await, Some("a"));
    }

    #[tokio::test]
    async fn test_close_drains_then_completes() {
        let events = Broadcast::named("events", 8, OverflowPolicy::Suspend);
        let mut cursor = events.cursor();
        events.emit(1u8).await.unwrap();
        events.emit(2).await.unwrap();
        events.close();

        assert!(events.is_closed());
        assert_eq!(events.emit(3).await, Err(FlowError::Closed));
        assert_eq!(cursor.next().await, Some(1));
        assert_eq!(cursor.next().await, Some(2));
        assert_eq!(cursor.next().await, None);

        let late = events.subscribe(|_| async { Ok(()) });
        assert_eq!(late.join().await, SubscriptionState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_cursor_releases_suspended_emit() {
        let events = Broadcast::named("events", 1, OverflowPolicy::Suspend);
        let cursor = events.cursor();
        events.emit(1u8).await.unwrap();

        let pending = {
            let events = events.clone();
            tokio::spawn(async move { events.emit(2).await })
        };
        sleep(Duration::from_millis(10)).await;
        assert!(!pending.is_finished());

        drop(cursor);
        assert_eq!(pending.await.unwrap(), Ok(0));
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_fails_suspended_emit() {
        let events = Broadcast::named("events", 1, OverflowPolicy::Suspend);
        let mut cursor = events.cursor();
        events.emit(1u8).await.unwrap();

        let pending = {
            let events = events.clone();
            tokio::spawn(async move { events.emit(2).await })
        };
        sleep(Duration::from_millis(10)).await;
        events.close();

        assert_eq!(pending.await.unwrap(), Err(FlowError::Closed));
        assert_eq!(cursor.next().await, Some(1));
        assert_eq!(cursor.next().await, None);
    }

    #[tokio::test]
    async fn test_failing_subscriber_leaves_others_running() {
        let squares = Broadcast::named("squares", 1, OverflowPolicy::Suspend);
        let bad = squares.subscribe(|v: u32| async move {
            if v == 2 {
                Err(FlowError::collector("bad"))
            } else {
                Ok(())
            }
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let good = {
            let seen = seen.clone();
            squares.subscribe(move |v| {
                seen.lock().push(v);
                async { Ok(()) }
            })
        };

        for v in 1..=6u32 {
            assert!(squares.emit(v).await.is_ok());
        }
        squares.close();

        assert_eq!(
            bad.join().await,
            SubscriptionState::Failed(FlowError::collector("bad"))
        );
        assert_eq!(good.join().await, SubscriptionState::Completed);
        assert_eq!(*seen.lock(), (1..=6).collect::<Vec<_>>());
    }
}
