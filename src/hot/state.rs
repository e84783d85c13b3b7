//! # Latest-value holder.
//!
//! [`StateCell`] always holds exactly one current value. It can be read
//! synchronously without subscribing, and every new subscriber first receives
//! the current value, then each later write.
//!
//! ## Rules
//! - `write` replaces the value and notifies subscribers in subscription order, all under one lock:
//!   concurrent writers are serialized and every subscriber sees the same interleaving.
//! - A new cursor is seeded with the current value under the same lock, so it never
//!   misses or duplicates a write.
//! - Per-subscriber buffers use [`OverflowPolicy::DropOldest`]: a subscriber that
//!   lags by more than its capacity skips stale values but always ends on the newest one.
//! - Every write is delivered, even when it equals the current value.
//!
//! ## Example
//! ```rust
//! use flowvisor::StateCell;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let counter = StateCell::new(0u32);
//! counter.write(1);
//! counter.update(|v| v + 1);
//! assert_eq!(counter.read(), 2);
//!
//! let mut cursor = counter.cursor();
//! counter.write(3);
//! assert_eq!(cursor.next().await, Some(2)); // current value first
//! assert_eq!(cursor.next().await, Some(3));
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::{Close, Subscription};
use crate::error::FlowError;
use crate::events::Bus;
use crate::flows::{ColdFlow, Emitter};
use crate::hot::registry::{Cursor, Detach, Registry, StreamMeta};
use crate::policies::{Offer, OverflowPolicy};

/// Default per-subscriber buffer capacity of a state cell.
pub(crate) const DEFAULT_STATE_CAPACITY: usize = 64;

struct Slot<T> {
    value: T,
    registry: Registry<T>,
}

struct StateInner<T> {
    meta: StreamMeta,
    capacity: usize,
    slot: Mutex<Slot<T>>,
}

impl<T: Send> Detach for StateInner<T> {
    fn detach(&self, id: u64) {
        if let Some(buffer) = self.slot.lock().registry.remove(id) {
            buffer.abort();
        }
    }
}

impl<T: Send> Close for StateInner<T> {
    fn close(&self) {
        if self.slot.lock().registry.close() {
            self.meta.closed();
        }
    }
}

/// Mutable cell that always holds a current value and replays it to new subscribers.
pub struct StateCell<T> {
    inner: Arc<StateInner<T>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> StateCell<T> {
    /// Creates a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        Self::with_options("state", initial, DEFAULT_STATE_CAPACITY, None)
    }

    /// Creates a named cell holding `initial` (the name shows up in logs and events).
    pub fn named(name: impl Into<Arc<str>>, initial: T) -> Self {
        Self::with_options(name, initial, DEFAULT_STATE_CAPACITY, None)
    }

    pub(crate) fn with_options(
        name: impl Into<Arc<str>>,
        initial: T,
        capacity: usize,
        bus: Option<Bus>,
    ) -> Self {
        Self {
            inner: Arc::new(StateInner {
                meta: StreamMeta::new(name, bus),
                capacity: capacity.max(1),
                slot: Mutex::new(Slot {
                    value: initial,
                    registry: Registry::new(),
                }),
            }),
        }
    }

    /// Returns a copy of the current value.
    pub fn read(&self) -> T {
        self.inner.slot.lock().value.clone()
    }

    /// Replaces the current value and notifies every subscriber.
    pub fn write(&self, value: T) {
        let mut slot = self.inner.slot.lock();
        slot.value = value;
        self.notify(&slot);
    }

    /// Atomically derives the next value from the current one; returns the new value.
    ///
    /// Concurrent `update` calls never lose increments. `f` runs under the cell
    /// lock, so it must not call back into this cell (`read` included).
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let mut slot = self.inner.slot.lock();
        slot.value = f(&slot.value);
        self.notify(&slot);
        slot.value.clone()
    }

    /// Writes the value returned by `f`, if any; returns the value written.
    ///
    /// Returning `None` leaves the cell untouched and notifies nobody. Like
    /// [`update`](Self::update), `f` must not call back into this cell.
    pub fn update_if<F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let mut slot = self.inner.slot.lock();
        let next = f(&slot.value)?;
        slot.value = next;
        self.notify(&slot);
        Some(slot.value.clone())
    }

    fn notify(&self, slot: &Slot<T>) {
        for (id, buffer) in slot.registry.iter() {
            match buffer.offer(slot.value.clone()) {
                Offer::DroppedOldest | Offer::DroppedNewest => {
                    self.inner.meta.value_dropped(*id, buffer.policy());
                }
                Offer::Queued | Offer::Full(_) | Offer::Closed(_) => {}
            }
        }
    }

    /// Attaches a new cursor, seeded with the current value.
    ///
    /// On a closed cell the cursor still yields the current value once, then ends.
    pub fn cursor(&self) -> Cursor<T> {
        let (id, buffer) = {
            let mut slot = self.inner.slot.lock();
            let seed = slot.value.clone();
            slot.registry
                .attach(self.inner.capacity, OverflowPolicy::DropOldest, Some(seed))
        };
        Cursor::new(id, buffer, self.inner.clone())
    }

    /// Cold view: every collection attaches its own cursor.
    pub fn flow(&self) -> ColdFlow<T> {
        let cell = self.clone();
        ColdFlow::new(self.name().to_string(), move |em: Emitter<T>| {
            let mut cursor = cell.cursor();
            async move {
                while let Some(v) = cursor.next().await {
                    em.emit(v).await?;
                }
                Ok::<(), FlowError>(())
            }
        })
    }

    /// Receives the current value, then every write, on a new task.
    ///
    /// The cursor is attached before this call returns.
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

    /// Waits until the value satisfies `pred` (checking the current value first).
    ///
    /// Returns [`FlowError::Closed`] if the cell is closed before that happens.
    pub async fn wait_for<P>(&self, mut pred: P) -> Result<T, FlowError>
    where
        P: FnMut(&T) -> bool,
    {
        let mut cursor = self.cursor();
        while let Some(v) = cursor.next().await {
            if pred(&v) {
                return Ok(v);
            }
        }
        Err(FlowError::Closed)
    }

    /// Number of attached cursors.
    pub fn subscriber_count(&self) -> usize {
        self.inner.slot.lock().registry.len()
    }

    /// Ends every subscription; the value stays readable and writable.
    pub fn close(&self) {
        Close::close(self.inner.as_ref());
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.slot.lock().registry.is_closed()
    }

    /// Stream name.
    pub fn name(&self) -> &str {
        &self.inner.meta.name
    }

    pub(crate) fn closer(&self) -> Weak<dyn Close> {
        Arc::downgrade(&self.inner) as Weak<dyn Close>
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("StateCell")
            .field("name", &self.inner.meta.name)
            .field("value", &slot.value)
            .field("subscribers", &slot.registry.len())
            .finish()
    }
}
