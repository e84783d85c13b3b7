//! # Bounded per-subscriber buffer with an overflow policy.
//!
//! [`OverflowBuffer`] is the queue that sits between a producer and exactly one
//! consumer. Hot streams give every cursor its own buffer, the `buffer` flow
//! operator puts one between an upstream producer and the downstream collector.
//!
//! ## Architecture
//! ```text
//! producer ── offer()/push() ──► [VecDeque, capacity N] ──► pop() ── consumer
//!                 │                      │
//!                 │   full + Suspend ────┴──► wait on `writable`
//!                 │   full + DropOldest ────► evict front, enqueue
//!                 └── full + DropNewest ────► discard incoming
//! ```
//!
//! ## Rules
//! - FIFO: values are popped in the order they were accepted.
//! - `close()` is terminal: pending values can still be popped, new values are refused,
//!   suspended producers are released with [`FlowError::Closed`].
//! - Capacity is clamped to a minimum of 1.
//! - The lock is never held across an `.await`.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::FlowError;
use crate::policies::OverflowPolicy;

/// Result of offering a value to a buffer without waiting.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Offer<T> {
    /// Value enqueued; nothing was lost.
    Queued,
    /// Value enqueued after evicting the oldest pending value.
    DroppedOldest,
    /// Buffer full; the incoming value was discarded.
    DroppedNewest,
    /// Buffer full under [`OverflowPolicy::Suspend`]; the value is handed back.
    Full(T),
    /// Buffer closed; the value is handed back.
    Closed(T),
}

/// Outcome of a successful [`OverflowBuffer::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Pushed {
    /// Value accepted without loss.
    Queued,
    /// Value accepted, the oldest pending value was evicted.
    DroppedOldest,
    /// Value discarded because the buffer was full.
    DroppedNewest,
}

impl Pushed {
    /// True if some value was lost while pushing.
    pub(crate) fn dropped(&self) -> bool {
        !matches!(self, Pushed::Queued)
    }
}

struct BufferState<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// Single-consumer bounded queue governed by an [`OverflowPolicy`].
pub(crate) struct OverflowBuffer<T> {
    capacity: usize,
    policy: OverflowPolicy,
    state: Mutex<BufferState<T>>,
    readable: Notify,
    writable: Notify,
}

impl<T> OverflowBuffer<T> {
    /// Creates an empty buffer (capacity clamped to at least 1).
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            policy,
            state: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    /// Offers a value without waiting.
    ///
    /// Never blocks: under [`OverflowPolicy::Suspend`] a full buffer returns [`Offer::Full`].
    pub(crate) fn offer(&self, value: T) -> Offer<T> {
        let mut st = self.state.lock();
        if st.closed {
            return Offer::Closed(value);
        }

        let offer = if st.queue.len() < self.capacity {
            st.queue.push_back(value);
            Offer::Queued
        } else {
            match self.policy {
                OverflowPolicy::Suspend => return Offer::Full(value),
                OverflowPolicy::DropOldest => {
                    st.queue.pop_front();
                    st.queue.push_back(value);
                    Offer::DroppedOldest
                }
                OverflowPolicy::DropNewest => return Offer::DroppedNewest,
            }
        };
        let has_room = st.queue.len() < self.capacity;
        drop(st);

        self.readable.notify_one();
        if has_room {
            // chain wake-ups between concurrent suspended producers
            self.writable.notify_one();
        }
        offer
    }

    /// Pushes a value, waiting for room under [`OverflowPolicy::Suspend`].
    ///
    /// Returns [`FlowError::Closed`] if the buffer is (or becomes) closed.
    pub(crate) async fn push(&self, mut value: T) -> Result<Pushed, FlowError> {
        loop {
            match self.offer(value) {
                Offer::Queued => return Ok(Pushed::Queued),
                Offer::DroppedOldest => return Ok(Pushed::DroppedOldest),
                Offer::DroppedNewest => return Ok(Pushed::DroppedNewest),
                Offer::Closed(_) => {
                    self.writable.notify_one();
                    return Err(FlowError::Closed);
                }
                Offer::Full(back) => {
                    value = back;
                    self.writable.notified().await;
                }
            }
        }
    }

    /// Pops the next value, waiting while the buffer is empty.
    ///
    /// Returns `None` once the buffer is closed and drained.
    pub(crate) async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut st = self.state.lock();
                if let Some(v) = st.queue.pop_front() {
                    drop(st);
                    self.writable.notify_one();
                    return Some(v);
                }
                if st.closed {
                    return None;
                }
            }
            self.readable.notified().await;
        }
    }

    /// Closes the buffer and releases every waiter.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.readable.notify_one();
        self.writable.notify_waiters();
        self.writable.notify_one();
    }

    /// Closes the buffer and discards pending values.
    pub(crate) fn abort(&self) {
        {
            let mut st = self.state.lock();
            st.closed = true;
            st.queue.clear();
        }
        self.readable.notify_one();
        self.writable.notify_waiters();
        self.writable.notify_one();
    }

    /// Number of pending values.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// True once [`close`](Self::close) or [`abort`](Self::abort) was called.
    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Configured policy.
    pub(crate) fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}
