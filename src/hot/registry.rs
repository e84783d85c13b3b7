//! # Subscriber cursors shared by hot streams.
//!
//! Every subscriber of a [`StateCell`](crate::StateCell) or a
//! [`Broadcast`](crate::Broadcast) owns a [`Cursor`]: an independent read
//! position backed by its own bounded buffer. The stream keeps the producer
//! side of each buffer in a [`Registry`], in subscription order.
//!
//! ## Architecture
//! ```text
//!              ┌──────────── Registry (under the stream lock) ────────────┐
//! write/emit ──┼──► (id 0) OverflowBuffer ──► Cursor 0 ──► subscriber A    │
//!              ├──► (id 1) OverflowBuffer ──► Cursor 1 ──► subscriber B    │
//!              └──► (id 2) OverflowBuffer ──► Cursor 2 ──► subscriber C    ┘
//! ```
//!
//! ## Rules
//! - Ids are unique per stream and increase with subscription order.
//! - Dropping a cursor detaches it and aborts its buffer (a producer suspended on it is released).
//! - Closing the registry closes every buffer; cursors drain what is pending, then end.

use std::sync::Arc;

use crate::events::{Bus, Event, EventKind};
use crate::policies::{OverflowBuffer, OverflowPolicy};

/// Removes a cursor from the stream that created it.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

/// Ordered set of subscriber buffers owned by one hot stream.
pub(crate) struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Arc<OverflowBuffer<T>>)>,
    closed: bool,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
            closed: false,
        }
    }

    /// Registers a new buffer, optionally seeded with one value.
    ///
    /// On a closed registry the buffer starts closed (a seed is still readable once).
    pub(crate) fn attach(
        &mut self,
        capacity: usize,
        policy: OverflowPolicy,
        seed: Option<T>,
    ) -> (u64, Arc<OverflowBuffer<T>>) {
        let id = self.next_id;
        self.next_id += 1;
        let buffer = Arc::new(OverflowBuffer::new(capacity, policy));
        if let Some(v) = seed {
            buffer.offer(v);
        }
        if self.closed {
            buffer.close();
        } else {
            self.entries.push((id, Arc::clone(&buffer)));
        }
        (id, buffer)
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<Arc<OverflowBuffer<T>>> {
        let pos = self.entries.iter().position(|(eid, _)| *eid == id)?;
        Some(self.entries.remove(pos).1)
    }

    /// Snapshot of the active buffers, in subscription order.
    pub(crate) fn targets(&self) -> Vec<(u64, Arc<OverflowBuffer<T>>)> {
        self.entries
            .iter()
            .map(|(id, b)| (*id, Arc::clone(b)))
            .collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &(u64, Arc<OverflowBuffer<T>>)> {
        self.entries.iter()
    }

    /// Closes every buffer and refuses further registrations. Returns false if already closed.
    pub(crate) fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        for (_, buffer) in self.entries.drain(..) {
            buffer.close();
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Name and diagnostics sink of a hot stream.
#[derive(Clone)]
pub(crate) struct StreamMeta {
    pub(crate) name: Arc<str>,
    bus: Option<Bus>,
}

impl StreamMeta {
    pub(crate) fn new(name: impl Into<Arc<str>>, bus: Option<Bus>) -> Self {
        Self {
            name: name.into(),
            bus,
        }
    }

    /// A value was lost for cursor `id` because of its overflow policy.
    pub(crate) fn value_dropped(&self, id: u64, policy: OverflowPolicy) {
        tracing::debug!(
            stream = %self.name,
            cursor = id,
            policy = policy.as_label(),
            "value dropped for slow subscriber"
        );
        if let Some(bus) = &self.bus {
            bus.publish(
                Event::new(EventKind::ValueDropped)
                    .with_stream(Arc::clone(&self.name))
                    .with_cursor(id)
                    .with_reason(policy.as_label()),
            );
        }
    }

    /// A value was emitted with nobody subscribed.
    pub(crate) fn emission_dropped(&self) {
        tracing::debug!(stream = %self.name, "emission dropped: no subscribers");
        if let Some(bus) = &self.bus {
            bus.publish(Event::new(EventKind::EmissionDropped).with_stream(Arc::clone(&self.name)));
        }
    }

    pub(crate) fn closed(&self) {
        tracing::debug!(stream = %self.name, "stream closed");
        if let Some(bus) = &self.bus {
            bus.publish(Event::new(EventKind::StreamClosed).with_stream(Arc::clone(&self.name)));
        }
    }
}

/// Independent read position of one subscriber within a hot stream.
///
/// Obtained from [`StateCell::cursor`](crate::StateCell::cursor) or
/// [`Broadcast::cursor`](crate::Broadcast::cursor). Values are returned in
/// the order the stream accepted them; [`next`](Cursor::next) returns `None`
/// once the stream is closed and everything pending was read.
pub struct Cursor<T> {
    id: u64,
    buffer: Arc<OverflowBuffer<T>>,
    owner: Arc<dyn Detach>,
}

impl<T> Cursor<T> {
    pub(crate) fn new(id: u64, buffer: Arc<OverflowBuffer<T>>, owner: Arc<dyn Detach>) -> Self {
        Self { id, buffer, owner }
    }

    /// Waits for the next value.
    pub async fn next(&mut self) -> Option<T> {
        self.buffer.pop().await
    }

    /// Cursor id, unique within its stream.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of values waiting to be read.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl<T> std::fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("pending", &self.buffer.len())
            .field("closed", &self.buffer.is_closed())
            .finish()
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.owner.detach(self.id);
        self.buffer.abort();
    }
}
