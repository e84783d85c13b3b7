//! # Diagnostics events emitted by scopes, streams and subscriptions.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Subscription events**: connection lifecycle (started, completed, cancelled, failed)
//! - **Stream events**: values lost to an overflow policy or to a missing audience
//! - **Observer events**: observer workers that dropped events or panicked
//! - **Scope events**: owner shutdown progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! subscription and stream names, and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use flowvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::SubscriptionFailed)
//!     .with_subscription("counter-ui")
//!     .with_reason("collector failed: boom");
//!
//! assert_eq!(ev.kind, EventKind::SubscriptionFailed);
//! assert_eq!(ev.subscription.as_deref(), Some("counter-ui"));
//! assert_eq!(ev.reason.as_deref(), Some("collector failed: boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostics events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscription events ===
    /// A subscription task started collecting.
    ///
    /// Sets:
    /// - `subscription`: subscription name
    SubscriptionStarted,

    /// The source completed (cold producer finished or hot stream closed).
    ///
    /// Sets:
    /// - `subscription`: subscription name
    SubscriptionCompleted,

    /// The subscription was cancelled (explicitly, by its scope, or by its lifecycle).
    ///
    /// Sets:
    /// - `subscription`: subscription name
    SubscriptionCancelled,

    /// The producer or the collector failed; the connection is terminal.
    ///
    /// Sets:
    /// - `subscription`: subscription name
    /// - `reason`: failure message
    SubscriptionFailed,

    // === Stream events ===
    /// A value was lost for one subscriber because of its overflow policy.
    ///
    /// Sets:
    /// - `stream`: stream name
    /// - `cursor`: subscriber cursor id
    /// - `reason`: policy label (`drop_oldest` / `drop_newest`)
    ValueDropped,

    /// A broadcast value was emitted while nobody was subscribed.
    ///
    /// Sets:
    /// - `stream`: stream name
    EmissionDropped,

    /// A stream was closed by its owner.
    ///
    /// Sets:
    /// - `stream`: stream name
    StreamClosed,

    // === Observer events ===
    /// Observer panicked during event processing.
    ///
    /// Sets:
    /// - `subscription`: observer name
    /// - `reason`: panic info/message
    ObserverPanicked,

    /// Observer dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscription`: observer name
    /// - `reason`: reason string (e.g., "full", "closed")
    ObserverOverflow,

    // === Scope events ===
    /// The owning scope started closing.
    ScopeClosing,

    /// Every subscription of the scope terminated within the grace period.
    ScopeClosed,

    /// Grace period exceeded; some subscriptions did not stop in time.
    ///
    /// Sets:
    /// - `reason`: names of the stuck subscriptions
    GraceExceeded,
}

/// Diagnostics event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the subscription (or observer), if applicable.
    pub subscription: Option<Arc<str>>,
    /// Name of the stream, if applicable.
    pub stream: Option<Arc<str>>,
    /// Subscriber cursor id within a hot stream.
    pub cursor: Option<u64>,
    /// Human-readable reason (errors, drop policy, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subscription: None,
            stream: None,
            cursor: None,
            reason: None,
        }
    }

    /// Attaches a subscription name.
    #[inline]
    pub fn with_subscription(mut self, name: impl Into<Arc<str>>) -> Self {
        self.subscription = Some(name.into());
        self
    }

    /// Attaches a stream name.
    #[inline]
    pub fn with_stream(mut self, name: impl Into<Arc<str>>) -> Self {
        self.stream = Some(name.into());
        self
    }

    /// Attaches a cursor id.
    #[inline]
    pub fn with_cursor(mut self, id: u64) -> Self {
        self.cursor = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates an observer overflow event.
    #[inline]
    pub fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::ObserverOverflow)
            .with_subscription(observer)
            .with_reason(format!("observer={observer} reason={reason}"))
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        Event::new(EventKind::ObserverPanicked)
            .with_subscription(observer)
            .with_reason(info)
    }

    #[inline]
    pub fn is_observer_overflow(&self) -> bool {
        matches!(self.kind, EventKind::ObserverOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::ScopeClosing);
        let b = Event::new(EventKind::ScopeClosed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_attach_metadata() {
        let ev = Event::new(EventKind::ValueDropped)
            .with_stream("squares")
            .with_cursor(3)
            .with_reason("drop_oldest");
        assert_eq!(ev.stream.as_deref(), Some("squares"));
        assert_eq!(ev.cursor, Some(3));
        assert!(ev.subscription.is_none());

        let ov = Event::observer_overflow("metrics", "full");
        assert!(ov.is_observer_overflow());
        assert_eq!(ov.reason.as_deref(), Some("observer=metrics reason=full"));
    }
}
