//! # Rendezvous hand-off between a producer and its collector.
//!
//! Every collection of a [`ColdFlow`](crate::ColdFlow) creates a fresh [`Emitter`]
//! and receiver pair. [`Emitter::emit`] parks the producer until the collector
//! acknowledges the value:
//!
//! ```text
//! producer ── emit(v) ──► [slot] ──► collector
//!     ▲                                  │
//!     └──────────── ack ◄────────────────┘  (after the callback, or immediately
//!                                            for latest-only collection)
//! ```
//!
//! The producer therefore never runs ahead of a sequential collector, which
//! is what makes a cold flow suspend between values.

use tokio::sync::{mpsc, oneshot};

use crate::error::FlowError;

/// Handle used by a producer procedure to emit values to its collector.
///
/// Cloning is cheap; all clones feed the same collection.
pub struct Emitter<T> {
    tx: mpsc::Sender<Delivery<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<T> Emitter<T> {
    /// Emits one value and waits until the collector accepted it.
    ///
    /// Returns [`FlowError::Canceled`] once the collector is gone (cancelled,
    /// failed, or finished early); producers should stop on error, usually with `?`.
    pub async fn emit(&self, value: T) -> Result<(), FlowError> {
        let (ack, accepted) = oneshot::channel();
        self.tx
            .send(Delivery { value, ack })
            .await
            .map_err(|_| FlowError::Canceled)?;
        accepted.await.map_err(|_| FlowError::Canceled)
    }

    /// True once the collector stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One emitted value plus its acknowledgement slot.
pub(crate) struct Delivery<T> {
    value: T,
    ack: oneshot::Sender<()>,
}

impl<T> Delivery<T> {
    /// Splits the delivery into the value and its acknowledgement.
    pub(crate) fn into_parts(self) -> (T, Ack) {
        (self.value, Ack(self.ack))
    }
}

/// Acknowledgement that releases a producer parked in [`Emitter::emit`].
pub(crate) struct Ack(oneshot::Sender<()>);

impl Ack {
    /// Releases the producer.
    pub(crate) fn done(self) {
        let _ = self.0.send(());
    }
}

/// Creates a connected emitter/receiver pair for one collection.
pub(crate) fn channel<T>() -> (Emitter<T>, mpsc::Receiver<Delivery<T>>) {
    let (tx, rx) = mpsc::channel(1);
    (Emitter { tx }, rx)
}
