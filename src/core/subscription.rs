//! # Subscription: one running collection on its own task.
//!
//! A [`Subscription`] is the handle returned by every `subscribe`/`launch` call.
//! The collection runs concurrently with the caller; the handle can cancel it,
//! inspect its state, or wait for the terminal state.
//!
//! ## State machine
//! ```text
//!            ┌─► Completed   producer finished, or the stream was closed
//! Active ────┼─► Cancelled   cancel(), owner scope closed, or the handle was told to stop
//!            └─► Failed(e)   producer/collector error, or a panic inside either
//! ```
//!
//! ## Rules
//! - Terminal states are final; `cancel()` after completion is a no-op.
//! - Cancellation takes effect at the next suspension point of the collection:
//!   a value whose callback has not started is never delivered afterwards.
//! - A panic inside the producer or the callback is caught and reported as
//!   [`FlowError::Panicked`]; it never tears down the owner.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;
use crate::events::{Bus, Event, EventKind};

/// Lifecycle state of a [`Subscription`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Still collecting.
    Active,
    /// Stopped by cancellation.
    Cancelled,
    /// Stopped by an error or a panic.
    Failed(FlowError),
    /// Finished normally.
    Completed,
}

impl SubscriptionState {
    /// True for every state except [`SubscriptionState::Active`].
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubscriptionState::Active)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriptionState::Active => "active",
            SubscriptionState::Cancelled => "cancelled",
            SubscriptionState::Failed(_) => "failed",
            SubscriptionState::Completed => "completed",
        }
    }

    fn from_outcome(res: Result<(), FlowError>) -> Self {
        match res {
            Ok(()) | Err(FlowError::Closed) => SubscriptionState::Completed,
            Err(FlowError::Canceled) => SubscriptionState::Cancelled,
            Err(e) => SubscriptionState::Failed(e),
        }
    }
}

/// Cancel handle and state view of one running collection.
#[derive(Clone)]
pub struct Subscription {
    name: Arc<str>,
    token: CancellationToken,
    state: watch::Receiver<SubscriptionState>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl Subscription {
    /// Spawns `run` on a new task, racing it against `token`.
    pub(crate) fn spawn<Fut>(
        name: impl Into<Arc<str>>,
        token: CancellationToken,
        bus: Option<Bus>,
        run: Fut,
    ) -> Subscription
    where
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        let name: Arc<str> = name.into();
        let (tx, rx) = watch::channel(SubscriptionState::Active);

        tracing::debug!(subscription = %name, "subscription started");
        if let Some(bus) = &bus {
            bus.publish(
                Event::new(EventKind::SubscriptionStarted).with_subscription(Arc::clone(&name)),
            );
        }

        let task_name = Arc::clone(&name);
        let task_token = token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = task_token.cancelled() => SubscriptionState::Cancelled,
                res = AssertUnwindSafe(run).catch_unwind() => match res {
                    Ok(res) => SubscriptionState::from_outcome(res),
                    Err(panic) => SubscriptionState::Failed(FlowError::from_panic(&*panic)),
                },
            };
            report(&task_name, &outcome, bus.as_ref());
            tx.send_replace(outcome);
        });

        Subscription {
            name,
            token,
            state: rx,
        }
    }

    /// Requests cancellation; no-op once the subscription is terminal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Current state.
    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    /// True while the subscription is collecting.
    pub fn is_active(&self) -> bool {
        !self.state.borrow().is_terminal()
    }

    /// Subscription name (the flow or stream name, or the name given to `launch`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the terminal state.
    pub async fn join(mut self) -> SubscriptionState {
        let waited = self
            .state
            .wait_for(SubscriptionState::is_terminal)
            .await
            .map(|s| s.clone());
        match waited {
            Ok(state) => state,
            Err(_) => {
                // task vanished without reporting (runtime shut down)
                let last = self.state.borrow().clone();
                if last.is_terminal() {
                    last
                } else {
                    SubscriptionState::Cancelled
                }
            }
        }
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }
}

fn report(name: &Arc<str>, outcome: &SubscriptionState, bus: Option<&Bus>) {
    let event = match outcome {
        SubscriptionState::Failed(e) => {
            tracing::warn!(subscription = %name, error = %e, label = e.as_label(), "subscription failed");
            Event::new(EventKind::SubscriptionFailed).with_reason(e.as_message())
        }
        SubscriptionState::Cancelled => {
            tracing::debug!(subscription = %name, "subscription cancelled");
            Event::new(EventKind::SubscriptionCancelled)
        }
        SubscriptionState::Completed | SubscriptionState::Active => {
            tracing::debug!(subscription = %name, "subscription completed");
            Event::new(EventKind::SubscriptionCompleted)
        }
    };
    if let Some(bus) = bus {
        bus.publish(event.with_subscription(Arc::clone(name)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_outcome_mapping() {
        let ok = Subscription::spawn("ok", CancellationToken::new(), None, async { Ok(()) });
        let closed = Subscription::spawn("closed", CancellationToken::new(), None, async {
            Err(FlowError::Closed)
        });
        let failed = Subscription::spawn("failed", CancellationToken::new(), None, async {
            Err(FlowError::producer("boom"))
        });
        assert_eq!(ok.join().await, SubscriptionState::Completed);
        assert_eq!(closed.join().await, SubscriptionState::Completed);
        assert_eq!(
            failed.join().await,
            SubscriptionState::Failed(FlowError::producer("boom"))
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let sub = Subscription::spawn("panicky", CancellationToken::new(), None, async {
            if true {
                panic!("collector exploded");
            }
            Ok(())
        });
        assert_eq!(
            sub.join().await,
            SubscriptionState::Failed(FlowError::Panicked {
                info: "collector exploded".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_final() {
        let sub = Subscription::spawn("forever", CancellationToken::new(), None, async {
            sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        assert!(sub.is_active());
        assert_eq!(sub.name(), "forever");

        sub.cancel();
        let handle = sub.clone();
        assert_eq!(sub.join().await, SubscriptionState::Cancelled);
        handle.cancel();
        assert_eq!(handle.state(), SubscriptionState::Cancelled);
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn test_lifecycle_events_published() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let sub = Subscription::spawn("ticker", CancellationToken::new(), Some(bus), async {
            Err(FlowError::collector("bad value"))
        });
        sub.join().await;

        let started = rx.recv().await.unwrap();
        assert_eq!(started.kind, EventKind::SubscriptionStarted);
        assert_eq!(started.subscription.as_deref(), Some("ticker"));
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::SubscriptionFailed);
        assert_eq!(
            failed.reason.as_deref(),
            Some(FlowError::collector("bad value").as_message().as_str())
        );
    }
}
