//! # Scope: owner of streams and subscriptions.
//!
//! A [`Scope`] plays the role of a view-model: it creates hot streams bound to
//! its lifetime, launches subscriptions under child cancellation tokens, and
//! tears everything down in one step.
//!
//! ## Architecture
//! ```text
//! Scope::builder(cfg).with_observers(..).build()
//!   ├─ Bus (diagnostics)  ──► listener task ──► ObserverSet ──► observer workers
//!   ├─ runtime token
//!   │     ├─ child token ──► Subscription (launch / launch_latest / spawn)
//!   │     └─ child token ──► Subscription ...
//!   └─ streams (weak)     ──► StateCell / Broadcast created by the scope
//!
//! close():
//!   publish ScopeClosing
//!   cancel runtime token            → every subscription ends at its next suspension point
//!   close every stream              → cursors drain and end
//!   wait up to cfg.grace:
//!     ├─ all terminal  → publish ScopeClosed, Ok(())
//!     └─ grace elapsed → publish GraceExceeded, Err(RuntimeError::GraceExceeded { stuck })
//!   stop listener, drain observers
//! ```
//!
//! ## Rules
//! - Subscriptions launched after `close()` start already cancelled.
//! - Dropping a scope cancels and closes without waiting.
//! - Streams outlive the scope if cloned elsewhere, but stay closed.

use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::builder::ScopeBuilder;
use crate::core::{Config, Subscription, SubscriptionState};
use crate::error::{FlowError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::flows::ColdFlow;
use crate::hot::{Broadcast, StateCell};
use crate::policies::OverflowPolicy;

/// Teardown hook of a hot stream owned by a scope.
pub(crate) trait Close: Send + Sync {
    fn close(&self);
}

struct Tracked {
    name: Arc<str>,
    state: watch::Receiver<SubscriptionState>,
}

/// Owner of hot streams and subscriptions with one-shot teardown.
pub struct Scope {
    cfg: Config,
    bus: Bus,
    token: CancellationToken,
    subscriptions: Mutex<Vec<Tracked>>,
    streams: Mutex<Vec<Weak<dyn Close>>>,
    listener_stop: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Scope {
    /// Starts building a scope with the given configuration.
    pub fn builder(cfg: Config) -> ScopeBuilder {
        ScopeBuilder::new(cfg)
    }

    /// Creates a scope with the default configuration and no observers.
    ///
    /// Must be called within a tokio runtime.
    pub fn new() -> Self {
        ScopeBuilder::new(Config::default()).build()
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        token: CancellationToken,
        listener_stop: CancellationToken,
        listener: JoinHandle<()>,
    ) -> Self {
        Self {
            cfg,
            bus,
            token,
            subscriptions: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            listener_stop,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Configuration this scope was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Diagnostics bus of this scope.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// True once `close()` was called or the scope is being dropped.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of subscriptions launched by this scope that are still active.
    pub fn active_count(&self) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|t| !t.state.borrow().is_terminal())
            .count()
    }

    /// Creates a state cell closed together with this scope.
    pub fn state_cell<T>(&self, name: impl Into<Arc<str>>, initial: T) -> StateCell<T>
    where
        T: Clone + Send + 'static,
    {
        let cell = StateCell::with_options(
            name,
            initial,
            self.cfg.state_capacity_clamped(),
            Some(self.bus.clone()),
        );
        self.own(cell.closer());
        cell
    }

    /// Creates a broadcast channel with the configured capacity and overflow policy.
    pub fn broadcast<T>(&self, name: impl Into<Arc<str>>) -> Broadcast<T>
    where
        T: Clone + Send + 'static,
    {
        self.broadcast_with(name, self.cfg.buffer_capacity_clamped(), self.cfg.overflow)
    }

    /// Creates a broadcast channel with an explicit capacity and overflow policy.
    pub fn broadcast_with<T>(
        &self,
        name: impl Into<Arc<str>>,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> Broadcast<T>
    where
        T: Clone + Send + 'static,
    {
        let channel = Broadcast::with_options(name, capacity, policy, Some(self.bus.clone()));
        self.own(channel.closer());
        channel
    }

    /// Collects `flow` sequentially, cancelled together with this scope.
    pub fn launch<T, F, Fut>(&self, flow: &ColdFlow<T>, f: F) -> Subscription
    where
        T: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        self.spawn(flow.name().to_string(), flow.start().sequential(f))
    }

    /// Collects `flow` latest-only, cancelled together with this scope.
    pub fn launch_latest<T, F, Fut>(&self, flow: &ColdFlow<T>, f: F) -> Subscription
    where
        T: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        self.spawn(flow.name().to_string(), flow.start().latest(f))
    }

    /// Runs an arbitrary future as a named subscription of this scope.
    pub fn spawn<Fut>(&self, name: impl Into<Arc<str>>, fut: Fut) -> Subscription
    where
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        let sub = Subscription::spawn(
            name,
            self.token.child_token(),
            Some(self.bus.clone()),
            fut,
        );
        let mut subs = self.subscriptions.lock();
        subs.retain(|t| !t.state.borrow().is_terminal());
        subs.push(Tracked {
            name: Arc::from(sub.name()),
            state: sub.watch(),
        });
        sub
    }

    /// Runs blocking work on the blocking pool and hands the result back to the caller.
    ///
    /// Returns [`FlowError::Canceled`] if the scope closes first (the work itself
    /// runs to completion in the background), or [`FlowError::Panicked`] if it panics.
    pub async fn offload<R, F>(&self, name: &str, work: F) -> Result<R, FlowError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(work);
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                tracing::debug!(work = name, "offloaded work abandoned: scope closed");
                Err(FlowError::Canceled)
            }
            res = handle => res.map_err(|e| match e.try_into_panic() {
                Ok(panic) => FlowError::from_panic(&*panic),
                Err(_) => FlowError::Canceled,
            }),
        }
    }

    /// Cancels every subscription, closes every stream, and waits up to `cfg.grace`.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        tracing::debug!("scope closing");
        self.bus.publish(Event::new(EventKind::ScopeClosing));
        self.token.cancel();
        self.close_streams();

        let tracked: Vec<(Arc<str>, watch::Receiver<SubscriptionState>)> = self
            .subscriptions
            .lock()
            .iter()
            .map(|t| (Arc::clone(&t.name), t.state.clone()))
            .collect();

        let grace = self.cfg.grace;
        let waits = tracked.iter().map(|(_, rx)| {
            let mut rx = rx.clone();
            async move {
                let _ = rx.wait_for(SubscriptionState::is_terminal).await;
            }
        });
        let res = match tokio::time::timeout(grace, join_all(waits)).await {
            Ok(_) => {
                tracing::debug!("scope closed");
                self.bus.publish(Event::new(EventKind::ScopeClosed));
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<String> = tracked
                    .iter()
                    .filter(|(_, rx)| !rx.borrow().is_terminal())
                    .map(|(name, _)| name.to_string())
                    .collect();
                let err = RuntimeError::GraceExceeded { grace, stuck };
                tracing::warn!(error = %err, label = err.as_label(), "scope close exceeded grace");
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(err.as_message()));
                Err(err)
            }
        };

        self.stop_listener().await;
        res
    }

    // The cancelled check and the push happen under the same lock that
    // `close_streams` takes after cancelling, so no stream slips past close.
    fn own(&self, stream: Weak<dyn Close>) {
        let mut streams = self.streams.lock();
        if self.token.is_cancelled() {
            drop(streams);
            if let Some(s) = stream.upgrade() {
                s.close();
            }
            return;
        }
        streams.retain(|w| w.strong_count() > 0);
        streams.push(stream);
    }

    fn close_streams(&self) {
        let streams: Vec<Weak<dyn Close>> = std::mem::take(&mut *self.streams.lock());
        for stream in streams.iter().filter_map(Weak::upgrade) {
            stream.close();
        }
    }

    async fn stop_listener(&self) {
        self.listener_stop.cancel();
        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.token.cancel();
        self.close_streams();
        self.listener_stop.cancel();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("closed", &self.is_closed())
            .field("active", &self.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::sleep;

    use crate::flows::Emitter;
    use crate::observers::Observe;

    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Observe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn ticker() -> ColdFlow<u64> {
        ColdFlow::new("ticker", |em: Emitter<u64>| async move {
            for n in 0u64.. {
                em.emit(n).await?;
                sleep(Duration::from_secs(1)).await;
            }
            Ok::<(), FlowError>(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_everything() {
        let recorder = Arc::new(Recorder {
            kinds: Mutex::new(Vec::new()),
        });
        let scope = Scope::builder(Config::default())
            .with_observers(vec![recorder.clone()])
            .build();

        let counter = scope.state_cell("counter", 0u32);
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let a = {
            let ticks = ticks.clone();
            scope.launch(&ticker(), move |n| {
                ticks.lock().push(n);
                async { Ok(()) }
            })
        };
        let b = scope.launch(&counter.flow(), |_| async { Ok(()) });
        assert_eq!(scope.active_count(), 2);

        sleep(Duration::from_millis(2500)).await;
        scope.close().await.unwrap();

        assert_eq!(a.state(), SubscriptionState::Cancelled);
        assert!(b.state().is_terminal());
        assert!(counter.is_closed());
        assert!(scope.is_closed());
        assert_eq!(*ticks.lock(), vec![0, 1, 2]);

        // nothing runs after close
        sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.lock().len(), 3);
        let late = scope.launch(&ticker(), |_| async { Ok(()) });
        assert_eq!(late.join().await, SubscriptionState::Cancelled);

        let kinds = recorder.kinds.lock().clone();
        assert!(kinds.contains(&EventKind::SubscriptionStarted));
        assert!(kinds.contains(&EventKind::SubscriptionCancelled));
        assert!(kinds.contains(&EventKind::StreamClosed));
        assert_eq!(kinds.last(), Some(&EventKind::ScopeClosed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_grace_exceeded_names_stuck_subscriptions() {
        let scope = Scope::builder(Config {
            grace: Duration::from_millis(50),
            ..Config::default()
        })
        .build();
        // blocks its worker thread, so cancellation cannot interrupt it
        let _sub = scope.spawn("blocking-decoder", async {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        sleep(Duration::from_millis(20)).await;

        match scope.close().await {
            Err(RuntimeError::GraceExceeded { stuck, grace }) => {
                assert_eq!(grace, Duration::from_millis(50));
                assert_eq!(stuck, vec!["blocking-decoder".to_string()]);
            }
            other => panic!("expected grace exceeded, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_owned_by_scope() {
        let scope = Scope::new();
        let squares: Broadcast<u64> = scope.broadcast("squares");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            scope.launch(&squares.flow(), move |v| {
                seen.lock().push(v);
                async { Ok(()) }
            })
        };

        for v in 1..=3u64 {
            assert_eq!(squares.emit(v * v).await, Ok(1));
        }
        sleep(Duration::from_millis(1)).await;
        drop(scope);

        assert_eq!(sub.join().await, SubscriptionState::Cancelled);
        assert_eq!(*seen.lock(), vec![1, 4, 9]);
        assert_eq!(squares.emit(16).await, Err(FlowError::Closed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_streams_created_during_close_are_closed() {
        let scope = Arc::new(Scope::new());
        let creator = {
            let scope = scope.clone();
            tokio::task::spawn_blocking(move || {
                (0..2000u32)
                    .map(|i| scope.state_cell(format!("cell-{i}"), i))
                    .collect::<Vec<_>>()
            })
        };
        tokio::task::yield_now().await;
        scope.close().await.unwrap();

        let cells = creator.await.unwrap();
        assert_eq!(cells.len(), 2000);
        assert!(cells.iter().all(StateCell::is_closed));
        assert!(scope.state_cell("late", 0u8).is_closed());
    }

    #[tokio::test]
    async fn test_offload_returns_result_and_panics() {
        let scope = Scope::new();
        let sum = scope
            .offload("sum", || (1..=100u64).sum::<u64>())
            .await
            .unwrap();
        assert_eq!(sum, 5050);

        let res = scope
            .offload("broken", || -> u64 { panic!("decoder crashed") })
            .await;
        assert_eq!(
            res,
            Err(FlowError::Panicked {
                info: "decoder crashed".into()
            })
        );

        scope.close().await.unwrap();
        assert_eq!(scope.offload("late", || 1).await, Err(FlowError::Canceled));
    }
}
