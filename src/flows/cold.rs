//! # Cold flows: definitions that re-run per collection.
//!
//! A [`ColdFlow`] stores nothing but a producer procedure. Every terminal
//! operation ([`collect`](ColdFlow::collect), [`collect_latest`](ColdFlow::collect_latest),
//! [`count`](ColdFlow::count), [`to_vec`](ColdFlow::to_vec)) and every
//! [`subscribe`](ColdFlow::subscribe) call starts the producer from the beginning
//! with its own [`Emitter`], so concurrent collections never share state or timing.
//!
//! ## Consumption modes
//! ```text
//! collect (sequential):
//!   emit(a) ──► f(a) ──────────► ack ──► emit(b) ──► f(b) ──► ack
//!   (the producer is parked until the callback finished)
//!
//! collect_latest (latest-only):
//!   emit(a) ──► f(a) ··· emit(b) ──► drop f(a), f(b) ··· emit(c) ──► drop f(b), f(c) ──► done
//!   (the producer is released immediately; a newer value cancels the running callback)
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use flowvisor::{ColdFlow, Emitter, FlowError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), FlowError> {
//! let countdown = ColdFlow::new("countdown", |em: Emitter<u32>| async move {
//!     for v in (0..=3).rev() {
//!         em.emit(v).await?;
//!         tokio::time::sleep(Duration::from_millis(1)).await;
//!     }
//!     Ok::<(), FlowError>(())
//! });
//!
//! assert_eq!(countdown.to_vec().await?, vec![3, 2, 1, 0]);
//! assert_eq!(countdown.count(|v| v % 2 == 0).await?, 2);
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::Subscription;
use crate::error::FlowError;
use crate::flows::emitter::{self, Delivery, Emitter};

/// Producer procedure shared by every collection of a flow.
type ProducerFn<T> = dyn Fn(Emitter<T>) -> BoxFuture<'static, Result<(), FlowError>> + Send + Sync;

/// Stateless definition of a stream that restarts its work for every collector.
pub struct ColdFlow<T> {
    name: Cow<'static, str>,
    producer: Arc<ProducerFn<T>>,
}

impl<T> Clone for ColdFlow<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T> std::fmt::Debug for ColdFlow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColdFlow").field("name", &self.name).finish()
    }
}

impl<T: Send + 'static> ColdFlow<T> {
    /// Creates a flow from a producer procedure.
    ///
    /// The closure is called once per collection and receives a fresh [`Emitter`].
    /// It must not keep state between calls; use `Arc<...>` explicitly if sharing is wanted.
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, producer: F) -> Self
    where
        F: Fn(Emitter<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            producer: Arc::new(move |em| producer(em).boxed()),
        }
    }

    /// Creates a flow that emits a fixed sequence of values.
    pub fn from_iter<I>(name: impl Into<Cow<'static, str>>, items: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send,
    {
        Self::new(name, move |em: Emitter<T>| {
            let items = items.clone();
            async move {
                for v in items {
                    em.emit(v).await?;
                }
                Ok::<(), FlowError>(())
            }
        })
    }

    /// Creates a flow that completes without emitting.
    pub fn empty(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, |_em: Emitter<T>| async { Ok(()) })
    }

    /// Returns the flow name (used for subscriptions, logs and events).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts one independent run: calls the producer closure now, polls nothing yet.
    ///
    /// Synchronous setup inside the closure (such as attaching a hot-stream
    /// cursor) therefore happens at subscription time, not when the task first runs.
    pub(crate) fn start(&self) -> Collection<T> {
        let (em, rx) = emitter::channel();
        Collection {
            producer: (self.producer)(em),
            rx,
        }
    }

    /// Collects every value sequentially.
    ///
    /// Each value is fully processed by `f` before the producer may emit the next one.
    /// Returns the first error raised by either side; the other side is dropped.
    pub async fn collect<F, Fut>(&self, f: F) -> Result<(), FlowError>
    where
        F: FnMut(T) -> Fut + Send,
        Fut: Future<Output = Result<(), FlowError>> + Send,
    {
        self.start().sequential(f).await
    }

    /// Collects values, always working on the most recent one.
    ///
    /// When a new value arrives while `f` is still running for the previous one,
    /// the running callback is dropped (cancelled at its current suspension point)
    /// and `f` starts again with the new value. The last value is always processed
    /// to completion.
    pub async fn collect_latest<F, Fut>(&self, f: F) -> Result<(), FlowError>
    where
        F: FnMut(T) -> Fut + Send,
        Fut: Future<Output = Result<(), FlowError>> + Send,
    {
        self.start().latest(f).await
    }

    /// Runs the flow to completion and counts the values matching `pred`.
    pub async fn count<P>(&self, mut pred: P) -> Result<usize, FlowError>
    where
        P: FnMut(&T) -> bool + Send,
    {
        let mut matched = 0usize;
        self.collect(|v| {
            if pred(&v) {
                matched += 1;
            }
            async { Ok(()) }
        })
        .await?;
        Ok(matched)
    }

    /// Runs the flow to completion and returns every value in emission order.
    pub async fn to_vec(&self) -> Result<Vec<T>, FlowError> {
        let mut out = Vec::new();
        self.collect(|v| {
            out.push(v);
            async { Ok(()) }
        })
        .await?;
        Ok(out)
    }

    /// Collects sequentially on a new task and returns its cancel handle.
    ///
    /// The subscription is not bound to any owner; prefer
    /// [`Scope::launch`](crate::Scope::launch) for structured cancellation.
    pub fn subscribe<F, Fut>(&self, f: F) -> Subscription
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        Subscription::spawn(
            self.name(),
            CancellationToken::new(),
            None,
            self.start().sequential(f),
        )
    }

    /// Collects latest-only on a new task and returns its cancel handle.
    pub fn subscribe_latest<F, Fut>(&self, f: F) -> Subscription
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        Subscription::spawn(
            self.name(),
            CancellationToken::new(),
            None,
            self.start().latest(f),
        )
    }
}

/// One started run of a flow: the producer future plus the collector end of its emitter.
pub(crate) struct Collection<T> {
    producer: BoxFuture<'static, Result<(), FlowError>>,
    rx: mpsc::Receiver<Delivery<T>>,
}

impl<T: Send + 'static> Collection<T> {
    /// Drives the run in sequential mode.
    pub(crate) async fn sequential<F, Fut>(self, mut f: F) -> Result<(), FlowError>
    where
        F: FnMut(T) -> Fut + Send,
        Fut: Future<Output = Result<(), FlowError>> + Send,
    {
        let Collection { producer, mut rx } = self;
        let consumer = async move {
            while let Some(delivery) = rx.recv().await {
                let (value, ack) = delivery.into_parts();
                f(value).await?;
                ack.done();
            }
            Ok::<(), FlowError>(())
        };
        try_join(producer, consumer).await.map(|_| ())
    }

    /// Drives the run in latest-only mode.
    pub(crate) async fn latest<F, Fut>(self, mut f: F) -> Result<(), FlowError>
    where
        F: FnMut(T) -> Fut + Send,
        Fut: Future<Output = Result<(), FlowError>> + Send,
    {
        let Collection { producer, mut rx } = self;
        let consumer = async move {
            let mut running: Option<Pin<Box<Fut>>> = None;
            loop {
                tokio::select! {
                    biased;
                    next = rx.recv() => match next {
                        Some(delivery) => {
                            let (value, ack) = delivery.into_parts();
                            ack.done();
                            running = Some(Box::pin(f(value)));
                        }
                        None => {
                            if let Some(last) = running.take() {
                                last.await?;
                            }
                            return Ok::<(), FlowError>(());
                        }
                    },
                    res = async {
                        match running.as_mut() {
                            Some(fut) => fut.await,
                            None => std::future::pending().await,
                        }
                    }, if running.is_some() => {
                        running = None;
                        res?;
                    }
                }
            }
        };
        try_join(producer, consumer).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    use crate::core::SubscriptionState;

    const UNIT: Duration = Duration::from_secs(1);

    fn countdown() -> ColdFlow<u32> {
        ColdFlow::new("countdown", |em: Emitter<u32>| async move {
            let mut current = 10;
            em.emit(current).await?;
            while current > 0 {
                sleep(UNIT).await;
                current -= 1;
                em.emit(current).await?;
            }
            Ok::<(), FlowError>(())
        })
    }

    /// Emits 0, 1, 2 at t=0, 1, 2.
    fn ticks() -> ColdFlow<u32> {
        ColdFlow::new("ticks", |em: Emitter<u32>| async move {
            for v in 0..3 {
                if v > 0 {
                    sleep(UNIT).await;
                }
                em.emit(v).await?;
            }
            Ok::<(), FlowError>(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_collections_are_independent() {
        let flow = countdown();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let seen = first.clone();
            flow.subscribe(move |v| {
                seen.lock().push(v);
                async { Ok(()) }
            })
        };
        sleep(Duration::from_millis(3500)).await;
        let b = {
            let seen = second.clone();
            flow.subscribe(move |v| {
                seen.lock().push(v);
                async { Ok(()) }
            })
        };

        assert_eq!(a.join().await, SubscriptionState::Completed);
        assert_eq!(b.join().await, SubscriptionState::Completed);
        let expected: Vec<u32> = (0..=10).rev().collect();
        assert_eq!(*first.lock(), expected);
        assert_eq!(*second.lock(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_waits_for_each_callback() {
        let start = Instant::now();
        let processed = Arc::new(Mutex::new(Vec::new()));
        let seen = processed.clone();

        ticks()
            .collect(move |v| {
                let seen = seen.clone();
                async move {
                    sleep(Duration::from_millis(1500)).await;
                    seen.lock().push((v, start.elapsed()));
                    Ok(())
                }
            })
            .await
            .unwrap();

        let processed = processed.lock().clone();
        assert_eq!(
            processed.iter().map(|(v, _)| *v).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        // 0 done at 1.5; producer resumes, waits 1s, 1 done at 4.0; 2 done at 6.5
        assert_eq!(processed[0].1, Duration::from_millis(1500));
        assert_eq!(processed[1].1, Duration::from_millis(4000));
        assert_eq!(processed[2].1, Duration::from_millis(6500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_cancels_stale_callbacks() {
        let start = Instant::now();
        let started = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(Mutex::new(Vec::new()));

        {
            let started = started.clone();
            let finished = finished.clone();
            ticks()
                .collect_latest(move |v| {
                    started.lock().push((v, start.elapsed()));
                    let finished = finished.clone();
                    async move {
                        sleep(Duration::from_millis(1500)).await;
                        finished.lock().push((v, start.elapsed()));
                        Ok(())
                    }
                })
                .await
                .unwrap();
        }

        assert_eq!(
            *started.lock(),
            vec![(0, Duration::ZERO), (1, UNIT), (2, 2 * UNIT)]
        );
        assert_eq!(*finished.lock(), vec![(2, Duration::from_millis(3500))]);
    }

    #[tokio::test]
    async fn test_producer_failure_reaches_collector() {
        let flow = ColdFlow::new("failing", |em: Emitter<u8>| async move {
            em.emit(1).await?;
            Err(FlowError::producer("sensor offline"))
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let res = flow
            .collect(move |v| {
                sink.lock().push(v);
                async { Ok(()) }
            })
            .await;
        assert_eq!(res, Err(FlowError::producer("sensor offline")));
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_producer_failure_stays_in_its_own_collection() {
        let runs = Arc::new(Mutex::new(0u32));
        let counter = runs.clone();
        let flow = ColdFlow::new("readings", move |em: Emitter<u32>| {
            let run = {
                let mut runs = counter.lock();
                *runs += 1;
                *runs
            };
            async move {
                em.emit(1).await?;
                if run == 1 {
                    return Err(FlowError::producer("sensor offline"));
                }
                em.emit(2).await?;
                em.emit(3).await?;
                Ok(())
            }
        });

        let a = flow.subscribe(|_| async { Ok(()) });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let b = {
            let seen = seen.clone();
            flow.subscribe(move |v| {
                seen.lock().push(v);
                async { Ok(()) }
            })
        };

        assert_eq!(
            a.join().await,
            SubscriptionState::Failed(FlowError::producer("sensor offline"))
        );
        assert_eq!(b.join().await, SubscriptionState::Completed);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_collector_failure_stops_producer() {
        let produced = Arc::new(Mutex::new(0u32));
        let counter = produced.clone();
        let flow = ColdFlow::new("numbers", move |em: Emitter<u32>| {
            let counter = counter.clone();
            async move {
                for v in 0..100 {
                    *counter.lock() += 1;
                    em.emit(v).await?;
                }
                Ok::<(), FlowError>(())
            }
        });

        let res = flow
            .collect(|v| async move {
                if v == 2 {
                    Err(FlowError::collector("rejected"))
                } else {
                    Ok(())
                }
            })
            .await;
        assert_eq!(res, Err(FlowError::collector("rejected")));
        assert_eq!(*produced.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_delay_stops_delivery() {
        let flow = countdown();
        let cancelled = Arc::new(Mutex::new(Vec::new()));
        let survivor = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let seen = cancelled.clone();
            flow.subscribe(move |v| {
                seen.lock().push(v);
                async { Ok(()) }
            })
        };
        let b = {
            let seen = survivor.clone();
            flow.subscribe(move |v| {
                seen.lock().push(v);
                async { Ok(()) }
            })
        };

        sleep(Duration::from_millis(2500)).await;
        a.cancel();

        assert_eq!(a.join().await, SubscriptionState::Cancelled);
        assert_eq!(b.join().await, SubscriptionState::Completed);
        assert_eq!(*cancelled.lock(), vec![10, 9, 8]);
        assert_eq!(survivor.lock().len(), 11);
    }

    #[tokio::test]
    async fn test_from_iter_and_empty() {
        let flow = ColdFlow::from_iter("dishes", vec!["appetizer", "main", "dessert"]);
        assert_eq!(flow.to_vec().await.unwrap(), vec!["appetizer", "main", "dessert"]);
        // a second run starts from the beginning
        assert_eq!(flow.count(|d| d.starts_with('d')).await.unwrap(), 1);

        let none: ColdFlow<u8> = ColdFlow::empty("none");
        assert!(none.to_vec().await.unwrap().is_empty());
        assert_eq!(none.name(), "none");
    }
}
