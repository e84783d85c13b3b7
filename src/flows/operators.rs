//! # Derived flows.
//!
//! Every operator returns a new [`ColdFlow`] whose producer collects the upstream
//! flow and re-emits into its own [`Emitter`]. Nothing is shared between
//! collections: counters, buffers and the upstream run itself are created inside
//! the producer, per collection.
//!
//! | Operator                          | Effect                                                   |
//! |-----------------------------------|----------------------------------------------------------|
//! | [`filter`](ColdFlow::filter)      | keeps values matching a predicate                        |
//! | [`map`](ColdFlow::map)            | transforms each value                                    |
//! | [`on_each`](ColdFlow::on_each)    | side-effect tap, value passes through unchanged          |
//! | [`take`](ColdFlow::take)          | first `n` values, then stops the upstream                |
//! | [`buffer`](ColdFlow::buffer)      | lets the upstream run ahead through an overflow buffer   |
//! | [`conflate`](ColdFlow::conflate)  | `buffer(1, DropOldest)`: slow collectors see the newest  |

use std::sync::Arc;

use futures::future::join;

use crate::error::FlowError;
use crate::flows::{ColdFlow, Emitter};
use crate::policies::{OverflowBuffer, OverflowPolicy};

impl<T: Send + 'static> ColdFlow<T> {
    /// Keeps only the values for which `pred` returns `true`.
    pub fn filter<P>(&self, pred: P) -> ColdFlow<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let pred = Arc::new(pred);
        ColdFlow::new(format!("{}.filter", self.name()), move |em: Emitter<T>| {
            let upstream = upstream.clone();
            let pred = Arc::clone(&pred);
            async move {
                upstream
                    .collect(|v| {
                        let keep = pred(&v);
                        let em = em.clone();
                        async move { if keep { em.emit(v).await } else { Ok(()) } }
                    })
                    .await
            }
        })
    }

    /// Transforms every value with `f`.
    pub fn map<U, F>(&self, f: F) -> ColdFlow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        ColdFlow::new(format!("{}.map", self.name()), move |em: Emitter<U>| {
            let upstream = upstream.clone();
            let f = Arc::clone(&f);
            async move {
                upstream
                    .collect(|v| {
                        let out = f(v);
                        let em = em.clone();
                        async move { em.emit(out).await }
                    })
                    .await
            }
        })
    }

    /// Calls `f` for every value before passing it downstream unchanged.
    pub fn on_each<F>(&self, f: F) -> ColdFlow<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        ColdFlow::new(format!("{}.on_each", self.name()), move |em: Emitter<T>| {
            let upstream = upstream.clone();
            let f = Arc::clone(&f);
            async move {
                upstream
                    .collect(|v| {
                        f(&v);
                        let em = em.clone();
                        async move { em.emit(v).await }
                    })
                    .await
            }
        })
    }

    /// Emits the first `n` values, then stops the upstream producer.
    pub fn take(&self, n: usize) -> ColdFlow<T> {
        let upstream = self.clone();
        ColdFlow::new(format!("{}.take", self.name()), move |em: Emitter<T>| {
            let upstream = upstream.clone();
            async move {
                if n == 0 {
                    return Ok(());
                }
                let mut left = n;
                let res = upstream
                    .collect(|v| {
                        left -= 1;
                        let reached = left == 0;
                        let em = em.clone();
                        async move {
                            em.emit(v).await?;
                            // unwinds the upstream; mapped back to Ok below
                            if reached { Err(FlowError::Closed) } else { Ok(()) }
                        }
                    })
                    .await;
                match res {
                    Err(FlowError::Closed) if left == 0 => Ok(()),
                    other => other,
                }
            }
        })
    }

    /// Runs the upstream producer ahead of the collector through a bounded buffer.
    ///
    /// - `OverflowPolicy::Suspend`: the upstream waits once `capacity` values are pending.
    /// - `OverflowPolicy::DropOldest`: pending values are replaced by newer ones.
    /// - `OverflowPolicy::DropNewest`: values arriving while the buffer is full are lost.
    ///
    /// Values already buffered are delivered before an upstream failure is surfaced.
    pub fn buffer(&self, capacity: usize, policy: OverflowPolicy) -> ColdFlow<T> {
        let upstream = self.clone();
        ColdFlow::new(format!("{}.buffer", self.name()), move |em: Emitter<T>| {
            let upstream = upstream.clone();
            async move {
                let buffer = OverflowBuffer::new(capacity, policy);
                let fill = async {
                    let res = upstream
                        .collect(|v| {
                            let buffer = &buffer;
                            async move {
                                let pushed = buffer.push(v).await?;
                                if pushed.dropped() {
                                    tracing::debug!(
                                        policy = buffer.policy().as_label(),
                                        "buffered flow dropped a value"
                                    );
                                }
                                Ok(())
                            }
                        })
                        .await;
                    buffer.close();
                    res
                };
                let drain = async {
                    while let Some(v) = buffer.pop().await {
                        if let Err(e) = em.emit(v).await {
                            buffer.abort();
                            return Err(e);
                        }
                    }
                    Ok(())
                };
                match join(fill, drain).await {
                    (_, Err(e)) => Err(e),
                    (res, Ok(())) => res,
                }
            }
        })
    }

    /// Keeps only the newest pending value for a slow collector.
    pub fn conflate(&self) -> ColdFlow<T> {
        self.buffer(1, OverflowPolicy::DropOldest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    fn restaurant() -> ColdFlow<&'static str> {
        ColdFlow::new("restaurant", |em: Emitter<&'static str>| async move {
            sleep(Duration::from_millis(250)).await;
            em.emit("appetizer").await?;
            sleep(Duration::from_millis(1000)).await;
            em.emit("main dish").await?;
            sleep(Duration::from_millis(200)).await;
            em.emit("dessert").await?;
            Ok::<(), FlowError>(())
        })
    }

    /// Eats every dish for 5s, recording (dish, finished_at).
    async fn eat(flow: ColdFlow<&'static str>) -> Vec<(&'static str, Duration)> {
        let start = Instant::now();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        flow.collect(move |dish| {
            let sink = sink.clone();
            async move {
                sleep(Duration::from_secs(5)).await;
                sink.lock().push((dish, start.elapsed()));
                Ok(())
            }
        })
        .await
        .unwrap();
        let out = log.lock().clone();
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_map_on_each_chain() {
        let tapped = Arc::new(Mutex::new(Vec::new()));
        let tap = tapped.clone();
        let flow = ColdFlow::from_iter("countdown", (0..=10).rev().collect::<Vec<u32>>())
            .filter(|t| t % 2 == 0)
            .map(|t| t * t)
            .on_each(move |t| tap.lock().push(*t));

        assert_eq!(flow.to_vec().await.unwrap(), vec![100, 64, 36, 16, 4, 0]);
        assert_eq!(*tapped.lock(), vec![100, 64, 36, 16, 4, 0]);
        assert_eq!(flow.name(), "countdown.filter.map.on_each");

        // derived operators keep no state across collections
        assert_eq!(flow.count(|t| t % 2 == 0).await.unwrap(), 6);
        assert_eq!(tapped.lock().len(), 12);
    }

    #[tokio::test]
    async fn test_take_stops_upstream() {
        let produced = Arc::new(Mutex::new(0u32));
        let counter = produced.clone();
        let naturals = ColdFlow::new("naturals", move |em: Emitter<u32>| {
            let counter = counter.clone();
            async move {
                for n in 0u32.. {
                    *counter.lock() += 1;
                    em.emit(n).await?;
                }
                Ok::<(), FlowError>(())
            }
        });

        assert_eq!(naturals.take(3).to_vec().await.unwrap(), vec![0, 1, 2]);
        assert_eq!(*produced.lock(), 3);
        assert!(naturals.take(0).to_vec().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_restaurant_waits_for_customer() {
        let eaten = eat(restaurant()).await;
        assert_eq!(
            eaten,
            vec![
                ("appetizer", Duration::from_millis(5250)),
                ("main dish", Duration::from_millis(11250)),
                ("dessert", Duration::from_millis(16450)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_lets_kitchen_run_ahead() {
        let eaten = eat(restaurant().buffer(64, OverflowPolicy::Suspend)).await;
        assert_eq!(
            eaten,
            vec![
                ("appetizer", Duration::from_millis(5250)),
                ("main dish", Duration::from_millis(10250)),
                ("dessert", Duration::from_millis(15250)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflate_skips_to_newest() {
        let eaten = eat(restaurant().conflate()).await;
        assert_eq!(
            eaten,
            vec![
                ("appetizer", Duration::from_millis(5250)),
                ("dessert", Duration::from_millis(10250)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_newest_buffer_keeps_first_pending() {
        let eaten = eat(restaurant().buffer(1, OverflowPolicy::DropNewest)).await;
        assert_eq!(
            eaten,
            vec![
                ("appetizer", Duration::from_millis(5250)),
                ("main dish", Duration::from_millis(10250)),
            ]
        );
    }

    #[tokio::test]
    async fn test_buffer_delivers_pending_before_failure() {
        let failing = ColdFlow::new("failing", |em: Emitter<u8>| async move {
            em.emit(1).await?;
            em.emit(2).await?;
            Err(FlowError::producer("oven broke"))
        })
        .buffer(8, OverflowPolicy::Suspend);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let res = failing
            .collect(move |v| {
                sink.lock().push(v);
                async { Ok(()) }
            })
            .await;
        assert_eq!(res, Err(FlowError::producer("oven broke")));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }
}
