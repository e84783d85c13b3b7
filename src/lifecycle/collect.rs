use std::future::Future;

use crate::core::{Scope, Subscription};
use crate::error::FlowError;
use crate::flows::ColdFlow;
use crate::lifecycle::{Lifecycle, LifecycleState};

impl Scope {
    /// Collects `flow` sequentially while `lifecycle` is at least `min`.
    ///
    /// Collection restarts from the beginning of the flow each time the state
    /// reaches `min` again, and is cancelled whenever it falls below. The
    /// subscription completes when the lifecycle is destroyed.
    pub fn collect_on_lifecycle<T, F, Fut>(
        &self,
        lifecycle: &Lifecycle,
        min: LifecycleState,
        flow: &ColdFlow<T>,
        f: F,
    ) -> Subscription
    where
        T: Send + 'static,
        F: FnMut(T) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        let lifecycle = lifecycle.clone();
        let source = flow.clone();
        self.spawn(format!("{}@{}", flow.name(), min.as_label()), async move {
            lifecycle
                .repeat_on(min, move || {
                    let source = source.clone();
                    let f = f.clone();
                    async move { source.collect(f).await }
                })
                .await
        })
    }

    /// Latest-only variant of [`collect_on_lifecycle`](Self::collect_on_lifecycle).
    pub fn collect_latest_on_lifecycle<T, F, Fut>(
        &self,
        lifecycle: &Lifecycle,
        min: LifecycleState,
        flow: &ColdFlow<T>,
        f: F,
    ) -> Subscription
    where
        T: Send + 'static,
        F: FnMut(T) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        let lifecycle = lifecycle.clone();
        let source = flow.clone();
        self.spawn(format!("{}@{}", flow.name(), min.as_label()), async move {
            lifecycle
                .repeat_on(min, move || {
                    let source = source.clone();
                    let f = f.clone();
                    async move { source.collect_latest(f).await }
                })
                .await
        })
    }
}
