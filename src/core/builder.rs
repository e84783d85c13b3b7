use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{Config, Scope},
    events::{Bus, Event},
    observers::{Observe, ObserverSet},
};

/// Builder for constructing a [`Scope`] with optional observers.
pub struct ScopeBuilder {
    cfg: Config,
    observers: Vec<Arc<dyn Observe>>,
}

impl ScopeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            observers: Vec::new(),
        }
    }

    /// Sets diagnostics observers.
    ///
    /// Observers receive scope events (subscription lifecycle, dropped values,
    /// teardown) through dedicated workers with bounded queues.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Builds the scope: creates the bus and spawns the observer listener.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Scope {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let observers = ObserverSet::new(self.observers, bus.clone());
        let listener_stop = CancellationToken::new();
        let listener = tokio::spawn(listen(bus.subscribe(), observers, listener_stop.clone()));

        Scope::new_internal(
            self.cfg,
            bus,
            CancellationToken::new(),
            listener_stop,
            listener,
        )
    }
}

/// Forwards bus events to the observers until stopped, then drains them.
async fn listen(mut rx: Receiver<Event>, observers: ObserverSet, stop: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            ev = rx.recv() => match ev {
                Ok(ev) => observers.emit_arc(Arc::new(ev)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "observer listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }
    // anything published before the stop request is still forwarded
    while let Ok(ev) = rx.try_recv() {
        observers.emit_arc(Arc::new(ev));
    }
    observers.shutdown().await;
}
