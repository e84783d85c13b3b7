use async_trait::async_trait;

use crate::events::Event;

/// Diagnostics observer attached to a [`Scope`](crate::Scope).
///
/// Each observer runs in isolation:
/// - **Bounded queue** buffers events (capacity via [`Self::queue_capacity`]).
/// - **Dedicated worker task** processes events sequentially (FIFO).
/// - **Panic isolation**: panics are caught and published as `ObserverPanicked`.
///
/// Observers never sit on the value path: a slow observer loses diagnostics
/// events, it never slows a producer or a subscriber down.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, not in the publisher context.
    async fn on_event(&self, event: &Event);

    /// Returns the observer name used in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this observer.
    ///
    /// When full, the new event is dropped for this observer only and an
    /// `EventKind::ObserverOverflow` is published. Clamped to a minimum of 1.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
