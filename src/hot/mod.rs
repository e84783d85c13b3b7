//! Hot streams: shared sources that exist independently of their subscribers.
//!
//! ## Contents
//! - [`StateCell`] latest-value holder, replays the current value to new subscribers
//! - [`Broadcast`] multicast channel without replay
//! - [`Cursor`] one subscriber's independent read position
//!
//! Both streams expose a cold view through `flow()`, so every operator and
//! consumption mode of [`ColdFlow`](crate::ColdFlow) applies to them.

mod broadcast;
mod registry;
mod state;

pub use broadcast::Broadcast;
pub(crate) use broadcast::DEFAULT_BROADCAST_CAPACITY;
pub use registry::Cursor;
pub use state::StateCell;
pub(crate) use state::DEFAULT_STATE_CAPACITY;
