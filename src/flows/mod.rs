//! # Cold flows.
//!
//! A cold flow does nothing until it is collected, and does everything again
//! for every collector.
//!
//! - [`ColdFlow`] definition, terminal operations and consumption modes
//! - [`Emitter`] producer-side handle with rendezvous hand-off
//! - derived operators (`filter`, `map`, `on_each`, `take`, `buffer`, `conflate`)
//!
//! Hot streams ([`StateCell`](crate::StateCell), [`Broadcast`](crate::Broadcast))
//! expose a cold view through `flow()`, so every operator and consumption mode
//! applies to them as well.

mod cold;
pub(crate) mod emitter;
mod operators;

pub use cold::ColdFlow;
pub use emitter::Emitter;
