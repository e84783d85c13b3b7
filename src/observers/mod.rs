//! # Diagnostics observers.
//!
//! Observers receive the [`Event`](crate::Event)s published on a scope's
//! [`Bus`](crate::Bus): subscription lifecycle, dropped values, stream closes
//! and scope teardown.
//!
//! ```text
//! Subscription / StateCell / Broadcast / Scope ── publish ──► Bus
//!                                                              │
//!                                                    scope listener task
//!                                                              ▼
//!                                                        ObserverSet
//!                                              ┌───────────────┼───────────────┐
//!                                              ▼               ▼               ▼
//!                                          LogWriter      MetricsObserver   Custom
//! ```
//!
//! ## Example
//! ```no_run
//! use flowvisor::{Event, EventKind, Observe};
//! use async_trait::async_trait;
//!
//! struct DropCounter;
//!
//! #[async_trait]
//! impl Observe for DropCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ValueDropped {
//!             // count it
//!         }
//!     }
//!     fn name(&self) -> &'static str { "drop_counter" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod observe;
mod set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use observe::Observe;
pub use set::ObserverSet;
