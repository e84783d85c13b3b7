//! # flowvisor
//!
//! **Flowvisor** is a small asynchronous data-stream library for Rust, built on tokio.
//!
//! It provides three stream primitives and an owner that supervises their
//! consumers:
//! - a **cold flow** that re-runs its producer for every collector,
//! - a **latest-value holder** that always has a current value,
//! - a **broadcast channel** that fans events out to everyone subscribed right now.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐        ┌──────────────┐        ┌──────────────┐
//!   │   ColdFlow   │        │  StateCell   │        │  Broadcast   │
//!   │ (producer fn)│        │(current value│        │  (no replay) │
//!   └──────┬───────┘        └──────┬───────┘        └──────┬───────┘
//!          │ start() per           │ one Cursor per        │ one Cursor per
//!          │ collection            │ subscriber            │ subscriber
//!          ▼                       ▼                       ▼
//!   Emitter ⇄ collector     OverflowBuffer(DropOldest)  OverflowBuffer(policy)
//!          │                       │ flow()                │ flow()
//!          └───────────────┬───────┴───────────────────────┘
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scope (owner)                                                    │
//! │  - runtime CancellationToken ──► child token per Subscription     │
//! │  - owned streams (closed on close/drop)                           │
//! │  - Bus (diagnostics) ──► listener ──► ObserverSet ──► observers   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Subscription lifecycle
//! ```text
//! launch(flow, f) ──► Subscription::spawn(child token)
//!   publish SubscriptionStarted
//!   select! {
//!     token cancelled     ─► Cancelled
//!     collection finished ─► Ok / Closed   ─► Completed
//!                            Err(e)        ─► Failed(e)
//!                            panic         ─► Failed(Panicked)
//!   }
//!   publish SubscriptionCompleted / SubscriptionCancelled / SubscriptionFailed
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Cold flows**    | Lazy, per-collector producers and derived operators.         | [`ColdFlow`], [`Emitter`]                   |
//! | **Hot streams**   | Shared state and multicast events with per-subscriber buffers.| [`StateCell`], [`Broadcast`], [`Cursor`]    |
//! | **Overflow**      | What happens when a subscriber is slower than its producer.  | [`OverflowPolicy`]                          |
//! | **Ownership**     | Structured cancellation and teardown of subscriptions.       | [`Scope`], [`Subscription`]                 |
//! | **Lifecycle**     | Collect only while the owner is visible.                     | [`Lifecycle`], [`LifecycleState`]           |
//! | **Diagnostics**   | Sequenced events fanned out to observers.                    | [`Event`], [`Observe`], [`ObserverSet`]     |
//! | **Errors**        | Typed errors for connections and scope teardown.             | [`FlowError`], [`RuntimeError`]             |
//! | **Configuration** | Scope-wide defaults.                                         | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], an observer that writes events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use flowvisor::{ColdFlow, Config, Emitter, FlowError, Scope};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scope = Scope::builder(Config::default()).build();
//!
//!     let countdown = ColdFlow::new("countdown", |em: Emitter<u32>| async move {
//!         for v in (0..=3).rev() {
//!             em.emit(v).await?;
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!         }
//!         Ok::<(), FlowError>(())
//!     });
//!
//!     let counter = scope.state_cell("counter", 0u32);
//!     let sub = {
//!         let counter = counter.clone();
//!         scope.launch(&countdown, move |_| {
//!             counter.update(|n| n + 1);
//!             async { Ok(()) }
//!         })
//!     };
//!     sub.join().await;
//!     assert_eq!(counter.read(), 4);
//!
//!     scope.close().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod flows;
mod hot;
mod lifecycle;
mod observers;
mod policies;

// ---- Public re-exports ----

pub use core::{Config, Scope, ScopeBuilder, Subscription, SubscriptionState};
pub use error::{FlowError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use flows::{ColdFlow, Emitter};
pub use hot::{Broadcast, Cursor, StateCell};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use observers::{Observe, ObserverSet};
pub use policies::OverflowPolicy;

// Optional: expose a built-in observer that logs through `tracing`.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
