//! Diagnostics events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to diagnostics emitted by scopes, subscriptions and hot
//! streams.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scope`, `Subscription` tasks, `StateCell`/`Broadcast`
//!   (overflow drops), `ObserverSet` workers (overflow/panic).
//! - **Consumers**: the scope listener, which fans out to the `ObserverSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
