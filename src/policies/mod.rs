//! Overflow handling for slow subscribers.
//!
//! This module groups the knobs that control **what happens** when a producer
//! is faster than one of its consumers.
//!
//! ## Contents
//! - [`OverflowPolicy`] suspend the producer / drop the oldest / drop the newest
//! - `OverflowBuffer` the bounded per-consumer queue that applies a policy
//!
//! ## Quick wiring
//! ```text
//! Broadcast { capacity, policy } ──► one OverflowBuffer per cursor
//! StateCell { capacity }         ──► one OverflowBuffer(DropOldest) per cursor
//! ColdFlow::buffer(cap, policy)  ──► one OverflowBuffer per collection
//! ```
//!
//! ## Defaults
//! - `OverflowPolicy::Suspend` for broadcast channels (no value is lost).
//! - `OverflowPolicy::DropOldest` for latest-value holders (never stale).

mod buffer;
mod overflow;

pub(crate) use buffer::{Offer, OverflowBuffer, Pushed};
pub use overflow::OverflowPolicy;
