//! # Scope configuration.
//!
//! Provides [`Config`], the settings a [`Scope`](crate::Scope) applies to
//! everything it creates.
//!
//! ## Sentinel values
//! - capacities of `0` are clamped to 1

use std::time::Duration;

use crate::hot::{DEFAULT_BROADCAST_CAPACITY, DEFAULT_STATE_CAPACITY};
use crate::policies::OverflowPolicy;

/// Configuration for a [`Scope`](crate::Scope).
///
/// ## Field semantics
/// - `grace`: maximum wait in `close()` for subscriptions to reach a terminal state
/// - `bus_capacity`: diagnostics bus ring buffer size (min 1)
/// - `buffer_capacity`: per-subscriber buffer of broadcasts created by the scope
/// - `overflow`: policy of broadcasts created by the scope
/// - `state_capacity`: per-subscriber buffer of state cells created by the scope
///
/// All fields are public; prefer the accessors, which apply the clamping.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time `close()` waits for subscriptions to stop.
    ///
    /// If exceeded, `close()` returns `RuntimeError::GraceExceeded` naming the stuck ones.
    pub grace: Duration,

    /// Capacity of the diagnostics bus.
    ///
    /// Observers lagging behind more than `bus_capacity` events skip older ones.
    pub bus_capacity: usize,

    /// Default per-subscriber buffer capacity for [`Scope::broadcast`](crate::Scope::broadcast).
    pub buffer_capacity: usize,

    /// Default overflow policy for [`Scope::broadcast`](crate::Scope::broadcast).
    pub overflow: OverflowPolicy,

    /// Per-subscriber buffer capacity for [`Scope::state_cell`](crate::Scope::state_cell).
    pub state_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a broadcast buffer capacity clamped to a minimum of 1.
    #[inline]
    pub fn buffer_capacity_clamped(&self) -> usize {
        self.buffer_capacity.max(1)
    }

    /// Returns a state cursor capacity clamped to a minimum of 1.
    #[inline]
    pub fn state_capacity_clamped(&self) -> usize {
        self.state_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `buffer_capacity = 64`, `overflow = Suspend` (no value is lost)
    /// - `state_capacity = 64`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            buffer_capacity: DEFAULT_BROADCAST_CAPACITY,
            overflow: OverflowPolicy::Suspend,
            state_capacity: DEFAULT_STATE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacities_are_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            buffer_capacity: 0,
            state_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.buffer_capacity_clamped(), 1);
        assert_eq!(cfg.state_capacity_clamped(), 1);
        assert_eq!(cfg.overflow, OverflowPolicy::Suspend);
    }
}
