//! # Overflow policies for slow subscribers.
//!
//! [`OverflowPolicy`] decides what happens when a producer hands a value to a
//! subscriber whose buffer is already full.
//!
//! - [`OverflowPolicy::Suspend`] the producer waits until the subscriber makes room.
//! - [`OverflowPolicy::DropOldest`] the oldest buffered value is discarded to make room.
//! - [`OverflowPolicy::DropNewest`] the incoming value is discarded.
//!
//! ## Choosing the right policy
//!
//! **Every value matters** (commands, audit records):
//! ```text
//! OverflowPolicy::Suspend     → fast producer is slowed down to the slowest subscriber
//! ```
//!
//! **Only fresh values matter** (UI state, progress, sensor readings):
//! ```text
//! OverflowPolicy::DropOldest  → subscriber skips stale values, always ends on the newest
//! ```
//!
//! **First values matter, bursts may be shed**:
//! ```text
//! OverflowPolicy::DropNewest  → buffered values are kept, the burst tail is lost
//! ```

/// Policy controlling how a full subscriber buffer treats a new value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OverflowPolicy {
    /// Block the producer until the slowest subscriber catches up (default).
    #[default]
    Suspend,
    /// Keep only the newest `capacity` pending values.
    DropOldest,
    /// Discard incoming values while the buffer is full.
    DropNewest,
}

impl OverflowPolicy {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OverflowPolicy::Suspend => "suspend",
            OverflowPolicy::DropOldest => "drop_oldest",
            OverflowPolicy::DropNewest => "drop_newest",
        }
    }

    /// True if a full buffer makes the producer wait.
    #[inline]
    pub fn suspends(&self) -> bool {
        matches!(self, OverflowPolicy::Suspend)
    }
}
