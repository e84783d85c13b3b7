//! Lifecycle-scoped collection.
//!
//! - [`LifecycleState`] ordered visibility states
//! - [`Lifecycle`] observable state plus [`Lifecycle::repeat_on`]
//! - `Scope::collect_on_lifecycle` / `Scope::collect_latest_on_lifecycle`:
//!   collect a flow only while the owner is visible

mod collect;
mod owner;
mod state;

pub use owner::Lifecycle;
pub use state::LifecycleState;
