//! # Lifecycle-bound repetition.
//!
//! [`Lifecycle`] tracks the visibility of an owner and runs work only while it
//! is at least in a given state:
//!
//! ```text
//! state:   Created ── Started ── Resumed ── Started ── Created ── Started ── Destroyed
//! block:              [ run #1 ─────────────────────]  dropped    [ run #2 ]  dropped, return
//!                     (min = Started)
//! ```
//!
//! ## Rules
//! - Each time the state reaches `min`, a fresh block starts.
//! - The block is dropped as soon as the state falls below `min`.
//! - `repeat_on` returns once the lifecycle is destroyed; an error from the block ends it early.

use std::future::Future;
use std::pin::Pin;

use crate::error::FlowError;
use crate::hot::StateCell;
use crate::lifecycle::LifecycleState;

/// Observable lifecycle of one owner.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    cell: StateCell<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Creates a lifecycle in [`LifecycleState::Initialized`].
    pub fn new() -> Self {
        Self {
            cell: StateCell::named("lifecycle", LifecycleState::Initialized),
        }
    }

    /// Current state.
    pub fn current(&self) -> LifecycleState {
        self.cell.read()
    }

    /// Moves to `state`. Ignored once destroyed or when already in `state`.
    ///
    /// Returns true if the transition happened.
    pub fn move_to(&self, state: LifecycleState) -> bool {
        let moved = self
            .cell
            .update_if(|cur| {
                (*cur != LifecycleState::Destroyed && *cur != state).then_some(state)
            })
            .is_some();
        if moved {
            tracing::trace!(state = state.as_label(), "lifecycle moved");
        }
        moved
    }

    /// Moves to [`LifecycleState::Destroyed`] and ends every observer of this lifecycle.
    pub fn destroy(&self) {
        self.move_to(LifecycleState::Destroyed);
        self.cell.close();
    }

    /// Read-only view of the state as a hot stream.
    pub fn states(&self) -> &StateCell<LifecycleState> {
        &self.cell
    }

    /// Runs `block` every time the state reaches `min`, dropping it when the state falls below.
    ///
    /// Returns `Ok(())` once the lifecycle is destroyed, or the first error of a block.
    pub async fn repeat_on<F, Fut>(&self, min: LifecycleState, mut block: F) -> Result<(), FlowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), FlowError>>,
    {
        let mut states = self.cell.cursor();
        let Some(mut current) = states.next().await else {
            return Ok(());
        };

        loop {
            while current < min {
                if current == LifecycleState::Destroyed {
                    return Ok(());
                }
                match states.next().await {
                    Some(s) => current = s,
                    None => return Ok(()),
                }
            }

            let mut running: Option<Pin<Box<Fut>>> = Some(Box::pin(block()));
            let below = loop {
                tokio::select! {
                    next = states.next() => match next {
                        Some(s) if s < min => break Some(s),
                        Some(_) => {}
                        None => break None,
                    },
                    res = async {
                        match running.as_mut() {
                            Some(fut) => fut.await,
                            None => std::future::pending().await,
                        }
                    }, if running.is_some() => {
                        running = None;
                        res?;
                    }
                }
            };
            drop(running);

            match below {
                Some(s) => current = s,
                None => return Ok(()),
            }
        }
    }
}
