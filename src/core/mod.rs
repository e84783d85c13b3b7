//! Runtime core: ownership and subscriptions.
//!
//! - [`Scope`]: owner of streams and subscriptions, one-shot teardown with a grace period;
//! - [`ScopeBuilder`]: wires the diagnostics bus and observers;
//! - [`Subscription`]: cancel handle of one running collection;
//! - [`Config`]: scope settings.

mod builder;
mod config;
mod scope;
mod subscription;

pub use builder::ScopeBuilder;
pub use config::Config;
pub(crate) use scope::Close;
pub use scope::Scope;
pub use subscription::{Subscription, SubscriptionState};
