//! Error types used by flows, hot streams and the owning scope.
//!
//! This module defines two main error enums:
//!
//! - [`FlowError`]: failures that terminate a single connection (one collection of a
//!   cold flow, or one subscriber of a hot stream).
//! - [`RuntimeError`]: errors raised by the owning [`Scope`](crate::Scope) itself.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the owning scope.
///
/// These represent failures in the scope itself, such as a close sequence
/// exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Close grace period was exceeded; some subscriptions were still running.
    #[error("close timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the subscriptions that did not terminate in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck subscriptions={stuck:?}")
            }
        }
    }
}

/// # Errors that terminate a single connection.
///
/// A failure only ever affects the connection it was raised on: other
/// collections of the same cold flow and other subscribers of the same hot
/// stream keep running.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The producer procedure of a cold flow failed.
    #[error("producer failed: {error}")]
    Producer {
        /// The underlying error message.
        error: String,
    },

    /// A consumer callback returned an error.
    #[error("collector failed: {error}")]
    Collector {
        /// The underlying error message.
        error: String,
    },

    /// A consumer callback (or producer) panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The stream was closed by its owner.
    #[error("stream closed")]
    Closed,

    /// The connection was cancelled (or its counterpart went away).
    #[error("subscription cancelled")]
    Canceled,
}

impl FlowError {
    /// Builds a [`FlowError::Producer`] from any displayable error.
    pub fn producer(error: impl Display) -> Self {
        FlowError::Producer {
            error: error.to_string(),
        }
    }

    /// Builds a [`FlowError::Collector`] from any displayable error.
    pub fn collector(error: impl Display) -> Self {
        FlowError::Collector {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowvisor::FlowError;
    ///
    /// assert_eq!(FlowError::producer("boom").as_label(), "flow_producer_failed");
    /// assert_eq!(FlowError::Closed.as_label(), "flow_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FlowError::Producer { .. } => "flow_producer_failed",
            FlowError::Collector { .. } => "flow_collector_failed",
            FlowError::Panicked { .. } => "flow_panicked",
            FlowError::Closed => "flow_closed",
            FlowError::Canceled => "flow_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            FlowError::Producer { error } => format!("producer: {error}"),
            FlowError::Collector { error } => format!("collector: {error}"),
            FlowError::Panicked { info } => format!("panic: {info}"),
            FlowError::Closed => "stream closed".to_string(),
            FlowError::Canceled => "subscription cancelled".to_string(),
        }
    }

    /// Indicates whether this error ends the connection without a fault
    /// (cancellation or an orderly close).
    pub fn is_graceful(&self) -> bool {
        matches!(self, FlowError::Canceled | FlowError::Closed)
    }

    /// Renders a panic payload caught with `catch_unwind`.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        FlowError::Panicked { info }
    }
}
