use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::observers::Observe;

/// Observer that renders every diagnostics event through `tracing`.
///
/// Enabled via the `logging` feature. Failures and grace overruns are logged
/// at `warn`, everything else at `info`.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Observe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let subscription = e.subscription.as_deref().unwrap_or("-");
        let stream = e.stream.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SubscriptionStarted => {
                tracing::info!(seq = e.seq, subscription, "[started]");
            }
            EventKind::SubscriptionCompleted => {
                tracing::info!(seq = e.seq, subscription, "[completed]");
            }
            EventKind::SubscriptionCancelled => {
                tracing::info!(seq = e.seq, subscription, "[cancelled]");
            }
            EventKind::SubscriptionFailed => {
                tracing::warn!(seq = e.seq, subscription, reason, "[failed]");
            }
            EventKind::ValueDropped => {
                tracing::info!(seq = e.seq, stream, cursor = ?e.cursor, reason, "[value-dropped]");
            }
            EventKind::EmissionDropped => {
                tracing::info!(seq = e.seq, stream, "[emission-dropped]");
            }
            EventKind::StreamClosed => {
                tracing::info!(seq = e.seq, stream, "[stream-closed]");
            }
            EventKind::ObserverPanicked | EventKind::ObserverOverflow => {
                tracing::warn!(seq = e.seq, observer = subscription, reason, "[observer]");
            }
            EventKind::ScopeClosing => tracing::info!(seq = e.seq, "[scope-closing]"),
            EventKind::ScopeClosed => tracing::info!(seq = e.seq, "[scope-closed]"),
            EventKind::GraceExceeded => {
                tracing::warn!(seq = e.seq, reason, "[grace-exceeded]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
