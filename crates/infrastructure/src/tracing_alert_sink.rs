use tracing::info;

use staffhq_application::AlertSink;

/// Alert sink writing structured log lines instead of UI popups.
///
/// Used by headless runs; a UI shell substitutes its own sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl TracingAlertSink {
    /// Creates the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AlertSink for TracingAlertSink {
    fn notify(&self, title: &str, message: &str) {
        info!(target: "staffhq::alerts", %title, %message, "notification alert");
    }
}
