use std::time::Duration;

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// Surface for user-visible notifications (the toast bar in a desktop shell).
/// `duration` is how long the message should stay on screen; `None` leaves it
/// to the surface.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str, duration: Option<Duration>);
}

/// Default notifier: writes through tracing so a headless agent still leaves
/// a record of what would have been shown.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str, duration: Option<Duration>) {
        match severity {
            Severity::Info => info!(target: "homeroom::notify", ?duration, "{message}"),
            Severity::Warning => warn!(target: "homeroom::notify", ?duration, "{message}"),
        }
    }
}
