pub(crate) mod channel;
pub(crate) mod dispatcher;
pub(crate) mod heartbeat;
pub mod supervisor;

/// Where the endpoint stands relative to a live classroom session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Connected (or not) but not bound to any session.
    Detached,
    /// The relay confirmed the join.
    Joined,
    /// The relay pushed a session state update (e.g. "paused", "ended").
    Updated(String),
}
