use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, warn};

use homeroom_proto::{AckStatus, CommandAck, ControlCommand};

use super::ack::AckSink;
use super::lock::{LockHandle, ScreenLock};
use super::notify::{Notifier, Severity};
use super::status::StatusBoard;

/// Bookkeeping for a command that has been received but not yet acknowledged.
#[derive(Debug, Clone, Copy)]
pub struct PendingCommand {
    pub received_at: Instant,
    pub deadline: Instant,
}

/// What a handler reports back: a success flag plus an optional response
/// payload for the acknowledgement.
pub(crate) struct HandlerOutcome {
    pub success: bool,
    pub data: Value,
}

impl HandlerOutcome {
    pub(crate) fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }

    /// A handled failure (as opposed to a handler error): acknowledged as
    /// failed with an empty payload.
    pub(crate) fn rejected() -> Self {
        Self {
            success: false,
            data: json!({}),
        }
    }
}

/// Executes control commands against the local device state. Commands are
/// tracked from receipt to acknowledgement; every command acknowledges
/// exactly once and is never retried by the endpoint.
pub struct CommandExecutor {
    pub(crate) board: Arc<StatusBoard>,
    pub(crate) notifier: Arc<dyn Notifier>,
    ack: Arc<dyn AckSink>,
    pub(crate) screen: Arc<dyn ScreenLock>,
    pub(crate) lock_handle: Mutex<Option<Box<dyn LockHandle>>>,
    pub(crate) restrictions: Mutex<Vec<String>>,
    pending: Mutex<HashMap<String, PendingCommand>>,
    deadline: Duration,
}

impl CommandExecutor {
    pub fn new(
        board: Arc<StatusBoard>,
        notifier: Arc<dyn Notifier>,
        ack: Arc<dyn AckSink>,
        screen: Arc<dyn ScreenLock>,
        deadline: Duration,
    ) -> Self {
        Self {
            board,
            notifier,
            ack,
            screen,
            lock_handle: Mutex::new(None),
            restrictions: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            deadline,
        }
    }

    pub fn pending_commands(&self) -> usize {
        self.pending.lock().len()
    }

    /// Currently recorded app restrictions (bookkeeping only).
    pub fn restrictions(&self) -> Vec<String> {
        self.restrictions.lock().clone()
    }

    /// Run one command end to end: track it, execute under its deadline,
    /// acknowledge, untrack. The pending entry is removed whatever the
    /// outcome, and a handler error never unwinds past this point.
    pub async fn execute(&self, command: ControlCommand) {
        let now = Instant::now();
        self.pending.lock().insert(
            command.action_id.clone(),
            PendingCommand {
                received_at: now,
                deadline: now + self.deadline,
            },
        );

        let (status, data) = match tokio::time::timeout(self.deadline, self.apply(&command)).await
        {
            Ok(Ok(outcome)) if outcome.success => (AckStatus::Executed, outcome.data),
            Ok(Ok(outcome)) => (AckStatus::Failed, outcome.data),
            Ok(Err(err)) => {
                warn!(
                    target: "homeroom::control",
                    action_id = %command.action_id,
                    action_type = %command.action_type,
                    error = %err,
                    "command handler failed"
                );
                (AckStatus::Failed, json!({ "error": err.to_string() }))
            }
            Err(_) => {
                warn!(
                    target: "homeroom::control",
                    action_id = %command.action_id,
                    action_type = %command.action_type,
                    deadline = ?self.deadline,
                    "command exceeded its deadline"
                );
                (AckStatus::TimedOut, json!({}))
            }
        };

        let ack = CommandAck {
            action_id: command.action_id.clone(),
            status,
            response_data: data,
        };
        // The report gets the same deadline as the handler; a hung POST must
        // never hold up the next frame on the channel.
        match tokio::time::timeout(self.deadline, self.ack.report(&ack)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    target: "homeroom::control",
                    action_id = %command.action_id,
                    error = %err,
                    "failed to report command acknowledgement"
                );
            }
            Err(_) => {
                warn!(
                    target: "homeroom::control",
                    action_id = %command.action_id,
                    deadline = ?self.deadline,
                    "acknowledgement report timed out"
                );
            }
        }
        self.pending.lock().remove(&command.action_id);

        let (severity, verb) = match status {
            AckStatus::Executed => (Severity::Info, "executed"),
            AckStatus::Failed => (Severity::Warning, "failed"),
            AckStatus::TimedOut => (Severity::Warning, "timed out"),
        };
        self.notifier.notify(
            severity,
            &format!("{} {}", command.action_type, verb),
            None,
        );
        debug!(
            target: "homeroom::control",
            action_id = %command.action_id,
            status = ?status,
            "command acknowledged"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::status::ControlStatus;
    use crate::testing::{
        CountingScreenLock, FailingAckSink, FailingScreenLock, HangingAckSink, RecordingAckSink,
        RecordingNotifier, StalledScreenLock,
    };
    use homeroom_proto::AckStatus;
    use serde_json::json;

    struct Harness {
        executor: CommandExecutor,
        ack: Arc<RecordingAckSink>,
        notifier: Arc<RecordingNotifier>,
        board: Arc<StatusBoard>,
    }

    fn harness(screen: Arc<dyn ScreenLock>, deadline: Duration) -> Harness {
        let (board, _rx) = StatusBoard::new();
        board.update(|flags| flags.connected = true);
        let ack = Arc::new(RecordingAckSink::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let executor = CommandExecutor::new(
            board.clone(),
            notifier.clone(),
            ack.clone(),
            screen,
            deadline,
        );
        Harness {
            executor,
            ack,
            notifier,
            board,
        }
    }

    fn harness_with_ack(
        ack: Arc<dyn AckSink>,
        deadline: Duration,
    ) -> (CommandExecutor, Arc<RecordingNotifier>, Arc<StatusBoard>) {
        let (board, _rx) = StatusBoard::new();
        board.update(|flags| flags.connected = true);
        let notifier = Arc::new(RecordingNotifier::default());
        let executor = CommandExecutor::new(
            board.clone(),
            notifier.clone(),
            ack,
            Arc::new(CountingScreenLock::default()),
            deadline,
        );
        (executor, notifier, board)
    }

    fn command(id: &str, action_type: &str, data: Value) -> ControlCommand {
        ControlCommand {
            action_id: id.to_string(),
            action_type: action_type.to_string(),
            action_data: data,
            controller_id: "c1".to_string(),
        }
    }

    #[tokio::test]
    async fn lock_then_unlock_returns_to_free() {
        let screen = Arc::new(CountingScreenLock::default());
        let h = harness(screen.clone(), Duration::from_secs(5));

        h.executor.execute(command("a1", "lock_screen", json!({}))).await;
        assert_eq!(h.board.current(), ControlStatus::Locked);
        assert_eq!(screen.active(), 1);

        h.executor
            .execute(command("a2", "unlock_screen", json!({})))
            .await;
        assert_eq!(h.board.current(), ControlStatus::Free);
        assert_eq!(screen.active(), 0);

        let acks = h.ack.acks();
        assert_eq!(acks.len(), 2);
        assert!(acks.iter().all(|ack| ack.status == AckStatus::Executed));
        assert_eq!(h.executor.pending_commands(), 0);
    }

    #[tokio::test]
    async fn locking_twice_holds_a_single_handle() {
        let screen = Arc::new(CountingScreenLock::default());
        let h = harness(screen.clone(), Duration::from_secs(5));

        h.executor.execute(command("a1", "lock_screen", json!({}))).await;
        h.executor.execute(command("a2", "lock_screen", json!({}))).await;

        assert_eq!(screen.engaged_total(), 1);
        assert_eq!(screen.active(), 1);
        assert_eq!(h.ack.acks().len(), 2);
        assert!(h.ack.acks().iter().all(|a| a.status == AckStatus::Executed));
    }

    #[tokio::test]
    async fn unlocking_when_not_locked_is_a_no_op_success() {
        let screen = Arc::new(CountingScreenLock::default());
        let h = harness(screen.clone(), Duration::from_secs(5));

        h.executor
            .execute(command("a1", "unlock_screen", json!({})))
            .await;
        assert_eq!(screen.engaged_total(), 0);
        assert_eq!(h.ack.acks()[0].status, AckStatus::Executed);
        assert_eq!(h.board.current(), ControlStatus::Free);
    }

    #[tokio::test]
    async fn remote_control_round_trip_restores_free() {
        let h = harness(Arc::new(CountingScreenLock::default()), Duration::from_secs(5));

        h.executor
            .execute(command("a1", "remote_control", json!({ "enabled": true })))
            .await;
        assert_eq!(h.board.current(), ControlStatus::Controlled);
        assert!(h.board.flags().remote_controlled);

        h.executor
            .execute(command("a2", "remote_control", json!({ "enabled": false })))
            .await;
        assert_eq!(h.board.current(), ControlStatus::Free);
        assert!(!h.board.flags().remote_controlled);
    }

    #[tokio::test]
    async fn restrict_then_allow_clears_bookkeeping() {
        let h = harness(Arc::new(CountingScreenLock::default()), Duration::from_secs(5));

        h.executor
            .execute(command(
                "a1",
                "restrict_apps",
                json!({ "restrictions": ["games", "social"] }),
            ))
            .await;
        assert_eq!(h.board.current(), ControlStatus::Restricted);
        assert_eq!(h.executor.restrictions(), vec!["games", "social"]);

        h.executor.execute(command("a2", "allow_apps", json!({}))).await;
        assert_eq!(h.board.current(), ControlStatus::Free);
        assert!(h.executor.restrictions().is_empty());
    }

    #[tokio::test]
    async fn send_message_shows_a_timed_notification() {
        let h = harness(Arc::new(CountingScreenLock::default()), Duration::from_secs(5));

        h.executor
            .execute(command(
                "a1",
                "send_message",
                json!({ "message": "Eyes up front, please" }),
            ))
            .await;

        let notes = h.notifier.notes();
        assert!(notes.iter().any(|(severity, message, duration)| {
            *severity == Severity::Info
                && message == "Eyes up front, please"
                && *duration == Some(Duration::from_secs(10))
        }));
        assert_eq!(h.ack.acks()[0].status, AckStatus::Executed);
    }

    #[tokio::test]
    async fn unknown_action_fails_without_state_change() {
        let screen = Arc::new(CountingScreenLock::default());
        let h = harness(screen.clone(), Duration::from_secs(5));

        h.executor
            .execute(command("a2", "bogus_action", json!({})))
            .await;

        let acks = h.ack.acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].action_id, "a2");
        assert_eq!(acks[0].status, AckStatus::Failed);
        assert_eq!(acks[0].response_data, json!({}));
        assert_eq!(h.board.current(), ControlStatus::Free);
        assert_eq!(screen.engaged_total(), 0);
        assert_eq!(h.executor.pending_commands(), 0);
    }

    #[tokio::test]
    async fn handler_error_becomes_a_failed_ack() {
        let h = harness(Arc::new(FailingScreenLock), Duration::from_secs(5));

        h.executor.execute(command("a1", "lock_screen", json!({}))).await;

        let acks = h.ack.acks();
        assert_eq!(acks[0].status, AckStatus::Failed);
        assert!(
            acks[0].response_data["error"]
                .as_str()
                .unwrap()
                .contains("display refused to lock")
        );
        // The lock never engaged, so the projection is untouched.
        assert_eq!(h.board.current(), ControlStatus::Free);
        assert_eq!(h.executor.pending_commands(), 0);
    }

    #[tokio::test]
    async fn stalled_handler_acknowledges_timed_out() {
        let h = harness(Arc::new(StalledScreenLock), Duration::from_millis(50));

        h.executor.execute(command("a1", "lock_screen", json!({}))).await;

        let acks = h.ack.acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].status, AckStatus::TimedOut);
        assert_eq!(h.executor.pending_commands(), 0);
    }

    #[tokio::test]
    async fn each_command_acknowledges_exactly_once() {
        let h = harness(Arc::new(CountingScreenLock::default()), Duration::from_secs(5));

        for (id, action) in [
            ("a1", "lock_screen"),
            ("a2", "unlock_screen"),
            ("a3", "send_message"),
            ("a4", "bogus_action"),
        ] {
            h.executor
                .execute(command(id, action, json!({ "message": "hi" })))
                .await;
        }

        let acks = h.ack.acks();
        assert_eq!(acks.len(), 4);
        let mut ids: Vec<_> = acks.iter().map(|a| a.action_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(h.executor.pending_commands(), 0);
    }

    #[tokio::test]
    async fn failed_ack_post_still_clears_the_command() {
        let (executor, notifier, board) =
            harness_with_ack(Arc::new(FailingAckSink), Duration::from_secs(5));

        executor.execute(command("a1", "lock_screen", json!({}))).await;

        // The report error is swallowed: the command leaves the pending set,
        // the effect stands and the outcome notification still fires.
        assert_eq!(executor.pending_commands(), 0);
        assert_eq!(board.current(), ControlStatus::Locked);
        assert!(
            notifier
                .notes()
                .iter()
                .any(|(_, message, _)| message == "lock_screen executed")
        );
    }

    #[tokio::test]
    async fn hung_ack_post_cannot_wedge_the_executor() {
        let (executor, _notifier, _board) =
            harness_with_ack(Arc::new(HangingAckSink), Duration::from_millis(50));

        tokio::time::timeout(
            Duration::from_secs(2),
            executor.execute(command("a1", "lock_screen", json!({}))),
        )
        .await
        .expect("execute returns once the report deadline elapses");

        assert_eq!(executor.pending_commands(), 0);
    }

    #[tokio::test]
    async fn lock_takes_precedence_over_remote_control() {
        // Deliberate design choice: back-to-back lock + remote-control leaves
        // both flags set and the endpoint reporting Locked.
        let h = harness(Arc::new(CountingScreenLock::default()), Duration::from_secs(5));

        h.executor.execute(command("a1", "lock_screen", json!({}))).await;
        h.executor
            .execute(command("a2", "remote_control", json!({ "enabled": true })))
            .await;

        assert_eq!(h.ack.acks().len(), 2);
        assert!(h.board.flags().screen_locked);
        assert!(h.board.flags().remote_controlled);
        assert_eq!(h.board.current(), ControlStatus::Locked);
    }
}
