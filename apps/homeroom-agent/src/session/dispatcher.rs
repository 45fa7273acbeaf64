use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use homeroom_proto::RelayMessage;

use super::SessionStatus;
use crate::control::executor::CommandExecutor;
use crate::control::notify::{Notifier, Severity};

/// Routes inbound relay frames by their `type` discriminator. Commands run
/// in arrival order; the next frame is not processed until the current
/// command has acknowledged.
pub(crate) struct Dispatcher {
    executor: Arc<CommandExecutor>,
    notifier: Arc<dyn Notifier>,
    session: Arc<watch::Sender<SessionStatus>>,
    shared_screen: watch::Sender<bool>,
}

impl Dispatcher {
    pub(crate) fn new(
        executor: Arc<CommandExecutor>,
        notifier: Arc<dyn Notifier>,
        session: Arc<watch::Sender<SessionStatus>>,
        shared_screen: watch::Sender<bool>,
    ) -> Self {
        Self {
            executor,
            notifier,
            session,
            shared_screen,
        }
    }

    pub(crate) async fn dispatch(&self, raw: &str) {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                // A non-JSON frame has no action id to acknowledge; drop it
                // without touching the channel.
                warn!(
                    target: "homeroom::dispatch",
                    error = %err,
                    preview = %preview(raw),
                    "dropping malformed relay frame"
                );
                return;
            }
        };
        let message: RelayMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                debug!(
                    target: "homeroom::dispatch",
                    error = %err,
                    "ignoring unrecognized relay message"
                );
                return;
            }
        };
        match message {
            RelayMessage::Registered { device_id } => {
                info!(
                    target: "homeroom::dispatch",
                    ?device_id,
                    "registration confirmed by relay"
                );
            }
            RelayMessage::SessionJoined { session_id } => {
                info!(target: "homeroom::dispatch", ?session_id, "joined session");
                let _ = self.session.send(SessionStatus::Joined);
            }
            RelayMessage::DeviceControlCommand { command } => {
                self.executor.execute(command).await;
            }
            RelayMessage::ScreenShareStarted {} => {
                let _ = self.shared_screen.send(true);
                self.notifier.notify(
                    Severity::Info,
                    "The teacher started sharing their screen",
                    None,
                );
            }
            RelayMessage::ScreenShareStopped {} => {
                let _ = self.shared_screen.send(false);
                self.notifier
                    .notify(Severity::Info, "Screen sharing ended", None);
            }
            RelayMessage::SessionStatusChanged { status } => {
                info!(
                    target: "homeroom::dispatch",
                    status = %status,
                    "session status changed"
                );
                let _ = self.session.send(SessionStatus::Updated(status));
            }
        }
    }
}

fn preview(raw: &str) -> String {
    // enough to identify the frame in logs without dumping whole payloads
    raw.chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::status::{ControlStatus, StatusBoard};
    use crate::testing::{CountingScreenLock, RecordingAckSink, RecordingNotifier};
    use homeroom_proto::AckStatus;
    use std::time::Duration;

    struct Harness {
        dispatcher: Dispatcher,
        ack: Arc<RecordingAckSink>,
        notifier: Arc<RecordingNotifier>,
        board: Arc<StatusBoard>,
        session: watch::Receiver<SessionStatus>,
        shared_screen: watch::Receiver<bool>,
    }

    fn harness() -> Harness {
        let (board, _rx) = StatusBoard::new();
        board.update(|flags| flags.connected = true);
        let ack = Arc::new(RecordingAckSink::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let executor = Arc::new(CommandExecutor::new(
            board.clone(),
            notifier.clone(),
            ack.clone(),
            Arc::new(CountingScreenLock::default()),
            Duration::from_secs(5),
        ));
        let (session_tx, session_rx) = watch::channel(SessionStatus::Detached);
        let (shared_tx, shared_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(
            executor,
            notifier.clone(),
            Arc::new(session_tx),
            shared_tx,
        );
        Harness {
            dispatcher,
            ack,
            notifier,
            board,
            session: session_rx,
            shared_screen: shared_rx,
        }
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_and_later_frames_still_work() {
        let h = harness();

        h.dispatcher.dispatch("garbage%%%not json").await;
        assert!(h.ack.acks().is_empty());

        h.dispatcher
            .dispatch(
                r#"{"type":"device_control_command","action_id":"a1","action_type":"lock_screen","action_data":{},"controller_id":"c1"}"#,
            )
            .await;
        assert_eq!(h.ack.acks().len(), 1);
        assert_eq!(h.ack.acks()[0].status, AckStatus::Executed);
        assert_eq!(h.board.current(), ControlStatus::Locked);
    }

    #[tokio::test]
    async fn unknown_message_type_is_ignored() {
        let h = harness();
        h.dispatcher
            .dispatch(r#"{"type":"quiz_started","quiz_id":"q1"}"#)
            .await;
        assert!(h.ack.acks().is_empty());
        assert!(h.notifier.notes().is_empty());
        assert_eq!(*h.session.borrow(), SessionStatus::Detached);
    }

    #[tokio::test]
    async fn session_joined_updates_the_watch() {
        let h = harness();
        h.dispatcher
            .dispatch(r#"{"type":"session_joined","session_id":"period-3"}"#)
            .await;
        assert_eq!(*h.session.borrow(), SessionStatus::Joined);
    }

    #[tokio::test]
    async fn session_status_change_is_reported() {
        let h = harness();
        h.dispatcher
            .dispatch(r#"{"type":"session_status_changed","status":"paused"}"#)
            .await;
        assert_eq!(
            *h.session.borrow(),
            SessionStatus::Updated("paused".to_string())
        );
    }

    #[tokio::test]
    async fn screen_share_toggles_the_viewing_flag() {
        let h = harness();

        h.dispatcher
            .dispatch(r#"{"type":"screen_share_started"}"#)
            .await;
        assert!(*h.shared_screen.borrow());

        h.dispatcher
            .dispatch(r#"{"type":"screen_share_stopped"}"#)
            .await;
        assert!(!*h.shared_screen.borrow());
        assert_eq!(h.notifier.notes().len(), 2);
    }
}
