use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::{Rng, distributions::Alphanumeric};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use homeroom_proto::{ClientMessage, EndpointRole};

use super::SessionStatus;
use super::channel::Channel;
use super::dispatcher::Dispatcher;
use super::heartbeat::HeartbeatPublisher;
use crate::config::{AgentConfig, ReconnectPolicy};
use crate::control::ack::{AckSink, RestAckSink};
use crate::control::executor::CommandExecutor;
use crate::control::lock::{ScreenLock, TracingScreenLock};
use crate::control::notify::{Notifier, Severity, TracingNotifier};
use crate::control::status::{ControlStatus, StatusBoard};
use crate::error::AgentError;

/// Where the endpoint sits in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Delay policy between reconnect attempts. `attempt` is 1-based and resets
/// after every successful connection.
pub trait BackoffPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// The classroom default: a flat delay, no growth, no cap.
pub struct FixedDelay(pub Duration);

impl BackoffPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Doubling delay capped at `cap`.
pub struct ExponentialBackoff {
    pub base: Duration,
    pub cap: Duration,
}

impl BackoffPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.cap)
    }
}

/// External collaborators, swappable in tests.
pub struct AgentDeps {
    pub ack: Arc<dyn AckSink>,
    pub notifier: Arc<dyn Notifier>,
    pub screen: Arc<dyn ScreenLock>,
    pub backoff: Box<dyn BackoffPolicy>,
}

impl AgentDeps {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            ack: Arc::new(RestAckSink::new(config.ack_url.clone())),
            notifier: Arc::new(TracingNotifier),
            screen: Arc::new(TracingScreenLock),
            backoff: backoff_for(&config.reconnect),
        }
    }
}

pub fn backoff_for(policy: &ReconnectPolicy) -> Box<dyn BackoffPolicy> {
    match policy {
        ReconnectPolicy::Fixed { delay } => Box::new(FixedDelay(*delay)),
        ReconnectPolicy::Exponential { base, cap } => Box::new(ExponentialBackoff {
            base: *base,
            cap: *cap,
        }),
    }
}

/// The controlled endpoint: owns the connection lifecycle and hands inbound
/// frames to the dispatcher. Control state (the lock handle, restrictions)
/// lives in the executor and survives reconnects; the device id does not.
pub struct DeviceAgent {
    config: AgentConfig,
    backoff: Box<dyn BackoffPolicy>,
    notifier: Arc<dyn Notifier>,
    board: Arc<StatusBoard>,
    dispatcher: Dispatcher,
    connection: watch::Sender<ConnectionState>,
    session: Arc<watch::Sender<SessionStatus>>,
    shutdown: watch::Receiver<bool>,
}

/// Observer + shutdown handle returned alongside the agent.
pub struct AgentHandle {
    status: watch::Receiver<ControlStatus>,
    connection: watch::Receiver<ConnectionState>,
    session: watch::Receiver<SessionStatus>,
    shared_screen: watch::Receiver<bool>,
    executor: Arc<CommandExecutor>,
    shutdown: watch::Sender<bool>,
}

impl AgentHandle {
    pub fn control_status(&self) -> ControlStatus {
        *self.status.borrow()
    }

    pub fn status_watch(&self) -> watch::Receiver<ControlStatus> {
        self.status.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn connection_watch(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn session_status(&self) -> SessionStatus {
        self.session.borrow().clone()
    }

    pub fn session_watch(&self) -> watch::Receiver<SessionStatus> {
        self.session.clone()
    }

    pub fn viewing_shared_screen(&self) -> bool {
        *self.shared_screen.borrow()
    }

    pub fn pending_commands(&self) -> usize {
        self.executor.pending_commands()
    }

    /// Ask the agent to stop; the running task closes the channel, cancels
    /// the heartbeat and exits.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl DeviceAgent {
    pub fn new(config: AgentConfig) -> (Self, AgentHandle) {
        let deps = AgentDeps::from_config(&config);
        Self::with_deps(config, deps)
    }

    pub fn with_deps(config: AgentConfig, deps: AgentDeps) -> (Self, AgentHandle) {
        let (board, status_rx) = StatusBoard::new();
        let executor = Arc::new(CommandExecutor::new(
            board.clone(),
            deps.notifier.clone(),
            deps.ack,
            deps.screen,
            config.command_deadline,
        ));
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::Disconnected);
        let (session_tx, session_rx) = watch::channel(SessionStatus::Detached);
        let session_tx = Arc::new(session_tx);
        let (shared_tx, shared_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(
            executor.clone(),
            deps.notifier.clone(),
            session_tx.clone(),
            shared_tx,
        );
        let agent = Self {
            config,
            backoff: deps.backoff,
            notifier: deps.notifier,
            board,
            dispatcher,
            connection: connection_tx,
            session: session_tx,
            shutdown: shutdown_rx,
        };
        let handle = AgentHandle {
            status: status_rx,
            connection: connection_rx,
            session: session_rx,
            shared_screen: shared_rx,
            executor,
            shutdown: shutdown_tx,
        };
        (agent, handle)
    }

    /// Connection supervisor loop: Disconnected → Connecting → Connected,
    /// then back through the backoff policy after every loss, until shutdown.
    pub async fn run(self) {
        let mut shutdown = self.shutdown.clone();
        let mut attempt: u32 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let _ = self.connection.send(ConnectionState::Connecting);
            match Channel::connect(&self.config.relay_url).await {
                Ok(channel) => {
                    attempt = 0;
                    if let Err(err) = self.run_connection(channel).await {
                        warn!(
                            target: "homeroom::session",
                            error = %err,
                            "session ended with error"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        target: "homeroom::session",
                        relay = %self.config.relay_url,
                        error = %err,
                        "relay connection failed"
                    );
                }
            }
            self.board.update(|flags| flags.connected = false);
            let _ = self.connection.send(ConnectionState::Disconnected);
            let _ = self.session.send(SessionStatus::Detached);
            if *shutdown.borrow() {
                break;
            }

            attempt += 1;
            let delay = self.backoff.next_delay(attempt);
            info!(target: "homeroom::session", attempt, ?delay, "reconnecting after delay");
            self.notifier.notify(
                Severity::Warning,
                "Connection to the classroom lost, reconnecting",
                None,
            );
            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(target: "homeroom::session", "agent shut down");
    }

    async fn run_connection(&self, mut channel: Channel) -> Result<(), AgentError> {
        // Fresh identity per connection; device ids never survive a drop.
        let device_id = generate_device_id();
        channel.send(ClientMessage::Register {
            user_id: self.config.user_id.clone(),
            device_id: device_id.clone(),
            device_info: self.config.device_info.clone(),
            tenant_id: self.config.tenant_id.clone(),
        })?;
        if let Some(session_id) = &self.config.session_id {
            channel.send(ClientMessage::JoinSession {
                session_id: session_id.clone(),
                user_id: self.config.user_id.clone(),
                device_id: device_id.clone(),
                role: EndpointRole::Student,
            })?;
        }
        self.board.update(|flags| flags.connected = true);
        let _ = self.connection.send(ConnectionState::Connected);
        info!(
            target: "homeroom::session",
            device_id = %device_id,
            relay = %self.config.relay_url,
            "connected to relay"
        );
        self.notifier
            .notify(Severity::Info, "Connected to the classroom", None);

        let heartbeat = HeartbeatPublisher::new(channel.sender(), device_id)
            .spawn(self.config.heartbeat_interval);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                frame = channel.recv() => match frame {
                    Some(text) => self.dispatcher.dispatch(&text).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        heartbeat.abort();
                        channel.close().await;
                        return Ok(());
                    }
                }
            }
        }

        // Socket is gone: stop heartbeats before anything else.
        heartbeat.abort();
        info!(target: "homeroom::session", "relay connection closed");
        Ok(())
    }
}

/// Device ids are unique per live connection and deliberately not stable
/// across drops: `student_<millis>_<random>`.
pub(crate) fn generate_device_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("student_{millis}_{}", suffix.to_lowercase())
}
