//! Test doubles for the executor's collaborator seams. Kept in the library
//! so the integration tests can drive a full agent against them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use homeroom_proto::CommandAck;

use crate::control::ack::{AckError, AckSink};
use crate::control::lock::{LockHandle, ScreenLock};
use crate::control::notify::{Notifier, Severity};

/// Records every acknowledgement instead of POSTing it.
#[derive(Default)]
pub struct RecordingAckSink {
    acks: Mutex<Vec<CommandAck>>,
}

impl RecordingAckSink {
    pub fn acks(&self) -> Vec<CommandAck> {
        self.acks.lock().clone()
    }
}

#[async_trait]
impl AckSink for RecordingAckSink {
    async fn report(&self, ack: &CommandAck) -> Result<(), AckError> {
        self.acks.lock().push(ack.clone());
        Ok(())
    }
}

/// An acknowledgement sink the classroom API always turns away, for
/// error-path tests.
#[derive(Default)]
pub struct FailingAckSink;

#[async_trait]
impl AckSink for FailingAckSink {
    async fn report(&self, _ack: &CommandAck) -> Result<(), AckError> {
        Err(AckError::Rejected("classroom api is refusing reports".into()))
    }
}

/// An acknowledgement sink that never answers, for deadline tests.
#[derive(Default)]
pub struct HangingAckSink;

#[async_trait]
impl AckSink for HangingAckSink {
    async fn report(&self, _ack: &CommandAck) -> Result<(), AckError> {
        std::future::pending::<()>().await;
        unreachable!("pending future never resolves")
    }
}

/// Records every notification shown to the user.
#[derive(Default)]
pub struct RecordingNotifier {
    notes: Mutex<Vec<(Severity, String, Option<Duration>)>>,
}

impl RecordingNotifier {
    pub fn notes(&self) -> Vec<(Severity, String, Option<Duration>)> {
        self.notes.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str, duration: Option<Duration>) {
        self.notes.lock().push((severity, message.to_string(), duration));
    }
}

/// Counts live lock handles so tests can assert the lock stays idempotent.
#[derive(Default)]
pub struct CountingScreenLock {
    active: Arc<AtomicUsize>,
    engaged_total: AtomicUsize,
}

impl CountingScreenLock {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn engaged_total(&self) -> usize {
        self.engaged_total.load(Ordering::SeqCst)
    }
}

struct CountingHandle(Arc<AtomicUsize>);

impl LockHandle for CountingHandle {}

impl Drop for CountingHandle {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScreenLock for CountingScreenLock {
    async fn engage(&self) -> anyhow::Result<Box<dyn LockHandle>> {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.engaged_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingHandle(self.active.clone())))
    }
}

/// A lock surface that never finishes engaging, for deadline tests.
#[derive(Default)]
pub struct StalledScreenLock;

#[async_trait]
impl ScreenLock for StalledScreenLock {
    async fn engage(&self) -> anyhow::Result<Box<dyn LockHandle>> {
        std::future::pending::<()>().await;
        unreachable!("pending future never resolves")
    }
}

/// A lock surface that refuses to engage, for failure-path tests.
#[derive(Default)]
pub struct FailingScreenLock;

#[async_trait]
impl ScreenLock for FailingScreenLock {
    async fn engage(&self) -> anyhow::Result<Box<dyn LockHandle>> {
        anyhow::bail!("display refused to lock")
    }
}
