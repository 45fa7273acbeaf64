use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// A held screen lock. Dropping the handle releases the lock, so the
/// executor can hold at most one and lock/unlock stay idempotent.
pub trait LockHandle: Send {}

/// Whatever covers the student's screen. The agent only ever holds one
/// handle at a time.
#[async_trait]
pub trait ScreenLock: Send + Sync {
    async fn engage(&self) -> Result<Box<dyn LockHandle>>;
}

/// Default lock surface for headless runs: records the transition but has no
/// display to cover.
#[derive(Debug, Default)]
pub struct TracingScreenLock;

struct TracingLockHandle;

impl LockHandle for TracingLockHandle {}

impl Drop for TracingLockHandle {
    fn drop(&mut self) {
        info!(target: "homeroom::lock", "screen lock released");
    }
}

#[async_trait]
impl ScreenLock for TracingScreenLock {
    async fn engage(&self) -> Result<Box<dyn LockHandle>> {
        info!(target: "homeroom::lock", "screen lock engaged");
        Ok(Box::new(TracingLockHandle))
    }
}
