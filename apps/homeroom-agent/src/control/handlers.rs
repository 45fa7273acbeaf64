use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};
use tracing::{info, warn};

use homeroom_proto::{ControlAction, ControlCommand};

use super::executor::{CommandExecutor, HandlerOutcome};
use super::notify::Severity;

/// How long a teacher message stays on screen.
const MESSAGE_DISPLAY: Duration = Duration::from_secs(10);

impl CommandExecutor {
    pub(crate) async fn apply(&self, command: &ControlCommand) -> Result<HandlerOutcome> {
        let Some(action) = command.action() else {
            warn!(
                target: "homeroom::control",
                action_type = %command.action_type,
                controller_id = %command.controller_id,
                "rejecting unknown control action"
            );
            return Ok(HandlerOutcome::rejected());
        };
        match action {
            ControlAction::LockScreen => self.lock_screen().await,
            ControlAction::UnlockScreen => self.unlock_screen(),
            ControlAction::RestrictApps => self.restrict_apps(&command.action_data),
            ControlAction::AllowApps => self.allow_apps(),
            ControlAction::SendMessage => self.send_message(&command.action_data),
            ControlAction::RemoteControl => self.remote_control(&command.action_data),
        }
    }

    async fn lock_screen(&self) -> Result<HandlerOutcome> {
        // At most one handle is ever held; locking an already locked screen
        // is a no-op success.
        let already_held = self.lock_handle.lock().is_some();
        if !already_held {
            let handle = self.screen.engage().await?;
            *self.lock_handle.lock() = Some(handle);
        }
        self.board.update(|flags| flags.screen_locked = true);
        self.notifier.notify(
            Severity::Warning,
            "Your screen was locked by the teacher",
            None,
        );
        Ok(HandlerOutcome::ok(json!({ "locked": true })))
    }

    fn unlock_screen(&self) -> Result<HandlerOutcome> {
        // Dropping the handle releases the lock; no handle means nothing to do.
        let released = self.lock_handle.lock().take().is_some();
        self.board.update(|flags| flags.screen_locked = false);
        if released {
            self.notifier
                .notify(Severity::Info, "Your screen was unlocked", None);
        }
        Ok(HandlerOutcome::ok(json!({ "locked": false })))
    }

    fn restrict_apps(&self, data: &Value) -> Result<HandlerOutcome> {
        // Bookkeeping only: the endpoint records what was restricted but
        // cannot enforce it outside a managed platform.
        let restrictions: Vec<String> = data
            .get("restrictions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let count = restrictions.len();
        *self.restrictions.lock() = restrictions;
        self.board.update(|flags| flags.apps_restricted = true);
        self.notifier
            .notify(Severity::Warning, "App restrictions are now active", None);
        Ok(HandlerOutcome::ok(json!({ "restricted": count })))
    }

    fn allow_apps(&self) -> Result<HandlerOutcome> {
        self.restrictions.lock().clear();
        self.board.update(|flags| flags.apps_restricted = false);
        self.notifier
            .notify(Severity::Info, "App restrictions were lifted", None);
        Ok(HandlerOutcome::ok(json!({ "restricted": 0 })))
    }

    fn send_message(&self, data: &Value) -> Result<HandlerOutcome> {
        let message = data.get("message").and_then(Value::as_str).unwrap_or_default();
        self.notifier
            .notify(Severity::Info, message, Some(MESSAGE_DISPLAY));
        info!(target: "homeroom::control", "teacher message displayed");
        Ok(HandlerOutcome::ok(json!({ "displayed": true })))
    }

    fn remote_control(&self, data: &Value) -> Result<HandlerOutcome> {
        let enabled = data.get("enabled").and_then(Value::as_bool).unwrap_or(false);
        self.board
            .update(|flags| flags.remote_controlled = enabled);
        if enabled {
            self.notifier.notify(
                Severity::Warning,
                "The teacher is now controlling this device",
                None,
            );
        } else {
            self.notifier
                .notify(Severity::Info, "Remote control ended", None);
        }
        Ok(HandlerOutcome::ok(json!({ "enabled": enabled })))
    }
}
