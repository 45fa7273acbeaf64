//! Wire messages for the Homeroom device-control session channel. Keeping
//! these in one crate keeps the endpoint agent and any future controller or
//! relay implementation in sync without copying message shapes across crates.
//!
//! Everything on the wire is JSON with a `type` discriminator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from a controlled endpoint to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce the endpoint after the socket opens. Sent exactly once per
    /// connection, with a device id minted for that connection.
    Register {
        user_id: String,
        device_id: String,
        device_info: DeviceInfo,
        tenant_id: String,
    },
    /// Bind the endpoint to a live session. Only sent when a session id was
    /// configured; follows `register` immediately.
    JoinSession {
        session_id: String,
        user_id: String,
        device_id: String,
        role: EndpointRole,
    },
    Heartbeat {
        device_id: String,
    },
}

/// Messages pushed from the relay to a controlled endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    Registered {
        #[serde(default)]
        device_id: Option<String>,
    },
    SessionJoined {
        #[serde(default)]
        session_id: Option<String>,
    },
    DeviceControlCommand {
        #[serde(flatten)]
        command: ControlCommand,
    },
    ScreenShareStarted {},
    ScreenShareStopped {},
    SessionStatusChanged {
        status: String,
    },
}

/// A single imperative instruction from a controller, correlated end to end
/// by `action_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlCommand {
    pub action_id: String,
    /// Kept as the raw wire string so an unrecognized action can still be
    /// acknowledged as failed instead of rejected at parse time.
    pub action_type: String,
    #[serde(default)]
    pub action_data: Value,
    pub controller_id: String,
}

impl ControlCommand {
    pub fn action(&self) -> Option<ControlAction> {
        ControlAction::parse(&self.action_type)
    }
}

/// The fixed action vocabulary a controller may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    LockScreen,
    UnlockScreen,
    RestrictApps,
    AllowApps,
    SendMessage,
    RemoteControl,
}

impl ControlAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "lock_screen" => Some(Self::LockScreen),
            "unlock_screen" => Some(Self::UnlockScreen),
            "restrict_apps" => Some(Self::RestrictApps),
            "allow_apps" => Some(Self::AllowApps),
            "send_message" => Some(Self::SendMessage),
            "remote_control" => Some(Self::RemoteControl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LockScreen => "lock_screen",
            Self::UnlockScreen => "unlock_screen",
            Self::RestrictApps => "restrict_apps",
            Self::AllowApps => "allow_apps",
            Self::SendMessage => "send_message",
            Self::RemoteControl => "remote_control",
        }
    }
}

/// Terminal outcome of a command, reported back over REST.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Executed,
    Failed,
    TimedOut,
}

/// Body of the command-acknowledgement POST.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandAck {
    pub action_id: String,
    pub status: AckStatus,
    #[serde(default)]
    pub response_data: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Student,
    Teacher,
}

/// Device metadata carried in the `register` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    pub form_factor: FormFactor,
    pub platform: String,
    pub client: String,
    pub screen: ScreenResolution,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormFactor {
    Desktop,
    Laptop,
    Tablet,
    Phone,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenResolution {
    pub width: u32,
    pub height: u32,
}

/// Capability flags advertised at registration time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    pub camera: bool,
    pub microphone: bool,
    pub screen_share: bool,
    pub remote_control: bool,
}
