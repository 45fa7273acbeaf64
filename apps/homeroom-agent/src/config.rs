use std::env;
use std::time::Duration;

use homeroom_proto::{Capabilities, DeviceInfo, FormFactor, ScreenResolution};
use url::Url;

use crate::error::AgentError;

/// Endpoint agent configuration. Endpoint identity (`user_id`, `session_id`)
/// usually comes from the CLI; everything else can be driven by environment
/// variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// WebSocket address of the classroom relay
    pub relay_url: String,
    /// REST endpoint receiving command acknowledgements
    pub ack_url: String,
    /// Stable identity of the student this device belongs to
    pub user_id: String,
    /// School / district tenant identifier
    pub tenant_id: String,
    /// Live session to join on connect; `None` means connected but unbound
    pub session_id: Option<String>,
    /// Metadata advertised in the `register` message
    pub device_info: DeviceInfo,
    pub heartbeat_interval: Duration,
    /// Per-command execution deadline; commands past it acknowledge `timed_out`
    pub command_deadline: Duration,
    pub reconnect: ReconnectPolicy,
}

/// Delay strategy between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Flat delay, no growth, no cap (the classroom default)
    Fixed { delay: Duration },
    /// Doubling delay capped at `cap`
    Exponential { base: Duration, cap: Duration },
}

impl AgentConfig {
    /// Load configuration from environment variables, falling back to the
    /// local development relay.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(relay) = env::var("HOMEROOM_RELAY_URL") {
            config.relay_url = normalize_host(relay);
        }
        if let Ok(ack) = env::var("HOMEROOM_ACK_URL") {
            config.ack_url = ack;
        }
        if let Ok(tenant) = env::var("HOMEROOM_TENANT_ID") {
            config.tenant_id = tenant;
        }
        if let Some(secs) = env_secs("HOMEROOM_HEARTBEAT_SECS") {
            config.heartbeat_interval = secs;
        }
        if let Some(secs) = env_secs("HOMEROOM_COMMAND_DEADLINE_SECS") {
            config.command_deadline = secs;
        }
        let reconnect_delay =
            env_secs("HOMEROOM_RECONNECT_SECS").unwrap_or(Duration::from_secs(3));
        config.reconnect = match env::var("HOMEROOM_RECONNECT_BACKOFF").ok().as_deref() {
            Some("exponential") => ReconnectPolicy::Exponential {
                base: Duration::from_millis(250),
                cap: Duration::from_secs(5),
            },
            _ => ReconnectPolicy::Fixed {
                delay: reconnect_delay,
            },
        };
        config
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        match Url::parse(&self.relay_url) {
            Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
            Ok(url) => {
                return Err(AgentError::InvalidRelayUrl {
                    url: self.relay_url.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
            Err(err) => {
                return Err(AgentError::InvalidRelayUrl {
                    url: self.relay_url.clone(),
                    reason: err.to_string(),
                });
            }
        }
        match Url::parse(&self.ack_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(AgentError::InvalidAckUrl {
                    url: self.ack_url.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
            Err(err) => {
                return Err(AgentError::InvalidAckUrl {
                    url: self.ack_url.clone(),
                    reason: err.to_string(),
                });
            }
        }
        if self.user_id.is_empty() {
            return Err(AgentError::MissingUserId);
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8080/ws".to_string(),
            ack_url: "http://127.0.0.1:8080/api/device-actions/ack".to_string(),
            user_id: String::new(),
            tenant_id: "default".to_string(),
            session_id: None,
            device_info: local_device_info(),
            heartbeat_interval: Duration::from_secs(30),
            command_deadline: Duration::from_secs(30),
            reconnect: ReconnectPolicy::Fixed {
                delay: Duration::from_secs(3),
            },
        }
    }
}

/// Metadata for the machine the agent runs on. Screen resolution stays zero
/// when there is no display to probe; the relay treats zero as "not reported".
pub fn local_device_info() -> DeviceInfo {
    DeviceInfo {
        form_factor: FormFactor::Desktop,
        platform: env::consts::OS.to_string(),
        client: format!("homeroom-agent/{}", env!("CARGO_PKG_VERSION")),
        screen: ScreenResolution::default(),
        capabilities: Capabilities {
            camera: false,
            microphone: false,
            screen_share: false,
            remote_control: true,
        },
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
}

// Normalize localhost to IPv4 to avoid IPv6 (::1) preference on macOS
fn normalize_host(url: String) -> String {
    if url.contains("//localhost") {
        url.replacen("//localhost", "//127.0.0.1", 1)
    } else {
        url
    }
}
