//! Homeroom student endpoint: keeps a control channel open to the classroom
//! relay, registers the device, heartbeats, executes teacher-issued control
//! commands, and reports each command's outcome to the classroom API.

pub mod config;
pub mod control;
pub mod error;
pub mod session;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{AgentConfig, ReconnectPolicy};
pub use control::status::{ControlStatus, EndpointFlags};
pub use error::AgentError;
pub use session::SessionStatus;
pub use session::supervisor::{
    AgentDeps, AgentHandle, BackoffPolicy, ConnectionState, DeviceAgent, ExponentialBackoff,
    FixedDelay,
};
