use std::time::Duration;

use tokio::time::interval;
use tracing::trace;

use homeroom_proto::ClientMessage;

use super::channel::ChannelSender;

/// Emits `heartbeat` frames on a fixed cadence for as long as the channel is
/// open. The task ends on its own once the channel sender is gone and is
/// aborted explicitly when the connection closes.
pub(crate) struct HeartbeatPublisher {
    sender: ChannelSender,
    device_id: String,
}

impl HeartbeatPublisher {
    pub(crate) fn new(sender: ChannelSender, device_id: String) -> Self {
        Self { sender, device_id }
    }

    pub(crate) fn spawn(self, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            // the first tick fires immediately; the first beat should wait a
            // full period after registration
            ticker.tick().await;
            loop {
                ticker.tick().await;
                trace!(target: "homeroom::heartbeat", device_id = %self.device_id, "heartbeat");
                let beat = ClientMessage::Heartbeat {
                    device_id: self.device_id.clone(),
                };
                if self.sender.send(beat).is_err() {
                    break;
                }
            }
        })
    }
}
