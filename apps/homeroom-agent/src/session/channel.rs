use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, trace};

use homeroom_proto::ClientMessage;

use crate::error::AgentError;

/// How long a graceful close waits for the relay to answer before the socket
/// task is torn down anyway.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub(crate) enum Outbound {
    Frame(ClientMessage),
    Close,
}

/// One live socket to the relay. Outbound frames go through an mpsc pump so
/// any task can send; inbound text frames come back raw for the dispatcher
/// to parse. When the socket dies the receiving side simply ends.
pub(crate) struct Channel {
    tx: mpsc::UnboundedSender<Outbound>,
    rx: mpsc::UnboundedReceiver<String>,
    task: Option<tokio::task::JoinHandle<()>>,
}

/// Cloneable sending half, handed to the heartbeat task.
#[derive(Clone)]
pub(crate) struct ChannelSender(pub(crate) mpsc::UnboundedSender<Outbound>);

impl ChannelSender {
    pub(crate) fn send(&self, message: ClientMessage) -> Result<(), AgentError> {
        self.0
            .send(Outbound::Frame(message))
            .map_err(|_| AgentError::ChannelClosed)
    }
}

impl Channel {
    pub(crate) async fn connect(url: &str) -> Result<Self, AgentError> {
        let (ws_stream, _) = connect_async(url).await?;
        let (tx_out, rx_out) = mpsc::unbounded_channel::<Outbound>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(run_socket(ws_stream, rx_out, tx_in));
        Ok(Self {
            tx: tx_out,
            rx: rx_in,
            task: Some(task),
        })
    }

    pub(crate) fn sender(&self) -> ChannelSender {
        ChannelSender(self.tx.clone())
    }

    pub(crate) fn send(&self, message: ClientMessage) -> Result<(), AgentError> {
        self.tx
            .send(Outbound::Frame(message))
            .map_err(|_| AgentError::ChannelClosed)
    }

    /// Next inbound text frame; `None` once the socket is gone.
    pub(crate) async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Graceful shutdown: send a Close frame, give the relay a moment to
    /// answer, then tear the socket task down.
    pub(crate) async fn close(mut self) {
        let _ = self.tx.send(Outbound::Close);
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_socket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<Outbound>,
    tx_in: mpsc::UnboundedSender<String>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Forward outbound messages to the socket as JSON text frames.
    let send_task = tokio::spawn(async move {
        while let Some(out) = rx_out.recv().await {
            let message = match out {
                Outbound::Frame(message) => message,
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            };
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(
                        target: "homeroom::channel",
                        error = %err,
                        "dropping unserializable outbound message"
                    );
                }
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                trace!(target: "homeroom::channel", len = text.len(), "inbound frame");
                if tx_in.send(text).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    send_task.abort();
}
