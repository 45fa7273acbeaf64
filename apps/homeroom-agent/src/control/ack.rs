use std::time::Duration;

use async_trait::async_trait;
use homeroom_proto::CommandAck;
use thiserror::Error;

/// Upper bound on any single acknowledgement POST; the classroom API is on
/// the local network and should answer well inside this.
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AckError {
    #[error("acknowledgement post failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("acknowledgement endpoint rejected the report: {0}")]
    Rejected(String),
}

/// Where command outcomes are reported. The production sink POSTs to the
/// classroom API; tests substitute a recorder.
#[async_trait]
pub trait AckSink: Send + Sync {
    async fn report(&self, ack: &CommandAck) -> Result<(), AckError>;
}

pub struct RestAckSink {
    client: reqwest::Client,
    endpoint: String,
}

impl RestAckSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ACK_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AckSink for RestAckSink {
    async fn report(&self, ack: &CommandAck) -> Result<(), AckError> {
        self.client
            .post(&self.endpoint)
            .json(ack)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
