use anyhow::Result;
use clap::Parser;
use tracing::info;

use homeroom_agent::{AgentConfig, DeviceAgent, telemetry};

#[derive(Parser, Debug)]
#[command(
    name = "homeroom-agent",
    about = "Student endpoint for the Homeroom classroom device-control channel"
)]
struct Cli {
    /// Identity of the student this device belongs to
    #[arg(long, env = "HOMEROOM_USER_ID")]
    user: String,

    /// Live session to join on connect; omit to stay connected but unbound
    #[arg(long, env = "HOMEROOM_SESSION_ID")]
    session: Option<String>,

    /// WebSocket address of the classroom relay
    #[arg(long, env = "HOMEROOM_RELAY_URL")]
    relay: Option<String>,

    /// REST endpoint receiving command acknowledgements
    #[arg(long, env = "HOMEROOM_ACK_URL")]
    ack_url: Option<String>,

    /// School / district tenant identifier
    #[arg(long, env = "HOMEROOM_TENANT_ID")]
    tenant: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init()?;

    let cli = Cli::parse();
    let mut config = AgentConfig::from_env();
    config.user_id = cli.user;
    config.session_id = cli.session;
    if let Some(relay) = cli.relay {
        config.relay_url = relay;
    }
    if let Some(ack_url) = cli.ack_url {
        config.ack_url = ack_url;
    }
    if let Some(tenant) = cli.tenant {
        config.tenant_id = tenant;
    }
    config.validate()?;

    let (agent, handle) = DeviceAgent::new(config);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            handle.shutdown();
        }
    });
    agent.run().await;
    Ok(())
}
