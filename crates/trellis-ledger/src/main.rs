//! Trellis node binary
//!
//! Placement and commission ledger daemon for a referral network.

use trellis_ledger::{NetworkConfig, TrellisNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis_node=info,trellis_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Trellis node");

    let config = NetworkConfig::from_env()?;

    let node = TrellisNode::new(config)?;
    node.run().await?;

    Ok(())
}
