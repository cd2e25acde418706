//! Trellis node - the daemon entry point.
//!
//! Architecture:
//! - Single process with shared RocksDB storage
//! - Unix admin socket for events and operator commands (trellis-admin CLI)
//! - Optional payout tick that settles the last closed pool period

use crate::admin_socket::AdminSocket;
use crate::config::NetworkConfig;
use crate::error::Result;
use crate::models::unix_secs;
use crate::network::Network;
use crate::payout::PayoutOutcome;
use std::time::Duration;

/// A Trellis node instance.
pub struct TrellisNode {
    network: Network,
}

impl TrellisNode {
    /// Open storage and create a node.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        Ok(Self {
            network: Network::open(config)?,
        })
    }

    /// Shared network handle.
    pub fn network(&self) -> Network {
        self.network.clone()
    }

    /// Run until interrupted.
    pub async fn run(self) -> Result<()> {
        let config = self.network.config().clone();
        tracing::info!("Trellis node starting");
        tracing::info!("  Admin: {:?}", config.admin_socket);
        tracing::info!("  Data: {:?}", config.data_dir);
        tracing::info!("  Commission (bps by depth): {:?}", config.commission.rates());
        tracing::info!("  Unclaimed shares: {:?}", config.unclaimed);

        if self.network.storage().root_id()?.is_none() {
            tracing::warn!("No tree root yet; activations fail until one is bootstrapped");
        }

        let admin_socket = AdminSocket::new(
            self.network.clone(),
            config.admin_socket.to_str().unwrap_or("./trellis-data/admin.sock"),
        );
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        if let Some(secs) = config.pool.tick_secs {
            let network = self.network.clone();
            tokio::spawn(async move { payout_tick(network, Duration::from_secs(secs.max(1))).await });
        }

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
        Ok(())
    }
}

async fn payout_tick(network: Network, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let Some(period) = network.config().pool.last_closed(unix_secs()) else {
            continue;
        };
        match network.run_pool_payout(period).await {
            Ok(PayoutOutcome::Completed(run)) => {
                tracing::info!("Scheduled payout for period {} paid {}", period, run.total_paid);
            }
            Ok(PayoutOutcome::AlreadyProcessed(_)) => {}
            Err(e) => tracing::error!("Scheduled payout for period {} failed: {}", period, e),
        }
    }
}
