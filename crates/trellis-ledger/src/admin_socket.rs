//! Unix socket server for admin commands.
//!
//! One JSON command per line in, one JSON response per line out. This is the
//! only way events and operator actions reach a running node; the
//! `trellis-admin` CLI is a thin client for it.

use crate::commission::PaymentOutcome;
use crate::error::{Error, Result};
use crate::models::{unix_secs, PaymentConfirmed};
use crate::network::Network;
use crate::payout::PayoutOutcome;
use crate::wallet::BonusOutcome;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Create the tree root
    Bootstrap { owner_id: String },
    /// Register a participant
    Signup {
        participant_id: String,
        #[serde(default)]
        sponsor_code: Option<String>,
    },
    /// Payment-confirmed event from the order layer
    PaymentConfirmed {
        participant_id: String,
        order_id: String,
        amount: u64,
        #[serde(default)]
        confirmed_at: Option<u64>,
    },
    /// Pay out a period; defaults to the last closed one
    RunPayout {
        #[serde(default)]
        period: Option<u64>,
    },
    /// Credit a one-off bonus
    GrantBonus {
        participant_id: String,
        amount: u64,
        reference: String,
    },
    RequestWithdrawal { participant_id: String, amount: u64 },
    ApproveWithdrawal { id: String },
    RejectWithdrawal { id: String },
    /// Balance and rank
    Wallet { participant_id: String },
    /// Ledger entries
    Ledger { participant_id: String },
    /// Tree position
    Placement { participant_id: String },
    /// Commission entries of an order
    OrderCommissions { order_id: String },
    Withdrawals { participant_id: String },
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Data { data: serde_json::Value },
    Pong,
}

impl AdminResponse {
    fn data<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(data) => AdminResponse::Data { data },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        }
    }

    fn error(e: impl std::fmt::Display) -> Self {
        AdminResponse::Error {
            error: e.to_string(),
        }
    }
}

/// Admin socket server.
pub struct AdminSocket {
    network: Network,
    socket_path: String,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(network: Network, socket_path: &str) -> Self {
        Self {
            network,
            socket_path: socket_path.to_string(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Stale socket from a previous run
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let network = self.network.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, network).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }
}

async fn handle_connection(stream: UnixStream, network: Network) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &network).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

/// Execute one command against the network.
pub async fn execute_command(cmd: AdminCommand, network: &Network) -> AdminResponse {
    match cmd {
        AdminCommand::Bootstrap { owner_id } => match blocking(network, move |n| n.bootstrap_root(&owner_id)).await {
            Ok(owner) => AdminResponse::Ok {
                message: format!(
                    "Root {} placed, referral code {}",
                    owner.id,
                    owner.referral_code.map(String::from).unwrap_or_default()
                ),
            },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Signup {
            participant_id,
            sponsor_code,
        } => match blocking(network, move |n| n.signup(&participant_id, sponsor_code.as_deref())).await {
            Ok(p) => AdminResponse::data(&p),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::PaymentConfirmed {
            participant_id,
            order_id,
            amount,
            confirmed_at,
        } => {
            let event = PaymentConfirmed {
                participant_id,
                order_id,
                amount,
                confirmed_at: confirmed_at.unwrap_or_else(unix_secs),
            };
            match blocking(network, move |n| n.payment_confirmed(&event)).await {
                Ok(PaymentOutcome::Processed(receipt)) => AdminResponse::data(&receipt.order),
                Ok(PaymentOutcome::AlreadyProcessed(order)) => AdminResponse::Ok {
                    message: format!("Order {} already processed", order.order_id),
                },
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::RunPayout { period } => {
            let period = match period.or_else(|| network.config().pool.last_closed(unix_secs())) {
                Some(period) => period,
                None => return AdminResponse::error("no closed period yet"),
            };
            match network.run_pool_payout(period).await {
                Ok(PayoutOutcome::Completed(run)) => AdminResponse::data(&run),
                Ok(PayoutOutcome::AlreadyProcessed(run)) => AdminResponse::Ok {
                    message: format!("Period {} already paid ({} participants)", run.period, run.paid_count),
                },
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::GrantBonus {
            participant_id,
            amount,
            reference,
        } => match blocking(network, move |n| n.grant_bonus(&participant_id, amount, &reference)).await {
            Ok(BonusOutcome::Granted(entry)) => AdminResponse::data(&entry),
            Ok(BonusOutcome::AlreadyProcessed(id)) => AdminResponse::Ok {
                message: format!("Bonus already granted as entry {}", id),
            },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::RequestWithdrawal {
            participant_id,
            amount,
        } => match blocking(network, move |n| n.request_withdrawal(&participant_id, amount)).await {
            Ok(request) => AdminResponse::data(&request),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::ApproveWithdrawal { id } => match blocking(network, move |n| n.approve_withdrawal(&id)).await {
            Ok((request, _)) => AdminResponse::data(&request),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::RejectWithdrawal { id } => match blocking(network, move |n| n.reject_withdrawal(&id)).await {
            Ok(request) => AdminResponse::data(&request),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Wallet { participant_id } => match blocking(network, move |n| n.wallet(&participant_id)).await {
            Ok(wallet) => AdminResponse::data(&wallet),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Ledger { participant_id } => match blocking(network, move |n| n.ledger(&participant_id)).await {
            Ok(entries) => AdminResponse::data(&entries),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Placement { participant_id } => match blocking(network, move |n| n.placement(&participant_id)).await {
            Ok(node) => AdminResponse::data(&node),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::OrderCommissions { order_id } => match blocking(network, move |n| n.order_commissions(&order_id)).await {
            Ok(entries) => AdminResponse::data(&entries),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Withdrawals { participant_id } => match blocking(network, move |n| n.withdrawals_for(&participant_id)).await {
            Ok(requests) => AdminResponse::data(&requests),
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Ping => AdminResponse::Pong,
    }
}

/// Run a synchronous network call on the blocking pool.
async fn blocking<T, F>(network: &Network, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Network) -> Result<T> + Send + 'static,
{
    let network = network.clone();
    tokio::task::spawn_blocking(move || f(&network))
        .await
        .map_err(|e| Error::Storage(format!("admin task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use tempfile::tempdir;
    use trellis_matrix::CommissionTable;

    fn network(dir: &std::path::Path) -> Network {
        let config = NetworkConfig::new(dir, CommissionTable::new([1000, 0, 0, 0, 0]).unwrap());
        Network::open(config).unwrap()
    }

    #[test]
    fn commands_parse_from_json() {
        let cmd: AdminCommand = serde_json::from_str(
            r#"{"cmd":"payment_confirmed","participant_id":"a","order_id":"o1","amount":500}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            AdminCommand::PaymentConfirmed {
                amount: 500,
                confirmed_at: None,
                ..
            }
        ));

        let cmd: AdminCommand = serde_json::from_str(r#"{"cmd":"run_payout"}"#).unwrap();
        assert!(matches!(cmd, AdminCommand::RunPayout { period: None }));
    }

    #[tokio::test]
    async fn payment_then_wallet() {
        let dir = tempdir().unwrap();
        let network = network(dir.path());

        let resp = execute_command(
            AdminCommand::Bootstrap {
                owner_id: "owner".into(),
            },
            &network,
        )
        .await;
        assert!(matches!(resp, AdminResponse::Ok { .. }));

        execute_command(
            AdminCommand::Signup {
                participant_id: "a".into(),
                sponsor_code: None,
            },
            &network,
        )
        .await;
        let pay = || AdminCommand::PaymentConfirmed {
            participant_id: "a".into(),
            order_id: "o1".into(),
            amount: 500,
            confirmed_at: Some(0),
        };
        assert!(matches!(execute_command(pay(), &network).await, AdminResponse::Data { .. }));
        assert!(matches!(execute_command(pay(), &network).await, AdminResponse::Ok { .. }));

        let resp = execute_command(
            AdminCommand::Wallet {
                participant_id: "owner".into(),
            },
            &network,
        )
        .await;
        let AdminResponse::Data { data } = resp else {
            panic!("expected data, got {:?}", resp);
        };
        assert_eq!(data["balance"], 50);
    }

    #[tokio::test]
    async fn errors_are_reported() {
        let dir = tempdir().unwrap();
        let network = network(dir.path());
        let resp = execute_command(
            AdminCommand::Wallet {
                participant_id: "ghost".into(),
            },
            &network,
        )
        .await;
        assert!(matches!(resp, AdminResponse::Error { .. }));
        assert_eq!(execute_command(AdminCommand::Ping, &network).await, AdminResponse::Pong);
    }

    #[tokio::test]
    async fn socket_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.sock");
        let socket = AdminSocket::new(network(dir.path()), path.to_str().unwrap());
        tokio::spawn(async move { socket.run().await });

        let mut stream = None;
        for _ in 0..50 {
            if let Ok(s) = UnixStream::connect(&path).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let (reader, mut writer) = stream.expect("socket never came up").into_split();
        writer.write_all(b"{\"cmd\":\"ping\"}\nnot json\n").await.unwrap();

        let mut lines = BufReader::new(reader).lines();
        let pong: AdminResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(pong, AdminResponse::Pong);
        let bad: AdminResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(bad, AdminResponse::Error { .. }));
    }
}
