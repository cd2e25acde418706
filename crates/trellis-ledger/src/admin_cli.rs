//! trellis-admin CLI tool
//!
//! Sends events and operator commands to a running trellis-node.
//!
//! Usage:
//!   trellis-admin bootstrap <owner_id>
//!   trellis-admin signup <participant_id> [sponsor_code]
//!   trellis-admin pay <participant_id> <order_id> <amount> [confirmed_at]
//!   trellis-admin payout [period]
//!   trellis-admin bonus <participant_id> <amount> <reference>
//!   trellis-admin withdraw <participant_id> <amount>
//!   trellis-admin approve <withdrawal_id>
//!   trellis-admin reject <withdrawal_id>
//!   trellis-admin wallet|ledger|placement|withdrawals <participant_id>
//!   trellis-admin order <order_id>
//!   trellis-admin ping

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use trellis_ledger::config::admin_socket_from_env;

/// Admin command sent over the socket.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum AdminCommand {
    Bootstrap {
        owner_id: String,
    },
    Signup {
        participant_id: String,
        sponsor_code: Option<String>,
    },
    PaymentConfirmed {
        participant_id: String,
        order_id: String,
        amount: u64,
        confirmed_at: Option<u64>,
    },
    RunPayout {
        period: Option<u64>,
    },
    GrantBonus {
        participant_id: String,
        amount: u64,
        reference: String,
    },
    RequestWithdrawal {
        participant_id: String,
        amount: u64,
    },
    ApproveWithdrawal {
        id: String,
    },
    RejectWithdrawal {
        id: String,
    },
    Wallet {
        participant_id: String,
    },
    Ledger {
        participant_id: String,
    },
    Placement {
        participant_id: String,
    },
    OrderCommissions {
        order_id: String,
    },
    Withdrawals {
        participant_id: String,
    },
    Ping,
}

/// Response from admin command.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Data { data: serde_json::Value },
    Pong,
}

fn print_usage() {
    eprintln!("trellis-admin - Drive a Trellis node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  trellis-admin bootstrap <owner_id>                        Create the tree root");
    eprintln!("  trellis-admin signup <id> [sponsor_code]                  Register a participant");
    eprintln!("  trellis-admin pay <id> <order_id> <amount> [unix_secs]    Confirm a payment");
    eprintln!("  trellis-admin payout [period]                             Pay out a pool period");
    eprintln!("  trellis-admin bonus <id> <amount> <reference>             Grant a bonus");
    eprintln!("  trellis-admin withdraw <id> <amount>                      Request a withdrawal");
    eprintln!("  trellis-admin approve <withdrawal_id>                     Approve a withdrawal");
    eprintln!("  trellis-admin reject <withdrawal_id>                      Reject a withdrawal");
    eprintln!("  trellis-admin wallet <id>                                 Show balance and level");
    eprintln!("  trellis-admin ledger <id>                                 Show ledger entries");
    eprintln!("  trellis-admin placement <id>                              Show tree position");
    eprintln!("  trellis-admin withdrawals <id>                            List withdrawals");
    eprintln!("  trellis-admin order <order_id>                            Show order commissions");
    eprintln!("  trellis-admin ping                                        Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TRELLIS_ADMIN_SOCKET  Path to admin socket (default: $TRELLIS_DATA_DIR/admin.sock)");
    eprintln!("  TRELLIS_DATA_DIR      Node data directory (default: ./trellis-data)");
}

fn get_socket_path() -> PathBuf {
    admin_socket_from_env()
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to trellis-node at {:?}: {}\n\
             Is the trellis-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn arg(args: &[String], index: usize, command: &str, name: &str) -> String {
    match args.get(index) {
        Some(value) => value.clone(),
        None => fail(&format!("{} requires a {} argument", command, name)),
    }
}

fn number(args: &[String], index: usize, command: &str, name: &str) -> u64 {
    let raw = arg(args, index, command, name);
    raw.parse()
        .unwrap_or_else(|_| fail(&format!("{} must be a non-negative integer, got {:?}", name, raw)))
}

fn optional_number(args: &[String], index: usize, name: &str) -> Option<u64> {
    args.get(index).map(|raw| {
        raw.parse()
            .unwrap_or_else(|_| fail(&format!("{} must be a non-negative integer, got {:?}", name, raw)))
    })
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = args[1].as_str();
    let cmd = match command {
        "bootstrap" => AdminCommand::Bootstrap {
            owner_id: arg(&args, 2, command, "owner_id"),
        },
        "signup" => AdminCommand::Signup {
            participant_id: arg(&args, 2, command, "participant_id"),
            sponsor_code: args.get(3).cloned(),
        },
        "pay" => AdminCommand::PaymentConfirmed {
            participant_id: arg(&args, 2, command, "participant_id"),
            order_id: arg(&args, 3, command, "order_id"),
            amount: number(&args, 4, command, "amount"),
            confirmed_at: optional_number(&args, 5, "confirmed_at"),
        },
        "payout" => AdminCommand::RunPayout {
            period: optional_number(&args, 2, "period"),
        },
        "bonus" => AdminCommand::GrantBonus {
            participant_id: arg(&args, 2, command, "participant_id"),
            amount: number(&args, 3, command, "amount"),
            reference: arg(&args, 4, command, "reference"),
        },
        "withdraw" => AdminCommand::RequestWithdrawal {
            participant_id: arg(&args, 2, command, "participant_id"),
            amount: number(&args, 3, command, "amount"),
        },
        "approve" => AdminCommand::ApproveWithdrawal {
            id: arg(&args, 2, command, "withdrawal_id"),
        },
        "reject" => AdminCommand::RejectWithdrawal {
            id: arg(&args, 2, command, "withdrawal_id"),
        },
        "wallet" => AdminCommand::Wallet {
            participant_id: arg(&args, 2, command, "participant_id"),
        },
        "ledger" => AdminCommand::Ledger {
            participant_id: arg(&args, 2, command, "participant_id"),
        },
        "placement" => AdminCommand::Placement {
            participant_id: arg(&args, 2, command, "participant_id"),
        },
        "withdrawals" => AdminCommand::Withdrawals {
            participant_id: arg(&args, 2, command, "participant_id"),
        },
        "order" => AdminCommand::OrderCommissions {
            order_id: arg(&args, 2, command, "order_id"),
        },
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            AdminResponse::Data { data } => match serde_json::to_string_pretty(&data) {
                Ok(text) => println!("{}", text),
                Err(e) => fail(&e.to_string()),
            },
            AdminResponse::Pong => {
                println!("pong - trellis-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
