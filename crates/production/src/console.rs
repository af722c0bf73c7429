//! The interactive console.
//!
//! Parses the command surface (`moneyTransfer <dst> <amt>`, `failProcess`,
//! `fixProcess`, `printBlockchain`, `printBalance`, `exit`) from stdin.
//! Writes become client events on the runner's channel; reads are served
//! from the shared [`ChainView`] without touching the event loop.
//!
//! [`ChainView`]: crate::ChainView

use crate::SharedChainView;
use paxchain_core::Event;
use paxchain_types::NodeId;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `moneyTransfer <dst> <amt>`
    MoneyTransfer { receiver: NodeId, amount: u64 },
    /// `failProcess`
    FailProcess,
    /// `fixProcess`
    FixProcess,
    /// `printBlockchain`
    PrintBlockchain,
    /// `printBalance`
    PrintBalance,
    /// `exit`
    Exit,
}

/// Console parse errors, surfaced straight back to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0:?}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ParseError> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err(ParseError::Unknown(String::new()));
    };
    let rest: Vec<&str> = parts.collect();

    match verb {
        "moneyTransfer" => {
            let usage = "moneyTransfer <dst> <amt>";
            let [dst, amt] = rest.as_slice() else {
                return Err(ParseError::Usage(usage));
            };
            let receiver = dst.parse().map(NodeId).map_err(|_| ParseError::Usage(usage))?;
            let amount = amt.parse().map_err(|_| ParseError::Usage(usage))?;
            Ok(ConsoleCommand::MoneyTransfer { receiver, amount })
        }
        "failProcess" => Ok(ConsoleCommand::FailProcess),
        "fixProcess" => Ok(ConsoleCommand::FixProcess),
        "printBlockchain" => Ok(ConsoleCommand::PrintBlockchain),
        "printBalance" => Ok(ConsoleCommand::PrintBalance),
        "exit" => Ok(ConsoleCommand::Exit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

/// Spawn the stdin loop.
///
/// `shutdown_tx` is signalled on `exit` (or when stdin closes); the runner
/// drains and stops. The snapshot is already on disk, so exit needs no
/// flush of its own.
pub fn spawn_console(
    event_tx: mpsc::Sender<Event>,
    view: SharedChainView,
    shutdown_tx: mpsc::Sender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        println!(
            "commands: moneyTransfer <dst> <amt> | failProcess | fixProcess | printBlockchain | printBalance | exit"
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                // stdin closed: treat like exit.
                Ok(None) => break,
                Err(err) => {
                    debug!(%err, "console read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Ok(ConsoleCommand::MoneyTransfer { receiver, amount }) => {
                    if view.read().is_failed() {
                        println!("cannot process command: node is failed");
                        continue;
                    }
                    let _ = event_tx.send(Event::SubmitTransfer { receiver, amount }).await;
                }
                Ok(ConsoleCommand::FailProcess) => {
                    let _ = event_tx.send(Event::Fail).await;
                }
                Ok(ConsoleCommand::FixProcess) => {
                    let _ = event_tx.send(Event::Recover).await;
                }
                Ok(ConsoleCommand::PrintBlockchain) => {
                    let chain = view.read().chain().to_vec();
                    match serde_json::to_string_pretty(&chain) {
                        Ok(text) => println!("{text}"),
                        Err(err) => println!("cannot render chain: {err}"),
                    }
                }
                Ok(ConsoleCommand::PrintBalance) => {
                    let balances = view.read().balances().clone();
                    match serde_json::to_string(&balances) {
                        Ok(text) => println!("{text}"),
                        Err(err) => println!("cannot render balances: {err}"),
                    }
                }
                Ok(ConsoleCommand::Exit) => break,
                Err(err) => println!("{err}"),
            }
        }
        let _ = shutdown_tx.send(()).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transfer() {
        assert_eq!(
            parse_command("moneyTransfer 2 30"),
            Ok(ConsoleCommand::MoneyTransfer {
                receiver: NodeId(2),
                amount: 30
            })
        );
    }

    #[test]
    fn parses_bare_verbs() {
        assert_eq!(parse_command("failProcess"), Ok(ConsoleCommand::FailProcess));
        assert_eq!(parse_command("fixProcess"), Ok(ConsoleCommand::FixProcess));
        assert_eq!(
            parse_command("  printBlockchain  "),
            Ok(ConsoleCommand::PrintBlockchain)
        );
        assert_eq!(parse_command("printBalance"), Ok(ConsoleCommand::PrintBalance));
        assert_eq!(parse_command("exit"), Ok(ConsoleCommand::Exit));
    }

    #[test]
    fn rejects_malformed_transfer() {
        assert_eq!(
            parse_command("moneyTransfer 2"),
            Err(ParseError::Usage("moneyTransfer <dst> <amt>"))
        );
        assert_eq!(
            parse_command("moneyTransfer two 30"),
            Err(ParseError::Usage("moneyTransfer <dst> <amt>"))
        );
        assert_eq!(
            parse_command("moneyTransfer 2 -5"),
            Err(ParseError::Usage("moneyTransfer <dst> <amt>"))
        );
    }

    #[test]
    fn rejects_unknown_verbs() {
        assert_eq!(
            parse_command("sendMoney 2 30"),
            Err(ParseError::Unknown("sendMoney".into()))
        );
    }
}
