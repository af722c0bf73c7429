//! Production runner with real I/O.
//!
//! This crate wraps the deterministic node state machine with tokio-based
//! networking, timers, and disk persistence:
//!
//! - **Transport**: one short-lived TCP connection per message, JSON
//!   payload, fixed artificial send delay, silent drops on connect failure
//!   or while the node is in FAILED mode
//! - **Timers**: one cancelable tokio task per timer id
//! - **Storage**: whole-snapshot JSON file, atomically replaced via
//!   write-temp-then-rename
//! - **Console**: the interactive command surface
//!   (`moneyTransfer`/`failProcess`/`fixProcess`/`printBlockchain`/
//!   `printBalance`/`exit`)
//!
//! # Architecture
//!
//! Uses the event aggregator pattern: a single task owns the state machine
//! and receives events via an mpsc channel fed by the TCP listener, the
//! timer manager, and the console. Actions are executed as they are
//! returned; internal loopback events drain before the next channel recv,
//! preserving the internal-first ordering the consensus engine relies on.

mod config;
mod console;
mod runner;
mod storage;
mod timers;
mod transport;
mod view;

pub use config::{ClusterConfig, ConfigError};
pub use console::{parse_command, spawn_console, ConsoleCommand, ParseError};
pub use runner::{NodeRunner, RunnerError};
pub use storage::{SnapshotStore, StorageError};
pub use timers::TimerManager;
pub use transport::{spawn_listener, Outbound};
pub use view::{ChainView, SharedChainView};
