//! The production event loop.

use crate::{Outbound, SharedChainView, SnapshotStore, StorageError, TimerManager};
use paxchain_core::{Action, Event, StateMachine};
use paxchain_node::NodeStateMachine;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Fatal runner errors.
///
/// A snapshot write failure is the only fatal condition: continuing after
/// one would let commits outrun disk, so the process must die (the atomic
/// rename guarantees the previous snapshot survives).
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("snapshot persistence failed: {0}")]
    Storage(#[from] StorageError),
}

/// Owns the state machine and executes its actions against real I/O.
///
/// Exactly one task runs the loop, so every event is handled to completion
/// before the next one starts. Internal loopback events drain before the
/// channel is polled again, matching the simulation's priority order.
pub struct NodeRunner {
    machine: NodeStateMachine,
    event_rx: mpsc::Receiver<Event>,
    timers: TimerManager,
    outbound: Outbound,
    store: SnapshotStore,
    view: SharedChainView,
    /// Transport-visible mirror of the machine's FAILED flag.
    failed: Arc<AtomicBool>,
    /// Loopback queue for `EnqueueInternal`.
    internal: VecDeque<Event>,
    started: Instant,
}

impl NodeRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        machine: NodeStateMachine,
        event_rx: mpsc::Receiver<Event>,
        timers: TimerManager,
        outbound: Outbound,
        store: SnapshotStore,
        view: SharedChainView,
        failed: Arc<AtomicBool>,
    ) -> Self {
        NodeRunner {
            machine,
            event_rx,
            timers,
            outbound,
            store,
            view,
            failed,
            internal: VecDeque::new(),
            started: Instant::now(),
        }
    }

    /// Run until shutdown is signalled or every event source closes.
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<(), RunnerError> {
        loop {
            // Consequences of the previous event come first.
            while let Some(event) = self.internal.pop_front() {
                self.dispatch(event)?;
            }
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("shutting down");
                    self.timers.cancel_all();
                    return Ok(());
                }
                event = self.event_rx.recv() => match event {
                    Some(event) => self.dispatch(event)?,
                    None => return Ok(()),
                },
            }
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<(), RunnerError> {
        self.machine.set_time(self.started.elapsed());
        let actions = self.machine.handle(event);
        for action in actions {
            self.execute(action)?;
        }

        let failed = self.machine.is_failed();
        self.failed.store(failed, Ordering::Relaxed);
        self.view.write().set_failed(failed);
        Ok(())
    }

    fn execute(&mut self, action: Action) -> Result<(), RunnerError> {
        match action {
            Action::Send { to, message } => self.outbound.send(to, message),
            Action::Broadcast { message } => self.outbound.broadcast(message),
            Action::SetTimer { id, duration } => self.timers.set_timer(id, duration),
            Action::CancelTimer { id } => self.timers.cancel_timer(id),
            Action::EnqueueInternal { event } => self.internal.push_back(event),
            Action::PersistLedger { snapshot } => {
                self.store.save(&snapshot)?;
                self.view.write().update(snapshot);
            }
            Action::EmitCommitted { block, depth } => {
                info!(depth, hash = %block.hash, "block committed");
                println!(
                    "committed depth {depth}: {} -> {} ${}",
                    block.sender, block.receiver, block.amount
                );
            }
            Action::EmitTransferRejected {
                receiver,
                amount,
                reason,
            } => {
                warn!(%receiver, amount, %reason, "transfer rejected");
                println!("transfer to {receiver} of ${amount} rejected: {reason}");
            }
        }
        Ok(())
    }
}
