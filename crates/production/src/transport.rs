//! TCP transport: one short-lived connection per message.
//!
//! Outbound messages are JSON documents written as the entire payload of a
//! fresh connection, after the fixed artificial wire delay. Delivery is
//! best effort: connection failures are dropped silently, and a node in
//! FAILED mode drops traffic in both directions, including sends already
//! in flight when the failure happened (the flag is re-checked after the
//! delay).

use crate::ClusterConfig;
use paxchain_core::Event;
use paxchain_types::{peers_of, NodeId, PeerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Sender half of the transport.
#[derive(Clone)]
pub struct Outbound {
    cluster: Arc<ClusterConfig>,
    me: NodeId,
    /// Mirrors the state machine's FAILED flag.
    failed: Arc<AtomicBool>,
    /// Artificial one-way delay applied before every send.
    delay: Duration,
}

impl Outbound {
    pub fn new(
        cluster: Arc<ClusterConfig>,
        me: NodeId,
        failed: Arc<AtomicBool>,
        delay: Duration,
    ) -> Self {
        Outbound {
            cluster,
            me,
            failed,
            delay,
        }
    }

    /// Schedule one message for delivery. Non-blocking; the delay, the
    /// connection, and any failure all happen on a spawned task.
    pub fn send(&self, to: NodeId, message: PeerMessage) {
        if self.failed.load(Ordering::Relaxed) {
            trace!(to = %to, "send dropped, node failed");
            return;
        }
        let Some(addr) = self.cluster.addr(to) else {
            warn!(to = %to, "no address for peer");
            return;
        };
        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "message encoding failed");
                return;
            }
        };

        let failed = Arc::clone(&self.failed);
        let delay = self.delay;
        let kind = message.type_name();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if failed.load(Ordering::Relaxed) {
                trace!(to = %to, kind, "in-flight send dropped, node failed");
                return;
            }
            match TcpStream::connect(addr).await {
                Ok(mut stream) => {
                    if let Err(err) = stream.write_all(&payload).await {
                        debug!(to = %to, kind, %err, "send failed");
                        return;
                    }
                    let _ = stream.shutdown().await;
                    trace!(to = %to, kind, "sent");
                }
                // Best effort: unreachable peers recover via timeouts.
                Err(err) => debug!(to = %to, kind, %err, "connect failed"),
            }
        });
    }

    /// Send to every peer except self.
    pub fn broadcast(&self, message: PeerMessage) {
        for peer in peers_of(self.me) {
            self.send(peer, message.clone());
        }
    }
}

/// Bind the listen socket and spawn the accept loop.
///
/// Each accepted connection is read to EOF on its own task, parsed as one
/// JSON [`PeerMessage`], and pushed into the event channel. Malformed
/// payloads are dropped at this decode boundary; while the node is failed,
/// inbound traffic is dropped wholesale.
///
/// Returns the bound address (useful with port 0) and the loop handle.
pub async fn spawn_listener(
    addr: std::net::SocketAddr,
    event_tx: mpsc::Sender<Event>,
    failed: Arc<AtomicBool>,
) -> std::io::Result<(std::net::SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        loop {
            let (mut stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    debug!(%err, "accept failed");
                    continue;
                }
            };
            if failed.load(Ordering::Relaxed) {
                trace!(%peer, "inbound connection dropped, node failed");
                continue;
            }
            let event_tx = event_tx.clone();
            let failed = Arc::clone(&failed);
            tokio::spawn(async move {
                let mut payload = Vec::new();
                if let Err(err) = stream.read_to_end(&mut payload).await {
                    debug!(%peer, %err, "read failed");
                    return;
                }
                if failed.load(Ordering::Relaxed) {
                    return;
                }
                match serde_json::from_slice::<PeerMessage>(&payload) {
                    Ok(message) => {
                        trace!(from = %message.from(), kind = message.type_name(), "received");
                        let _ = event_tx.send(Event::from(message)).await;
                    }
                    Err(err) => debug!(%peer, %err, "malformed message dropped"),
                }
            });
        }
    });

    Ok((local, handle))
}
