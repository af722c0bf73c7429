//! Wire messages.
//!
//! Every message is one JSON object, framed as the entire payload of one
//! short-lived connection. The `type` tag and field names are the protocol;
//! validation of untrusted input happens at the decode boundary (a message
//! that fails to parse is dropped by the transport).

use crate::{Ballot, Block, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A peer-to-peer protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// Phase 1a: a proposer solicits promises for `ballot`.
    #[serde(rename = "PREPARE")]
    Prepare { from: NodeId, ballot: Ballot },

    /// Phase 1b: an acceptor promises `ballot`, reporting what it last
    /// accepted in this slot (if anything).
    #[serde(rename = "PROMISE")]
    Promise {
        from: NodeId,
        ballot: Ballot,
        accepted_ballot: Option<Ballot>,
        accepted_value: Option<Block>,
    },

    /// Phase 2a: the leader asks acceptors to accept `value`.
    #[serde(rename = "ACCEPT")]
    Accept {
        from: NodeId,
        ballot: Ballot,
        value: Block,
    },

    /// Phase 2b: an acceptor accepted `value` under `ballot`.
    #[serde(rename = "ACCEPTED")]
    Accepted {
        from: NodeId,
        ballot: Ballot,
        value: Block,
    },

    /// Learn phase: `value` is chosen for its slot.
    #[serde(rename = "DECIDE")]
    Decide { from: NodeId, value: Block },

    /// Catch-up: a recovering node asks for committed state.
    #[serde(rename = "REQUEST_LEDGER")]
    RequestLedger { from: NodeId },

    /// Catch-up reply: the responder's committed chain and balances.
    #[serde(rename = "LEDGER_RESPONSE")]
    LedgerResponse {
        from: NodeId,
        chain: Vec<Block>,
        balances: BTreeMap<NodeId, u64>,
    },
}

impl PeerMessage {
    /// The sending node.
    pub fn from(&self) -> NodeId {
        match self {
            PeerMessage::Prepare { from, .. }
            | PeerMessage::Promise { from, .. }
            | PeerMessage::Accept { from, .. }
            | PeerMessage::Accepted { from, .. }
            | PeerMessage::Decide { from, .. }
            | PeerMessage::RequestLedger { from }
            | PeerMessage::LedgerResponse { from, .. } => *from,
        }
    }

    /// Wire tag, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            PeerMessage::Prepare { .. } => "PREPARE",
            PeerMessage::Promise { .. } => "PROMISE",
            PeerMessage::Accept { .. } => "ACCEPT",
            PeerMessage::Accepted { .. } => "ACCEPTED",
            PeerMessage::Decide { .. } => "DECIDE",
            PeerMessage::RequestLedger { .. } => "REQUEST_LEDGER",
            PeerMessage::LedgerResponse { .. } => "LEDGER_RESPONSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Digest;

    #[test]
    fn prepare_wire_form() {
        let msg = PeerMessage::Prepare {
            from: NodeId(1),
            ballot: Ballot::new(4, NodeId(1), 0),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "PREPARE");
        assert_eq!(json["from"], 1);
        assert_eq!(json["ballot"], serde_json::json!([4, 1, 0]));
    }

    #[test]
    fn promise_carries_nulls_when_nothing_accepted() {
        let msg = PeerMessage::Promise {
            from: NodeId(2),
            ballot: Ballot::new(4, NodeId(1), 0),
            accepted_ballot: None,
            accepted_value: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["accepted_ballot"].is_null());
        assert!(json["accepted_value"].is_null());
        let back: PeerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn decide_round_trips() {
        let block = Block::seal(NodeId(1), NodeId(2), 30, "ab12CD34".into(), Digest::ZERO);
        let msg = PeerMessage::Decide {
            from: NodeId(3),
            value: block,
        };
        let text = serde_json::to_string(&msg).unwrap();
        let back: PeerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.type_name(), "DECIDE");
    }

    #[test]
    fn garbage_is_rejected_at_decode() {
        assert!(serde_json::from_str::<PeerMessage>("{\"type\":\"NOPE\"}").is_err());
        assert!(serde_json::from_str::<PeerMessage>("not json").is_err());
    }
}
