//! Bidirectional message registry.
//!
//! Compiled once from the resolved catalog: every rx message of every node is
//! indexed by PGN so inbound frames resolve to `(node, message, payload)` in
//! one lookup plus an address scan. Outbound payloads encode through the same
//! bound messages.

use std::collections::HashMap;
use std::sync::Arc;

use wb_config::{BoundMessage, Catalog, Node};
use wb_protocol::{BROADCAST_ADDR, Direction, Frame, Payload, can_id_to_pgn, pgn_to_can_id};

use crate::error::{CanError, CanResult};

/// Default source node for outbound messages.
pub const MASTER_NODE_KEY: &str = "master";

/// An inbound frame resolved against the registry.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub node: Arc<Node>,
    pub msg_key: String,
    pub payload: Payload,
}

pub struct MessageRegistry {
    catalog: Arc<Catalog>,
    by_pgn: HashMap<u32, Vec<(Arc<Node>, BoundMessage)>>,
}

impl MessageRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let mut by_pgn: HashMap<u32, Vec<(Arc<Node>, BoundMessage)>> = HashMap::new();
        for node in &catalog.nodes {
            for bound in &node.messages {
                if bound.def.direction == Direction::Rx {
                    by_pgn
                        .entry(bound.def.pgn)
                        .or_default()
                        .push((node.clone(), bound.clone()));
                }
            }
        }
        Self { catalog, by_pgn }
    }

    /// Resolve an inbound frame. Unknown PGNs, address mismatches, and
    /// payloads that fail to decode all drop the frame.
    pub fn decode(&self, frame: &Frame) -> Option<Decoded> {
        let (pgn, _priority, src_addr, dest_addr) = can_id_to_pgn(frame.can_id);
        let candidates = self.by_pgn.get(&pgn)?;

        for (node, bound) in candidates {
            let dest_matches = dest_addr == BROADCAST_ADDR || dest_addr == node.node_addr;
            let src_matches = bound.src_addr.is_none_or(|addr| addr == src_addr);
            if !(dest_matches && src_matches) {
                continue;
            }

            return match bound.def.decode(&frame.data) {
                Ok(payload) => Some(Decoded {
                    node: node.clone(),
                    msg_key: bound.key.clone(),
                    payload,
                }),
                Err(e) => {
                    tracing::debug!(
                        pgn = format_args!("0x{pgn:05X}"),
                        node = %node.key,
                        error = %e,
                        "dropping undecodable frame"
                    );
                    None
                }
            };
        }

        None
    }

    /// Encode an outbound payload for `target_node_key`, sourced from the
    /// master. Unknown keys are programmer errors and fatal to the caller.
    pub fn encode(
        &self,
        target_node_key: &str,
        msg_key: &str,
        payload: &Payload,
    ) -> CanResult<Frame> {
        self.encode_from(target_node_key, msg_key, payload, MASTER_NODE_KEY)
    }

    /// Encode an outbound payload with an explicit source node.
    pub fn encode_from(
        &self,
        target_node_key: &str,
        msg_key: &str,
        payload: &Payload,
        src_node_key: &str,
    ) -> CanResult<Frame> {
        let src_node = self.node(src_node_key)?;
        let target_node = self.node(target_node_key)?;
        let bound =
            target_node
                .message(msg_key)
                .ok_or_else(|| CanError::UnknownMessage {
                    node: target_node_key.to_string(),
                    message: msg_key.to_string(),
                })?;

        let data = bound.def.encode(payload)?;
        let can_id = pgn_to_can_id(
            bound.def.pgn,
            bound.def.priority,
            src_node.node_addr,
            target_node.node_addr,
        );
        Ok(Frame::new(can_id, data))
    }

    fn node(&self, key: &str) -> CanResult<&Arc<Node>> {
        self.catalog
            .node(key)
            .ok_or_else(|| CanError::UnknownNode(key.to_string()))
    }
}
