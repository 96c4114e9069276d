//! Queue items shared between producers, the dispatch task, and the send
//! task.

use tokio::sync::mpsc;

use wb_protocol::Payload;

/// One `(node, message, payload)` triple, produced by periodic tx tasks and
/// mock sources, drained by the supervisor's send and dispatch tasks.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub node_key: String,
    pub msg_key: String,
    pub payload: Payload,
}

pub type QueueSender = mpsc::UnboundedSender<QueueItem>;
pub type QueueReceiver = mpsc::UnboundedReceiver<QueueItem>;
