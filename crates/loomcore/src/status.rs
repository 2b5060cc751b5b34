use crate::workflow::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Lifecycle status of one node during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Loading,
    Success,
    Error,
}

/// Ephemeral per-node lifecycle event; broadcast only, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    pub status: NodeStatus,
}

/// Fan-out bus with one broadcast channel per node kind.
///
/// Observers (a live UI, the CLI) subscribe to the kinds they render;
/// executors publish through a [`StatusPublisher`] scoped to their kind.
/// Delivery is best-effort: events to a channel with no subscribers are
/// dropped silently.
pub struct StatusBus {
    channels: HashMap<NodeKind, broadcast::Sender<StatusEvent>>,
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let channels = NodeKind::ALL
            .iter()
            .map(|kind| {
                let (sender, _) = broadcast::channel(capacity);
                (*kind, sender)
            })
            .collect();
        Self { channels }
    }

    pub fn subscribe(&self, kind: NodeKind) -> broadcast::Receiver<StatusEvent> {
        self.channels[&kind].subscribe()
    }

    pub fn publisher(&self, kind: NodeKind) -> StatusPublisher {
        StatusPublisher {
            sender: self.channels[&kind].clone(),
        }
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Publish handle given to executors for real-time progress updates
#[derive(Clone)]
pub struct StatusPublisher {
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusPublisher {
    pub fn publish(&self, node_id: &NodeId, status: NodeStatus) {
        let _ = self.sender.send(StatusEvent {
            node_id: node_id.clone(),
            status,
        });
    }
}
