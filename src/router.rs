//! Fans a message out to every registered connection.
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ChatError;
use crate::message::Outbound;
use crate::registry::{ConnectionId, Registry};
use crate::transport::Transport;

/// What happened to one broadcast.
#[derive(Debug, Default)]
pub struct Delivery {
    /// Number of connections a send was attempted on.
    pub attempted: usize,
    pub failed: Vec<(ConnectionId, ChatError)>,
}

impl Delivery {
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Router {
    transport: Arc<dyn Transport>,
    registry: Registry,
}

impl Router {
    pub fn new(transport: Arc<dyn Transport>, registry: Registry) -> Router {
        Router { transport, registry }
    }

    /// Sends `message` to every connection registered when the call starts. A failed send is
    /// recorded and logged; the remaining connections are still tried.
    pub fn broadcast(&self, message: &Outbound) -> Delivery {
        let line = message.to_string();
        let mut delivery = Delivery::default();
        for conn in self.registry.snapshot() {
            delivery.attempted += 1;
            if let Err(err) = self.transport.send(conn, &line) {
                warn!("could not send to {}: {}", conn, err);
                delivery.failed.push((conn, err));
            }
        }
        debug!(
            "broadcast {:?} to {} of {} connections",
            line,
            delivery.delivered(),
            delivery.attempted
        );
        delivery
    }

    /// Sends `line` to a single connection.
    pub fn reply(&self, conn: ConnectionId, line: &str) -> Result<(), ChatError> {
        self.transport.send(conn, line)
    }
}
