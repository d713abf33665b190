//! The seam between the chat logic and whatever moves bytes.
//!
//! A [`Transport`] accepts connections and reports what happens on them to a
//! [`ConnectionHandler`]. The handler may be invoked concurrently for different connections,
//! but the transport delivers the lines of a single connection in order.

use std::sync::Arc;

use crate::error::{ChatError, Result};
use crate::registry::ConnectionId;

pub trait ConnectionHandler: Send + Sync {
    /// A new connection was accepted. Fires before any line is read from it.
    fn connected(&self, conn: ConnectionId);

    /// One complete line arrived on `conn`.
    fn message(&self, conn: ConnectionId, line: String);

    /// The connection is gone, either because the peer hung up or because it was closed.
    /// May fire more than once for the same connection.
    fn disconnected(&self, conn: ConnectionId);

    /// Reading from the connection failed. `disconnected` follows.
    fn errored(&self, conn: ConnectionId, cause: &ChatError);
}

pub trait Transport: Send + Sync {
    /// Starts accepting connections, reporting them to `handler`. Returns the bound port.
    fn listen(&self, handler: Arc<dyn ConnectionHandler>) -> Result<u16>;

    /// Stops accepting new connections. Existing connections stay open.
    fn stop_listening(&self) -> Result<()>;

    /// Queues one line for `conn`.
    fn send(&self, conn: ConnectionId, line: &str) -> Result<()>;

    /// Flushes whatever is queued for `conn`, then ends it. Closing a closed connection
    /// fails with [`ChatError::ConnectionClosed`].
    fn close(&self, conn: ConnectionId) -> Result<()>;
}
