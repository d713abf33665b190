//! The chat server: lifecycle state, the login handshake, and routing of client lines.
//!
//! `ChatServer` is a cheap handle around shared state. The transport holds one copy as its
//! [`ConnectionHandler`], the operator console holds another.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result};
use crate::login;
use crate::message::{Outbound, ALREADY_LOGGED_IN, INVALID_LOGIN, LOGIN_SUCCESSFUL, NOT_LOGGED_IN};
use crate::registry::{Connection, ConnectionId, Registry, Session};
use crate::router::{Delivery, Router};
use crate::terminal::Operator;
use crate::transport::{ConnectionHandler, Transport};

pub const STOPPED_LISTENING: &str = "Server has stopped listening for connections.";
pub const SERVER_CLOSED: &str = "Server has been closed";
pub const SEND_FAILED: &str = "Could not send message to clients.";
pub const CLOSING_AFTER_ERROR: &str = "Now trying to close the client connection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Listening { port: u16 },
    /// Terminal. A closed server never listens again.
    Closed,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ServerState::Stopped => write!(f, "stopped"),
            ServerState::Listening { port } => write!(f, "listening on port {}", port),
            ServerState::Closed => write!(f, "closed"),
        }
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    operator: Arc<dyn Operator>,
    registry: Registry,
    router: Router,
    state: Mutex<ServerState>,
}

#[derive(Clone)]
pub struct ChatServer {
    inner: Arc<Shared>,
}

impl ChatServer {
    pub fn new(transport: Arc<dyn Transport>, operator: Arc<dyn Operator>) -> ChatServer {
        let registry = Registry::new();
        let router = Router::new(transport.clone(), registry.clone());
        ChatServer {
            inner: Arc::new(Shared {
                transport,
                operator,
                registry,
                router,
                state: Mutex::new(ServerState::Stopped),
            }),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn state(&self) -> ServerState {
        *self.inner.state.lock()
    }

    pub fn is_listening(&self) -> bool {
        match self.state() {
            ServerState::Listening { .. } => true,
            _ => false,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self.state() {
            ServerState::Listening { port } => Some(port),
            _ => None,
        }
    }

    fn display(&self, message: &str) {
        self.inner.operator.display(message);
    }

    /// STOPPED -> LISTENING. Returns the port the transport bound.
    pub fn start_listening(&self) -> Result<u16> {
        let mut state = self.inner.state.lock();
        match *state {
            ServerState::Closed => return Err(ChatError::ServerClosed),
            ServerState::Listening { .. } => return Err(ChatError::AlreadyListening),
            ServerState::Stopped => {}
        }
        let handler: Arc<dyn ConnectionHandler> = Arc::new(self.clone());
        let port = self.inner.transport.listen(handler)?;
        *state = ServerState::Listening { port };
        info!("Server listening for connections on port {}", port);
        Ok(port)
    }

    /// LISTENING -> STOPPED. Connected clients keep their connections.
    pub fn stop_listening(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                ServerState::Closed => return Err(ChatError::ServerClosed),
                ServerState::Stopped => return Err(ChatError::NotListening),
                ServerState::Listening { .. } => {}
            }
            self.inner.transport.stop_listening()?;
            *state = ServerState::Stopped;
        }
        self.display(STOPPED_LISTENING);
        Ok(())
    }

    /// Moves to CLOSED and ends every connection. A server that was listening reports that it
    /// stopped listening first. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let previous = {
            let mut state = self.inner.state.lock();
            let previous = *state;
            if previous == ServerState::Closed {
                return Ok(());
            }
            if let ServerState::Listening { .. } = previous {
                if let Err(err) = self.inner.transport.stop_listening() {
                    warn!("Error stopping listener during close: {}", err);
                }
            }
            *state = ServerState::Closed;
            previous
        };
        if let ServerState::Listening { .. } = previous {
            self.display(STOPPED_LISTENING);
        }
        for conn in self.inner.registry.connections() {
            self.close_connection(conn.id());
        }
        self.display(SERVER_CLOSED);
        info!("Server closed");
        Ok(())
    }

    /// Broadcasts a line typed by the operator as `SERVER MSG: <text>`.
    pub fn handle_operator_message(&self, text: &str) -> Delivery {
        let delivery = self.inner.router.broadcast(&Outbound::Operator(text));
        if !delivery.is_complete() {
            self.display(SEND_FAILED);
        }
        delivery
    }

    /// Handles one line from a client: the login handshake for `#login` lines, chat otherwise.
    pub fn handle_message(&self, conn: ConnectionId, line: &str) -> Result<()> {
        let connection = self
            .inner
            .registry
            .get(conn)
            .ok_or(ChatError::UnknownConnection(conn))?;
        if login::is_login(line) {
            self.handle_login(&connection, line)
        } else {
            self.handle_chat(&connection, line)
        }
    }

    /// Runs under the session lock, so a connection being retired concurrently either
    /// announces its login first or never logs in at all.
    fn handle_login(&self, connection: &Connection, line: &str) -> Result<()> {
        let conn = connection.id();
        let mut session = connection.session();
        match login::authenticate(conn, &mut session, line) {
            Ok(identity) => {
                info!("{} has connected", identity);
                self.reply(conn, LOGIN_SUCCESSFUL);
                let _ = self.inner.router.broadcast(&Outbound::Connected(&identity));
                Ok(())
            }
            Err(err @ ChatError::AlreadyLoggedIn(_)) => {
                drop(session);
                self.reply(conn, ALREADY_LOGGED_IN);
                self.close_connection(conn);
                Err(err)
            }
            Err(err @ ChatError::MalformedLogin(_)) => {
                self.reply(conn, INVALID_LOGIN);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn handle_chat(&self, connection: &Connection, line: &str) -> Result<()> {
        let session = connection.session();
        if session.is_retired() {
            debug!("dropping line from retired connection {}", connection.id());
            return Err(ChatError::ConnectionClosed(connection.id()));
        }
        let identity = match session.identity() {
            Some(identity) => identity,
            None => {
                self.reply(connection.id(), NOT_LOGGED_IN);
                return Err(ChatError::NotLoggedIn(connection.id()));
            }
        };
        info!("Message received: {} from {}", line, identity);
        let _ = self.inner.router.broadcast(&Outbound::Chat {
            from: identity,
            text: line,
        });
        Ok(())
    }

    fn reply(&self, conn: ConnectionId, line: &str) {
        if let Err(err) = self.inner.router.reply(conn, line) {
            warn!("could not reply to {}: {}", conn, err);
        }
    }

    /// Ends `conn` from the server side and sends its leave notice. Close failures are
    /// logged and otherwise ignored.
    pub fn close_connection(&self, conn: ConnectionId) {
        if let Err(err) = self.inner.transport.close(conn) {
            warn!("Error closing client connection {}: {}", conn, err);
        }
        let _ = self.retire(conn);
    }

    /// Removes `conn` and announces its departure. Only the first call for a connection has
    /// any effect; returns whether this call was it.
    fn retire(&self, conn: ConnectionId) -> bool {
        let connection = match self.inner.registry.get(conn) {
            Some(connection) => connection,
            None => return false,
        };
        let mut session = connection.session();
        self.retire_locked(conn, &mut session)
    }

    fn retire_locked(&self, conn: ConnectionId, session: &mut Session) -> bool {
        if !session.retire() {
            return false;
        }
        let _ = self.inner.registry.remove(conn);
        let name = session.display_name().to_owned();
        self.display(&format!("{} has disconnected", name));
        let _ = self.inner.router.broadcast(&Outbound::Disconnected(&name));
        true
    }

    fn handle_error(&self, conn: ConnectionId, cause: &ChatError) {
        let connection = match self.inner.registry.get(conn) {
            Some(connection) => connection,
            None => {
                debug!("error on retired connection {}: {}", conn, cause);
                return;
            }
        };
        let mut session = connection.session();
        if session.is_retired() {
            debug!("error on retired connection {}: {}", conn, cause);
            return;
        }
        warn!("connection {} failed: {}", conn, cause);
        self.display(&format!("{} client has encountered an error", session.display_name()));
        self.display(CLOSING_AFTER_ERROR);
        if let Err(err) = self.inner.transport.close(conn) {
            warn!("Error closing client connection {}: {}", conn, err);
        }
        let _ = self.retire_locked(conn, &mut session);
    }
}

impl ConnectionHandler for ChatServer {
    fn connected(&self, conn: ConnectionId) {
        let connection = self.inner.registry.register(conn);
        let session = connection.session();
        info!("{} ({}) client has connected.", session.display_name(), conn);
    }

    fn message(&self, conn: ConnectionId, line: String) {
        if let Err(err) = self.handle_message(conn, &line) {
            info!("line from {} rejected: {}", conn, err);
        }
    }

    fn disconnected(&self, conn: ConnectionId) {
        if !self.retire(conn) {
            debug!("{} already disconnected", conn);
        }
    }

    fn errored(&self, conn: ConnectionId, cause: &ChatError) {
        self.handle_error(conn, cause);
    }
}
