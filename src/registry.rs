//! Tracks every accepted connection and the session state attached to it.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{ChatError, Result};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Opaque handle the transport hands out for each accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> ConnectionId {
        ConnectionId(raw)
    }

    /// A process-unique id for a freshly accepted connection.
    pub fn next() -> ConnectionId {
        ConnectionId(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mutable per-connection state. Only reachable through [`Connection::session`], so every
/// handler touching a connection is serialized on that connection's lock.
#[derive(Debug, Default)]
pub struct Session {
    identity: Option<String>,
    retired: bool,
}

impl Session {
    /// The identity claimed at login. `None` while UNAUTHENTICATED.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_ref().map(String::as_str)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Records the login identity. An identity is set at most once and never replaced.
    pub fn claim(&mut self, conn: ConnectionId, identity: String) -> Result<()> {
        if self.identity.is_some() {
            return Err(ChatError::AlreadyLoggedIn(conn));
        }
        self.identity = Some(identity);
        Ok(())
    }

    /// Whether the disconnect notice for this connection has already gone out.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Marks the connection as finished. Returns `false` if it already was.
    pub fn retire(&mut self) -> bool {
        !std::mem::replace(&mut self.retired, true)
    }

    /// Identity for display purposes, `unknown` before login.
    pub fn display_name(&self) -> &str {
        self.identity().unwrap_or(UNKNOWN_IDENTITY)
    }
}

/// Stand-in shown for connections that never logged in.
pub const UNKNOWN_IDENTITY: &str = "unknown";

#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    session: Mutex<Session>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Connection {
        Connection {
            id,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Locks the session. Disconnect and error handling hold this for their whole run.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock()
    }

    pub fn identity(&self) -> Option<String> {
        self.session().identity().map(str::to_owned)
    }
}

/// The set of live connections, shared between the transport callbacks and the router.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<ConnectionId, Arc<Connection>>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Adds a connection, or returns the one already registered under `id`.
    pub fn register(&self, id: ConnectionId) -> Arc<Connection> {
        self.inner
            .lock()
            .entry(id)
            .or_insert_with(|| Arc::new(Connection::new(id)))
            .clone()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner.lock().remove(&id)
    }

    /// Ids registered right now, in accept order. Broadcasts iterate this copy so the
    /// registry lock is never held across a send.
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.inner.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        let mut conns: Vec<Arc<Connection>> = self.inner.lock().values().cloned().collect();
        conns.sort_by_key(|conn| conn.id());
        conns
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
