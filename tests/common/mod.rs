//! Shared fixtures for the integration tests: an in-memory transport, an operator that
//! remembers what it was shown, and a tracing layer that captures log messages.
#![allow(dead_code)]

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use echo_chat::{ChatError, ChatServer, ConnectionHandler, ConnectionId, Operator, Result, Transport};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Records every send and close instead of touching the network.
#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<(ConnectionId, String)>>,
    attempts: Mutex<Vec<ConnectionId>>,
    failing: Mutex<HashSet<ConnectionId>>,
    closed: Mutex<Vec<ConnectionId>>,
    listening: Mutex<bool>,
}

impl FakeTransport {
    /// Every send to `conn` fails from now on.
    pub fn fail_sends_to(&self, conn: ConnectionId) {
        self.failing.lock().insert(conn);
    }

    pub fn sent(&self) -> Vec<(ConnectionId, String)> {
        self.sent.lock().clone()
    }

    /// Lines delivered to `conn`, in order.
    pub fn sent_to(&self, conn: ConnectionId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == conn)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn attempts(&self) -> Vec<ConnectionId> {
        self.attempts.lock().clone()
    }

    pub fn closed(&self) -> Vec<ConnectionId> {
        self.closed.lock().clone()
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.lock()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.attempts.lock().clear();
    }
}

impl Transport for FakeTransport {
    fn listen(&self, _handler: Arc<dyn ConnectionHandler>) -> Result<u16> {
        *self.listening.lock() = true;
        Ok(5555)
    }

    fn stop_listening(&self) -> Result<()> {
        *self.listening.lock() = false;
        Ok(())
    }

    fn send(&self, conn: ConnectionId, line: &str) -> Result<()> {
        self.attempts.lock().push(conn);
        if self.failing.lock().contains(&conn) || self.closed.lock().contains(&conn) {
            return Err(ChatError::ConnectionClosed(conn));
        }
        self.sent.lock().push((conn, line.to_owned()));
        Ok(())
    }

    fn close(&self, conn: ConnectionId) -> Result<()> {
        let mut closed = self.closed.lock();
        if closed.contains(&conn) {
            return Err(ChatError::ConnectionClosed(conn));
        }
        closed.push(conn);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingOperator {
    lines: Mutex<Vec<String>>,
}

impl RecordingOperator {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Waits up to five seconds for `line` to be shown. Lines shown by socket tasks arrive
    /// asynchronously.
    pub fn wait_for(&self, line: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if self.lines.lock().iter().any(|shown| shown == line) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Operator for RecordingOperator {
    fn display(&self, message: &str) {
        self.lines.lock().push(message.to_owned());
    }
}

pub struct Harness {
    pub server: ChatServer,
    pub transport: Arc<FakeTransport>,
    pub operator: Arc<RecordingOperator>,
}

impl Harness {
    pub fn new() -> Harness {
        let transport = Arc::new(FakeTransport::default());
        let operator = Arc::new(RecordingOperator::default());
        let server = ChatServer::new(transport.clone(), operator.clone());
        Harness {
            server,
            transport,
            operator,
        }
    }

    /// Accepts a connection without logging it in.
    pub fn connect(&self, raw: u64) -> ConnectionId {
        let conn = ConnectionId::new(raw);
        self.server.connected(conn);
        conn
    }

    /// Accepts a connection and logs it in as `name>`.
    pub fn login(&self, raw: u64, name: &str) -> ConnectionId {
        let conn = self.connect(raw);
        self.server
            .handle_message(conn, &format!("#login {}>", name))
            .expect("login failed");
        conn
    }
}

/// Captures the formatted message of every tracing event.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CapturedLogs {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|message| message.contains(needle))
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.messages.lock().push(message);
    }
}
