//! Defines IO with chat peers over TCP.
//!
//! Every accepted socket gets two tasks: a reader that hands complete lines to the
//! [`ConnectionHandler`] and a writer that drains an unbounded channel into the socket.
//! Closing a peer drops its channel sender, so the writer flushes what was already queued
//! and then shuts the socket down.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::Either;
use futures::sync::{mpsc, oneshot};
use parking_lot::Mutex;
use tokio::codec::Decoder;
use tokio::net::{TcpListener, TcpStream};
use tokio::prelude::*;
use tokio::runtime::TaskExecutor;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result};
use crate::message::LineCodec;
use crate::registry::ConnectionId;
use crate::transport::{ConnectionHandler, Transport};

struct PeerHandle {
    tx: mpsc::UnboundedSender<String>,
    /// Fires to cancel the reader task.
    close: oneshot::Sender<()>,
}

struct Shared {
    addr: SocketAddr,
    executor: Mutex<TaskExecutor>,
    peers: Mutex<HashMap<ConnectionId, PeerHandle>>,
    /// Present while the accept loop runs.
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl Shared {
    fn forget(&self, conn: ConnectionId) -> bool {
        self.peers.lock().remove(&conn).is_some()
    }
}

/// A [`Transport`] over tokio TCP sockets speaking newline-delimited text.
#[derive(Clone)]
pub struct TcpTransport {
    inner: Arc<Shared>,
}

impl TcpTransport {
    /// `executor` runs the accept loop; peer tasks are spawned from inside it.
    pub fn new(addr: SocketAddr, executor: TaskExecutor) -> TcpTransport {
        TcpTransport {
            inner: Arc::new(Shared {
                addr,
                executor: Mutex::new(executor),
                peers: Mutex::new(HashMap::new()),
                stop: Mutex::new(None),
            }),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.lock().len()
    }
}

fn accept(inner: &Arc<Shared>, socket: TcpStream, handler: &Arc<dyn ConnectionHandler>) {
    let conn = ConnectionId::next();
    match socket.peer_addr() {
        Ok(addr) => debug!("accepted {} from {}", conn, addr),
        Err(err) => debug!("accepted {} from an unknown address: {}", conn, err),
    }

    let (tx, rx) = mpsc::unbounded::<String>();
    let (close_tx, close_rx) = oneshot::channel::<()>();
    let _ = inner.peers.lock().insert(conn, PeerHandle { tx, close: close_tx });
    handler.connected(conn);

    let (sink, stream) = LineCodec::new().framed(socket).split();

    let writer = rx
        .map_err(move |()| ChatError::ConnectionClosed(conn))
        .forward(sink)
        .then(move |outcome| -> std::result::Result<(), ()> {
            if let Err(err) = outcome {
                debug!("writer for {} stopped: {}", conn, err);
            }
            Ok(())
        });

    let lines = handler.clone();
    let reader = stream.for_each(move |line| -> Result<()> {
        lines.message(conn, line);
        Ok(())
    });

    let shared = inner.clone();
    let events = handler.clone();
    let session = reader
        .select2(close_rx)
        .then(move |outcome| -> std::result::Result<(), ()> {
            match outcome {
                Ok(Either::A(_)) => debug!("{} hung up", conn),
                Ok(Either::B(_)) | Err(Either::B(_)) => debug!("{} closed by the server", conn),
                Err(Either::A((err, _))) => events.errored(conn, &err),
            }
            let _ = shared.forget(conn);
            events.disconnected(conn);
            Ok(())
        });

    tokio::spawn(writer);
    tokio::spawn(session);
}

impl Transport for TcpTransport {
    fn listen(&self, handler: Arc<dyn ConnectionHandler>) -> Result<u16> {
        let mut stop = self.inner.stop.lock();
        if stop.is_some() {
            return Err(ChatError::AlreadyListening);
        }
        let listener = TcpListener::bind(&self.inner.addr)?;
        let port = listener.local_addr()?.port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let inner = self.inner.clone();
        let incoming = listener
            .incoming()
            .map_err(ChatError::from)
            .for_each(move |socket| -> Result<()> {
                accept(&inner, socket, &handler);
                Ok(())
            });
        let task = incoming
            .select2(stop_rx)
            .then(move |outcome| -> std::result::Result<(), ()> {
                match outcome {
                    Err(Either::A((err, _))) => {
                        warn!("stopped accepting connections on port {}: {}", port, err)
                    }
                    _ => info!("no longer accepting connections on port {}", port),
                }
                Ok(())
            });

        self.inner.executor.lock().spawn(task);
        *stop = Some(stop_tx);
        Ok(port)
    }

    fn stop_listening(&self) -> Result<()> {
        match self.inner.stop.lock().take() {
            Some(stop) => {
                let _ = stop.send(());
                Ok(())
            }
            None => Err(ChatError::NotListening),
        }
    }

    fn send(&self, conn: ConnectionId, line: &str) -> Result<()> {
        let peers = self.inner.peers.lock();
        let peer = peers.get(&conn).ok_or(ChatError::ConnectionClosed(conn))?;
        peer.tx
            .unbounded_send(line.to_owned())
            .map_err(|_| ChatError::ConnectionClosed(conn))
    }

    fn close(&self, conn: ConnectionId) -> Result<()> {
        let peer = self
            .inner
            .peers
            .lock()
            .remove(&conn)
            .ok_or(ChatError::ConnectionClosed(conn))?;
        let _ = peer.close.send(());
        Ok(())
    }
}
