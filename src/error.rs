//! Error type shared by the chat server, its transport, and the client.

use std::io;

use thiserror::Error;

use crate::registry::ConnectionId;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A `#login` line that has no separator or no terminating `>`.
    #[error("malformed login request: {0:?}")]
    MalformedLogin(String),

    /// A second `#login` on a connection that already claimed an identity.
    #[error("connection {0} is already logged in")]
    AlreadyLoggedIn(ConnectionId),

    /// Chat text received before the connection logged in.
    #[error("connection {0} has not logged in")]
    NotLoggedIn(ConnectionId),

    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    #[error("server is already listening")]
    AlreadyListening,

    #[error("server is not listening")]
    NotListening,

    #[error("server has been closed")]
    ServerClosed,

    /// The client has no open connection to a server.
    #[error("not connected to a server")]
    NotConnected,

    #[error("already connected to a server")]
    AlreadyConnected,

    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
