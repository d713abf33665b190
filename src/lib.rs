//! # A small multi-client chat server.
//!
//! Clients connect over TCP and speak newline-delimited text. The first thing a client does is
//! log in with `#login <id>>`; after that every line it sends is relayed to all connected
//! clients as `<id>: <line>`. The operator at the server console can broadcast messages of their
//! own and start, stop, or close the server.
//!
//! Every wire message is a plain text line:
//!
//! 1. `#login<sep><id>>` claims an identity. The separator is any single character.
//! 2. `Login successful` or `You are already logged in, closing connection.` answer a login.
//! 3. `SERVER MSG: <id> has connected` and `SERVER MSG: <id> has disconnected` announce peers.
//! 4. `SERVER MSG: <text>` carries an operator broadcast.
//! 5. `<id>: <text>` relays chat from a logged-in client.
//!
//! A second `#login` on a connection closes it. Chat sent before logging in is refused with an
//! error reply and is not relayed.
//!
//! [`ChatClient`] is the matching console client: it logs in as `<id>>` when it connects and
//! sends every other console line as chat.
//!
//! Architecture:
//!
//!  TcpListener
//!     v
//! +-----------+             +------------+                        +------------+
//! | TcpStream |<-LineCodec->| PeerHandle |<-ConnectionHandler---->|            |
//! +-----------+             +------------+                        | ChatServer |---> Registry
//! | TcpStream |<-LineCodec->| PeerHandle |<-ConnectionHandler---->|            |---> Router
//! +-----------+             +------------+                        +------------+
//! | ...       |   ...       |  ...       |                              ^    v
//! +-----------+             +------------+                          Terminal (Operator)
//!                                                                      ^     v
//!                                                                   stdin  stdout

pub mod client;
pub mod config;
pub mod error;
pub mod login;
pub mod message;
pub mod peer;
pub mod registry;
pub mod router;
pub mod server;
pub mod terminal;
pub mod transport;

pub use crate::client::ChatClient;
pub use crate::config::{ClientConfig, ServerConfig};
pub use crate::error::{ChatError, Result};
pub use crate::peer::TcpTransport;
pub use crate::registry::{Connection, ConnectionId, Registry};
pub use crate::router::{Delivery, Router};
pub use crate::server::{ChatServer, ServerState};
pub use crate::terminal::{Console, Operator, Terminal};
pub use crate::transport::{ConnectionHandler, Transport};
