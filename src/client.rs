//! The user's side of a chat: a console that connects to a server, logs in, and relays
//! whatever the user types.
//!
//! Lines starting with `#` are commands, anything else is sent to the server as chat.
//!
//! `#login`    connect and log in, when not connected
//! `#logoff`   close the connection, keeping the client running
//! `#sethost`  change the host for the next connection; the next input line is the host
//! `#setport`  change the port for the next connection; the next input line is the port
//! `#gethost`  show the host
//! `#getport`  show the port
//! `#quit`     close the connection and leave
//!
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{self, Either};
use futures::sync::{mpsc, oneshot};
use tokio::codec::Decoder;
use tokio::net::TcpStream;
use tokio::prelude::*;
use tokio::runtime::TaskExecutor;
use tracing::{debug, info, warn};

use crate::config::{parse_port, ClientConfig};
use crate::error::{ChatError, Result};
use crate::message::{LineCodec, LOGIN_PREFIX};
use crate::terminal::Operator;

pub const ALREADY_LOGGED_OFF: &str = "You are already logged off.";
pub const ALREADY_CONNECTED: &str = "You are already logged in";
pub const LOGIN_FAILED: &str = "Login failed.";
pub const SET_HOST_CONNECTED: &str = "You cannot set host while still connected";
pub const SET_PORT_CONNECTED: &str = "You cannot set port while still connected";
pub const ENTER_HOST: &str = "Enter a host name";
pub const ENTER_PORT: &str = "Enter a port number";
pub const BAD_HOST: &str = "Problem occurred when setting host";
pub const BAD_PORT: &str = "Problem occurred when setting port";
pub const INVALID_COMMAND: &str = "Invalid command";
pub const SEND_FAILED: &str = "Could not send message to server.";
pub const CONNECTION_CLOSED: &str = "Connection closed.";
pub const SERVER_HUNG_UP: &str = "The server has closed the connection.";
pub const CONNECTION_LOST: &str = "Lost the connection to the server.";

/// A parsed client console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Login,
    Logoff,
    SetHost,
    SetPort,
    GetHost,
    GetPort,
    Quit,
    /// A `#` line that names no command.
    Invalid(String),
    Message(String),
}

impl ClientCommand {
    pub fn parse(line: &str) -> ClientCommand {
        let trimmed = line.trim();
        if !trimmed.starts_with('#') {
            return ClientCommand::Message(line.to_owned());
        }
        match trimmed {
            "#login" => ClientCommand::Login,
            "#logoff" => ClientCommand::Logoff,
            "#sethost" => ClientCommand::SetHost,
            "#setport" => ClientCommand::SetPort,
            "#gethost" => ClientCommand::GetHost,
            "#getport" => ClientCommand::GetPort,
            "#quit" => ClientCommand::Quit,
            other => ClientCommand::Invalid(other.to_owned()),
        }
    }
}

/// The live half of a connection: a channel into the writer task and a switch for the reader.
struct Link {
    tx: mpsc::UnboundedSender<String>,
    close: oneshot::Sender<()>,
    /// Cleared by the reader task once the server side is gone.
    open: Arc<AtomicBool>,
}

impl Link {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Spawns the reader and writer tasks for `socket`. Must run on the runtime.
fn attach(socket: TcpStream, display: Arc<dyn Operator>) -> Link {
    let (tx, rx) = mpsc::unbounded::<String>();
    let (close_tx, close_rx) = oneshot::channel::<()>();
    let open = Arc::new(AtomicBool::new(true));

    let (sink, stream) = LineCodec::new().framed(socket).split();

    let writer = rx
        .map_err(|()| ChatError::NotConnected)
        .forward(sink)
        .then(|outcome| -> std::result::Result<(), ()> {
            if let Err(err) = outcome {
                debug!("writer to server stopped: {}", err);
            }
            Ok(())
        });

    let shown = display.clone();
    let reader = stream.for_each(move |line| -> Result<()> {
        shown.display(&line);
        Ok(())
    });

    let flag = open.clone();
    let session = reader
        .select2(close_rx)
        .then(move |outcome| -> std::result::Result<(), ()> {
            flag.store(false, Ordering::SeqCst);
            match outcome {
                Ok(Either::A(_)) => display.display(SERVER_HUNG_UP),
                Ok(Either::B(_)) | Err(Either::B(_)) => display.display(CONNECTION_CLOSED),
                Err(Either::A((err, _))) => {
                    warn!("connection to server failed: {}", err);
                    display.display(CONNECTION_LOST);
                }
            }
            Ok(())
        });

    tokio::spawn(writer);
    tokio::spawn(session);
    Link {
        tx,
        close: close_tx,
        open,
    }
}

pub struct ChatClient {
    config: ClientConfig,
    executor: TaskExecutor,
    display: Arc<dyn Operator>,
    link: Option<Link>,
}

impl ChatClient {
    /// A client that is not connected yet. `executor` runs the socket tasks.
    pub fn new(config: ClientConfig, executor: TaskExecutor, display: Arc<dyn Operator>) -> ChatClient {
        ChatClient {
            config,
            executor,
            display,
            link: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().map_or(false, Link::is_open)
    }

    /// Connects to the configured server and sends the login line for the configured id.
    /// Blocks until the connection is up or has failed.
    pub fn open_connection(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(ChatError::AlreadyConnected);
        }
        let addr = self.config.socket_addr()?;
        let (ready_tx, ready_rx) = oneshot::channel::<Result<Link>>();
        let display = self.display.clone();
        let connect = future::lazy(move || TcpStream::connect(&addr)).then(
            move |outcome| -> std::result::Result<(), ()> {
                let link = outcome
                    .map(|socket| attach(socket, display))
                    .map_err(ChatError::from);
                let _ = ready_tx.send(link);
                Ok(())
            },
        );
        self.executor.spawn(connect);

        let link = ready_rx.wait().map_err(|_| {
            ChatError::Io(io::Error::new(io::ErrorKind::Other, "connect task was dropped"))
        })??;
        info!("connected to {}", addr);
        self.link = Some(link);
        self.send(&format!("{} {}>", LOGIN_PREFIX, self.config.id))
    }

    /// Ends the connection. Lines already queued are flushed first.
    pub fn close_connection(&mut self) -> Result<()> {
        match self.link.take() {
            Some(link) => {
                let _ = link.close.send(());
                Ok(())
            }
            None => Err(ChatError::NotConnected),
        }
    }

    /// Queues one line for the server.
    pub fn send(&self, line: &str) -> Result<()> {
        match self.link {
            Some(ref link) if link.is_open() => link
                .tx
                .unbounded_send(line.to_owned())
                .map_err(|_| ChatError::NotConnected),
            _ => Err(ChatError::NotConnected),
        }
    }

    pub fn set_host(&mut self, host: &str) -> Result<()> {
        if self.is_connected() {
            return Err(ChatError::AlreadyConnected);
        }
        let host = host.trim();
        if host.is_empty() {
            return Err(ChatError::InvalidArgument("empty host".to_owned()));
        }
        self.config.host = host.to_owned();
        Ok(())
    }

    pub fn set_port(&mut self, port: &str) -> Result<()> {
        if self.is_connected() {
            return Err(ChatError::AlreadyConnected);
        }
        self.config.port = parse_port(port)?;
        Ok(())
    }

    /// Processes lines until `#quit` or end of input, then drops the connection.
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        let mut lines = input.lines();
        while let Some(line) = lines.next() {
            let line = line?;
            if !self.execute(ClientCommand::parse(&line), &mut lines)? {
                break;
            }
        }
        if self.link.is_some() {
            let _ = self.close_connection();
        }
        Ok(())
    }

    /// Runs one command. `#sethost` and `#setport` take their value from the next line of
    /// `input`. Returns `false` once the client should stop.
    pub fn execute<I>(&mut self, command: ClientCommand, input: &mut I) -> Result<bool>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        match command {
            ClientCommand::Quit => return Ok(false),
            ClientCommand::Logoff => {
                if self.is_connected() {
                    let _ = self.close_connection();
                } else {
                    self.display.display(ALREADY_LOGGED_OFF);
                }
            }
            ClientCommand::SetHost => {
                if self.is_connected() {
                    self.display.display(SET_HOST_CONNECTED);
                } else {
                    self.display.display(ENTER_HOST);
                    let host = input.next().transpose()?.unwrap_or_default();
                    if self.set_host(&host).is_err() {
                        self.display.display(BAD_HOST);
                    }
                }
            }
            ClientCommand::SetPort => {
                if self.is_connected() {
                    self.display.display(SET_PORT_CONNECTED);
                } else {
                    self.display.display(ENTER_PORT);
                    let port = input.next().transpose()?.unwrap_or_default();
                    if self.set_port(&port).is_err() {
                        self.display.display(BAD_PORT);
                    }
                }
            }
            ClientCommand::Login => {
                if self.is_connected() {
                    self.display.display(ALREADY_CONNECTED);
                } else if let Err(err) = self.open_connection() {
                    warn!("could not connect to {}:{}: {}", self.config.host, self.config.port, err);
                    self.display.display(LOGIN_FAILED);
                }
            }
            ClientCommand::GetHost => self.display.display(&format!("Host name: {}", self.config.host)),
            ClientCommand::GetPort => self.display.display(&format!("Port number: {}", self.config.port)),
            ClientCommand::Invalid(command) => {
                debug!("unknown client command {}", command);
                self.display.display(INVALID_COMMAND);
            }
            ClientCommand::Message(text) => {
                if self.send(&text).is_err() {
                    self.display.display(SEND_FAILED);
                }
            }
        }
        Ok(true)
    }
}
