//! The operator's side of the server: where notices are shown and where console commands
//! come from.
//!
//! Lines starting with `#` are commands, anything else is broadcast to every client as a
//! server message.
//!
//! `#start`    start listening for connections
//! `#stop`     stop listening, keeping current clients connected
//! `#close`    stop listening and disconnect every client
//! `#status`   show the server state and the number of connections
//! `#getport`  show the configured port
//! `#quit`     close the server and leave
//!

use std::io::{self, BufRead, Write};

use tracing::warn;

use crate::config::ServerConfig;
use crate::error::{ChatError, Result};
use crate::server::ChatServer;

/// Where operator-facing notices go.
pub trait Operator: Send + Sync {
    fn display(&self, message: &str);
}

/// Writes notices to stdout, each prefixed with `> `.
#[derive(Debug, Default)]
pub struct Console;

impl Operator for Console {
    fn display(&self, message: &str) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(err) = writeln!(out, "> {}", message).and_then(|_| out.flush()) {
            warn!("could not write to console: {}", err);
        }
    }
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Close,
    Status,
    GetPort,
    Quit,
    Broadcast(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let trimmed = line.trim();
        if !trimmed.starts_with('#') {
            return Ok(Command::Broadcast(line.to_owned()));
        }
        match &trimmed.to_lowercase()[..] {
            "#start" => Ok(Command::Start),
            "#stop" => Ok(Command::Stop),
            "#close" => Ok(Command::Close),
            "#status" => Ok(Command::Status),
            "#getport" => Ok(Command::GetPort),
            "#quit" | "#exit" => Ok(Command::Quit),
            other => Err(ChatError::InvalidArgument(format!("unknown command {}", other))),
        }
    }
}

/// Reads operator lines and drives the server with them.
pub struct Terminal<'a> {
    server: ChatServer,
    config: &'a ServerConfig,
    operator: &'a dyn Operator,
}

impl<'a> Terminal<'a> {
    pub fn new(server: ChatServer, config: &'a ServerConfig, operator: &'a dyn Operator) -> Terminal<'a> {
        Terminal {
            server,
            config,
            operator,
        }
    }

    /// Processes lines until `#quit` or end of input. The server is closed either way.
    pub fn run<R: BufRead>(&self, input: R) -> Result<()> {
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.execute(command),
                Err(err) => self.operator.display(&err.to_string()),
            }
        }
        self.server.close()
    }

    pub fn execute(&self, command: Command) {
        let outcome = match command {
            Command::Start => self.server.start_listening().map(|_| ()),
            Command::Stop => self.server.stop_listening(),
            Command::Close => self.server.close(),
            Command::Status => {
                self.operator.display(&format!(
                    "Server is {}, {} client(s) connected",
                    self.server.state(),
                    self.server.registry().len()
                ));
                Ok(())
            }
            Command::GetPort => {
                let port = self.server.port().unwrap_or(self.config.port);
                self.operator.display(&format!("Port number: {}", port));
                Ok(())
            }
            Command::Quit => self.server.close(),
            Command::Broadcast(text) => {
                self.operator.display(&text);
                let _ = self.server.handle_operator_message(&text);
                Ok(())
            }
        };
        if let Err(err) = outcome {
            self.operator.display(&format!("Command failed: {}", err));
        }
    }
}
