//! The text protocol spoken between the server and its clients.
//!
//! Every message is a single UTF-8 line terminated by `\n` (a preceding `\r` is tolerated):
//!
//! client -> server: `#login<sep><id>>` or free chat text
//! server -> client: `Login successful`, `You are already logged in, closing connection.`
//! server -> all:    `SERVER MSG: <text>` or `<id>: <text>`
//!

use std::fmt;

use bytes::BytesMut;
use tokio::codec::{Decoder, Encoder};

use crate::error::ChatError;

/// A line starting with this prefix is a login request.
pub const LOGIN_PREFIX: &str = "#login";
pub const LOGIN_SUCCESSFUL: &str = "Login successful";
pub const ALREADY_LOGGED_IN: &str = "You are already logged in, closing connection.";
pub const NOT_LOGGED_IN: &str = "You are not logged in, message was not delivered.";
pub const INVALID_LOGIN: &str = "Invalid login, expected #login <id>>";
pub const SERVER_PREFIX: &str = "SERVER MSG: ";

/// Longest line accepted from a peer, excluding the line terminator.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// A message on its way out to every connection. The variant decides the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound<'a> {
    /// Chat text relayed from an authenticated client.
    Chat { from: &'a str, text: &'a str },
    /// Text typed by the operator at the server console.
    Operator(&'a str),
    Connected(&'a str),
    Disconnected(&'a str),
}

impl<'a> fmt::Display for Outbound<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Outbound::Chat { from, text } => write!(f, "{}: {}", from, text),
            Outbound::Operator(text) => write!(f, "{}{}", SERVER_PREFIX, text),
            Outbound::Connected(id) => write!(f, "{}{} has connected", SERVER_PREFIX, id),
            Outbound::Disconnected(id) => write!(f, "{}{} has disconnected", SERVER_PREFIX, id),
        }
    }
}

/// Splits a byte stream into lines and writes lines back out with a `\n` terminator.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Where to resume the newline search on the next call.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> LineCodec {
        LineCodec { next_index: 0 }
    }

    fn take_line(&mut self, buf: &mut BytesMut, len: usize, consumed: usize) -> Result<String, ChatError> {
        let raw = buf.split_to(consumed);
        self.next_index = 0;
        let mut line = &raw[..len];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        String::from_utf8(line.to_vec()).map_err(|err| {
            ChatError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ChatError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, ChatError> {
        let newline = buf[self.next_index..].iter().position(|b| *b == b'\n');
        match newline {
            Some(offset) => {
                let len = self.next_index + offset;
                let content = if len > 0 && buf[len - 1] == b'\r' { len - 1 } else { len };
                if content > MAX_LINE_LEN {
                    return Err(ChatError::LineTooLong(MAX_LINE_LEN));
                }
                self.take_line(buf, len, len + 1).map(Some)
            }
            // One spare byte for a `\r` still waiting on its `\n`.
            None if buf.len() > MAX_LINE_LEN + 1 => Err(ChatError::LineTooLong(MAX_LINE_LEN)),
            None => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    /// A peer that closes without a trailing newline still gets its last line delivered.
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, ChatError> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None if buf.is_empty() => Ok(None),
            None => {
                let len = buf.len();
                self.take_line(buf, len, len).map(Some)
            }
        }
    }
}

impl Encoder for LineCodec {
    type Item = String;
    type Error = ChatError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), ChatError> {
        dst.reserve(item.len() + 1);
        dst.extend_from_slice(item.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
