//! The one-time login handshake that turns an UNAUTHENTICATED connection into an
//! AUTHENTICATED one.
//!
//! A login line is `#login`, one separator character whose value is ignored, the identity,
//! and a closing `>`. The stored identity keeps the `>`: `#login Fred>` logs in as `Fred>`.

use crate::error::{ChatError, Result};
use crate::message::LOGIN_PREFIX;
use crate::registry::{ConnectionId, Session};

/// Whether `line` should be handled as a login request rather than chat text.
pub fn is_login(line: &str) -> bool {
    line.starts_with(LOGIN_PREFIX)
}

/// Extracts the identity from a login line. Text after the first `>` is ignored.
pub fn parse_login(line: &str) -> Result<String> {
    if !is_login(line) {
        return Err(ChatError::MalformedLogin(line.to_owned()));
    }
    let mut rest = line[LOGIN_PREFIX.len()..].chars();
    if rest.next().is_none() {
        return Err(ChatError::MalformedLogin(line.to_owned()));
    }
    let rest = rest.as_str();
    match rest.find('>') {
        Some(end) => Ok(format!("{}>", &rest[..end])),
        None => Err(ChatError::MalformedLogin(line.to_owned())),
    }
}

/// Runs the handshake for `line` against the locked `session` of `conn` and returns the
/// identity now attached to it.
///
/// A connection that already logged in is rejected before the line is parsed, so a duplicate
/// login never touches the stored identity. A retired connection never logs in.
pub fn authenticate(conn: ConnectionId, session: &mut Session, line: &str) -> Result<String> {
    if session.is_retired() {
        return Err(ChatError::ConnectionClosed(conn));
    }
    if session.is_authenticated() {
        return Err(ChatError::AlreadyLoggedIn(conn));
    }
    let identity = parse_login(line)?;
    session.claim(conn, identity.clone())?;
    Ok(identity)
}
