//! Server and client settings, taken from the command line.
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use clap::ArgMatches;

use crate::error::{ChatError, Result};

/// The port used when none is given.
pub const DEFAULT_PORT: u16 = 5555;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// `0` lets the OS pick a free port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Reads `PORT` and `--host`, falling back to the defaults for anything missing.
    pub fn from_matches(matches: &ArgMatches) -> Result<ServerConfig> {
        let mut config = ServerConfig::default();
        if let Some(port) = matches.value_of("PORT") {
            config.port = parse_port(port)?;
        }
        if let Some(host) = matches.value_of("host") {
            config.host = host
                .parse()
                .map_err(|_| ChatError::InvalidArgument(format!("invalid host {:?}", host)))?;
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Where a client connects and who it logs in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl ClientConfig {
    pub fn new(id: &str, host: &str, port: u16) -> ClientConfig {
        ClientConfig {
            id: id.to_owned(),
            host: host.to_owned(),
            port,
        }
    }

    /// Reads the required `ID` and the optional `HOST` and `PORT`.
    pub fn from_matches(matches: &ArgMatches) -> Result<ClientConfig> {
        let id = matches
            .value_of("ID")
            .ok_or_else(|| ChatError::InvalidArgument("You cannot login without an ID".to_owned()))?;
        let mut config = ClientConfig::new(id, DEFAULT_CLIENT_HOST, DEFAULT_PORT);
        if let Some(host) = matches.value_of("HOST") {
            config.host = host.to_owned();
        }
        if let Some(port) = matches.value_of("PORT") {
            config.port = parse_port(port)?;
        }
        Ok(config)
    }

    /// Resolves `host:port` to the first address it names.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ChatError::InvalidArgument(format!("could not resolve {:?}", self.host)))
    }
}

/// Host a client connects to when none is given.
pub const DEFAULT_CLIENT_HOST: &str = "localhost";

pub fn parse_port(raw: &str) -> Result<u16> {
    raw.trim()
        .parse()
        .map_err(|_| ChatError::InvalidArgument(format!("invalid port {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{App, Arg};

    fn app<'a, 'b>() -> App<'a, 'b> {
        App::new("test")
            .arg(Arg::with_name("PORT").index(1))
            .arg(Arg::with_name("host").long("host").takes_value(true))
    }

    #[test]
    fn defaults_to_port_5555_on_all_interfaces() {
        let matches = app().get_matches_from(vec!["test"]);
        let config = ServerConfig::from_matches(&matches).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5555");
    }

    #[test]
    fn reads_port_and_host() {
        let matches = app().get_matches_from(vec!["test", "6000", "--host", "127.0.0.1"]);
        let config = ServerConfig::from_matches(&matches).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:6000");
    }

    #[test]
    fn rejects_bad_port() {
        let matches = app().get_matches_from(vec!["test", "seventy"]);
        match ServerConfig::from_matches(&matches) {
            Err(ChatError::InvalidArgument(msg)) => assert!(msg.contains("seventy")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    fn client_app<'a, 'b>() -> App<'a, 'b> {
        App::new("test")
            .arg(Arg::with_name("ID").index(1))
            .arg(Arg::with_name("HOST").index(2))
            .arg(Arg::with_name("PORT").index(3))
    }

    #[test]
    fn client_defaults_to_localhost() {
        let matches = client_app().get_matches_from(vec!["test", "Ann"]);
        let config = ClientConfig::from_matches(&matches).unwrap();
        assert_eq!(config, ClientConfig::new("Ann", "localhost", 5555));
    }

    #[test]
    fn client_reads_host_and_port() {
        let matches = client_app().get_matches_from(vec!["test", "Ann", "127.0.0.1", "6000"]);
        let config = ClientConfig::from_matches(&matches).unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:6000");
    }

    #[test]
    fn client_requires_an_id() {
        let matches = client_app().get_matches_from(vec!["test"]);
        match ClientConfig::from_matches(&matches) {
            Err(ChatError::InvalidArgument(msg)) => assert!(msg.contains("without an ID")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
