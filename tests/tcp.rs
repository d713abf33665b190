//! Runs the server on a real socket and talks to it the way a line-based client would.
mod common;

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use echo_chat::{ChatServer, TcpTransport};
use tokio::prelude::Future;
use tokio::runtime::Runtime;

use common::RecordingOperator;

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(port: u16) -> Client {
        let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Client {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn send(&mut self, line: &str) {
        writeln!(self.writer, "{}", line).unwrap();
        self.writer.flush().unwrap();
    }

    fn recv(&mut self) -> String {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).unwrap();
        assert!(read > 0, "connection closed while waiting for a line");
        line.trim_end_matches('\n').to_string()
    }

    fn assert_closed(&mut self) {
        let mut line = String::new();
        assert_eq!(self.reader.read_line(&mut line).unwrap(), 0, "got {:?}", line);
    }
}

#[test]
fn chat_session_over_tcp() {
    let runtime = Runtime::new().unwrap();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let transport = Arc::new(TcpTransport::new(addr, runtime.executor()));
    let operator = Arc::new(RecordingOperator::default());
    let server = ChatServer::new(transport.clone(), operator.clone());
    let port = server.start_listening().unwrap();
    assert_ne!(port, 0);

    let mut ann = Client::connect(port);
    ann.send("#login Ann>");
    assert_eq!(ann.recv(), "Login successful");
    assert_eq!(ann.recv(), "SERVER MSG: Ann> has connected");

    let mut bob = Client::connect(port);
    bob.send("hello before login");
    assert_eq!(bob.recv(), "You are not logged in, message was not delivered.");
    bob.send("#login Bob>");
    assert_eq!(bob.recv(), "Login successful");
    assert_eq!(bob.recv(), "SERVER MSG: Bob> has connected");
    assert_eq!(ann.recv(), "SERVER MSG: Bob> has connected");

    ann.send("hi there");
    assert_eq!(ann.recv(), "Ann>: hi there");
    assert_eq!(bob.recv(), "Ann>: hi there");

    server.handle_operator_message("hello");
    assert_eq!(ann.recv(), "SERVER MSG: hello");
    assert_eq!(bob.recv(), "SERVER MSG: hello");

    bob.send("#login Again>");
    assert_eq!(bob.recv(), "You are already logged in, closing connection.");
    bob.assert_closed();
    assert_eq!(ann.recv(), "SERVER MSG: Bob> has disconnected");

    server.close().unwrap();
    ann.assert_closed();
    assert_eq!(transport.peer_count(), 0);
    assert!(operator.lines().contains(&"Server has been closed".to_string()));

    runtime.shutdown_now().wait().unwrap();
}

#[test]
fn hangup_is_announced() {
    let runtime = Runtime::new().unwrap();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let transport = Arc::new(TcpTransport::new(addr, runtime.executor()));
    let operator = Arc::new(RecordingOperator::default());
    let server = ChatServer::new(transport, operator);
    let port = server.start_listening().unwrap();

    let mut ann = Client::connect(port);
    ann.send("#login Ann>");
    assert_eq!(ann.recv(), "Login successful");
    assert_eq!(ann.recv(), "SERVER MSG: Ann> has connected");

    let mut bob = Client::connect(port);
    bob.send("#login Bob>");
    assert_eq!(bob.recv(), "Login successful");
    assert_eq!(bob.recv(), "SERVER MSG: Bob> has connected");
    assert_eq!(ann.recv(), "SERVER MSG: Bob> has connected");

    drop(bob);
    assert_eq!(ann.recv(), "SERVER MSG: Bob> has disconnected");

    server.close().unwrap();
    runtime.shutdown_now().wait().unwrap();
}
