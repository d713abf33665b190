#[macro_use]
extern crate clap;

use std::io;
use std::process;
use std::sync::Arc;

use echo_chat::{ChatServer, Console, Operator, Result, ServerConfig, TcpTransport, Terminal};
use tokio::prelude::Future;
use tokio::runtime::Runtime;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = clap_app!(
        myapp =>
            (name: "echo-chat")
            (version: "0.1")
            (author: "Andrew Lyjak <andrew.lyjak@gmail.com>")
            (about: "A multi-client chat server with an operator console.")
            (@arg PORT: "The port to listen on, 5555 by default.")
            (@arg host: --host +takes_value "The address to bind to, 0.0.0.0 by default.")
    )
    .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = match ServerConfig::from_matches(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(2);
        }
    };

    if let Err(err) = run(&config) {
        error!("server failed: {}", err);
        process::exit(1);
    }
}

fn run(config: &ServerConfig) -> Result<()> {
    let runtime = Runtime::new()?;
    let transport = Arc::new(TcpTransport::new(config.socket_addr(), runtime.executor()));
    let console = Arc::new(Console);
    let server = ChatServer::new(transport, console.clone());

    if let Err(err) = server.start_listening() {
        error!("could not listen on {}: {}", config.socket_addr(), err);
        console.display("ERROR - Could not listen for clients!");
    }

    // The console owns the main thread; peers are served by the runtime's pool.
    let stdin = io::stdin();
    let outcome = Terminal::new(server, config, &*console).run(stdin.lock());
    let _ = runtime.shutdown_now().wait();
    outcome
}
