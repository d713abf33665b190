#[macro_use]
extern crate clap;

use std::io;
use std::process;
use std::sync::Arc;

use echo_chat::{ChatClient, ClientConfig, Console, Operator, Result};
use tokio::prelude::Future;
use tokio::runtime::Runtime;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = clap_app!(
        myapp =>
            (name: "echo-chat-client")
            (version: "0.1")
            (author: "Andrew Lyjak <andrew.lyjak@gmail.com>")
            (about: "Console client for the echo-chat server.")
            (@arg ID: +required "The id to log in as.")
            (@arg HOST: "The server to connect to, localhost by default.")
            (@arg PORT: "The server port, 5555 by default.")
    )
    .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = match ClientConfig::from_matches(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(2);
        }
    };

    if let Err(err) = run(config) {
        error!("client failed: {}", err);
        process::exit(1);
    }
}

fn run(config: ClientConfig) -> Result<()> {
    let runtime = Runtime::new()?;
    let console = Arc::new(Console);
    let mut client = ChatClient::new(config, runtime.executor(), console.clone());

    if let Err(err) = client.open_connection() {
        error!("could not connect to {}:{}: {}", client.host(), client.port(), err);
        console.display("Error: Can't setup connection! Terminating client.");
        let _ = runtime.shutdown_now().wait();
        process::exit(1);
    }

    let stdin = io::stdin();
    let outcome = client.run(stdin.lock());
    // Let the writer flush the connection close before the runtime goes away.
    let _ = runtime.shutdown_on_idle().wait();
    outcome
}
