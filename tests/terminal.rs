mod common;

use std::io::Cursor;

use echo_chat::{ServerConfig, ServerState, Terminal};

use common::Harness;

#[test]
fn console_lines_drive_the_server() {
    let h = Harness::new();
    let config = ServerConfig::default();
    let ann = h.login(1, "Ann");
    h.transport.clear();

    let input = Cursor::new("#stop\n#start\n#status\nhello all\n\n#getport\n#bogus\n#quit\nignored\n");
    Terminal::new(h.server.clone(), &config, &*h.operator)
        .run(input)
        .unwrap();

    assert_eq!(h.server.state(), ServerState::Closed);
    assert!(!h.transport.is_listening());
    assert_eq!(
        h.transport.sent_to(ann),
        vec!["SERVER MSG: hello all"],
    );
    assert_eq!(
        h.operator.lines(),
        vec![
            "Command failed: server is not listening".to_string(),
            "Server is listening on port 5555, 1 client(s) connected".to_string(),
            "hello all".to_string(),
            "Port number: 5555".to_string(),
            "invalid argument: unknown command #bogus".to_string(),
            "Server has stopped listening for connections.".to_string(),
            "Ann> has disconnected".to_string(),
            "Server has been closed".to_string(),
        ]
    );
}

#[test]
fn end_of_input_closes_the_server() {
    let h = Harness::new();
    let config = ServerConfig::default();
    Terminal::new(h.server.clone(), &config, &*h.operator)
        .run(Cursor::new(""))
        .unwrap();
    assert_eq!(h.server.state(), ServerState::Closed);
    assert_eq!(h.operator.lines(), vec!["Server has been closed"]);
}
