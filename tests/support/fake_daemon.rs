// A minimal stand-in for the cache daemon's administrative CLI port. It
// writes a scripted sequence of responses as commands arrive, and records
// every command line it sees (heredoc bodies included) so a test can assert
// on order and content without caring about our own codec internals.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct FakeDaemon {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeDaemon {
    /// Binds an ephemeral port and, on the first connection, writes
    /// `greeting` then works through `responses` one at a time: read one
    /// command line (slurping its heredoc body if present), record it,
    /// write the matching response.
    pub fn start(greeting: (u32, &str), responses: Vec<(u32, &str)>) -> FakeDaemon {
        let listener = TcpListener::bind("127.0.0.1:0").expect("binding fake daemon listener");
        let addr = listener.local_addr().expect("fake daemon local addr");
        let received = Arc::new(Mutex::new(Vec::new()));

        let greeting = (greeting.0, greeting.1.to_string());
        let responses: Vec<(u32, String)> =
            responses.into_iter().map(|(s, b)| (s, b.to_string())).collect();
        let received_handle = Arc::clone(&received);

        thread::spawn(move || {
            let (stream, _) = match listener.accept() {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let mut writer = stream.try_clone().expect("cloning fake daemon stream");
            let mut reader = BufReader::new(stream);

            write_frame(&mut writer, greeting.0, greeting.1.as_bytes());

            for (status, body) in responses {
                let cmd = match read_command_line(&mut reader) {
                    Some(c) => c,
                    None => break,
                };
                received_handle.lock().unwrap().push(cmd);
                write_frame(&mut writer, status, body.as_bytes());
            }

            // Keep the socket open a little so a session's daemon-reader
            // poll has something to time out against instead of an
            // immediate reset; the test process tears everything down on
            // drop regardless.
            thread::sleep(std::time::Duration::from_millis(200));
        });

        FakeDaemon { addr, received }
    }

    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    pub fn received_commands(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

/// Reads one command line off `reader`. If it carries a ` << TOKEN` heredoc
/// suffix, slurps the body up to the terminating token line and folds it
/// into the returned string as `<line> [[<body>]]` so assertions can check
/// both the command and its payload in one string.
fn read_command_line(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = String::new();
    if reader.read_line(&mut line).ok()? == 0 {
        return None;
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).to_string();

    if let Some(idx) = trimmed.rfind(" << ") {
        let token = trimmed[idx + 4..].to_string();
        let mut body = String::new();
        loop {
            let mut body_line = String::new();
            if reader.read_line(&mut body_line).ok()? == 0 {
                break;
            }
            if body_line.trim_end_matches(['\n', '\r']) == token {
                break;
            }
            body.push_str(&body_line);
        }
        return Some(format!("{} [[{}]]", trimmed, body.trim_end()));
    }

    Some(trimmed)
}

fn write_frame<W: Write>(w: &mut W, status: u32, body: &[u8]) {
    let header = format!("{} {}", status, body.len());
    let padded = format!("{:<12}\n", header);
    let _ = w.write_all(padded.as_bytes());
    let _ = w.write_all(body);
    let _ = w.write_all(b"\n");
    let _ = w.flush();
}
