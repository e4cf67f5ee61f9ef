//! Client Session (§4.5): a console↔daemon relay with interception.
//!
//! Realizes the two-cooperating-threads concurrency model from §5 as the
//! teacher's `shell::SessionInner::bidi_stream` does for its pty↔client
//! byte shuffle: a console-reader thread that owns the
//! console→daemon→interceptor pipeline, and a daemon-reader thread that
//! only runs while no console command is outstanding (modeled here as
//! `try_lock` on the shared Daemon Client), woken by the daemon socket's
//! own short read timeout instead of `nix::select`.

use std::io::BufReader;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use tracing::{info, warn};

use crate::codec::write_response;
use crate::command::read_command;
use crate::config::GatewayConfig;
use crate::consts::{BUF_SIZE, DAEMON_READ_TIMEOUT, JOIN_POLL_DURATION};
use crate::daemon_client::DaemonClient;
use crate::interceptor::{self, SessionContext};

struct Shared {
    daemon: Mutex<DaemonClient>,
    console_out: Mutex<TcpStream>,
    authenticated: AtomicBool,
}

/// Run one Client Session to completion. Blocks the calling worker thread
/// until the session ends (console EOF, daemon EOF, protocol error, or
/// cooperative shutdown).
pub fn run(console: TcpStream, config: Arc<GatewayConfig>, stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    let peer = console.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "?".to_string());
    let _span = tracing::info_span!("client_session", peer = %peer).entered();

    let (daemon, greeting_status, greeting_body) =
        DaemonClient::connect(&config.daemon_addr, DAEMON_READ_TIMEOUT)
            .context("connecting to cache daemon")?;

    let mut console_out = console.try_clone().context("cloning console socket for writing")?;
    write_response(&mut console_out, greeting_status, &greeting_body)
        .context("forwarding daemon greeting to console")?;

    let shared = Arc::new(Shared {
        daemon: Mutex::new(daemon),
        console_out: Mutex::new(console_out),
        authenticated: AtomicBool::new(false),
    });

    let daemon_reader = {
        let shared = Arc::clone(&shared);
        let stop = Arc::clone(&stop);
        thread::spawn(move || daemon_reader_loop(shared, stop))
    };

    let console_in = console.try_clone().context("cloning console socket for reading")?;
    let result = console_reader_loop(
        BufReader::with_capacity(BUF_SIZE, console_in),
        Arc::clone(&shared),
        Arc::clone(&config),
        stop,
    );

    // Tear the socket down so a blocked daemon-reader poll and any
    // outstanding read both unwind promptly, then wait for it to notice.
    let _ = console.shutdown(std::net::Shutdown::Both);
    let _ = daemon_reader.join();

    result
}

fn console_reader_loop(
    mut console_in: BufReader<TcpStream>,
    shared: Arc<Shared>,
    config: Arc<GatewayConfig>,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        let authenticated = shared.authenticated.load(Ordering::Relaxed);
        let cmd = match read_command(&mut console_in, authenticated) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => {
                info!("console disconnected");
                return Ok(());
            }
            Err(e) => {
                warn!("protocol error reading console command: {:?}", e);
                return Err(e);
            }
        };

        let (status, body) = {
            let mut daemon = shared.daemon.lock().unwrap();
            let mut ctx = SessionContext { authenticated, config: &config };
            let outcome = interceptor::dispatch(&cmd, &mut daemon, &mut ctx)?;
            if ctx.authenticated {
                shared.authenticated.store(true, Ordering::Relaxed);
            }
            outcome
        };

        let mut out = shared.console_out.lock().unwrap();
        write_response(&mut *out, status, &body).context("forwarding response to console")?;
    }
}

fn daemon_reader_loop(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let polled = {
            let mut daemon = match shared.daemon.try_lock() {
                Ok(d) => d,
                Err(_) => {
                    thread::sleep(JOIN_POLL_DURATION);
                    continue;
                }
            };
            daemon.poll_response()
        };

        match polled {
            Ok(Some((status, body))) => {
                let mut out = shared.console_out.lock().unwrap();
                if let Err(e) = write_response(&mut *out, status, &body) {
                    warn!("failed forwarding unsolicited daemon frame: {:?}", e);
                    return;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                info!("daemon side of session ending: {:?}", e);
                return;
            }
        }
    }
}
