//! Listener/Supervisor (§4.7): two listening endpoints, spawn-per-accept,
//! asynchronous reaping, cooperative shutdown. Grounded on the teacher's
//! `daemon/mod.rs::run` + `daemon/server.rs::serve` spawn-per-connection
//! loop and `daemon/signals.rs`'s signal-thread-that-cleans-up-and-exits,
//! generalized to two listeners and a cooperative stop flag instead of an
//! immediate `process::exit`.

use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use crossbeam_channel::unbounded;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{info, warn};

use crate::announce;
use crate::config::GatewayConfig;
use crate::consts::JOIN_POLL_DURATION;
use crate::pidfile::PidFile;
use crate::session;

pub fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let pid_file = match &config.pid_file {
        Some(path) => Some(PidFile::acquire(path)?),
        None => None,
    };

    let console_listener = TcpListener::bind(&config.console_addr)
        .with_context(|| format!("binding console listener on {}", config.console_addr))?;
    let master_listener = TcpListener::bind(&config.master_addr)
        .with_context(|| format!("binding master listener on {}", config.master_addr))?;
    console_listener.set_nonblocking(true).context("setting console listener nonblocking")?;
    master_listener.set_nonblocking(true).context("setting master listener nonblocking")?;

    if let Some(pid_file) = &pid_file {
        pid_file.write_current_pid()?;
    }
    info!("listening for consoles on {}, for the daemon on {}", config.console_addr, config.master_addr);

    if let Some(url) = &config.announce_url {
        announce::spawn(
            url.clone(),
            config.daemon_port(),
            config.console_port(),
            config.agent_id.clone(),
            config.secret.as_ref().map(|s| String::from_utf8_lossy(s.bytes()).into_owned()),
        );
    }

    let stop = Arc::new(AtomicBool::new(false));
    let workers: Arc<Mutex<Vec<TcpStream>>> = Arc::new(Mutex::new(Vec::new()));

    // Workers report their own completion over a channel; a dedicated
    // reaper thread drains it and prunes the live set, the same
    // channel-fed-by-workers shape as the teacher's `ttl_reaper`.
    let (reap_tx, reap_rx) = unbounded::<std::net::SocketAddr>();
    {
        let workers = Arc::clone(&workers);
        thread::spawn(move || {
            for addr in reap_rx.iter() {
                workers.lock().unwrap().retain(|s| s.peer_addr().map(|p| p != addr).unwrap_or(true));
                crate::emit!("worker-reaped");
            }
        });
    }

    spawn_signal_handler(Arc::clone(&stop), Arc::clone(&workers))?;

    let console_handle = {
        let config = Arc::clone(&config);
        let stop = Arc::clone(&stop);
        let workers = Arc::clone(&workers);
        let reap_tx = reap_tx.clone();
        thread::spawn(move || accept_loop("console", console_listener, config, stop, workers, reap_tx, Kind::Client))
    };
    let master_handle = {
        let config = Arc::clone(&config);
        let stop = Arc::clone(&stop);
        let workers = Arc::clone(&workers);
        thread::spawn(move || accept_loop("master", master_listener, config, stop, workers, reap_tx, Kind::Master))
    };

    let _ = console_handle.join();
    let _ = master_handle.join();

    // Give in-flight workers a short window to notice the torn-down sockets
    // and unwind before we remove the PID file.
    thread::sleep(JOIN_POLL_DURATION * 5);

    if let Some(pid_file) = &pid_file {
        pid_file.remove();
    }
    crate::emit!("supervisor-shutdown");

    Ok(())
}

#[derive(Clone, Copy)]
enum Kind {
    Client,
    Master,
}

fn accept_loop(
    name: &'static str,
    listener: TcpListener,
    config: Arc<GatewayConfig>,
    stop: Arc<AtomicBool>,
    workers: Arc<Mutex<Vec<TcpStream>>>,
    reap_tx: crossbeam_channel::Sender<std::net::SocketAddr>,
    kind: Kind,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        match listener.accept() {
            Ok((stream, addr)) => {
                info!("accepted {} connection from {}", name, addr);
                if let Ok(tracked) = stream.try_clone() {
                    workers.lock().unwrap().push(tracked);
                }

                let worker_config = Arc::clone(&config);
                let worker_stop = Arc::clone(&stop);
                let reap_tx = reap_tx.clone();

                thread::spawn(move || {
                    let result = match kind {
                        Kind::Client => session::client::run(stream, worker_config, worker_stop),
                        Kind::Master => session::master::run(stream, worker_config, worker_stop),
                    };
                    if let Err(e) = result {
                        warn!("{} session ended with error: {:?}", name, e);
                    }
                    let _ = reap_tx.send(addr);
                });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(JOIN_POLL_DURATION);
            }
            Err(e) => {
                warn!("{} accept failed: {:?}", name, e);
                thread::sleep(JOIN_POLL_DURATION);
            }
        }
    }
}

fn spawn_signal_handler(stop: Arc<AtomicBool>, workers: Arc<Mutex<Vec<TcpStream>>>) -> anyhow::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("registering signal handlers")?;
    thread::spawn(move || {
        for sig in signals.forever() {
            info!("received signal {}, shutting down", sig);
            stop.store(true, Ordering::Relaxed);
            let workers = workers.lock().unwrap();
            for w in workers.iter() {
                let _ = w.shutdown(std::net::Shutdown::Both);
            }
            break;
        }
    });
    Ok(())
}
