//! Master Session (§4.6): replays persisted state onto a daemon-initiated
//! connection, strictly sequentially, then holds the connection open with a
//! quiet read loop.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::consts::DAEMON_READ_TIMEOUT;
use crate::daemon_client::DaemonClient;
use crate::state::{params::ParamList, vcl};
use crate::status::Status;

pub fn run(stream: TcpStream, config: Arc<GatewayConfig>, stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "?".to_string());
    let _span = tracing::info_span!("master_session", peer = %peer).entered();

    let (mut daemon, status, body) = DaemonClient::from_stream(stream, DAEMON_READ_TIMEOUT)?;

    match status {
        Status::Auth => {
            let secret = config
                .secret
                .as_ref()
                .ok_or_else(|| anyhow!("daemon requires auth but no shared secret is configured"))?;
            daemon.authenticate(&body, secret)?;
        }
        Status::Ok => {}
        other => bail!("master connection greeted with unexpected status {:?}", other),
    }

    replay_params(&mut daemon, &config);
    replay_vcl(&mut daemon, &config);

    quiet_read_loop(&mut daemon, &stop);
    Ok(())
}

fn replay_params(daemon: &mut DaemonClient, config: &GatewayConfig) {
    let list = match ParamList::read(&config.param_file) {
        Ok(l) => l,
        Err(e) => {
            warn!("could not read parameter file for replay: {:?}", e);
            return;
        }
    };

    for (name, value) in list.iter() {
        match daemon.send_command("param.set", &[name.to_string(), value.to_string()]) {
            Ok((status, _)) if status.is_ok() => info!("replayed param.set {} {}", name, value),
            Ok((status, body)) => warn!(
                "param.set {} {} rejected by daemon: {:?} {}",
                name,
                value,
                status,
                String::from_utf8_lossy(&body)
            ),
            Err(e) => warn!("param.set {} {} failed: {:?}", name, value, e),
        }
    }
}

fn replay_vcl(daemon: &mut DaemonClient, config: &GatewayConfig) {
    let body = match vcl::read(&config.vcl_file) {
        Ok(Some(b)) => b,
        Ok(None) => return,
        Err(e) => {
            warn!("could not read VCL file for replay: {:?}", e);
            return;
        }
    };

    let name = vcl::fingerprint(&body);
    match daemon.send_heredoc_command("vcl.inline", &[name.clone()], &body) {
        Ok((status, _)) if status.is_ok() => use_and_start(daemon, &name),
        Ok((status, body)) => warn!(
            "vcl.inline {} rejected by daemon: {:?} {}",
            name,
            status,
            String::from_utf8_lossy(&body)
        ),
        Err(e) => warn!("vcl.inline {} failed: {:?}", name, e),
    }
}

fn use_and_start(daemon: &mut DaemonClient, name: &str) {
    match daemon.send_command("vcl.use", &[name.to_string()]) {
        Ok((status, _)) if status.is_ok() => match daemon.send_command("start", &[]) {
            Ok((status, _)) if status.is_ok() => info!("replayed vcl {} and started", name),
            Ok((status, body)) => {
                warn!("start rejected by daemon: {:?} {}", status, String::from_utf8_lossy(&body))
            }
            Err(e) => warn!("start failed: {:?}", e),
        },
        Ok((status, body)) => warn!(
            "vcl.use {} rejected by daemon: {:?} {}",
            name,
            status,
            String::from_utf8_lossy(&body)
        ),
        Err(e) => warn!("vcl.use {} failed: {:?}", name, e),
    }
}

fn quiet_read_loop(daemon: &mut DaemonClient, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        match daemon.poll_response() {
            Ok(Some((status, body))) => {
                info!("daemon: {:?} {}", status, String::from_utf8_lossy(&body));
            }
            Ok(None) => continue,
            Err(e) => {
                info!("master connection ending: {:?}", e);
                return;
            }
        }
    }
}
