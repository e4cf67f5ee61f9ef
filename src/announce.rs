//! Announce (§4.11, ambient): one-shot, fire-and-forget outbound HTTP GET
//! performed from a background thread once both listeners are bound, the
//! same background-spawn idiom the teacher project uses for its own
//! fire-and-forget helper threads.

use std::net::TcpStream;
use std::thread;

use tracing::warn;

/// Spawn the background thread that performs the single announcement GET.
/// Never blocks the caller and never propagates an error — failure is
/// logged at warn and otherwise ignored (§4.11, §6).
pub fn spawn(url: String, daemon_port: u16, console_port: u16, agent_id: String, secret: Option<String>) {
    thread::spawn(move || {
        if let Err(e) = announce_once(&url, daemon_port, console_port, &agent_id, secret.as_deref()) {
            warn!("announcement to {} failed: {:?}", url, e);
        }
    });
}

fn announce_once(
    url: &str,
    daemon_port: u16,
    console_port: u16,
    agent_id: &str,
    secret: Option<&str>,
) -> anyhow::Result<()> {
    let ip = local_ip_for(url)?;

    let mut req = ureq::get(url)
        .query("ip", &ip)
        .query("port", &daemon_port.to_string())
        .query("cliPort", &console_port.to_string())
        .query("agentId", agent_id);
    if let Some(secret) = secret {
        req = req.query("secret", secret);
    }

    let response = req.call()?;
    if response.status() >= 300 {
        anyhow::bail!("announcement endpoint returned status {}", response.status());
    }
    Ok(())
}

/// The source address observed on the socket opened to connect outbound to
/// `url`'s host — not necessarily either listener's bound address (§4.11).
fn local_ip_for(url: &str) -> anyhow::Result<String> {
    let addr = host_port(url)?;
    let stream = TcpStream::connect(&addr)?;
    Ok(stream.local_addr()?.ip().to_string())
}

fn host_port(url: &str) -> anyhow::Result<String> {
    let is_https = url.starts_with("https://");
    let rest = url.splitn(2, "://").nth(1).unwrap_or(url);
    let host_port = rest.split(['/', '?']).next().unwrap_or(rest);
    if host_port.is_empty() {
        anyhow::bail!("could not determine host from announcement URL '{}'", url);
    }
    if host_port.contains(':') {
        Ok(host_port.to_string())
    } else {
        Ok(format!("{}:{}", host_port, if is_https { 443 } else { 80 }))
    }
}
