//! Config (§4.8, ambient): CLI flags and the flat `Key Value` config file
//! merged into one immutable `GatewayConfig`, handed to the Supervisor and
//! from there to every session worker by construction (§3).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::warn;

use crate::consts::{DEFAULT_CONSOLE_ADDR, DEFAULT_DAEMON_ADDR, DEFAULT_MASTER_ADDR};
use crate::secret::Secret;

#[derive(Parser, Debug, Clone)]
#[clap(version, author, about = "administrative-protocol gateway for a cache daemon")]
pub struct Args {
    #[clap(short = 'c', long, help = "a flat Key Value file containing configuration")]
    pub config_file: Option<PathBuf>,

    #[clap(short, long, action, help = "stay attached to the controlling terminal instead of daemonizing")]
    pub foreground: bool,

    #[clap(long, action, help = "force debug-level logging regardless of -v count")]
    pub debug: bool,

    #[clap(short, long, action = clap::ArgAction::Count,
           help = "show more in logs, may be given multiple times")]
    pub verbose: u8,

    #[clap(long, help = "file to additionally write logs to")]
    pub log_file: Option<PathBuf>,

    #[clap(long, action, help = "also send logs to syslog")]
    pub syslog: bool,

    #[clap(long, help = "path to the PID file")]
    pub pid_file: Option<PathBuf>,

    #[clap(long, help = "address to listen on for console connections")]
    pub console_addr: Option<String>,

    #[clap(long, help = "address of the cache daemon's administrative port")]
    pub daemon_addr: Option<String>,

    #[clap(long, help = "address to listen on for the daemon's master call-in")]
    pub master_addr: Option<String>,

    #[clap(long, help = "path to the persisted VCL file")]
    pub vcl_file: Option<PathBuf>,

    #[clap(long, help = "path to the persisted parameter file")]
    pub param_file: Option<PathBuf>,

    #[clap(long, help = "path to a file containing the shared secret")]
    pub secret_file: Option<PathBuf>,

    #[clap(long, help = "this gateway instance's identifier")]
    pub agent_id: Option<String>,

    #[clap(long, help = "URL to announce this instance to at startup")]
    pub announce_url: Option<String>,

    #[clap(long, help = "CA file for a future TLS-wrapped listener (accepted, not wired)")]
    pub tls_ca_file: Option<PathBuf>,

    #[clap(long, help = "command to run for agent.stat, invoked with no arguments")]
    pub stats_command: Option<String>,
}

/// The merged, validated, immutable configuration every session worker is
/// constructed with (§3).
#[derive(Clone)]
pub struct GatewayConfig {
    pub foreground: bool,
    pub debug: bool,
    pub verbosity: u8,
    pub log_file: Option<PathBuf>,
    pub syslog: bool,
    pub pid_file: Option<PathBuf>,
    pub console_addr: String,
    pub daemon_addr: String,
    pub master_addr: String,
    pub vcl_file: PathBuf,
    pub param_file: PathBuf,
    pub secret: Option<Secret>,
    pub agent_id: String,
    pub announce_url: Option<String>,
    pub tls_ca_file: Option<PathBuf>,
    pub stats_command: String,
}

impl GatewayConfig {
    /// Cache daemon's CLI port, used as the `port` query parameter on
    /// announce (§6).
    pub fn daemon_port(&self) -> u16 {
        port_of(&self.daemon_addr).unwrap_or(0)
    }

    pub fn console_port(&self) -> u16 {
        port_of(&self.console_addr).unwrap_or(0)
    }
}

fn port_of(addr: &str) -> Option<u16> {
    addr.rsplit(':').next()?.parse().ok()
}

/// CLI flags (highest priority) over the config file (§6) over built-in
/// defaults.
pub fn load(args: Args) -> anyhow::Result<GatewayConfig> {
    let file_values = match &args.config_file {
        Some(path) => read_config_file(path)?,
        None => HashMap::new(),
    };

    let string_opt = |cli: Option<String>, key: &str, default: &str| -> String {
        cli.or_else(|| file_values.get(key).cloned()).unwrap_or_else(|| default.to_string())
    };
    let path_opt = |cli: Option<PathBuf>, key: &str, default: &str| -> PathBuf {
        cli.or_else(|| file_values.get(key).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(default))
    };

    let secret_file: Option<PathBuf> = args
        .secret_file
        .clone()
        .or_else(|| file_values.get("secret_file").map(PathBuf::from));
    let secret = match &secret_file {
        Some(path) => Some(Secret::load(path)?),
        None => None,
    };

    let config = GatewayConfig {
        foreground: args.foreground || file_flag(&file_values, "foreground"),
        debug: args.debug || file_flag(&file_values, "debug"),
        verbosity: args.verbose,
        log_file: args.log_file.clone().or_else(|| file_values.get("log_file").map(PathBuf::from)),
        syslog: args.syslog || file_flag(&file_values, "syslog"),
        pid_file: args.pid_file.clone().or_else(|| file_values.get("pid_file").map(PathBuf::from)),
        console_addr: string_opt(args.console_addr.clone(), "console_addr", DEFAULT_CONSOLE_ADDR),
        daemon_addr: string_opt(args.daemon_addr.clone(), "daemon_addr", DEFAULT_DAEMON_ADDR),
        master_addr: string_opt(args.master_addr.clone(), "master_addr", DEFAULT_MASTER_ADDR),
        vcl_file: path_opt(args.vcl_file.clone(), "vcl_file", "./cachegate.vcl"),
        param_file: path_opt(args.param_file.clone(), "param_file", "./cachegate.params"),
        secret,
        agent_id: string_opt(args.agent_id.clone(), "agent_id", "cachegate"),
        announce_url: args.announce_url.clone().or_else(|| file_values.get("announce_url").cloned()),
        tls_ca_file: args.tls_ca_file.clone().or_else(|| file_values.get("tls_ca_file").map(PathBuf::from)),
        stats_command: string_opt(args.stats_command.clone(), "stats_command", "varnishstat -1"),
    };

    validate(&config)?;
    Ok(config)
}

fn file_flag(values: &HashMap<String, String>, key: &str) -> bool {
    matches!(values.get(key).map(|v| v.as_str()), Some("true") | Some("1") | Some("yes"))
}

/// One `Key Value` pair per line; `#` starts a comment; blank lines are
/// ignored. Unknown keys are logged, not treated as an error (§4.8) —
/// callers here simply collect everything and the known-key lookups above
/// silently ignore anything they don't recognize.
fn read_config_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file {:?}", path))?;

    let known_keys = known_config_keys();
    let mut values = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let key = match parts.next() {
            Some(k) => k,
            None => continue,
        };
        let value = parts.next().unwrap_or("").trim().to_string();
        if !known_keys.contains(key) {
            warn!("ignoring unknown config file key '{}'", key);
            continue;
        }
        values.insert(key.to_string(), value);
    }
    Ok(values)
}

fn known_config_keys() -> std::collections::HashSet<&'static str> {
    [
        "foreground",
        "debug",
        "verbose",
        "log_file",
        "syslog",
        "pid_file",
        "console_addr",
        "daemon_addr",
        "master_addr",
        "vcl_file",
        "param_file",
        "secret_file",
        "agent_id",
        "announce_url",
        "tls_ca_file",
        "stats_command",
    ]
    .into_iter()
    .collect()
}

/// Paths are at least nominally writable/creatable, the secret file (if
/// given) is readable — checked before the Listener/Supervisor is
/// constructed (§4.8); failures here are Startup errors (§7).
fn validate(config: &GatewayConfig) -> anyhow::Result<()> {
    for path in [&config.vcl_file, &config.param_file] {
        validate_writable(path)?;
    }
    if let Some(pid_file) = &config.pid_file {
        validate_writable(pid_file)?;
    }
    if let Some(log_file) = &config.log_file {
        validate_writable(log_file)?;
    }
    Ok(())
}

fn validate_writable(path: &Path) -> anyhow::Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let meta = fs::metadata(parent).with_context(|| format!("checking directory {:?}", parent))?;
    if !meta.is_dir() {
        bail!("{:?} is not a directory", parent);
    }
    Ok(())
}
