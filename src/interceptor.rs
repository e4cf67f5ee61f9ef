//! Command Interceptor (§4.4): table-driven dispatch over recognized
//! command names. Mirrors the teacher's `handle_conn` match over
//! `ConnectHeader` variants, reworked to dispatch on a command name parsed
//! off the wire instead of a deserialized enum.

use tracing::{info, warn};

use crate::command::ParsedCommand;
use crate::config::GatewayConfig;
use crate::daemon_client::DaemonClient;
use crate::stats;
use crate::state::params;
use crate::status::Status;

/// Per-session interception state: just the authentication flag (§3) plus
/// the config every session worker is constructed with.
pub struct SessionContext<'a> {
    pub authenticated: bool,
    pub config: &'a GatewayConfig,
}

/// Dispatch one parsed command. Returns the response frame to forward to
/// the console; may have side effects on `ctx` and on the Persisted State
/// Store.
pub fn dispatch(
    cmd: &ParsedCommand,
    daemon: &mut DaemonClient,
    ctx: &mut SessionContext,
) -> anyhow::Result<(Status, Vec<u8>)> {
    match cmd.command_name.as_str() {
        "auth" => handle_auth(cmd, daemon, ctx),
        "vcl.use" => handle_vcl_use(cmd, daemon, ctx),
        "param.set" => handle_param_set(cmd, daemon, ctx),
        "agent.stat" => handle_agent_stat(cmd, ctx),
        _ => forward(daemon, cmd),
    }
}

fn handle_auth(
    cmd: &ParsedCommand,
    daemon: &mut DaemonClient,
    ctx: &mut SessionContext,
) -> anyhow::Result<(Status, Vec<u8>)> {
    let (status, body) = forward(daemon, cmd)?;
    if status.is_ok() {
        ctx.authenticated = true;
    }
    Ok((status, body))
}

fn handle_vcl_use(
    cmd: &ParsedCommand,
    daemon: &mut DaemonClient,
    ctx: &mut SessionContext,
) -> anyhow::Result<(Status, Vec<u8>)> {
    let name = match cmd.arg(0) {
        Some(n) => n,
        // Missing argument: forward as-is and let the daemon raise the error.
        None => return forward(daemon, cmd),
    };

    let (show_status, show_body) = daemon.send_command("vcl.show", &[name.to_string()])?;
    let (use_status, use_body) = forward(daemon, cmd)?;

    // §9 open question, preserved on purpose: only persist when *both*
    // sub-steps succeeded; a vcl.show failure with a successful vcl.use
    // changes daemon state without updating the VCL file.
    if show_status.is_ok() && use_status.is_ok() {
        if let Err(e) = crate::state::vcl::write(&ctx.config.vcl_file, &String::from_utf8_lossy(&show_body)) {
            warn!("failed to persist VCL file after vcl.use {}: {:?}", name, e);
        } else {
            info!("persisted VCL for vcl.use {}", name);
            crate::emit!(&format!("vcl-persisted:{}", name));
        }
    }

    Ok((use_status, use_body))
}

fn handle_param_set(
    cmd: &ParsedCommand,
    daemon: &mut DaemonClient,
    ctx: &mut SessionContext,
) -> anyhow::Result<(Status, Vec<u8>)> {
    let (status, body) = forward(daemon, cmd)?;

    // §9 open question, preserved on purpose: only an OK daemon reply
    // triggers persistence.
    if status.is_ok() {
        if let (Some(name), Some(value)) = (cmd.arg(0), cmd.arg(1)) {
            let mut list = params::ParamList::read(&ctx.config.param_file).unwrap_or_default();
            list.add_param(name, value);
            params::persist(&ctx.config.param_file, &list);
            crate::emit!(&format!("param-persisted:{}", name));
        }
    }

    Ok((status, body))
}

fn handle_agent_stat(
    cmd: &ParsedCommand,
    ctx: &SessionContext,
) -> anyhow::Result<(Status, Vec<u8>)> {
    let _ = cmd;
    if ctx.config.secret.is_some() && !ctx.authenticated {
        return Ok((Status::Cant, b"Not an authenticated connection".to_vec()));
    }

    match stats::run(&ctx.config.stats_command) {
        Ok(stdout) => Ok((Status::Ok, stdout)),
        Err(e) => Ok((Status::Cant, e.to_string().into_bytes())),
    }
}

/// Default path for any command without a dedicated handler: forward
/// verbatim, re-attaching the here-doc body if the parsed command carried
/// one (§3: the body is appended as the final argument).
fn forward(daemon: &mut DaemonClient, cmd: &ParsedCommand) -> anyhow::Result<(Status, Vec<u8>)> {
    if cmd.heredoc_present {
        let body = cmd.args.last().expect("heredoc_present implies a body argument");
        let head_args = &cmd.args[..cmd.args.len() - 1];
        daemon.send_heredoc_command(&cmd.command_name, head_args, body)
    } else {
        daemon.send_command(&cmd.command_name, &cmd.args)
    }
}
