//! Stats shell-out (§4.12, ambient): invoked only by the `agent.stat`
//! intercept handler.

use std::process::Command;

use anyhow::{bail, Context};
use tracing::warn;

/// Run the configured statistics command and return its captured stdout.
/// The command string is whitespace-split into a program and its arguments
/// (e.g. `"varnishstat -1"` runs `varnishstat` with `-1`) rather than passed
/// to the OS as a single literal executable name. A non-zero exit or a spawn
/// failure becomes an error whose display text the caller turns into a CANT
/// response body (§4.4).
pub fn run(command: &str) -> anyhow::Result<Vec<u8>> {
    let mut parts = command.split_whitespace();
    let program = parts.next().with_context(|| format!("empty statistics command '{}'", command))?;

    let output = Command::new(program)
        .args(parts)
        .output()
        .with_context(|| format!("spawning statistics command '{}'", command))?;

    if !output.stderr.is_empty() {
        warn!(
            "statistics command '{}' wrote to stderr: {}",
            command,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    if !output.status.success() {
        bail!("statistics command '{}' exited with {}", command, output.status);
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_a_successful_command() {
        let out = run("true").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        assert!(run("false").is_err());
    }

    #[test]
    fn missing_command_is_an_error() {
        assert!(run("/no/such/statistics-command").is_err());
    }

    #[test]
    fn splits_program_from_its_arguments() {
        let out = run("echo cache.hit_ratio=0.9").unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "cache.hit_ratio=0.9");
    }
}
