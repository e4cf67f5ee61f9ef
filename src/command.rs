//! Parsed Command (§3) and the console-side request reader that ties the
//! Line Codec's pieces together: line read, here-doc gating on the session's
//! authentication flag, tokenizing.

use std::io::BufRead;

use anyhow::{bail, Context};

use crate::codec::heredoc::{read_heredoc_body, split_heredoc_suffix};
use crate::codec::quoting::unquote_line;

#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub raw_line: String,
    pub command_name: String,
    pub args: Vec<String>,
    pub heredoc_present: bool,
}

impl ParsedCommand {
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(|s| s.as_str())
    }
}

/// Read one request line and, if permitted, its here-document body.
///
/// `authenticated` gates here-doc parsing per §4.1: an unauthenticated
/// session's ` << TOKEN` suffix is left untouched and forwarded as-is,
/// matching the upstream daemon's own gating.
///
/// Returns `Ok(None)` on a clean EOF (console hung up).
pub fn read_command<R: BufRead>(
    r: &mut R,
    authenticated: bool,
) -> anyhow::Result<Option<ParsedCommand>> {
    let mut line = String::new();
    let n = r.read_line(&mut line).context("reading command line")?;
    if n == 0 {
        return Ok(None);
    }
    let raw_line = line.trim_end_matches(['\n', '\r']).to_string();

    let (head, heredoc_token) = if authenticated {
        match split_heredoc_suffix(&raw_line) {
            Some((head, token)) => (head, Some(token.to_string())),
            None => (raw_line.as_str(), None),
        }
    } else {
        (raw_line.as_str(), None)
    };

    let mut tokens = unquote_line(head)?;
    if tokens.is_empty() {
        bail!("empty command line");
    }

    let heredoc_present = heredoc_token.is_some();
    if let Some(token) = heredoc_token {
        let body = read_heredoc_body(r, &token)?;
        tokens.push(body);
    }

    let command_name = tokens.remove(0);
    Ok(Some(ParsedCommand { raw_line, command_name, args: tokens, heredoc_present }))
}
