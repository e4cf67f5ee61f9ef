//! Daemon Client (§4.2): a connection to the cache daemon's administrative
//! port, with a send/receive surface the two session kinds build on.
//!
//! Mirrors the teacher's client/server framing split (`protocol::Client`'s
//! `write_connect_header`/`read_reply`), reworked for the daemon's
//! line-oriented text protocol instead of length-prefixed MessagePack.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::codec::heredoc::choose_token;
use crate::codec::quoting::quote_args;
use crate::codec::{read_response, write_response};
use crate::consts::BUF_SIZE;
use crate::secret::{challenge_response, Secret};
use crate::status::Status;

pub struct DaemonClient {
    write: TcpStream,
    read: BufReader<TcpStream>,
}

impl DaemonClient {
    /// Open a TCP connection and read the daemon's greeting frame. Does not
    /// perform any authentication handshake itself — callers decide whether
    /// to run one (Master Session, §4.6) or pass the greeting through for
    /// the console to authenticate against (Client Session, §4.5).
    pub fn connect(addr: &str, read_timeout: Duration) -> anyhow::Result<(DaemonClient, Status, Vec<u8>)> {
        let stream = TcpStream::connect(addr)
            .with_context(|| format!("connecting to cache daemon at {}", addr))?;
        Self::from_stream(stream, read_timeout)
    }

    /// Wrap an already-open stream to the daemon (used by the Master
    /// Session, where the daemon is the one that dialed in) and read its
    /// greeting frame.
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> anyhow::Result<(DaemonClient, Status, Vec<u8>)> {
        stream.set_read_timeout(Some(read_timeout)).context("setting daemon read timeout")?;
        let write = stream.try_clone().context("cloning daemon socket for writing")?;
        let mut read = BufReader::with_capacity(BUF_SIZE, stream);

        let (status, body) = read_response(&mut read).context("reading daemon greeting")?;
        Ok((DaemonClient { write, read }, status, body))
    }

    /// Run the challenge/response handshake (GLOSSARY) against a greeting
    /// that returned AUTH, using `challenge_body` as its body.
    pub fn authenticate(&mut self, challenge_body: &[u8], secret: &Secret) -> anyhow::Result<()> {
        let challenge = String::from_utf8_lossy(challenge_body);
        let challenge = challenge.lines().next().unwrap_or("");
        let digest = challenge_response(challenge, secret);
        let (status, _) = self.send_command("auth", &[digest])?;
        if !status.is_ok() {
            bail!("daemon rejected authentication handshake ({:?})", status);
        }
        Ok(())
    }

    pub fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.write.write_all(line.as_bytes()).context("writing command line")?;
        self.write.write_all(b"\n").context("writing command newline")?;
        self.write.flush().context("flushing command")
    }

    pub fn recv_response(&mut self) -> anyhow::Result<(Status, Vec<u8>)> {
        read_response(&mut self.read)
    }

    pub fn send_command(&mut self, name: &str, args: &[String]) -> anyhow::Result<(Status, Vec<u8>)> {
        self.send_line(&command_line(name, args))?;
        self.recv_response()
    }

    /// Send a command with a here-document body (used by Master Session
    /// replay for `vcl.inline`, §4.6).
    pub fn send_heredoc_command(
        &mut self,
        name: &str,
        args: &[String],
        body: &str,
    ) -> anyhow::Result<(Status, Vec<u8>)> {
        let token = choose_token(body);
        let line = format!("{} << {}", command_line(name, args), token);
        self.send_line(&line)?;

        let mut with_newline = body.to_string();
        if !with_newline.ends_with('\n') {
            with_newline.push('\n');
        }
        self.write.write_all(with_newline.as_bytes()).context("writing here-document body")?;
        self.write.write_all(format!("{}\n", token).as_bytes()).context("writing here-document terminator")?;
        self.write.flush().context("flushing here-document command")?;

        self.recv_response()
    }

    /// Forward an already-assembled response frame verbatim (used by a
    /// Client Session relaying its own Interceptor's decision, or by a
    /// session forwarding an unsolicited frame to its peer).
    pub fn forward_response<W: Write>(&self, w: &mut W, status: Status, body: &[u8]) -> anyhow::Result<()> {
        write_response(w, status, body)
    }

    /// Non-blocking check for an unsolicited frame: `Ok(None)` on timeout
    /// (nothing to read yet), `Ok(Some(_))` on a decoded frame, `Err` on a
    /// real I/O failure or a clean EOF from the daemon.
    pub fn poll_response(&mut self) -> anyhow::Result<Option<(Status, Vec<u8>)>> {
        match self.read.fill_buf() {
            Ok(buf) if buf.is_empty() => bail!("daemon closed the connection"),
            Ok(_) => Ok(Some(self.recv_response()?)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e).context("polling daemon socket"),
        }
    }

    pub fn set_read_timeout(&self, dur: Option<Duration>) -> anyhow::Result<()> {
        self.write.set_read_timeout(dur).context("adjusting daemon read timeout")
    }
}

fn command_line(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, quote_args(args))
    }
}
