//! Response frame encode/decode (§4.1, §8 property 1).

use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, Context};

use crate::consts::RESPONSE_HEADER_LEN;
use crate::status::Status;

/// Write a response frame: a 13-byte header (`"<status> <len>"` space-padded
/// to 12 characters, LF-terminated), the raw body, then a trailing LF.
pub fn write_response<W: Write>(w: &mut W, status: Status, body: &[u8]) -> anyhow::Result<()> {
    let header = format!("{} {}", status.code(), body.len());
    if header.len() > 12 {
        bail!("response header '{}' does not fit in 12 columns", header);
    }
    let padded = format!("{:<12}\n", header);
    debug_assert_eq!(padded.len(), RESPONSE_HEADER_LEN);

    w.write_all(padded.as_bytes()).context("writing response header")?;
    w.write_all(body).context("writing response body")?;
    w.write_all(b"\n").context("writing response trailer")?;
    w.flush().context("flushing response")?;
    Ok(())
}

/// Read one response frame. Blank lines before the header are skipped, as
/// the protocol allows stray newlines between frames.
pub fn read_response<R: BufRead>(r: &mut R) -> anyhow::Result<(Status, Vec<u8>)> {
    let header = loop {
        let mut line = String::new();
        let n = r.read_line(&mut line).context("reading response header")?;
        if n == 0 {
            bail!("EOF while reading response header");
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.trim().is_empty() {
            continue;
        }
        break trimmed.to_string();
    };

    let mut fields = header.split_whitespace();
    let code: u32 = fields
        .next()
        .ok_or_else(|| anyhow!("missing status code in header '{}'", header))?
        .parse()
        .with_context(|| format!("parsing status code in header '{}'", header))?;
    let len: usize = fields
        .next()
        .ok_or_else(|| anyhow!("missing length in header '{}'", header))?
        .parse()
        .with_context(|| format!("parsing body length in header '{}'", header))?;
    if fields.next().is_some() {
        bail!("trailing garbage in response header '{}'", header);
    }

    let status = Status::from_code(code).ok_or_else(|| anyhow!("unknown status code {}", code))?;

    let mut body = vec![0u8; len];
    r.read_exact(&mut body)
        .with_context(|| format!("reading {}-byte response body", len))?;

    // trailing newline
    let mut trailer = String::new();
    r.read_line(&mut trailer).context("reading response trailer")?;

    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn round_trips_a_simple_frame() {
        let mut buf = Vec::new();
        write_response(&mut buf, Status::Ok, b"Hello").unwrap();
        assert_eq!(buf.len(), 13 + 5 + 1);

        let mut cur = Cursor::new(buf);
        let (status, body) = read_response(&mut cur).unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(body, b"Hello");
    }

    #[test]
    fn matches_literal_greeting_header() {
        let mut buf = Vec::new();
        write_response(&mut buf, Status::Ok, b"Hello").unwrap();
        assert_eq!(&buf, b"200 5           \nHello\n");
    }

    #[test]
    fn skips_blank_lines_before_header() {
        let mut cur = Cursor::new(b"\n\n101 14          \nUnknown request\n\n".to_vec());
        let (status, body) = read_response(&mut cur).unwrap();
        assert_eq!(status, Status::Unknown);
        assert_eq!(body, b"Unknown request");
    }

    #[test]
    fn rejects_short_body() {
        let mut cur = Cursor::new(b"200 100         \nshort\n".to_vec());
        assert!(read_response(&mut cur).is_err());
    }
}
