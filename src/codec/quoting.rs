//! Quoted-argument tokenizing and re-serialization (§4.1, §8 property 2,
//! §9 "textual unquote ordering hazard").
//!
//! Unquoting is one left-to-right pass over each token's bytes rather than
//! a sequence of find/replace passes, so `\\` never needs a sentinel to
//! protect it from later stages.

use anyhow::bail;

/// Serialize one argument the way the gateway re-emits commands it
/// constructs itself (`vcl.show`, `param.set`, ...).
pub fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty() || arg.chars().any(|c| c.is_whitespace());

    let mut escaped = String::with_capacity(arg.len());
    for b in arg.bytes() {
        match b {
            b'\\' => escaped.push_str("\\\\"),
            b'"' => escaped.push_str("\\\""),
            b'\n' => escaped.push_str("\\n"),
            b'\r' => escaped.push_str("\\r"),
            b'\t' => escaped.push_str("\\t"),
            0x20..=0x7e => escaped.push(b as char),
            _ => escaped.push_str(&format!("\\{:03o}", b)),
        }
    }

    if needs_quotes {
        format!("\"{}\"", escaped)
    } else {
        escaped
    }
}

/// Serialize a full argument vector as one space-separated command line
/// (without a trailing here-doc suffix; callers append that separately).
pub fn quote_args(args: &[String]) -> String {
    args.iter().map(|a| quote_arg(a)).collect::<Vec<_>>().join(" ")
}

/// Tokenize an incoming command line into its unescaped arguments.
pub fn unquote_line(line: &str) -> anyhow::Result<Vec<String>> {
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let mut raw = Vec::new();
        if bytes[i] == b'"' {
            i += 1;
            let mut closed = false;
            while i < bytes.len() {
                if bytes[i] == b'"' {
                    closed = true;
                    i += 1;
                    break;
                } else if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    raw.push(bytes[i]);
                    raw.push(bytes[i + 1]);
                    i += 2;
                } else {
                    raw.push(bytes[i]);
                    i += 1;
                }
            }
            if !closed {
                bail!("unbalanced quotes in command line");
            }
        } else {
            while i < bytes.len() && !(bytes[i] as char).is_whitespace() {
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    raw.push(bytes[i]);
                    raw.push(bytes[i + 1]);
                    i += 2;
                } else {
                    raw.push(bytes[i]);
                    i += 1;
                }
            }
        }

        tokens.push(decode_escapes(&raw)?);
    }

    Ok(tokens)
}

fn decode_escapes(raw: &[u8]) -> anyhow::Result<String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            out.push(raw[i]);
            i += 1;
            continue;
        }

        match raw[i + 1] {
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            b'"' => {
                out.push(b'"');
                i += 2;
            }
            b'n' => {
                out.push(b'\n');
                i += 2;
            }
            b'r' => {
                out.push(b'\r');
                i += 2;
            }
            b't' => {
                out.push(b'\t');
                i += 2;
            }
            b'x' => {
                let digits = &raw[i + 2..(i + 4).min(raw.len())];
                let s = std::str::from_utf8(digits).unwrap_or("");
                match u8::from_str_radix(s, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 2 + digits.len();
                    }
                    Err(_) => bail!("invalid \\x escape in command line"),
                }
            }
            b'0'..=b'7' => {
                let mut j = i + 1;
                let mut n_digits = 0;
                while j < raw.len() && n_digits < 3 && (b'0'..=b'7').contains(&raw[j]) {
                    j += 1;
                    n_digits += 1;
                }
                let s = std::str::from_utf8(&raw[i + 1..j]).unwrap();
                let byte = u8::from_str_radix(s, 8).unwrap_or(0);
                out.push(byte);
                i = j;
            }
            other => {
                // unrecognized escape: keep literally, the daemon protocol
                // never emits these but a forwarding gateway shouldn't choke.
                out.push(b'\\');
                out.push(other);
                i += 2;
            }
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_args() {
        let args = vec!["vcl.use".to_string(), "boot".to_string()];
        let line = quote_args(&args);
        assert_eq!(unquote_line(&line).unwrap(), args);
    }

    #[test]
    fn quotes_args_with_whitespace() {
        let args = vec!["param.set".to_string(), "has space".to_string()];
        let line = quote_args(&args);
        assert!(line.contains('"'));
        assert_eq!(unquote_line(&line).unwrap(), args);
    }

    #[test]
    fn round_trips_escapes() {
        let args = vec!["x\ty\nz\\\"w".to_string()];
        let line = quote_args(&args);
        assert_eq!(unquote_line(&line).unwrap(), args);
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        assert!(unquote_line("cmd \"unterminated").is_err());
    }

    #[test]
    fn octal_and_hex_escapes_decode() {
        let toks = unquote_line(r#"a\101b \x42"#).unwrap();
        assert_eq!(toks, vec!["aAb".to_string(), "B".to_string()]);
    }
}
