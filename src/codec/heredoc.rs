//! Here-document token selection and body capture (§4.1, §9 "token
//! collision").

use std::io::BufRead;

use anyhow::{bail, Context};
use rand::Rng;

use crate::consts::HEREDOC_TOKEN_LEN;

const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Pick a random lowercase-letter token that does not occur as a substring
/// of `body`, retrying on collision.
pub fn choose_token(body: &str) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (0..HEREDOC_TOKEN_LEN)
            .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
            .collect();
        if !body.contains(&candidate) {
            return candidate;
        }
    }
}

/// Read lines until one exactly equals `token`, returning the concatenation
/// of the intervening lines with their terminating newlines intact.
pub fn read_heredoc_body<R: BufRead>(r: &mut R, token: &str) -> anyhow::Result<String> {
    let mut body = String::new();
    loop {
        let mut line = String::new();
        let n = r.read_line(&mut line).context("reading here-document line")?;
        if n == 0 {
            bail!("EOF while reading here-document body (expected terminator '{}')", token);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == token {
            return Ok(body);
        }
        body.push_str(&line);
    }
}

/// Parse the ` << TOKEN` suffix off a command line, if present. Returns the
/// line with the suffix stripped and the token, or `None` if there is no
/// such suffix.
pub fn split_heredoc_suffix(line: &str) -> Option<(&str, &str)> {
    let idx = line.rfind(" << ")?;
    let (head, rest) = line.split_at(idx);
    let token = &rest[4..];
    if token.is_empty() || !token.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((head, token))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn chosen_token_never_collides() {
        let body = "a".repeat(1000);
        let token = choose_token(&body);
        assert!(!body.contains(&token));
        assert_eq!(token.len(), HEREDOC_TOKEN_LEN);
    }

    #[test]
    fn reads_body_up_to_terminator() {
        let mut cur = Cursor::new(b"line one\nline two\nEND\nnot part of body\n".to_vec());
        let body = read_heredoc_body(&mut cur, "END").unwrap();
        assert_eq!(body, "line one\nline two\n");
    }

    #[test]
    fn splits_suffix() {
        let (head, token) = split_heredoc_suffix("vcl.inline boot << abcdefgh").unwrap();
        assert_eq!(head, "vcl.inline boot");
        assert_eq!(token, "abcdefgh");
    }

    #[test]
    fn no_suffix_returns_none() {
        assert!(split_heredoc_suffix("param.set x 1").is_none());
    }
}
