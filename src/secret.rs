//! Shared Secret (§3): loaded once at startup, never mutated, consumed only
//! by challenge/response authentication.

use std::fs;
use std::path::Path;

use anyhow::Context;

#[derive(Clone)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Secret> {
        let bytes = fs::read(path.as_ref())
            .with_context(|| format!("reading secret file {:?}", path.as_ref()))?;
        Ok(Secret(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(<{} bytes redacted>)", self.0.len())
    }
}

/// `SHA256_HEX(challenge + "\n" + secret + challenge + "\n")` (GLOSSARY).
pub fn challenge_response(challenge: &str, secret: &Secret) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(b"\n");
    hasher.update(secret.bytes());
    hasher.update(challenge.as_bytes());
    hasher.update(b"\n");
    hex::encode(hasher.finalize())
}
