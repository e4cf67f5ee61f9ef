//! Persisted VCL blob and its content fingerprint (§3, §4.3, §8 property 5).

use std::fs;
use std::path::Path;

use anyhow::Context;
use sha1::{Digest, Sha1};

/// `vcl_name == SHA1_HEX(body)`.
pub fn fingerprint(body: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Full slurp; a missing file reads as empty (§7).
pub fn read<P: AsRef<Path>>(path: P) -> anyhow::Result<Option<String>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading VCL file {:?}", path)),
    }
}

/// Full overwrite.
pub fn write<P: AsRef<Path>>(path: P, body: &str) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, body).with_context(|| format!("writing VCL file {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_identical_bodies() {
        let body = "vcl 4.0;\nbackend default { .host = \"127.0.0.1\"; }\n";
        assert_eq!(fingerprint(body), fingerprint(body));
        assert_eq!(fingerprint(body).len(), 40);
    }

    #[test]
    fn fingerprint_differs_for_different_bodies() {
        assert_ne!(fingerprint("vcl 4.0;\n"), fingerprint("vcl 4.1;\n"));
    }

    #[test]
    fn missing_file_reads_as_none() {
        assert!(read("/nonexistent/path/does-not-exist.vcl").unwrap().is_none());
    }

    #[test]
    fn write_read_round_trips() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write(tmp.path(), "vcl 4.0;\n").unwrap();
        assert_eq!(read(tmp.path()).unwrap(), Some("vcl 4.0;\n".to_string()));
    }
}
