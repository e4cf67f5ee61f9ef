//! Persisted Parameter List (§3, §4.3, §8 properties 3-4).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ParamList {
    entries: Vec<(String, String)>,
}

impl ParamList {
    pub fn new() -> ParamList {
        ParamList { entries: Vec::new() }
    }

    /// A missing file reads as empty (§7); lines that don't match
    /// `^(\S+?)=(.*)$` are ignored.
    pub fn read<P: AsRef<Path>>(path: P) -> anyhow::Result<ParamList> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ParamList::new()),
            Err(e) => return Err(e).with_context(|| format!("reading parameter file {:?}", path)),
        };

        let mut list = ParamList::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some((name, value)) if !name.is_empty() && !name.contains(char::is_whitespace) => {
                    list.add_param(name, value);
                }
                _ => continue,
            }
        }
        Ok(list)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut out = String::new();
        for (name, value) in &self.entries {
            out.push_str(name);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        fs::write(path, out).with_context(|| format!("writing parameter file {:?}", path))
    }

    /// Removes any existing entry with the same name and appends the new
    /// one, preserving the "last write wins, surviving order" invariant.
    pub fn add_param(&mut self, name: &str, value: &str) {
        self.entries.retain(|(n, _)| n != name);
        self.entries.push((name.to_string(), value.to_string()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rewrite the parameter file after persisting `add_param`, logging (but not
/// propagating) write failures per §7's persistence error kind.
pub fn persist(path: &PathBuf, list: &ParamList) {
    if let Err(e) = list.write(path) {
        warn!("failed to persist parameter file {:?}: {:?}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_param_dedups_and_keeps_last_value() {
        let mut list = ParamList::new();
        list.add_param("x", "1");
        list.add_param("x", "2");
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![("x", "2")]);
    }

    #[test]
    fn read_ignores_malformed_lines() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        fs::write(tmp.path(), "x=1\nnot a param\n=novalue\ny=2\n").unwrap();
        let list = ParamList::read(tmp.path()).unwrap();
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![("x", "1"), ("y", "2")]);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let list = ParamList::read("/nonexistent/path/does-not-exist").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn write_read_round_trips() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut list = ParamList::new();
        list.add_param("a", "1");
        list.add_param("b", "2");
        list.write(tmp.path()).unwrap();

        let read_back = ParamList::read(tmp.path()).unwrap();
        assert_eq!(read_back.iter().collect::<Vec<_>>(), vec![("a", "1"), ("b", "2")]);
    }
}
