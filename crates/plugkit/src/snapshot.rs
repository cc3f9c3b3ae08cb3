//! Snapshots: plugin name -> commit hash
//!
//! # Snapshot Format
//!
//! ```toml
//! # plugkit snapshot
//! # Generated: 2024-05-01 10:00:00
//!
//! "mini.nvim" = "0a1b2c3d..."
//! plenary = "4e5f6a7b..."
//! ```
//!
//! Keys are sorted so saved snapshots diff cleanly.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Captured revisions, keyed by plugin name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    revisions: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, commit: impl Into<String>) {
        self.revisions.insert(name.into(), commit.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.revisions.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.revisions.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as TOML with a comment header.
    pub fn to_text(&self) -> Result<String> {
        let body = toml::to_string(&self.revisions)
            .map_err(|e| Error::Other(format!("failed to serialize snapshot: {e}")))?;
        let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        Ok(format!("# plugkit snapshot\n# Generated: {generated}\n\n{body}"))
    }

    /// Parse a snapshot, rejecting anything but a flat string table.
    pub fn from_text(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        let mut snapshot = Self::new();
        for (name, value) in table {
            match value {
                toml::Value::String(commit) => snapshot.insert(name, commit),
                other => {
                    return Err(Error::InvalidSnapshot(format!(
                        "value of '{name}' must be a string, found {}",
                        other.type_str()
                    )));
                }
            }
        }
        Ok(snapshot)
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_text()?)?;
        log::debug!("Wrote snapshot with {} entries to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Self::from_text(&text)
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            revisions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("zeta", "3333");
        snapshot.insert("mini.nvim", "1111");
        snapshot.insert("alpha", "2222");
        snapshot
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/snapshot.toml");

        sample().save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), sample());
    }

    #[test]
    fn test_text_is_sorted_with_header() {
        let text = sample().to_text().unwrap();
        assert!(text.starts_with("# plugkit snapshot\n"));

        let keys: Vec<&str> = text
            .lines()
            .filter(|l| !l.starts_with('#') && !l.is_empty())
            .map(|l| l.split(" = ").next().unwrap())
            .collect();
        assert_eq!(keys, vec!["alpha", "\"mini.nvim\"", "zeta"]);
    }

    #[test]
    fn test_rejects_nested_values() {
        let err = Snapshot::from_text("foo = { rev = \"abc\" }").unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));

        let err = Snapshot::from_text("foo = 3").unwrap_err();
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        let err = Snapshot::from_text("not toml at all").unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Snapshot::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
