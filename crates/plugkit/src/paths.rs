//! Install layout - where plugins live on disk
//!
//! ```text
//! <package>/pack/deps/opt/<name>     plugins installed by the manager
//! <package>/pack/deps/start/<name>   plugins placed there by the user
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the pack directory under `<package>/pack`.
pub const PACK_NAME: &str = "deps";

/// Install directory layout rooted at a package path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    package: PathBuf,
}

impl Layout {
    pub fn new(package: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
        }
    }

    pub fn package(&self) -> &Path {
        &self.package
    }

    fn pack_dir(&self) -> PathBuf {
        self.package.join("pack").join(PACK_NAME)
    }

    /// Directory holding "opt" plugins.
    pub fn opt_dir(&self) -> PathBuf {
        self.pack_dir().join("opt")
    }

    /// Directory holding "start" plugins.
    pub fn start_dir(&self) -> PathBuf {
        self.pack_dir().join("start")
    }

    /// Install path for a plugin name.
    ///
    /// An existing `opt` install wins, then an existing `start` install;
    /// new plugins go to `opt`.
    pub fn plugin_path(&self, name: &str) -> PathBuf {
        let opt = self.opt_dir().join(name);
        if opt.exists() {
            return opt;
        }
        let start = self.start_dir().join(name);
        if start.exists() {
            return start;
        }
        opt
    }

    /// Every directory currently present under `start` and `opt`.
    pub fn installed_paths(&self) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for dir in [self.start_dir(), self.opt_dir()] {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    paths.push(entry.path());
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}
