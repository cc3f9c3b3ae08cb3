//! Orphan detection and removal
//!
//! An orphan is a directory under `pack/deps/{start,opt}` that no session
//! entry points at. Comparison is by whole path, never by string prefix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How orphans are disposed of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Delete recursively
    Delete,
    /// Move into this directory
    Trash(PathBuf),
}

/// Installed paths that are neither a session path nor contain one.
pub fn find_orphans(installed: &[PathBuf], session_paths: &[&Path]) -> Vec<PathBuf> {
    installed
        .iter()
        .filter(|path| {
            !session_paths
                .iter()
                .any(|managed| *managed == path.as_path() || managed.starts_with(path))
        })
        .cloned()
        .collect()
}

/// Remove one orphan. Returns where it went when trashed.
pub fn remove(path: &Path, removal: &Removal) -> io::Result<Option<PathBuf>> {
    match removal {
        Removal::Delete => {
            log::debug!("Deleting {}", path.display());
            fs::remove_dir_all(path)?;
            Ok(None)
        }
        Removal::Trash(dir) => move_to_trash(path, dir).map(Some),
    }
}

/// Move `path` to `<trash>/<parent name>/<file name>`.
///
/// The parent (`start` or `opt`) is kept so same-named orphans from both
/// directories do not collide.
pub fn move_to_trash(path: &Path, trash: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no file name: {}", path.display()),
        )
    })?;
    let dir = match path.parent().and_then(Path::file_name) {
        Some(parent) => trash.join(parent),
        None => trash.to_path_buf(),
    };
    fs::create_dir_all(&dir)?;
    let dest = dir.join(name);
    log::debug!("Moving {} to {}", path.display(), dest.display());
    move_dir(path, &dest)?;
    Ok(dest)
}

/// Rename, falling back to copy + delete across filesystems.
pub fn move_dir(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!("{} is on another device, copying", dest.display());
            copy_tree(src, dest)?;
            fs::remove_dir_all(src)
        }
        Err(e) => Err(e),
    }
}

/// Recursively copy a directory. Symlinks are recreated, not followed.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let link = fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest).map(|_| ())
}
