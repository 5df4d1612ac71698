//! All-or-nothing file writes.
//!
//! Contents are staged in a temporary file next to the destination, synced,
//! and only then renamed over it. An uncommitted staged file is deleted when
//! dropped, so the destination is either the old file or the complete new one.

use crate::error::{Result, SealError};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// File permissions for the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Keep the destination's current permissions (0644 for new files)
    Normal,
    /// Owner read/write only (0600 on Unix)
    Private,
}

#[cfg(unix)]
fn apply_mode(file: &File, dest: &Path, mode: FileMode) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let bits = match mode {
        FileMode::Private => 0o600,
        FileMode::Normal => fs::metadata(dest)
            .map(|m| m.permissions().mode() & 0o777)
            .unwrap_or(0o644),
    };
    let mut perms = file.metadata()?.permissions();
    perms.set_mode(bits);
    file.set_permissions(perms)
}

#[cfg(not(unix))]
fn apply_mode(_file: &File, _dest: &Path, _mode: FileMode) -> std::io::Result<()> {
    Ok(())
}

/// Fully written temporary file waiting to replace `dest`
pub struct StagedFile {
    tmp: NamedTempFile,
    dest: PathBuf,
}

impl StagedFile {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Rename the staged file over its destination
    pub fn commit(self) -> Result<()> {
        let dest = self.dest;
        self.tmp
            .persist(&dest)
            .map_err(|e| SealError::io(format!("replacing {}: {}", dest.display(), e.error)))?;
        Ok(())
    }
}

/// Write `contents` to a temporary sibling of `path` without touching `path`
pub fn stage(path: &Path, contents: &[u8], mode: FileMode) -> Result<StagedFile> {
    let name = path
        .file_name()
        .ok_or_else(|| SealError::io(format!("path has no filename: {}", path.display())))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let io_err =
        |what: &str, e: std::io::Error| SealError::io(format!("{} {}: {}", what, path.display(), e));

    let mut prefix = std::ffi::OsString::from(".");
    prefix.push(name);
    prefix.push(".");
    let mut tmp = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| io_err("creating temp file for", e))?;

    apply_mode(tmp.as_file(), path, mode).map_err(|e| io_err("setting permissions for", e))?;
    tmp.write_all(contents).map_err(|e| io_err("writing", e))?;
    tmp.flush().map_err(|e| io_err("flushing", e))?;
    tmp.as_file().sync_all().map_err(|e| io_err("syncing", e))?;

    Ok(StagedFile {
        tmp,
        dest: path.to_path_buf(),
    })
}

/// Replace `path` with `contents` atomically
pub fn write_atomic(path: &Path, contents: &[u8], mode: FileMode) -> Result<()> {
    stage(path, contents, mode)?.commit()
}

/// Read a whole file, mapping failures to [`SealError::Io`] with the path
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| SealError::io(format!("reading {}: {}", path.display(), e)))
}

pub fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| SealError::io(format!("reading {}: {}", path.display(), e)))
}
