// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Crash-safe file writes.
//!
//! [`save_bytes`] writes to a temporary file in the target's directory and
//! renames it over the target, so a reader sees either the old content or
//! the new content and never a mix. The filesystem sits behind
//! [`FileSystem`] so each step can be made to fail in tests.

use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Mode for certificates, organization metadata and configuration.
pub const PUBLIC_FILE_MODE: u32 = 0o644;

/// Mode for private keys.
pub const SECRET_FILE_MODE: u32 = 0o600;

pub const DIR_MODE: u32 = 0o700;

/// The filesystem operations the atomic write protocol needs.
pub trait FileSystem: Send + Sync {
    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Create a new, empty, uniquely named file inside `dir`.
    fn create_temp(&self, dir: &Path) -> io::Result<Box<dyn TempFile>>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// An open temporary file.
pub trait TempFile {
    fn path(&self) -> &Path;

    fn set_permissions(&mut self, mode: u32) -> io::Result<()>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush to disk and close.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

struct OsTempFile {
    path: PathBuf,
    file: fs::File,
}

impl FileSystem for OsFileSystem {
    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(path)
    }

    fn create_temp(&self, dir: &Path) -> io::Result<Box<dyn TempFile>> {
        let random_suffix: u64 = rand::Rng::random(&mut rand::rng());
        let path = dir.join(format!(".tmp-{:x}", random_suffix));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Box::new(OsTempFile { path, file }))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

impl TempFile for OsTempFile {
    fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn set_permissions(&mut self, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        self.file.set_permissions(fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_permissions(&mut self, _mode: u32) -> io::Result<()> {
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// Atomically replace `path` with `bytes`.
///
/// Creates the parent directory with `dir_mode` if needed. If any step
/// after the temporary file exists fails, the temporary file is removed and
/// `path` keeps its previous content.
pub fn save_bytes(
    fs: &dyn FileSystem,
    path: &Path,
    bytes: &[u8],
    file_mode: u32,
    dir_mode: u32,
) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;

    fs.create_dir_all(dir, dir_mode)
        .map_err(|e| Error::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let temp = fs.create_temp(dir).map_err(|e| Error::CreateTemp {
        dir: dir.to_path_buf(),
        source: e,
    })?;
    let temp_path = temp.path().to_path_buf();

    let result = write_temp(temp, bytes, file_mode).and_then(|()| {
        fs.rename(&temp_path, path).map_err(|e| Error::Rename {
            from: temp_path.clone(),
            to: path.to_path_buf(),
            source: e,
        })
    });

    if result.is_err() {
        if let Err(e) = fs.remove_file(&temp_path) {
            tracing::warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
        }
    }
    result
}

fn write_temp(mut temp: Box<dyn TempFile>, bytes: &[u8], file_mode: u32) -> Result<()> {
    let path = temp.path().to_path_buf();
    temp.set_permissions(file_mode)
        .map_err(|e| Error::SetPermissions {
            path: path.clone(),
            source: e,
        })?;
    temp.write_all(bytes).map_err(|e| Error::WriteFile {
        path: path.clone(),
        source: e,
    })?;
    temp.close().map_err(|e| Error::CloseFile { path, source: e })
}

/// Atomically write a world-readable file on the real filesystem.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    save_bytes(&OsFileSystem, path, contents, PUBLIC_FILE_MODE, DIR_MODE)
}

pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}
