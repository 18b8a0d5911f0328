// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use cim_common::{CimError, StreamerError};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures from the file-based store. File-system failures always name the path involved;
/// protocol-level failures are carried through unchanged as [`CimError`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("cannot open file {}: {source}", path.display())]
    CannotOpenFile { path: PathBuf, source: io::Error },
    #[error("cannot create file {}: {source}", path.display())]
    CannotCreateFile { path: PathBuf, source: io::Error },
    #[error("cannot remove file {}: {source}", path.display())]
    CannotRemoveFile { path: PathBuf, source: io::Error },
    #[error("cannot rename {} to {}: {source}", from.display(), to.display())]
    CannotRenameFile {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("cannot read file {}: {source}", path.display())]
    CannotReadFile { path: PathBuf, source: io::Error },
    #[error("cannot write file {}: {source}", path.display())]
    CannotWriteFile { path: PathBuf, source: io::Error },
    #[error("cannot create directory {}: {source}", path.display())]
    CannotCreateDirectory { path: PathBuf, source: io::Error },
    #[error("cannot remove directory {}: {source}", path.display())]
    CannotRemoveDirectory { path: PathBuf, source: io::Error },
    #[error("corrupt repository file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("object streaming failed: {0}")]
    Encoding(#[from] StreamerError),
    #[error(transparent)]
    Cim(#[from] CimError),
}

impl RepositoryError {
    pub(crate) fn open(path: &Path, source: io::Error) -> Self {
        Self::CannotOpenFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn create(path: &Path, source: io::Error) -> Self {
        Self::CannotCreateFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn remove(path: &Path, source: io::Error) -> Self {
        Self::CannotRemoveFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn rename(from: &Path, to: &Path, source: io::Error) -> Self {
        Self::CannotRenameFile {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }

    pub(crate) fn read(path: &Path, source: io::Error) -> Self {
        Self::CannotReadFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &Path, source: io::Error) -> Self {
        Self::CannotWriteFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// The protocol-level error, if this is one.
    pub fn cim_error(&self) -> Option<&CimError> {
        match self {
            Self::Cim(e) => Some(e),
            _ => None,
        }
    }
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_file_if_exists(path: &Path) -> Result<(), RepositoryError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RepositoryError::remove(path, e)),
    }
}

/// Read a whole file; `None` if it does not exist.
pub(crate) fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, RepositoryError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RepositoryError::read(path, e)),
    }
}

/// Write `contents` to a sibling temporary file and rename it over `path`.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> Result<(), RepositoryError> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, contents).map_err(|e| RepositoryError::create(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| RepositoryError::rename(&tmp, path, e))
}

/// Sibling temporary path used while rewriting `path`.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
