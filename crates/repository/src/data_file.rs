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

//! Append-only data file holding the encoded instances of one class, back to back. Positions
//! come from the class's [`InstanceIndexFile`](crate::InstanceIndexFile).

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{RepositoryError, read_if_exists, remove_file_if_exists, tmp_path};
use crate::index_file::{IndexEntry, ROLLBACK_SUFFIX};

/// Handle on one class's `.instances` file.
#[derive(Debug, Clone)]
pub struct InstanceDataFile {
    path: PathBuf,
}

impl InstanceDataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Holds the pre-transaction size of the data file, as 16 hex digits.
    pub fn rollback_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(ROLLBACK_SUFFIX);
        PathBuf::from(name)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current length in bytes; zero if the file does not exist.
    pub fn size(&self) -> Result<u64, RepositoryError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(RepositoryError::read(&self.path, e)),
        }
    }

    /// Read the `size` bytes at `offset`. A range past the end of the file is corrupt.
    pub fn load_instance(&self, offset: u64, size: u64) -> Result<Vec<u8>, RepositoryError> {
        let mut file = File::open(&self.path).map_err(|e| RepositoryError::open(&self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| RepositoryError::read(&self.path, e))?
            .len();
        if offset.checked_add(size).is_none_or(|end| end > len) {
            return Err(RepositoryError::corrupt(
                &self.path,
                format!("instance at {offset}+{size} lies past end of file ({len} bytes)"),
            ));
        }
        let mut buffer = vec![0; size as usize];
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut buffer))
            .map_err(|e| RepositoryError::read(&self.path, e))?;
        Ok(buffer)
    }

    /// The whole file, for bulk enumeration. A missing file reads as empty.
    pub fn load_all_instances(&self) -> Result<Vec<u8>, RepositoryError> {
        Ok(read_if_exists(&self.path)?.unwrap_or_default())
    }

    /// Append an encoded instance, returning the offset it was written at.
    pub fn append_instance(&self, bytes: &[u8]) -> Result<u64, RepositoryError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RepositoryError::open(&self.path, e))?;
        let offset = file
            .metadata()
            .map_err(|e| RepositoryError::read(&self.path, e))?
            .len();
        file.write_all(bytes)
            .map_err(|e| RepositoryError::write(&self.path, e))?;
        trace!(path = %self.path.display(), offset, size = bytes.len(), "appended instance");
        Ok(offset)
    }

    /// Rewrite the file keeping only the ranges of live entries, in entry order. `entries` must
    /// be the index as it stood before its own compaction.
    pub fn compact(&self, entries: &[IndexEntry]) -> Result<(), RepositoryError> {
        let contents = self.load_all_instances()?;
        let mut compacted = Vec::with_capacity(contents.len());
        for entry in entries.iter().filter(|e| !e.free) {
            let range = entry.offset as usize..(entry.offset + entry.size) as usize;
            let Some(bytes) = contents.get(range) else {
                return Err(RepositoryError::corrupt(
                    &self.path,
                    format!(
                        "entry {} at {}+{} lies past end of {}-byte file",
                        entry.key,
                        entry.offset,
                        entry.size,
                        contents.len()
                    ),
                ));
            };
            compacted.extend_from_slice(bytes);
        }
        debug!(
            path = %self.path.display(),
            before = contents.len(),
            after = compacted.len(),
            "compacted instance data"
        );
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, &compacted).map_err(|e| RepositoryError::create(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| RepositoryError::rename(&tmp, &self.path, e))
    }

    /// Record the current size so that [`Self::rollback_transaction`] can truncate back to it.
    pub fn begin_transaction(&self) -> Result<(), RepositoryError> {
        let size = self.size()?;
        let rollback = self.rollback_path();
        fs::write(&rollback, format!("{size:016x}"))
            .map_err(|e| RepositoryError::create(&rollback, e))
    }

    pub fn undo_begin_transaction(&self) -> Result<(), RepositoryError> {
        remove_file_if_exists(&self.rollback_path())
    }

    /// Truncate to the recorded size, then drop the rollback file. Does nothing without one.
    pub fn rollback_transaction(&self) -> Result<(), RepositoryError> {
        let rollback = self.rollback_path();
        let Some(recorded) = read_if_exists(&rollback)? else {
            return Ok(());
        };
        let size = std::str::from_utf8(&recorded)
            .ok()
            .and_then(|s| u64::from_str_radix(s.trim(), 16).ok())
            .ok_or_else(|| RepositoryError::corrupt(&rollback, "unreadable recorded size"))?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|e| RepositoryError::open(&self.path, e))?;
        file.set_len(size)
            .map_err(|e| RepositoryError::write(&self.path, e))?;
        debug!(path = %self.path.display(), size, "rolled back instance data");
        remove_file_if_exists(&rollback)
    }

    pub fn commit_transaction(&self) -> Result<(), RepositoryError> {
        remove_file_if_exists(&self.rollback_path())
    }

    pub fn has_rollback(&self) -> bool {
        self.rollback_path().exists()
    }
}
