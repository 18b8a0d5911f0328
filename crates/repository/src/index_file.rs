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

//! Line-oriented index of the instances of one class.
//!
//! Layout:
//!
//! ```text
//! 00000002                                  <- free-entry count, 8 hex digits
//! 1 8f3a21c0 0 112 Employee.ssn="1"          <- free flag, key hash, offset, size, escaped key
//! 0 1b2c3d4e 112 120 Employee.ssn="2"
//! 1 8f3a21c0 232 118 Employee.ssn="1"
//! ```
//!
//! Records are never removed in place: deletion flips the leading flag to `1` and bumps the
//! header count; only [`InstanceIndexFile::compact`] physically drops freed records.

use cim_common::{CimError, ObjectPath};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{RepositoryError, read_if_exists, remove_file_if_exists, replace_file};
use crate::key_codec::{canonical_key, decode_key, encode_key, key_hash};

/// Length of the free-count header, including its newline.
const HEADER_LEN: usize = 9;
const EMPTY_HEADER: &[u8] = b"00000000\n";

pub const ROLLBACK_SUFFIX: &str = ".rollback";

/// A decoded index record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub free: bool,
    pub hash: u32,
    pub offset: u64,
    pub size: u64,
    pub key: ObjectPath,
}

/// A record as it sits in the file, key still escaped.
#[derive(Debug)]
struct IndexRecord {
    /// Byte position of the record's free flag.
    position: u64,
    free: bool,
    hash: u32,
    offset: u64,
    size: u64,
    key: String,
}

impl IndexRecord {
    fn line(free: bool, hash: u32, offset: u64, size: u64, key: &str) -> String {
        format!("{} {hash:08x} {offset} {size} {key}\n", if free { 1 } else { 0 })
    }
}

struct IndexContents {
    free_count: u32,
    records: Vec<IndexRecord>,
}

impl IndexContents {
    fn parse(path: &Path, bytes: &[u8]) -> Result<Self, RepositoryError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| RepositoryError::corrupt(path, "index is not valid UTF-8"))?;
        if text.is_empty() {
            return Ok(Self {
                free_count: 0,
                records: vec![],
            });
        }
        let header = text
            .get(..HEADER_LEN)
            .filter(|h| h.ends_with('\n'))
            .ok_or_else(|| RepositoryError::corrupt(path, "truncated free-count header"))?;
        let free_count = u32::from_str_radix(&header[..HEADER_LEN - 1], 16)
            .map_err(|_| RepositoryError::corrupt(path, format!("bad free-count {header:?}")))?;

        let mut records = vec![];
        let mut position = HEADER_LEN as u64;
        for line in text[HEADER_LEN..].split_inclusive('\n') {
            let Some(body) = line.strip_suffix('\n') else {
                return Err(RepositoryError::corrupt(path, "truncated index record"));
            };
            let bad = || RepositoryError::corrupt(path, format!("malformed index record {body:?}"));
            let mut fields = body.splitn(5, ' ');
            let free = match fields.next() {
                Some("0") => false,
                Some("1") => true,
                _ => return Err(bad()),
            };
            let hash = fields
                .next()
                .and_then(|h| u32::from_str_radix(h, 16).ok())
                .ok_or_else(bad)?;
            let offset = fields.next().and_then(|o| o.parse().ok()).ok_or_else(bad)?;
            let size = fields.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
            let key = fields.next().filter(|k| !k.is_empty()).ok_or_else(bad)?;
            records.push(IndexRecord {
                position,
                free,
                hash,
                offset,
                size,
                key: key.to_string(),
            });
            position += line.len() as u64;
        }
        Ok(Self {
            free_count,
            records,
        })
    }

    /// The first live record for `key`. The stored hash only short-circuits the comparison;
    /// the decoded key must still match.
    fn find_live(&self, path: &Path, key: &ObjectPath) -> Result<Option<&IndexRecord>, RepositoryError> {
        let hash = key_hash(key);
        for record in &self.records {
            if record.free || record.hash != hash {
                continue;
            }
            let stored = decode_key(&record.key)
                .map_err(|e| RepositoryError::corrupt(path, e.to_string()))?;
            if stored == *key {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// Handle on one class's `.idx` file.
#[derive(Debug, Clone)]
pub struct InstanceIndexFile {
    path: PathBuf,
}

impl InstanceIndexFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rollback_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(ROLLBACK_SUFFIX);
        PathBuf::from(name)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> Result<Option<IndexContents>, RepositoryError> {
        match read_if_exists(&self.path)? {
            Some(bytes) => IndexContents::parse(&self.path, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Location `(offset, size)` in the data file of the live record for `key`.
    pub fn lookup_entry(&self, key: &ObjectPath) -> Result<Option<(u64, u64)>, RepositoryError> {
        let Some(contents) = self.load()? else {
            return Ok(None);
        };
        Ok(contents
            .find_live(&self.path, key)?
            .map(|r| (r.offset, r.size)))
    }

    /// Append a live record for `key`. Fails with `AlreadyExists`, leaving the file untouched,
    /// if the key already has a live record.
    pub fn create_entry(&self, key: &ObjectPath, offset: u64, size: u64) -> Result<(), RepositoryError> {
        if let Some(contents) = self.load()? {
            if contents.find_live(&self.path, key)?.is_some() {
                return Err(CimError::AlreadyExists(canonical_key(key)).into());
            }
        }
        trace!(path = %self.path.display(), %key, offset, size, "create index entry");
        self.append_record(&IndexRecord::line(false, key_hash(key), offset, size, &encode_key(key)))
    }

    /// Mark the live record for `key` free.
    pub fn delete_entry(&self, key: &ObjectPath) -> Result<(), RepositoryError> {
        let (position, free_count) = self.locate_live(key)?;
        trace!(path = %self.path.display(), %key, "free index entry");
        self.mark_free(position)?;
        self.write_free_count(free_count + 1)
    }

    /// Free the live record for `key` and append a replacement pointing at the new location.
    pub fn modify_entry(&self, key: &ObjectPath, offset: u64, size: u64) -> Result<(), RepositoryError> {
        let (position, free_count) = self.locate_live(key)?;
        trace!(path = %self.path.display(), %key, offset, size, "replace index entry");
        self.mark_free(position)?;
        self.append_record(&IndexRecord::line(false, key_hash(key), offset, size, &encode_key(key)))?;
        self.write_free_count(free_count + 1)
    }

    /// All records in file order, optionally including freed ones.
    pub fn enumerate_entries(&self, include_free: bool) -> Result<Vec<IndexEntry>, RepositoryError> {
        let Some(contents) = self.load()? else {
            return Ok(vec![]);
        };
        contents
            .records
            .into_iter()
            .filter(|r| include_free || !r.free)
            .map(|r| {
                let key = decode_key(&r.key)
                    .map_err(|e| RepositoryError::corrupt(&self.path, e.to_string()))?;
                Ok(IndexEntry {
                    free: r.free,
                    hash: r.hash,
                    offset: r.offset,
                    size: r.size,
                    key,
                })
            })
            .collect()
    }

    pub fn free_count(&self) -> Result<u32, RepositoryError> {
        Ok(self.load()?.map(|c| c.free_count).unwrap_or(0))
    }

    /// Drop freed records and renumber offsets as if the surviving ranges were laid out back
    /// to back in record order, which is exactly what [`crate::InstanceDataFile::compact`]
    /// produces. The data file must be compacted first, from the pre-compaction entries.
    pub fn compact(&self) -> Result<(), RepositoryError> {
        let Some(contents) = self.load()? else {
            return Ok(());
        };
        let mut text = String::from_utf8_lossy(EMPTY_HEADER).into_owned();
        let mut offset = 0;
        let mut kept = 0;
        for record in contents.records.iter().filter(|r| !r.free) {
            text.push_str(&IndexRecord::line(false, record.hash, offset, record.size, &record.key));
            offset += record.size;
            kept += 1;
        }
        debug!(
            path = %self.path.display(),
            kept,
            dropped = contents.records.len() - kept,
            "compacted index"
        );
        replace_file(&self.path, text.as_bytes())
    }

    /// Snapshot the whole index into the `.rollback` sibling. A missing index is first created
    /// empty so that rollback restores a well-formed (empty) file.
    pub fn begin_transaction(&self) -> Result<(), RepositoryError> {
        if !self.path.exists() {
            fs::write(&self.path, EMPTY_HEADER)
                .map_err(|e| RepositoryError::create(&self.path, e))?;
        }
        let rollback = self.rollback_path();
        fs::copy(&self.path, &rollback).map_err(|e| RepositoryError::create(&rollback, e))?;
        Ok(())
    }

    /// Discard a snapshot whose transaction never started mutating; it may be incomplete.
    pub fn undo_begin_transaction(&self) -> Result<(), RepositoryError> {
        remove_file_if_exists(&self.rollback_path())
    }

    /// Restore the snapshot, if there is one.
    pub fn rollback_transaction(&self) -> Result<(), RepositoryError> {
        let rollback = self.rollback_path();
        if !rollback.exists() {
            return Ok(());
        }
        fs::rename(&rollback, &self.path)
            .map_err(|e| RepositoryError::rename(&rollback, &self.path, e))
    }

    pub fn commit_transaction(&self) -> Result<(), RepositoryError> {
        remove_file_if_exists(&self.rollback_path())
    }

    pub fn has_rollback(&self) -> bool {
        self.rollback_path().exists()
    }

    fn locate_live(&self, key: &ObjectPath) -> Result<(u64, u32), RepositoryError> {
        let not_found = || RepositoryError::from(CimError::NotFound(canonical_key(key)));
        let contents = self.load()?.ok_or_else(not_found)?;
        let record = contents
            .find_live(&self.path, key)?
            .ok_or_else(not_found)?;
        Ok((record.position, contents.free_count))
    }

    fn open_for_update(&self) -> Result<File, RepositoryError> {
        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| RepositoryError::open(&self.path, e))
    }

    fn mark_free(&self, position: u64) -> Result<(), RepositoryError> {
        let mut file = self.open_for_update()?;
        file.seek(SeekFrom::Start(position))
            .and_then(|_| file.write_all(b"1"))
            .map_err(|e| RepositoryError::write(&self.path, e))
    }

    fn write_free_count(&self, free_count: u32) -> Result<(), RepositoryError> {
        let mut file = self.open_for_update()?;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(format!("{free_count:08x}").as_bytes()))
            .map_err(|e| RepositoryError::write(&self.path, e))
    }

    fn append_record(&self, line: &str) -> Result<(), RepositoryError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RepositoryError::open(&self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| RepositoryError::read(&self.path, e))?
            .len();
        if len == 0 {
            file.write_all(EMPTY_HEADER)
                .map_err(|e| RepositoryError::write(&self.path, e))?;
        }
        file.write_all(line.as_bytes())
            .map_err(|e| RepositoryError::write(&self.path, e))
    }
}
