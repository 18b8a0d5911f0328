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

//! Snapshot/restore protocol over a class's index and data file pair.
//!
//! Each multi-file step is bracketed by a marker file in the namespace's instance directory so
//! that startup recovery can tell which step a crash interrupted:
//!
//! * `begin.progress`: snapshots were being taken; the main files are untouched.
//! * `commit.progress`: the main files are final; only snapshots remain to be removed.
//! * `rollback.progress`: the main files are being restored from the snapshots.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, trace};

use crate::data_file::InstanceDataFile;
use crate::error::{RepositoryError, remove_file_if_exists};
use crate::index_file::InstanceIndexFile;

pub const BEGIN_PROGRESS: &str = "begin.progress";
pub const COMMIT_PROGRESS: &str = "commit.progress";
pub const ROLLBACK_PROGRESS: &str = "rollback.progress";

/// The index/data file pair of one class, plus the directory its markers live in.
#[derive(Debug, Clone)]
pub struct InstanceFileSet {
    pub instance_dir: PathBuf,
    pub index: InstanceIndexFile,
    pub data: InstanceDataFile,
}

impl InstanceFileSet {
    pub fn new(instance_dir: impl Into<PathBuf>, index_path: PathBuf, data_path: PathBuf) -> Self {
        Self {
            instance_dir: instance_dir.into(),
            index: InstanceIndexFile::new(index_path),
            data: InstanceDataFile::new(data_path),
        }
    }

    pub fn has_rollback(&self) -> bool {
        self.index.has_rollback() || self.data.has_rollback()
    }

    fn marker(&self, name: &str) -> PathBuf {
        self.instance_dir.join(name)
    }
}

fn create_marker(path: &Path) -> Result<(), RepositoryError> {
    fs::write(path, b"").map_err(|e| RepositoryError::create(path, e))
}

/// Run `step` bracketed by the named marker file. If `step` fails, `undo` gets a chance to put
/// the files back the way they were; the marker is only removed once nothing is left for
/// recovery to finish.
fn with_marker(
    files: &InstanceFileSet,
    marker: &str,
    step: impl FnOnce() -> Result<(), RepositoryError>,
    undo: impl FnOnce() -> Result<(), RepositoryError>,
) -> Result<(), RepositoryError> {
    let marker = files.marker(marker);
    create_marker(&marker)?;
    if let Err(e) = step() {
        match undo() {
            Ok(()) => remove_file_if_exists(&marker)?,
            Err(undo_err) => error!(
                marker = %marker.display(),
                "left for recovery after failed undo: {undo_err}"
            ),
        }
        return Err(e);
    }
    remove_file_if_exists(&marker)
}

/// Snapshot both files. On failure the partial snapshots are discarded again.
pub fn begin_instance_transaction(files: &InstanceFileSet) -> Result<(), RepositoryError> {
    trace!(index = %files.index.path().display(), "begin instance transaction");
    with_marker(
        files,
        BEGIN_PROGRESS,
        || {
            files.index.begin_transaction()?;
            files.data.begin_transaction()
        },
        || undo_begin_instance_transaction(files),
    )
}

/// Drop both snapshots. If that fails the remaining snapshot is an ordinary leftover, which the
/// caller (or the next recovery sweep) rolls back; no marker is kept for it.
pub fn commit_instance_transaction(files: &InstanceFileSet) -> Result<(), RepositoryError> {
    trace!(index = %files.index.path().display(), "commit instance transaction");
    with_marker(
        files,
        COMMIT_PROGRESS,
        || {
            files.data.commit_transaction()?;
            files.index.commit_transaction()
        },
        || Ok(()),
    )
}

/// Restore both files from their snapshots. A no-op when there are no snapshots.
pub fn rollback_instance_transaction(files: &InstanceFileSet) -> Result<(), RepositoryError> {
    if !files.has_rollback() {
        return Ok(());
    }
    trace!(index = %files.index.path().display(), "rollback instance transaction");
    // A failed rollback leaves its snapshots behind; recovery rolls those back regardless.
    with_marker(
        files,
        ROLLBACK_PROGRESS,
        || {
            files.data.rollback_transaction()?;
            files.index.rollback_transaction()
        },
        || Ok(()),
    )
}

/// Discard snapshots left by an interrupted begin step; the main files were never touched.
pub fn undo_begin_instance_transaction(files: &InstanceFileSet) -> Result<(), RepositoryError> {
    files.index.undo_begin_transaction()?;
    files.data.undo_begin_transaction()
}

/// Scope guard for one all-or-nothing mutation of a class's index and data files.
///
/// The files must carry no snapshot from an earlier transaction; those are settled by
/// [`crate::store::recovery::complete_transactions`], which knows which marker they belong to.
/// Dropping the handler without a successful [`InstanceTransactionHandler::complete`]
/// restores both files to the snapshot taken at construction.
#[must_use = "dropping the handler rolls the transaction back"]
pub struct InstanceTransactionHandler<'a> {
    files: &'a InstanceFileSet,
    completed: bool,
}

impl<'a> InstanceTransactionHandler<'a> {
    pub fn new(files: &'a InstanceFileSet) -> Result<Self, RepositoryError> {
        if files.has_rollback() {
            return Err(RepositoryError::corrupt(
                files.index.path(),
                "unsettled snapshot from an earlier instance transaction",
            ));
        }
        begin_instance_transaction(files)?;
        Ok(Self {
            files,
            completed: false,
        })
    }

    pub fn files(&self) -> &InstanceFileSet {
        self.files
    }

    /// Commit. If dropping the snapshots fails the handler rolls back as it is dropped.
    pub fn complete(mut self) -> Result<(), RepositoryError> {
        commit_instance_transaction(self.files)?;
        self.completed = true;
        Ok(())
    }
}

impl Drop for InstanceTransactionHandler<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Err(e) = rollback_instance_transaction(self.files) {
            error!(
                index = %self.files.index.path().display(),
                "failed to roll back instance transaction: {e}"
            );
        }
    }
}
