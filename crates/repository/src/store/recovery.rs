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

//! Startup sweep that settles instance transactions interrupted by a crash.

use glob::Pattern;
use itertools::Itertools;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{RepositoryError, remove_file_if_exists};
use crate::index_file::ROLLBACK_SUFFIX;
use crate::store::layout::{DATA_SUFFIX, INDEX_SUFFIX, NamespaceLayout};
use crate::transaction::{
    BEGIN_PROGRESS, COMMIT_PROGRESS, InstanceFileSet, ROLLBACK_PROGRESS,
    commit_instance_transaction, rollback_instance_transaction, undo_begin_instance_transaction,
};

/// What the startup sweep found and repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Index files whose half-taken snapshots were discarded.
    pub undone_begins: Vec<PathBuf>,
    /// Index files whose interrupted commit was finished.
    pub completed_commits: Vec<PathBuf>,
    /// Index files whose interrupted rollback was finished.
    pub completed_rollbacks: Vec<PathBuf>,
    /// Index files restored from a snapshot no marker accounted for.
    pub orphan_rollbacks: Vec<PathBuf>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.undone_begins.is_empty()
            && self.completed_commits.is_empty()
            && self.completed_rollbacks.is_empty()
            && self.orphan_rollbacks.is_empty()
    }

    fn merge(&mut self, other: RecoveryReport) {
        self.undone_begins.extend(other.undone_begins);
        self.completed_commits.extend(other.completed_commits);
        self.completed_rollbacks.extend(other.completed_rollbacks);
        self.orphan_rollbacks.extend(other.orphan_rollbacks);
    }
}

/// The classes in `layout` that have a snapshot file lying around.
fn files_with_snapshots(layout: &NamespaceLayout) -> Result<Vec<InstanceFileSet>, RepositoryError> {
    let dir = layout.instances_dir();
    let pattern = format!(
        "{}/*{ROLLBACK_SUFFIX}",
        Pattern::escape(&dir.to_string_lossy())
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| RepositoryError::corrupt(&dir, format!("bad rollback pattern: {e}")))?;

    let mut bases = vec![];
    for path in paths {
        let path = path.map_err(|e| {
            let path = e.path().to_path_buf();
            RepositoryError::read(&path, e.into_error())
        })?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(ROLLBACK_SUFFIX) else {
            continue;
        };
        match stem
            .strip_suffix(INDEX_SUFFIX)
            .or_else(|| stem.strip_suffix(DATA_SUFFIX))
        {
            Some(base) => bases.push(base.to_string()),
            None => warn!(path = %path.display(), "ignoring unrecognized rollback file"),
        }
    }
    Ok(bases
        .into_iter()
        .unique()
        .map(|base| layout.instance_files(&base))
        .collect())
}

/// True if any transaction marker is present in the namespace's instance directory.
pub fn has_markers(layout: &NamespaceLayout) -> bool {
    [BEGIN_PROGRESS, COMMIT_PROGRESS, ROLLBACK_PROGRESS]
        .iter()
        .any(|marker| layout.instances_dir().join(marker).exists())
}

fn settle_marker(
    layout: &NamespaceLayout,
    marker: &str,
    action: impl Fn(&InstanceFileSet) -> Result<(), RepositoryError>,
    settled: &mut Vec<PathBuf>,
) -> Result<(), RepositoryError> {
    let marker_path = layout.instances_dir().join(marker);
    if !marker_path.exists() {
        return Ok(());
    }
    info!(marker = %marker_path.display(), "found interrupted instance transaction");
    for files in files_with_snapshots(layout)? {
        action(&files)?;
        settled.push(files.index.path().to_path_buf());
    }
    remove_file_if_exists(&marker_path)
}

/// Settle one namespace. Marker files are handled first; whatever snapshots remain afterwards
/// belong to transactions that crashed before writing any marker and are rolled back.
pub fn complete_transactions(layout: &NamespaceLayout) -> Result<RecoveryReport, RepositoryError> {
    let mut report = RecoveryReport::default();

    settle_marker(
        layout,
        BEGIN_PROGRESS,
        undo_begin_instance_transaction,
        &mut report.undone_begins,
    )?;
    settle_marker(
        layout,
        COMMIT_PROGRESS,
        commit_instance_transaction,
        &mut report.completed_commits,
    )?;
    settle_marker(
        layout,
        ROLLBACK_PROGRESS,
        rollback_instance_transaction,
        &mut report.completed_rollbacks,
    )?;

    for files in files_with_snapshots(layout)? {
        warn!(index = %files.index.path().display(), "rolling back incomplete instance transaction");
        rollback_instance_transaction(&files)?;
        report.orphan_rollbacks.push(files.index.path().to_path_buf());
    }
    Ok(report)
}

/// Settle every namespace.
pub fn complete_all_transactions<'a>(
    layouts: impl IntoIterator<Item = &'a NamespaceLayout>,
) -> Result<RecoveryReport, RepositoryError> {
    let mut report = RecoveryReport::default();
    for layout in layouts {
        report.merge(complete_transactions(layout)?);
    }
    if !report.is_clean() {
        info!(?report, "repository recovery complete");
    }
    Ok(report)
}
