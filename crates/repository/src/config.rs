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

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{RepositoryError, read_if_exists, replace_file};

/// Free-entry count in an instance index at which the index/data pair is compacted.
pub const DEFAULT_COMPACTION_THRESHOLD: u32 = 16;

/// Name of the per-repository settings file.
pub const REPOSITORY_CONF: &str = "repository.conf";

const STORE_COMPLETE_CLASSES: &str = "storeCompleteClasses";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory holding the repository. Created on first open.
    pub root: PathBuf,
    /// Whether classes are stored with their inherited features resolved. Only consulted when
    /// a repository is first created; afterwards `repository.conf` is authoritative.
    pub store_complete_classes: bool,
    /// Escape non-ASCII characters in namespace directory names.
    pub escape_non_ascii_names: bool,
    /// Number of freed index entries that triggers compaction of a class's instance files.
    pub compaction_threshold: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("repository"),
            store_complete_classes: false,
            escape_non_ascii_names: true,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
        }
    }
}

impl RepositoryConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }
}

/// Read the persisted store mode from `repository.conf`, writing `default` there if the file
/// does not exist yet.
pub(crate) fn load_or_init_store_mode(root: &Path, default: bool) -> Result<bool, RepositoryError> {
    let path = root.join(REPOSITORY_CONF);
    let Some(contents) = read_if_exists(&path)? else {
        info!(
            path = %path.display(),
            store_complete_classes = default,
            "initializing repository settings"
        );
        replace_file(&path, format!("{STORE_COMPLETE_CLASSES}={default}\n").as_bytes())?;
        return Ok(default);
    };
    let contents = String::from_utf8(contents)
        .map_err(|_| RepositoryError::corrupt(&path, "settings file is not UTF-8"))?;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(RepositoryError::corrupt(&path, format!("malformed line {line:?}")));
        };
        if key.trim() == STORE_COMPLETE_CLASSES {
            return match value.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(RepositoryError::corrupt(
                    &path,
                    format!("invalid {STORE_COMPLETE_CLASSES} value {other:?}"),
                )),
            };
        }
    }
    Err(RepositoryError::corrupt(
        &path,
        format!("missing {STORE_COMPLETE_CLASSES} setting"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_mode_is_persisted_on_first_use() {
        let tmpdir = TempDir::new().unwrap();
        assert!(load_or_init_store_mode(tmpdir.path(), true).unwrap());
        // Later opens ignore the supplied default.
        assert!(load_or_init_store_mode(tmpdir.path(), false).unwrap());
        let contents = std::fs::read_to_string(tmpdir.path().join(REPOSITORY_CONF)).unwrap();
        assert_eq!(contents, "storeCompleteClasses=true\n");
    }

    #[test]
    fn test_malformed_settings_are_reported() {
        let tmpdir = TempDir::new().unwrap();
        std::fs::write(tmpdir.path().join(REPOSITORY_CONF), "storeCompleteClasses=maybe\n").unwrap();
        assert!(matches!(
            load_or_init_store_mode(tmpdir.path(), false),
            Err(RepositoryError::Corrupt { .. })
        ));
    }
}
