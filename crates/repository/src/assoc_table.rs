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

//! Flat association tables, one for instances and one for classes per namespace.
//!
//! Each record is eight escaped text lines followed by a blank line:
//!
//! ```text
//! <association id>
//! <association class>
//! <from id>
//! <from class>
//! <from role>
//! <to id>
//! <to class>
//! <to role>
//!
//! ```
//!
//! There is no index; every query is a linear scan.

use cim_common::{CimClass, CimInstance, ObjectPath};
use itertools::Itertools;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use unicase::UniCase;

use crate::error::{RepositoryError, read_if_exists, remove_file_if_exists, replace_file};
use crate::key_codec::{canonical_key, escape, unescape};

const FIELDS: usize = 8;

/// One association row, read as "`from` is related to `to` through `assoc_id`".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssociationEntry {
    pub assoc_id: String,
    pub assoc_class: String,
    pub from_id: String,
    pub from_class: String,
    pub from_role: String,
    pub to_id: String,
    pub to_class: String,
    pub to_role: String,
}

impl AssociationEntry {
    /// Class-level rows for an association class: one per ordered pair of its reference
    /// properties, from the referenced class on one end to the referenced class on the other.
    pub fn for_class(class: &CimClass) -> Vec<Self> {
        let ends: Vec<(&str, String)> = class
            .reference_properties()
            .map(|p| (p.name.as_str(), p.reference_class.clone().unwrap_or_default()))
            .collect();
        let mut entries = vec![];
        for (i, (from_role, from_class)) in ends.iter().enumerate() {
            for (j, (to_role, to_class)) in ends.iter().enumerate() {
                if i == j {
                    continue;
                }
                entries.push(Self {
                    assoc_id: class.class_name.clone(),
                    assoc_class: class.class_name.clone(),
                    from_id: from_class.clone(),
                    from_class: from_class.clone(),
                    from_role: from_role.to_string(),
                    to_id: to_class.clone(),
                    to_class: to_class.clone(),
                    to_role: to_role.to_string(),
                });
            }
        }
        entries
    }

    /// Instance-level rows for an association instance: one per ordered pair of its
    /// reference-valued properties.
    pub fn for_instance(path: &ObjectPath, instance: &CimInstance) -> Vec<Self> {
        let ends: Vec<(&str, &ObjectPath)> = instance.reference_values().collect();
        let assoc_id = canonical_key(path);
        let mut entries = vec![];
        for (i, (from_role, from)) in ends.iter().enumerate() {
            for (j, (to_role, to)) in ends.iter().enumerate() {
                if i == j {
                    continue;
                }
                entries.push(Self {
                    assoc_id: assoc_id.clone(),
                    assoc_class: path.class_name.clone(),
                    from_id: canonical_key(from),
                    from_class: from.class_name.clone(),
                    from_role: from_role.to_string(),
                    to_id: canonical_key(to),
                    to_class: to.class_name.clone(),
                    to_role: to_role.to_string(),
                });
            }
        }
        entries
    }

    fn fields(&self) -> [&str; FIELDS] {
        [
            &self.assoc_id,
            &self.assoc_class,
            &self.from_id,
            &self.from_class,
            &self.from_role,
            &self.to_id,
            &self.to_class,
            &self.to_role,
        ]
    }

    fn from_fields(fields: [String; FIELDS]) -> Self {
        let [assoc_id, assoc_class, from_id, from_class, from_role, to_id, to_class, to_role] =
            fields;
        Self {
            assoc_id,
            assoc_class,
            from_id,
            from_class,
            from_role,
            to_id,
            to_class,
            to_role,
        }
    }

    fn record(&self) -> String {
        let mut record = String::new();
        for field in self.fields() {
            record.push_str(&escape(field));
            record.push('\n');
        }
        record.push('\n');
        record
    }
}

/// Object identifiers compare as object paths when both sides parse as one, which makes key
/// order and name case irrelevant; otherwise (class names) case-insensitively.
fn same_object(a: &str, b: &str) -> bool {
    match (a.parse::<ObjectPath>(), b.parse::<ObjectPath>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => UniCase::new(a) == UniCase::new(b),
    }
}

/// Deduplication key for result ids.
fn identity(id: &str) -> String {
    match id.parse::<ObjectPath>() {
        Ok(path) => path.normalized().to_string(),
        Err(_) => id.to_lowercase(),
    }
}

/// Empty role means "any role".
fn role_matches(filter: &str, role: &str) -> bool {
    filter.is_empty() || UniCase::new(filter) == UniCase::new(role)
}

/// Empty class list means "any class".
fn class_in(filter: &[String], class: &str) -> bool {
    filter.is_empty() || filter.iter().any(|c| UniCase::new(c.as_str()) == UniCase::new(class))
}

/// Handle on an association table file.
#[derive(Debug, Clone)]
pub struct AssociationTable {
    path: PathBuf,
}

impl AssociationTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows in one write.
    pub fn append(&self, entries: &[AssociationEntry]) -> Result<(), RepositoryError> {
        if entries.is_empty() {
            return Ok(());
        }
        let text: String = entries.iter().map(AssociationEntry::record).collect();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RepositoryError::open(&self.path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| RepositoryError::write(&self.path, e))?;
        debug!(path = %self.path.display(), rows = entries.len(), "appended association rows");
        Ok(())
    }

    /// All rows. A missing table has none.
    pub fn entries(&self) -> Result<Vec<AssociationEntry>, RepositoryError> {
        let Some(bytes) = read_if_exists(&self.path)? else {
            return Ok(vec![]);
        };
        let text = String::from_utf8(bytes)
            .map_err(|_| RepositoryError::corrupt(&self.path, "association table is not UTF-8"))?;

        let mut entries = vec![];
        let mut lines = text.lines();
        'records: loop {
            let mut fields: [String; FIELDS] = Default::default();
            for (i, field) in fields.iter_mut().enumerate() {
                match lines.next() {
                    Some(line) => {
                        *field = unescape(line)
                            .map_err(|e| RepositoryError::corrupt(&self.path, e.to_string()))?;
                    }
                    None if i == 0 => break 'records,
                    None => {
                        warn!(path = %self.path.display(), "ignoring truncated association record");
                        break 'records;
                    }
                }
            }
            match lines.next() {
                Some("") => {}
                None => {
                    warn!(path = %self.path.display(), "ignoring unterminated association record");
                    break;
                }
                Some(other) => {
                    return Err(RepositoryError::corrupt(
                        &self.path,
                        format!("expected record separator, found {other:?}"),
                    ));
                }
            }
            entries.push(AssociationEntry::from_fields(fields));
        }
        Ok(entries)
    }

    /// Remove every row of the association `assoc_id`. Returns whether any row matched. The
    /// file is removed altogether once it holds no rows.
    pub fn delete_association(&self, assoc_id: &str) -> Result<bool, RepositoryError> {
        let entries = self.entries()?;
        let (removed, kept): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| same_object(&e.assoc_id, assoc_id));
        if removed.is_empty() {
            return Ok(false);
        }
        debug!(path = %self.path.display(), assoc_id, rows = removed.len(), "deleting association rows");
        if kept.is_empty() {
            remove_file_if_exists(&self.path)?;
        } else {
            let text: String = kept.iter().map(AssociationEntry::record).collect();
            replace_file(&self.path, text.as_bytes())?;
        }
        Ok(true)
    }

    /// Far-end ids of the associations in which `object_id` plays `role`.
    pub fn associator_names(
        &self,
        object_id: &str,
        assoc_classes: &[String],
        result_classes: &[String],
        role: &str,
        result_role: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| {
                same_object(&e.from_id, object_id)
                    && role_matches(role, &e.from_role)
                    && role_matches(result_role, &e.to_role)
                    && class_in(assoc_classes, &e.assoc_class)
                    && class_in(result_classes, &e.to_class)
            })
            .map(|e| e.to_id)
            .unique_by(|id| identity(id))
            .collect())
    }

    /// Ids of the associations that refer to `object_id` in `role`.
    pub fn reference_names(
        &self,
        object_id: &str,
        result_classes: &[String],
        role: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| {
                same_object(&e.from_id, object_id)
                    && role_matches(role, &e.from_role)
                    && class_in(result_classes, &e.assoc_class)
            })
            .map(|e| e.assoc_id)
            .unique_by(|id| identity(id))
            .collect())
    }

    pub fn exists(&self) -> bool {
        fs::metadata(&self.path).is_ok()
    }
}
