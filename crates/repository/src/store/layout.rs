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

//! Where things live under the repository root.

use std::fs;
use std::path::{Path, PathBuf};
use unicase::UniCase;

use crate::error::RepositoryError;
use crate::transaction::InstanceFileSet;

pub const CLASSES_DIR: &str = "classes";
pub const INSTANCES_DIR: &str = "instances";
pub const QUALIFIERS_DIR: &str = "qualifiers";
pub const ASSOCIATIONS_FILE: &str = "associations";
pub const REMOTE_FILE: &str = "remote";
pub const INDEX_SUFFIX: &str = ".idx";
pub const DATA_SUFFIX: &str = ".instances";
pub const ROOT_CLASS_MARKER: &str = "#";

const ESCAPE: char = '@';
const SEPARATOR: char = '#';

/// Map a namespace name onto a single directory name: `/` becomes `#`; `#`, `@`, characters
/// that are unsafe in file names and (optionally) non-ASCII characters become `@` followed by
/// six hex digits of the code point.
pub fn namespace_to_dir_name(namespace: &str, escape_non_ascii: bool) -> String {
    let mut dir = String::with_capacity(namespace.len());
    for c in namespace.chars() {
        let unsafe_char = matches!(c, '#' | '@' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            || c.is_control()
            || (escape_non_ascii && !c.is_ascii());
        if c == '/' {
            dir.push(SEPARATOR);
        } else if unsafe_char {
            dir.push_str(&format!("{ESCAPE}{:06x}", c as u32));
        } else {
            dir.push(c);
        }
    }
    dir
}

/// Inverse of [`namespace_to_dir_name`]. `None` if `dir` is not a well-formed encoding.
pub fn dir_name_to_namespace(dir: &str) -> Option<String> {
    let mut namespace = String::with_capacity(dir.len());
    let mut chars = dir.chars();
    while let Some(c) = chars.next() {
        match c {
            SEPARATOR => namespace.push('/'),
            ESCAPE => {
                let hex: String = chars.by_ref().take(6).collect();
                if hex.len() != 6 {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                namespace.push(char::from_u32(code)?);
            }
            c => namespace.push(c),
        }
    }
    (!namespace.is_empty()).then_some(namespace)
}

/// Flags encoded in a namespace's sharing-marker directory: `S{W|R}{S|F}[parent dir]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingMarker {
    pub updates_allowed: bool,
    pub shareable: bool,
    pub parent_dir: Option<String>,
}

impl SharingMarker {
    pub fn dir_name(&self) -> String {
        format!(
            "S{}{}{}",
            if self.updates_allowed { 'W' } else { 'R' },
            if self.shareable { 'S' } else { 'F' },
            self.parent_dir.as_deref().unwrap_or_default()
        )
    }

    pub fn parse(dir_name: &str) -> Option<Self> {
        let mut chars = dir_name.chars();
        if chars.next()? != 'S' {
            return None;
        }
        let updates_allowed = match chars.next()? {
            'W' => true,
            'R' => false,
            _ => return None,
        };
        let shareable = match chars.next()? {
            'S' => true,
            'F' => false,
            _ => return None,
        };
        let parent: String = chars.collect();
        Some(Self {
            updates_allowed,
            shareable,
            parent_dir: (!parent.is_empty()).then_some(parent),
        })
    }
}

/// `<Class>.<Super>` or `<Class>.#` for a root class.
pub fn class_file_name(class_name: &str, super_class: Option<&str>) -> String {
    format!("{class_name}.{}", super_class.unwrap_or(ROOT_CLASS_MARKER))
}

/// Split a class file name into class and superclass. Temporary files and anything else that
/// is not `<name>.<name|#>` yields `None`.
pub fn parse_class_file_name(file_name: &str) -> Option<(String, Option<String>)> {
    if file_name.starts_with('.') {
        return None;
    }
    let (class, super_class) = file_name.split_once('.')?;
    if class.is_empty() || super_class.is_empty() || super_class.contains('.') {
        return None;
    }
    let super_class = (super_class != ROOT_CLASS_MARKER).then(|| super_class.to_string());
    Some((class.to_string(), super_class))
}

/// A class file found on disk.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub path: PathBuf,
    pub class_name: String,
    pub super_class: Option<String>,
}

/// The directories and files of one namespace.
#[derive(Debug, Clone)]
pub struct NamespaceLayout {
    pub dir: PathBuf,
}

impl NamespaceLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn classes_dir(&self) -> PathBuf {
        self.dir.join(CLASSES_DIR)
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.dir.join(INSTANCES_DIR)
    }

    pub fn qualifiers_dir(&self) -> PathBuf {
        self.dir.join(QUALIFIERS_DIR)
    }

    pub fn class_association_table(&self) -> PathBuf {
        self.classes_dir().join(ASSOCIATIONS_FILE)
    }

    pub fn instance_association_table(&self) -> PathBuf {
        self.instances_dir().join(ASSOCIATIONS_FILE)
    }

    pub fn remote_file(&self) -> PathBuf {
        self.dir.join(REMOTE_FILE)
    }

    /// Instance files are named after the lower-cased class name so that lookups are
    /// case-insensitive.
    pub fn instance_files(&self, class_name: &str) -> InstanceFileSet {
        let instances = self.instances_dir();
        let base = class_name.to_lowercase();
        InstanceFileSet::new(
            &instances,
            instances.join(format!("{base}{INDEX_SUFFIX}")),
            instances.join(format!("{base}{DATA_SUFFIX}")),
        )
    }

    /// Every class file in the namespace.
    pub fn class_files(&self) -> Result<Vec<ClassFile>, RepositoryError> {
        let dir = self.classes_dir();
        Ok(file_names(&dir)?
            .into_iter()
            .filter_map(|name| {
                let (class_name, super_class) = parse_class_file_name(&name)?;
                Some(ClassFile {
                    path: dir.join(&name),
                    class_name,
                    super_class,
                })
            })
            .collect())
    }

    /// The file holding `class_name`, whatever its case on disk.
    pub fn find_class_file(&self, class_name: &str) -> Result<Option<ClassFile>, RepositoryError> {
        Ok(self
            .class_files()?
            .into_iter()
            .find(|f| UniCase::new(f.class_name.as_str()) == UniCase::new(class_name)))
    }

    /// Qualifier file names, which are the qualifier names.
    pub fn qualifier_files(&self) -> Result<Vec<(String, PathBuf)>, RepositoryError> {
        let dir = self.qualifiers_dir();
        Ok(file_names(&dir)?
            .into_iter()
            .filter(|name| !name.starts_with('.') && !name.contains('.'))
            .map(|name| {
                let path = dir.join(&name);
                (name, path)
            })
            .collect())
    }

    pub fn find_qualifier_file(&self, name: &str) -> Result<Option<PathBuf>, RepositoryError> {
        Ok(self
            .qualifier_files()?
            .into_iter()
            .find(|(n, _)| UniCase::new(n.as_str()) == UniCase::new(name))
            .map(|(_, path)| path))
    }
}

/// Names of the regular files in `dir`; a missing directory has none.
pub fn file_names(dir: &Path) -> Result<Vec<String>, RepositoryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(RepositoryError::open(dir, e)),
    };
    let mut names = vec![];
    for entry in entries {
        let entry = entry.map_err(|e| RepositoryError::read(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| RepositoryError::read(&entry.path(), e))?
            .is_file();
        if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("root/cimv2", true, "root#cimv2"; "separator")]
    #[test_case("root/a#b@c", true, "root#a@000023b@000040c"; "reserved characters")]
    #[test_case("root/caf\u{e9}", true, "root#caf@0000e9"; "non-ascii escaped")]
    #[test_case("root/caf\u{e9}", false, "root#caf\u{e9}"; "non-ascii kept")]
    fn test_namespace_dir_names(namespace: &str, escape_non_ascii: bool, dir: &str) {
        assert_eq!(namespace_to_dir_name(namespace, escape_non_ascii), dir);
        assert_eq!(dir_name_to_namespace(dir).as_deref(), Some(namespace));
    }

    #[test]
    fn test_bad_escape_is_rejected() {
        assert_eq!(dir_name_to_namespace("root@00"), None);
        assert_eq!(dir_name_to_namespace("root@zzzzzz"), None);
    }

    #[test_case(true, true, None, "SWS"; "primary")]
    #[test_case(false, false, Some("root"), "SRFroot"; "read-only dependent")]
    fn test_sharing_marker(updates_allowed: bool, shareable: bool, parent: Option<&str>, dir: &str) {
        let marker = SharingMarker {
            updates_allowed,
            shareable,
            parent_dir: parent.map(str::to_string),
        };
        assert_eq!(marker.dir_name(), dir);
        assert_eq!(SharingMarker::parse(dir), Some(marker));
    }

    #[test]
    fn test_class_file_names() {
        assert_eq!(class_file_name("Base", None), "Base.#");
        assert_eq!(
            parse_class_file_name("Derived.Base"),
            Some(("Derived".into(), Some("Base".into())))
        );
        assert_eq!(parse_class_file_name("Base.#"), Some(("Base".into(), None)));
        assert_eq!(parse_class_file_name("Derived.Base.tmp"), None);
        assert_eq!(parse_class_file_name("associations"), None);
    }
}
