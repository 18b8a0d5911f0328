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

//! The file-based repository store: namespaces as directories, one file per class and per
//! qualifier, an index/data file pair per class for instances and two association tables per
//! namespace.
//!
//! The store persists what it is told; schema rules (sharing, inheritance, read-only
//! namespaces) are enforced by [`crate::NameSpaceManager`] before the store is called.
//! Callers must serialize writers; [`crate::Repository`] does so with a lock.

pub mod layout;
pub mod recovery;

use cim_common::{
    BinaryStreamer, CimClass, CimError, CimInstance, CimQualifierDecl, ObjectPath, ObjectStreamer,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use unicase::UniCase;

use crate::assoc_table::{AssociationEntry, AssociationTable};
use crate::config::{RepositoryConfig, load_or_init_store_mode};
use crate::error::{RepositoryError, read_if_exists, remove_file_if_exists, replace_file};
use crate::key_codec::canonical_key;
use crate::transaction::{InstanceFileSet, InstanceTransactionHandler};

use layout::{
    CLASSES_DIR, INSTANCES_DIR, NamespaceLayout, QUALIFIERS_DIR, SharingMarker, class_file_name,
    dir_name_to_namespace, namespace_to_dir_name,
};
pub use recovery::RecoveryReport;

/// A namespace as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDefinition {
    pub name: String,
    pub shareable: bool,
    pub updates_allowed: bool,
    pub parent: Option<String>,
    pub remote_info: Option<String>,
}

impl NamespaceDefinition {
    /// A shareable, updatable primary namespace.
    pub fn primary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shareable: true,
            updates_allowed: true,
            parent: None,
            remote_info: None,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredNamespace {
    definition: NamespaceDefinition,
    dir_name: String,
}

pub struct FileBasedStore {
    root: PathBuf,
    config: RepositoryConfig,
    store_complete_classes: bool,
    streamer: Box<dyn ObjectStreamer>,
    namespaces: HashMap<UniCase<String>, StoredNamespace>,
    recovery_report: RecoveryReport,
}

impl FileBasedStore {
    /// Open (creating if needed) the repository at `config.root` with the binary streamer.
    pub fn open(config: RepositoryConfig) -> Result<Self, RepositoryError> {
        Self::open_with_streamer(config, Box::new(BinaryStreamer::new()))
    }

    /// Open the repository, then settle any instance transactions a crash left behind before
    /// anything else can touch the files.
    #[instrument(skip(streamer), fields(root = %config.root.display()))]
    pub fn open_with_streamer(
        config: RepositoryConfig,
        streamer: Box<dyn ObjectStreamer>,
    ) -> Result<Self, RepositoryError> {
        let root = config.root.clone();
        fs::create_dir_all(&root).map_err(|source| RepositoryError::CannotCreateDirectory {
            path: root.clone(),
            source,
        })?;
        let store_complete_classes = load_or_init_store_mode(&root, config.store_complete_classes)?;
        let namespaces = scan_namespaces(&root)?;
        let recovery_report = recovery::complete_all_transactions(
            namespaces
                .values()
                .map(|ns| NamespaceLayout::new(root.join(&ns.dir_name)))
                .collect::<Vec<_>>()
                .iter(),
        )?;
        info!(
            namespaces = namespaces.len(),
            store_complete_classes, "opened repository"
        );
        Ok(Self {
            root,
            config,
            store_complete_classes,
            streamer,
            namespaces,
            recovery_report,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_complete_classes(&self) -> bool {
        self.store_complete_classes
    }

    /// What the startup sweep repaired.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery_report
    }

    fn stored(&self, namespace: &str) -> Result<&StoredNamespace, RepositoryError> {
        self.namespaces
            .get(&UniCase::new(namespace.to_string()))
            .ok_or_else(|| CimError::InvalidNamespace(namespace.to_string()).into())
    }

    fn layout(&self, namespace: &str) -> Result<NamespaceLayout, RepositoryError> {
        Ok(NamespaceLayout::new(
            self.root.join(&self.stored(namespace)?.dir_name),
        ))
    }

    fn marker_path(&self, stored: &StoredNamespace) -> Result<PathBuf, RepositoryError> {
        let parent_dir = match &stored.definition.parent {
            Some(parent) => Some(self.stored(parent)?.dir_name.clone()),
            None => None,
        };
        let marker = SharingMarker {
            updates_allowed: stored.definition.updates_allowed,
            shareable: stored.definition.shareable,
            parent_dir,
        };
        Ok(self.root.join(&stored.dir_name).join(marker.dir_name()))
    }

    // Namespaces

    /// Every namespace, primaries first.
    pub fn enumerate_namespaces(&self) -> Vec<NamespaceDefinition> {
        let mut definitions: Vec<_> = self
            .namespaces
            .values()
            .map(|ns| ns.definition.clone())
            .collect();
        definitions.sort_by_key(|d| (d.parent.is_some(), d.name.to_lowercase()));
        definitions
    }

    pub fn namespace_exists(&self, namespace: &str) -> bool {
        self.namespaces
            .contains_key(&UniCase::new(namespace.to_string()))
    }

    #[instrument(skip(self))]
    pub fn create_namespace(&mut self, definition: &NamespaceDefinition) -> Result<(), RepositoryError> {
        if self.namespace_exists(&definition.name) {
            return Err(CimError::AlreadyExists(definition.name.clone()).into());
        }
        let stored = StoredNamespace {
            definition: definition.clone(),
            dir_name: namespace_to_dir_name(&definition.name, self.config.escape_non_ascii_names),
        };
        let dir = self.root.join(&stored.dir_name);
        let marker = self.marker_path(&stored)?;
        for sub in [
            dir.join(CLASSES_DIR),
            dir.join(INSTANCES_DIR),
            dir.join(QUALIFIERS_DIR),
            marker,
        ] {
            fs::create_dir_all(&sub)
                .map_err(|source| RepositoryError::CannotCreateDirectory { path: sub, source })?;
        }
        if let Some(remote) = &definition.remote_info {
            let layout = NamespaceLayout::new(&dir);
            replace_file(&layout.remote_file(), remote.as_bytes())?;
        }
        info!(namespace = %definition.name, dir = %dir.display(), "created namespace");
        self.namespaces
            .insert(UniCase::new(definition.name.clone()), stored);
        Ok(())
    }

    /// Change the sharing flags of a namespace.
    #[instrument(skip(self))]
    pub fn modify_namespace(
        &mut self,
        namespace: &str,
        shareable: bool,
        updates_allowed: bool,
    ) -> Result<(), RepositoryError> {
        let stored = self.stored(namespace)?.clone();
        let old_marker = self.marker_path(&stored)?;
        let mut updated = stored;
        updated.definition.shareable = shareable;
        updated.definition.updates_allowed = updates_allowed;
        let new_marker = self.marker_path(&updated)?;
        if old_marker != new_marker {
            fs::rename(&old_marker, &new_marker)
                .map_err(|e| RepositoryError::rename(&old_marker, &new_marker, e))?;
        }
        self.namespaces
            .insert(UniCase::new(updated.definition.name.clone()), updated);
        Ok(())
    }

    /// Rename a namespace's directory. Dependents' markers, which embed the parent's directory
    /// name, follow.
    #[instrument(skip(self))]
    pub fn modify_namespace_name(&mut self, old_name: &str, new_name: &str) -> Result<(), RepositoryError> {
        if self.namespace_exists(new_name) {
            return Err(CimError::AlreadyExists(new_name.to_string()).into());
        }
        let stored = self.stored(old_name)?.clone();
        let dependents: Vec<StoredNamespace> = self
            .namespaces
            .values()
            .filter(|ns| {
                ns.definition
                    .parent
                    .as_deref()
                    .is_some_and(|p| UniCase::new(p) == UniCase::new(old_name))
            })
            .cloned()
            .collect();
        let old_markers = dependents
            .iter()
            .map(|d| self.marker_path(d))
            .collect::<Result<Vec<_>, _>>()?;

        let renamed = StoredNamespace {
            definition: NamespaceDefinition {
                name: new_name.to_string(),
                ..stored.definition.clone()
            },
            dir_name: namespace_to_dir_name(new_name, self.config.escape_non_ascii_names),
        };
        let old_dir = self.root.join(&stored.dir_name);
        let new_dir = self.root.join(&renamed.dir_name);
        fs::rename(&old_dir, &new_dir).map_err(|e| RepositoryError::rename(&old_dir, &new_dir, e))?;
        self.namespaces.remove(&UniCase::new(stored.definition.name.clone()));
        self.namespaces
            .insert(UniCase::new(new_name.to_string()), renamed);

        for (dependent, old_marker) in dependents.into_iter().zip(old_markers) {
            let mut dependent = dependent;
            dependent.definition.parent = Some(new_name.to_string());
            let new_marker = self.marker_path(&dependent)?;
            fs::rename(&old_marker, &new_marker)
                .map_err(|e| RepositoryError::rename(&old_marker, &new_marker, e))?;
            self.namespaces
                .insert(UniCase::new(dependent.definition.name.clone()), dependent);
        }
        info!(old_name, new_name, "renamed namespace");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_namespace(&mut self, namespace: &str) -> Result<(), RepositoryError> {
        let dir = self.layout(namespace)?.dir;
        fs::remove_dir_all(&dir).map_err(|source| RepositoryError::CannotRemoveDirectory {
            path: dir.clone(),
            source,
        })?;
        self.namespaces.remove(&UniCase::new(namespace.to_string()));
        info!(namespace, "deleted namespace");
        Ok(())
    }

    /// True if the namespace holds no classes, no qualifiers and no live instances.
    pub fn is_namespace_empty(&self, namespace: &str) -> Result<bool, RepositoryError> {
        let layout = self.layout(namespace)?;
        if !layout.class_files()?.is_empty() || !layout.qualifier_files()?.is_empty() {
            return Ok(false);
        }
        let instances = layout.instances_dir();
        for name in layout::file_names(&instances)? {
            if let Some(base) = name.strip_suffix(layout::INDEX_SUFFIX) {
                let files = self.instance_files(namespace, base)?;
                if !files.index.enumerate_entries(false)?.is_empty() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    // Classes

    pub fn get_class(&self, namespace: &str, class_name: &str) -> Result<CimClass, RepositoryError> {
        let layout = self.layout(namespace)?;
        let file = layout
            .find_class_file(class_name)?
            .ok_or_else(|| CimError::NotFound(class_name.to_string()))?;
        let bytes = fs::read(&file.path).map_err(|e| RepositoryError::read(&file.path, e))?;
        let (class, _) = self.streamer.decode_class(&bytes, 0)?;
        Ok(class)
    }

    pub fn class_exists(&self, namespace: &str, class_name: &str) -> Result<bool, RepositoryError> {
        Ok(self.layout(namespace)?.find_class_file(class_name)?.is_some())
    }

    /// `(class, superclass)` for every class stored in the namespace.
    pub fn enumerate_class_names(&self, namespace: &str) -> Result<Vec<(String, Option<String>)>, RepositoryError> {
        Ok(self
            .layout(namespace)?
            .class_files()?
            .into_iter()
            .map(|f| (f.class_name, f.super_class))
            .collect())
    }

    #[instrument(skip(self, class), fields(class = %class.class_name))]
    pub fn create_class(&self, namespace: &str, class: &CimClass) -> Result<(), RepositoryError> {
        let layout = self.layout(namespace)?;
        if layout.find_class_file(&class.class_name)?.is_some() {
            return Err(CimError::AlreadyExists(class.class_name.clone()).into());
        }
        let path = layout.classes_dir().join(class_file_name(
            &class.class_name,
            class.super_class_name.as_deref(),
        ));
        replace_file(&path, &self.streamer.encode_class(class)?)?;
        if class.is_association() {
            AssociationTable::new(layout.class_association_table())
                .append(&AssociationEntry::for_class(class))?;
        }
        debug!(path = %path.display(), "created class");
        Ok(())
    }

    /// Replace a class definition. With an unchanged superclass the file is replaced
    /// atomically; a superclass change renames the file, so the old one is removed first.
    #[instrument(skip(self, class), fields(class = %class.class_name))]
    pub fn modify_class(&self, namespace: &str, class: &CimClass) -> Result<(), RepositoryError> {
        let layout = self.layout(namespace)?;
        let existing = layout
            .find_class_file(&class.class_name)?
            .ok_or_else(|| CimError::NotFound(class.class_name.clone()))?;
        let path = layout.classes_dir().join(class_file_name(
            &class.class_name,
            class.super_class_name.as_deref(),
        ));
        let bytes = self.streamer.encode_class(class)?;
        if existing.path != path {
            remove_file_if_exists(&existing.path)?;
        }
        replace_file(&path, &bytes)?;

        let table = AssociationTable::new(layout.class_association_table());
        table.delete_association(&existing.class_name)?;
        if class.is_association() {
            table.append(&AssociationEntry::for_class(class))?;
        }
        debug!(path = %path.display(), "modified class");
        Ok(())
    }

    /// Remove a class file along with its instance files and class-level association rows.
    #[instrument(skip(self))]
    pub fn delete_class(&self, namespace: &str, class_name: &str) -> Result<(), RepositoryError> {
        let layout = self.layout(namespace)?;
        let file = layout
            .find_class_file(class_name)?
            .ok_or_else(|| CimError::NotFound(class_name.to_string()))?;
        remove_file_if_exists(&file.path)?;

        let files = layout.instance_files(class_name);
        for path in [
            files.index.path().to_path_buf(),
            files.index.rollback_path(),
            files.data.path().to_path_buf(),
            files.data.rollback_path(),
        ] {
            remove_file_if_exists(&path)?;
        }
        AssociationTable::new(layout.class_association_table()).delete_association(&file.class_name)?;
        debug!(path = %file.path.display(), "deleted class");
        Ok(())
    }

    // Qualifiers

    pub fn get_qualifier(&self, namespace: &str, name: &str) -> Result<Option<CimQualifierDecl>, RepositoryError> {
        let layout = self.layout(namespace)?;
        let Some(path) = layout.find_qualifier_file(name)? else {
            return Ok(None);
        };
        let Some(bytes) = read_if_exists(&path)? else {
            return Ok(None);
        };
        Ok(Some(self.streamer.decode_qualifier(&bytes, 0)?.0))
    }

    /// Store a new qualifier declaration; an existing one of the same name is an error.
    pub fn create_qualifier(&self, namespace: &str, qualifier: &CimQualifierDecl) -> Result<(), RepositoryError> {
        let layout = self.layout(namespace)?;
        if layout.find_qualifier_file(&qualifier.name)?.is_some() {
            return Err(CimError::AlreadyExists(qualifier.name.clone()).into());
        }
        replace_file(
            &layout.qualifiers_dir().join(&qualifier.name),
            &self.streamer.encode_qualifier(qualifier)?,
        )
    }

    /// Store a qualifier declaration, replacing any existing one of the same name.
    pub fn set_qualifier(&self, namespace: &str, qualifier: &CimQualifierDecl) -> Result<(), RepositoryError> {
        let layout = self.layout(namespace)?;
        let path = layout.qualifiers_dir().join(&qualifier.name);
        if let Some(existing) = layout.find_qualifier_file(&qualifier.name)? {
            if existing != path {
                remove_file_if_exists(&existing)?;
            }
        }
        replace_file(&path, &self.streamer.encode_qualifier(qualifier)?)
    }

    pub fn delete_qualifier(&self, namespace: &str, name: &str) -> Result<(), RepositoryError> {
        let path = self
            .layout(namespace)?
            .find_qualifier_file(name)?
            .ok_or_else(|| CimError::NotFound(name.to_string()))?;
        fs::remove_file(&path).map_err(|e| RepositoryError::remove(&path, e))
    }

    pub fn enumerate_qualifiers(&self, namespace: &str) -> Result<Vec<CimQualifierDecl>, RepositoryError> {
        let mut qualifiers = vec![];
        for (_, path) in self.layout(namespace)?.qualifier_files()? {
            let bytes = fs::read(&path).map_err(|e| RepositoryError::read(&path, e))?;
            qualifiers.push(self.streamer.decode_qualifier(&bytes, 0)?.0);
        }
        Ok(qualifiers)
    }

    // Instances

    /// The index/data file pair for a class, as it stands on disk.
    pub fn instance_files(&self, namespace: &str, class_name: &str) -> Result<InstanceFileSet, RepositoryError> {
        Ok(self.layout(namespace)?.instance_files(class_name))
    }

    /// The file pair for a class about to be written. A transaction an earlier failure left
    /// unsettled in the namespace is settled first, following its marker. Callers hold the
    /// repository's write lock.
    fn instance_files_for_update(
        &self,
        namespace: &str,
        class_name: &str,
    ) -> Result<InstanceFileSet, RepositoryError> {
        let layout = self.layout(namespace)?;
        let files = layout.instance_files(class_name);
        if files.has_rollback() || recovery::has_markers(&layout) {
            warn!(namespace, class_name, "settling leftover instance transaction");
            let report = recovery::complete_transactions(&layout)?;
            debug!(?report, "settled");
        }
        Ok(files)
    }

    pub fn get_instance(&self, namespace: &str, path: &ObjectPath) -> Result<CimInstance, RepositoryError> {
        let files = self.instance_files(namespace, &path.class_name)?;
        let (offset, size) = files
            .index
            .lookup_entry(path)?
            .ok_or_else(|| CimError::NotFound(canonical_key(path)))?;
        let bytes = files.data.load_instance(offset, size)?;
        let (mut instance, _) = self.streamer.decode_instance(&bytes, 0)?;
        instance.path.get_or_insert_with(|| path.normalized());
        Ok(instance)
    }

    pub fn instance_exists(&self, namespace: &str, path: &ObjectPath) -> Result<bool, RepositoryError> {
        let files = self.instance_files(namespace, &path.class_name)?;
        Ok(files.index.lookup_entry(path)?.is_some())
    }

    /// Store a new instance under `path`. For association instances the instance-level
    /// association rows are recorded once the instance itself is committed.
    #[instrument(skip(self, instance))]
    pub fn create_instance(
        &self,
        namespace: &str,
        path: &ObjectPath,
        instance: &CimInstance,
        is_association: bool,
    ) -> Result<ObjectPath, RepositoryError> {
        let layout = self.layout(namespace)?;
        let path = path.normalized();
        let files = self.instance_files_for_update(namespace, &path.class_name)?;
        if files.index.lookup_entry(&path)?.is_some() {
            return Err(CimError::AlreadyExists(canonical_key(&path)).into());
        }
        let bytes = self.encode_instance(&path, instance)?;

        let handler = InstanceTransactionHandler::new(&files)?;
        let offset = files.data.append_instance(&bytes)?;
        files.index.create_entry(&path, offset, bytes.len() as u64)?;
        handler.complete()?;

        if is_association {
            AssociationTable::new(layout.instance_association_table())
                .append(&AssociationEntry::for_instance(&path, instance))?;
        }
        Ok(path)
    }

    /// Replace the stored instance at `path`. Association rows are rewritten from the new
    /// reference values.
    #[instrument(skip(self, instance))]
    pub fn modify_instance(
        &self,
        namespace: &str,
        path: &ObjectPath,
        instance: &CimInstance,
        is_association: bool,
    ) -> Result<(), RepositoryError> {
        let layout = self.layout(namespace)?;
        let path = path.normalized();
        let files = self.instance_files_for_update(namespace, &path.class_name)?;
        let bytes = self.encode_instance(&path, instance)?;

        let handler = InstanceTransactionHandler::new(&files)?;
        let offset = files.data.append_instance(&bytes)?;
        files.index.modify_entry(&path, offset, bytes.len() as u64)?;
        self.compact_if_needed(&files)?;
        handler.complete()?;

        if is_association {
            let table = AssociationTable::new(layout.instance_association_table());
            table.delete_association(&canonical_key(&path))?;
            table.append(&AssociationEntry::for_instance(&path, instance))?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_instance(
        &self,
        namespace: &str,
        path: &ObjectPath,
        is_association: bool,
    ) -> Result<(), RepositoryError> {
        let layout = self.layout(namespace)?;
        let files = self.instance_files_for_update(namespace, &path.class_name)?;

        let handler = InstanceTransactionHandler::new(&files)?;
        files.index.delete_entry(path)?;
        self.compact_if_needed(&files)?;
        handler.complete()?;

        if is_association {
            AssociationTable::new(layout.instance_association_table())
                .delete_association(&canonical_key(path))?;
        }
        Ok(())
    }

    pub fn enumerate_instance_names_for_class(
        &self,
        namespace: &str,
        class_name: &str,
    ) -> Result<Vec<ObjectPath>, RepositoryError> {
        let files = self.instance_files(namespace, class_name)?;
        Ok(files
            .index
            .enumerate_entries(false)?
            .into_iter()
            .map(|e| e.key)
            .collect())
    }

    /// Every instance of exactly `class_name`, decoded from one bulk read of the data file.
    pub fn enumerate_instances_for_class(
        &self,
        namespace: &str,
        class_name: &str,
    ) -> Result<Vec<CimInstance>, RepositoryError> {
        let files = self.instance_files(namespace, class_name)?;
        let entries = files.index.enumerate_entries(false)?;
        if entries.is_empty() {
            return Ok(vec![]);
        }
        let bytes = files.data.load_all_instances()?;
        let mut instances = Vec::with_capacity(entries.len());
        for entry in entries {
            let (mut instance, consumed) = self
                .streamer
                .decode_instance(&bytes, entry.offset as usize)?;
            if consumed as u64 != entry.size {
                return Err(RepositoryError::corrupt(
                    files.data.path(),
                    format!(
                        "instance {} decoded {consumed} bytes, index records {}",
                        entry.key, entry.size
                    ),
                ));
            }
            instance.path.get_or_insert(entry.key);
            instances.push(instance);
        }
        Ok(instances)
    }

    /// Compact a class's instance files now, regardless of the free-entry count.
    #[instrument(skip(self))]
    pub fn compact_instances(&self, namespace: &str, class_name: &str) -> Result<(), RepositoryError> {
        let files = self.instance_files_for_update(namespace, class_name)?;
        if !files.index.exists() {
            return Ok(());
        }
        let handler = InstanceTransactionHandler::new(&files)?;
        compact(&files)?;
        handler.complete()
    }

    fn compact_if_needed(&self, files: &InstanceFileSet) -> Result<(), RepositoryError> {
        let free = files.index.free_count()?;
        if free >= self.config.compaction_threshold {
            info!(index = %files.index.path().display(), free, "compacting instance files");
            compact(files)?;
        }
        Ok(())
    }

    fn encode_instance(&self, path: &ObjectPath, instance: &CimInstance) -> Result<Vec<u8>, RepositoryError> {
        let mut instance = instance.clone();
        instance.path = Some(path.clone());
        Ok(self.streamer.encode_instance(&instance)?)
    }

    // Associations

    pub fn instance_associator_names(
        &self,
        namespace: &str,
        object: &ObjectPath,
        assoc_classes: &[String],
        result_classes: &[String],
        role: &str,
        result_role: &str,
    ) -> Result<Vec<ObjectPath>, RepositoryError> {
        let table = AssociationTable::new(self.layout(namespace)?.instance_association_table());
        let ids = table.associator_names(
            &canonical_key(object),
            assoc_classes,
            result_classes,
            role,
            result_role,
        )?;
        parse_ids(table.path(), ids)
    }

    pub fn instance_reference_names(
        &self,
        namespace: &str,
        object: &ObjectPath,
        result_classes: &[String],
        role: &str,
    ) -> Result<Vec<ObjectPath>, RepositoryError> {
        let table = AssociationTable::new(self.layout(namespace)?.instance_association_table());
        let ids = table.reference_names(&canonical_key(object), result_classes, role)?;
        parse_ids(table.path(), ids)
    }

    pub fn class_associator_names(
        &self,
        namespace: &str,
        class_name: &str,
        assoc_classes: &[String],
        result_classes: &[String],
        role: &str,
        result_role: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        AssociationTable::new(self.layout(namespace)?.class_association_table()).associator_names(
            class_name,
            assoc_classes,
            result_classes,
            role,
            result_role,
        )
    }

    pub fn class_reference_names(
        &self,
        namespace: &str,
        class_name: &str,
        result_classes: &[String],
        role: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        AssociationTable::new(self.layout(namespace)?.class_association_table())
            .reference_names(class_name, result_classes, role)
    }
}

/// Data file first, from the pre-compaction index, then the index itself.
fn compact(files: &InstanceFileSet) -> Result<(), RepositoryError> {
    let entries = files.index.enumerate_entries(true)?;
    files.data.compact(&entries)?;
    files.index.compact()
}

fn parse_ids(table: &Path, ids: Vec<String>) -> Result<Vec<ObjectPath>, RepositoryError> {
    ids.into_iter()
        .map(|id| {
            id.parse()
                .map_err(|e: cim_common::ObjectPathError| RepositoryError::corrupt(table, e.to_string()))
        })
        .collect()
}

/// Build the namespace table from the directories under `root`.
fn scan_namespaces(root: &Path) -> Result<HashMap<UniCase<String>, StoredNamespace>, RepositoryError> {
    let entries = fs::read_dir(root).map_err(|e| RepositoryError::open(root, e))?;
    let mut found = vec![];
    for entry in entries {
        let entry = entry.map_err(|e| RepositoryError::read(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "skipping non-UTF-8 directory");
            continue;
        };
        let Some(name) = dir_name_to_namespace(&dir_name) else {
            warn!(path = %path.display(), "skipping unrecognized directory");
            continue;
        };
        let Some(marker) = read_sharing_marker(&path)? else {
            warn!(path = %path.display(), "skipping directory without a sharing marker");
            continue;
        };
        let remote_info = read_if_exists(&NamespaceLayout::new(&path).remote_file())?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        found.push((name, dir_name, marker, remote_info));
    }

    let parent_names: HashMap<String, String> = found
        .iter()
        .map(|(name, dir_name, _, _)| (dir_name.clone(), name.clone()))
        .collect();
    let mut namespaces = HashMap::new();
    for (name, dir_name, marker, remote_info) in found {
        let parent = match &marker.parent_dir {
            Some(parent_dir) => match parent_names.get(parent_dir) {
                Some(parent) => Some(parent.clone()),
                None => {
                    return Err(RepositoryError::corrupt(
                        &root.join(&dir_name),
                        format!("parent namespace directory {parent_dir} is missing"),
                    ));
                }
            },
            None => None,
        };
        debug!(namespace = %name, "found namespace");
        namespaces.insert(
            UniCase::new(name.clone()),
            StoredNamespace {
                definition: NamespaceDefinition {
                    name,
                    shareable: marker.shareable,
                    updates_allowed: marker.updates_allowed,
                    parent,
                    remote_info,
                },
                dir_name,
            },
        );
    }
    Ok(namespaces)
}

fn read_sharing_marker(dir: &Path) -> Result<Option<SharingMarker>, RepositoryError> {
    let entries = fs::read_dir(dir).map_err(|e| RepositoryError::open(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RepositoryError::read(dir, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(marker) = entry.file_name().to_str().and_then(SharingMarker::parse) {
            return Ok(Some(marker));
        }
    }
    Ok(None)
}
