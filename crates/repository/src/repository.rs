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

//! The repository as the dispatch layer sees it: one store and one namespace catalog behind a
//! single readers-writer lock. Every operation validates against the catalog before touching
//! the store, and updates the catalog only once the store has succeeded.

use cim_common::{CimClass, CimError, CimInstance, CimQualifierDecl, ObjectPath, ObjectStreamer};
use itertools::Itertools;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, instrument};
use unicase::UniCase;

use crate::config::RepositoryConfig;
use crate::error::RepositoryError;
use crate::namespace::NameSpaceManager;
use crate::store::{FileBasedStore, NamespaceDefinition, RecoveryReport};

/// The primary namespace that can never be deleted.
pub const ROOT_NAMESPACE: &str = "root";

/// What a class modification is allowed to change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassModification {
    pub allow_superclass_change: bool,
    pub allow_non_leaf_modification: bool,
}

struct RepositoryState {
    store: FileBasedStore,
    namespaces: NameSpaceManager,
}

impl RepositoryState {
    /// Rebuild the catalog from disk: namespaces parents first, then the class graph of every
    /// read-write namespace, primaries before secondaries.
    fn load(store: FileBasedStore) -> Result<Self, RepositoryError> {
        let mut namespaces = NameSpaceManager::new();
        let definitions = store.enumerate_namespaces();

        let mut pending = definitions.clone();
        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|d| {
                d.parent
                    .as_deref()
                    .is_none_or(|p| namespaces.name_space_exists(p))
            });
            if ready.is_empty() {
                let orphans = waiting.iter().map(|d| d.name.as_str()).join(", ");
                return Err(RepositoryError::corrupt(
                    store.root(),
                    format!("namespaces with unresolvable parents: {orphans}"),
                ));
            }
            for definition in &ready {
                namespaces.create_name_space(definition)?;
            }
            pending = waiting;
        }

        for definition in definitions.iter().filter(|d| d.updates_allowed) {
            namespaces.load_classes(&definition.name, store.enumerate_class_names(&definition.name)?)?;
        }
        info!(
            namespaces = definitions.len(),
            "loaded namespace catalog"
        );
        Ok(Self { store, namespaces })
    }

    fn get_class(&self, ns: &str, class: &str) -> Result<CimClass, RepositoryError> {
        let (owner, _) = self.namespaces.locate_class(ns, class)?;
        self.store.get_class(&owner, class)
    }

    /// `class` and all of its subclasses as seen from `ns`.
    fn class_family(&self, ns: &str, class: &str) -> Result<Vec<String>, RepositoryError> {
        let mut family = vec![self.namespaces.class_name(ns, class)?];
        family.extend(self.namespaces.get_sub_class_names(ns, Some(class), true)?);
        Ok(family)
    }

    /// An empty filter matches every class.
    fn class_filter(&self, ns: &str, class: Option<&str>) -> Result<Vec<String>, RepositoryError> {
        match class {
            Some(class) => self.class_family(ns, class),
            None => Ok(vec![]),
        }
    }

    /// `ns` and every namespace that shares schema from it, directly or indirectly.
    fn sharing_name_spaces(&self, ns: &str) -> Result<Vec<String>, RepositoryError> {
        let mut names = vec![];
        let mut queue = VecDeque::from([ns.to_string()]);
        while let Some(next) = queue.pop_front() {
            queue.extend(self.namespaces.dependents(&next)?);
            names.push(next);
        }
        Ok(names)
    }

    /// `ns` followed by the namespaces it takes schema from.
    fn lookup_name_spaces(&self, ns: &str) -> Result<Vec<String>, RepositoryError> {
        let mut names = vec![ns.to_string()];
        names.extend(self.namespaces.schema_name_spaces(ns)?);
        Ok(names
            .into_iter()
            .unique_by(|n| UniCase::new(n.clone()))
            .collect())
    }

    /// With complete-class storage, fold the superclass's properties into `class`.
    fn resolve_class(&self, ns: &str, class: &CimClass) -> Result<CimClass, RepositoryError> {
        let Some(super_class) = class
            .super_class_name
            .as_deref()
            .filter(|_| self.store.store_complete_classes())
        else {
            return Ok(class.clone());
        };
        let parent = self.get_class(ns, super_class)?;
        let mut resolved = class.clone();
        let inherited = parent
            .properties
            .into_iter()
            .filter(|p| class.property(&p.name).is_none());
        resolved.properties = inherited.chain(class.properties.iter().cloned()).collect();
        Ok(resolved)
    }

    fn check_schema_writable(&self, ns: &str) -> Result<(), RepositoryError> {
        if !self.namespaces.get_name_space_attributes(ns)?.updates_allowed {
            return Err(CimError::AccessDenied(format!("namespace {ns} is read-only")).into());
        }
        Ok(())
    }

    fn instance_path(&self, ns: &str, instance: &CimInstance) -> Result<(ObjectPath, CimClass), RepositoryError> {
        self.namespaces.validate_class(ns, &instance.class_name)?;
        let class = self.get_class(ns, &instance.class_name)?;
        let path = match instance.build_path(&class) {
            Ok(path) => path,
            Err(e) => instance.path.as_ref().map(ObjectPath::normalized).ok_or(e)?,
        };
        Ok((path, class))
    }
}

pub struct Repository {
    state: RwLock<RepositoryState>,
}

impl Repository {
    pub fn open(config: RepositoryConfig) -> Result<Self, RepositoryError> {
        Self::from_store(FileBasedStore::open(config)?)
    }

    pub fn open_with_streamer(
        config: RepositoryConfig,
        streamer: Box<dyn ObjectStreamer>,
    ) -> Result<Self, RepositoryError> {
        Self::from_store(FileBasedStore::open_with_streamer(config, streamer)?)
    }

    fn from_store(store: FileBasedStore) -> Result<Self, RepositoryError> {
        Ok(Self {
            state: RwLock::new(RepositoryState::load(store)?),
        })
    }

    // Poisoning is ignored; instance writes roll back on unwind.
    fn read(&self) -> RwLockReadGuard<'_, RepositoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RepositoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn recovery_report(&self) -> RecoveryReport {
        self.read().store.recovery_report().clone()
    }

    pub fn store_complete_classes(&self) -> bool {
        self.read().store.store_complete_classes()
    }

    // Namespaces

    pub fn enumerate_name_spaces(&self) -> Vec<String> {
        self.read().namespaces.get_name_space_names()
    }

    pub fn get_name_space_attributes(&self, ns: &str) -> Result<NamespaceDefinition, RepositoryError> {
        Ok(self.read().namespaces.get_name_space_attributes(ns)?)
    }

    pub fn is_remote_name_space(&self, ns: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.read().namespaces.is_remote_name_space(ns)?)
    }

    #[instrument(skip(self))]
    pub fn create_name_space(&self, definition: &NamespaceDefinition) -> Result<(), RepositoryError> {
        let mut state = self.write();
        state.namespaces.check_create_name_space(definition)?;
        state.store.create_namespace(definition)?;
        state.namespaces.create_name_space(definition)?;
        Ok(())
    }

    /// Delete an empty namespace without dependents. `root` cannot be deleted.
    #[instrument(skip(self))]
    pub fn delete_name_space(&self, ns: &str) -> Result<(), RepositoryError> {
        let mut state = self.write();
        if UniCase::new(ns) == UniCase::new(ROOT_NAMESPACE) {
            return Err(CimError::AccessDenied(format!("namespace {ns} cannot be deleted")).into());
        }
        state.namespaces.check_delete_name_space(ns)?;
        if !state.store.is_namespace_empty(ns)? {
            return Err(CimError::Failed(format!("namespace {ns} is not empty")).into());
        }
        state.store.delete_namespace(ns)?;
        state.namespaces.delete_name_space(ns)?;
        Ok(())
    }

    pub fn modify_name_space(&self, ns: &str, shareable: bool, updates_allowed: bool) -> Result<(), RepositoryError> {
        let mut state = self.write();
        state
            .namespaces
            .check_modify_name_space(ns, shareable, updates_allowed)?;
        state.store.modify_namespace(ns, shareable, updates_allowed)?;
        state.namespaces.modify_name_space(ns, shareable, updates_allowed)?;
        Ok(())
    }

    pub fn modify_name_space_name(&self, old_name: &str, new_name: &str) -> Result<(), RepositoryError> {
        let mut state = self.write();
        state
            .namespaces
            .check_modify_name_space_name(old_name, new_name)?;
        state.store.modify_namespace_name(old_name, new_name)?;
        state.namespaces.modify_name_space_name(old_name, new_name)?;
        Ok(())
    }

    // Classes

    pub fn get_class(&self, ns: &str, class: &str) -> Result<CimClass, RepositoryError> {
        self.read().get_class(ns, class)
    }

    pub fn get_super_class_name(&self, ns: &str, class: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.read().namespaces.get_super_class_name(ns, class)?)
    }

    /// Subclass names of `class` (root classes when `None`), recursively when `deep`.
    pub fn enumerate_class_names(
        &self,
        ns: &str,
        class: Option<&str>,
        deep: bool,
    ) -> Result<Vec<String>, RepositoryError> {
        Ok(self.read().namespaces.get_sub_class_names(ns, class, deep)?)
    }

    pub fn enumerate_classes(
        &self,
        ns: &str,
        class: Option<&str>,
        deep: bool,
    ) -> Result<Vec<CimClass>, RepositoryError> {
        let state = self.read();
        state
            .namespaces
            .get_sub_class_names(ns, class, deep)?
            .iter()
            .map(|name| state.get_class(ns, name))
            .collect()
    }

    #[instrument(skip(self, class), fields(class = %class.class_name))]
    pub fn create_class(&self, ns: &str, class: &CimClass) -> Result<(), RepositoryError> {
        let mut state = self.write();
        let super_class = class.super_class_name.as_deref();
        state
            .namespaces
            .check_create_class(ns, &class.class_name, super_class)?;
        let resolved = state.resolve_class(ns, class)?;
        state.store.create_class(ns, &resolved)?;
        state
            .namespaces
            .create_class(ns, &class.class_name, super_class)?;
        Ok(())
    }

    #[instrument(skip(self, class), fields(class = %class.class_name))]
    pub fn modify_class(
        &self,
        ns: &str,
        class: &CimClass,
        options: ClassModification,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write();
        let super_class = class.super_class_name.as_deref();
        state.namespaces.check_modify_class(
            ns,
            &class.class_name,
            super_class,
            options.allow_superclass_change,
            options.allow_non_leaf_modification,
        )?;
        let resolved = state.resolve_class(ns, class)?;
        state.store.modify_class(ns, &resolved)?;
        state
            .namespaces
            .modify_class(ns, &class.class_name, super_class)?;
        Ok(())
    }

    /// Delete a leaf class that has no instances in any namespace sharing it.
    #[instrument(skip(self))]
    pub fn delete_class(&self, ns: &str, class: &str) -> Result<(), RepositoryError> {
        let mut state = self.write();
        state.namespaces.check_delete_class(ns, class)?;
        for sharing in state.sharing_name_spaces(ns)? {
            if !state
                .store
                .enumerate_instance_names_for_class(&sharing, class)?
                .is_empty()
            {
                return Err(CimError::ClassHasInstances(class.to_string()).into());
            }
        }
        state.store.delete_class(ns, class)?;
        state.namespaces.delete_class(ns, class)?;
        Ok(())
    }

    // Instances

    pub fn get_instance(&self, ns: &str, path: &ObjectPath) -> Result<CimInstance, RepositoryError> {
        let state = self.read();
        state.namespaces.validate_class(ns, &path.class_name)?;
        state.store.get_instance(ns, path)
    }

    /// Store a new instance, returning the path derived from its key properties.
    #[instrument(skip(self, instance), fields(class = %instance.class_name))]
    pub fn create_instance(&self, ns: &str, instance: &CimInstance) -> Result<ObjectPath, RepositoryError> {
        let state = self.write();
        let (path, class) = state.instance_path(ns, instance)?;
        state
            .store
            .create_instance(ns, &path, instance, class.is_association())
    }

    #[instrument(skip(self, instance))]
    pub fn modify_instance(
        &self,
        ns: &str,
        path: &ObjectPath,
        instance: &CimInstance,
    ) -> Result<(), RepositoryError> {
        let state = self.write();
        state.namespaces.validate_class(ns, &path.class_name)?;
        let class = state.get_class(ns, &path.class_name)?;
        state
            .store
            .modify_instance(ns, path, instance, class.is_association())
    }

    #[instrument(skip(self))]
    pub fn delete_instance(&self, ns: &str, path: &ObjectPath) -> Result<(), RepositoryError> {
        let state = self.write();
        state.namespaces.validate_class(ns, &path.class_name)?;
        let class = state.get_class(ns, &path.class_name)?;
        state.store.delete_instance(ns, path, class.is_association())
    }

    /// Instance paths of `class` and all of its subclasses.
    pub fn enumerate_instance_names(&self, ns: &str, class: &str) -> Result<Vec<ObjectPath>, RepositoryError> {
        let state = self.read();
        state.namespaces.validate_class(ns, class)?;
        let mut names = vec![];
        for member in state.class_family(ns, class)? {
            names.extend(state.store.enumerate_instance_names_for_class(ns, &member)?);
        }
        Ok(names)
    }

    /// Instances of `class` and all of its subclasses.
    pub fn enumerate_instances(&self, ns: &str, class: &str) -> Result<Vec<CimInstance>, RepositoryError> {
        let state = self.read();
        state.namespaces.validate_class(ns, class)?;
        let mut instances = vec![];
        for member in state.class_family(ns, class)? {
            instances.extend(state.store.enumerate_instances_for_class(ns, &member)?);
        }
        Ok(instances)
    }

    // Associations

    /// Objects associated with `object`. For a class path the class-level table is consulted,
    /// otherwise the instance-level one. Class filters include subclasses.
    pub fn associator_names(
        &self,
        ns: &str,
        object: &ObjectPath,
        assoc_class: Option<&str>,
        result_class: Option<&str>,
        role: &str,
        result_role: &str,
    ) -> Result<Vec<ObjectPath>, RepositoryError> {
        let state = self.read();
        state.namespaces.validate_class(ns, &object.class_name)?;
        let assoc_classes = state.class_filter(ns, assoc_class)?;
        let result_classes = state.class_filter(ns, result_class)?;
        if !object.is_class_path() {
            return state.store.instance_associator_names(
                ns,
                object,
                &assoc_classes,
                &result_classes,
                role,
                result_role,
            );
        }
        let mut names = vec![];
        for schema in state.namespaces.schema_name_spaces(ns)? {
            names.extend(state.store.class_associator_names(
                &schema,
                &object.class_name,
                &assoc_classes,
                &result_classes,
                role,
                result_role,
            )?);
        }
        Ok(class_paths(names))
    }

    /// Associations that refer to `object`. `result_class` filters on the association class.
    pub fn reference_names(
        &self,
        ns: &str,
        object: &ObjectPath,
        result_class: Option<&str>,
        role: &str,
    ) -> Result<Vec<ObjectPath>, RepositoryError> {
        let state = self.read();
        state.namespaces.validate_class(ns, &object.class_name)?;
        let result_classes = state.class_filter(ns, result_class)?;
        if !object.is_class_path() {
            return state
                .store
                .instance_reference_names(ns, object, &result_classes, role);
        }
        let mut names = vec![];
        for schema in state.namespaces.schema_name_spaces(ns)? {
            names.extend(state.store.class_reference_names(
                &schema,
                &object.class_name,
                &result_classes,
                role,
            )?);
        }
        Ok(class_paths(names))
    }

    // Qualifiers

    /// The qualifier declaration visible from `ns`, looking through shared schema.
    pub fn get_qualifier(&self, ns: &str, name: &str) -> Result<CimQualifierDecl, RepositoryError> {
        let state = self.read();
        for space in state.lookup_name_spaces(ns)? {
            if let Some(qualifier) = state.store.get_qualifier(&space, name)? {
                return Ok(qualifier);
            }
        }
        Err(CimError::NotFound(name.to_string()).into())
    }

    pub fn create_qualifier(&self, ns: &str, qualifier: &CimQualifierDecl) -> Result<(), RepositoryError> {
        let state = self.write();
        state.check_schema_writable(ns)?;
        state.store.create_qualifier(ns, qualifier)
    }

    pub fn set_qualifier(&self, ns: &str, qualifier: &CimQualifierDecl) -> Result<(), RepositoryError> {
        let state = self.write();
        state.check_schema_writable(ns)?;
        state.store.set_qualifier(ns, qualifier)
    }

    pub fn delete_qualifier(&self, ns: &str, name: &str) -> Result<(), RepositoryError> {
        let state = self.write();
        state.check_schema_writable(ns)?;
        state.store.delete_qualifier(ns, name)
    }

    /// Qualifier declarations visible from `ns`; the nearest namespace wins on a name clash.
    pub fn enumerate_qualifiers(&self, ns: &str) -> Result<Vec<CimQualifierDecl>, RepositoryError> {
        let state = self.read();
        let mut qualifiers = vec![];
        for space in state.lookup_name_spaces(ns)? {
            qualifiers.extend(state.store.enumerate_qualifiers(&space)?);
        }
        Ok(qualifiers
            .into_iter()
            .unique_by(|q| UniCase::new(q.name.clone()))
            .collect())
    }

    // Maintenance

    /// Compact the instance files of one class in one namespace.
    pub fn compact(&self, ns: &str, class: &str) -> Result<(), RepositoryError> {
        let state = self.write();
        state.namespaces.validate_class(ns, class)?;
        state.store.compact_instances(ns, class)
    }
}

fn class_paths(names: Vec<String>) -> Vec<ObjectPath> {
    names
        .into_iter()
        .unique_by(|n| UniCase::new(n.clone()))
        .map(ObjectPath::class)
        .collect()
}
