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

//! In-memory catalog of namespaces and their class graphs.
//!
//! Namespaces live in an arena keyed by name; parent and dependent links are names, never
//! ownership. A read-only namespace keeps no schema of its own and resolves classes through
//! its nearest read-write ancestor; a read-write secondary namespace resolves through its own
//! tree and then its primary parent's.

pub mod inheritance;

use cim_common::CimError;
use cim_common::model::is_valid_name;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, instrument};
use unicase::UniCase;

pub use inheritance::{ClassNode, InheritanceTree};

use crate::store::NamespaceDefinition;

#[derive(Debug, Clone)]
pub struct NameSpace {
    pub name: String,
    pub shareable: bool,
    pub updates_allowed: bool,
    pub parent: Option<String>,
    pub dependents: Vec<String>,
    pub remote_info: Option<String>,
    pub tree: InheritanceTree,
}

impl NameSpace {
    pub fn definition(&self) -> NamespaceDefinition {
        NamespaceDefinition {
            name: self.name.clone(),
            shareable: self.shareable,
            updates_allowed: self.updates_allowed,
            parent: self.parent.clone(),
            remote_info: self.remote_info.clone(),
        }
    }
}

fn key(name: &str) -> UniCase<String> {
    UniCase::new(name.to_string())
}

fn same(a: &str, b: &str) -> bool {
    UniCase::new(a) == UniCase::new(b)
}

#[derive(Debug, Default)]
pub struct NameSpaceManager {
    namespaces: HashMap<UniCase<String>, NameSpace>,
}

impl NameSpaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, name: &str) -> Result<&NameSpace, CimError> {
        self.namespaces
            .get(&key(name))
            .ok_or_else(|| CimError::InvalidNamespace(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut NameSpace, CimError> {
        self.namespaces
            .get_mut(&key(name))
            .ok_or_else(|| CimError::InvalidNamespace(name.to_string()))
    }

    /// The nearest read-write namespace at or above `name`; the one holding its schema.
    fn rw_parent(&self, name: &str) -> Result<&NameSpace, CimError> {
        let mut ns = self.get(name)?;
        while !ns.updates_allowed {
            let Some(parent) = &ns.parent else {
                break;
            };
            ns = self.get(parent)?;
        }
        Ok(ns)
    }

    /// The trees consulted for class lookups from `name`: the read-write namespace's own,
    /// then its parent's.
    fn schema_chain(&self, name: &str) -> Result<Vec<&NameSpace>, CimError> {
        let rw = self.rw_parent(name)?;
        let mut chain = vec![rw];
        if let Some(parent) = &rw.parent {
            chain.push(self.get(parent)?);
        }
        Ok(chain)
    }

    // Namespaces

    pub fn name_space_exists(&self, name: &str) -> bool {
        self.namespaces.contains_key(&key(name))
    }

    pub fn validate_name_space(&self, name: &str) -> Result<(), CimError> {
        self.get(name).map(|_| ())
    }

    pub fn get_name_space_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.values().map(|ns| ns.name.clone()).collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }

    pub fn get_name_space_attributes(&self, name: &str) -> Result<NamespaceDefinition, CimError> {
        Ok(self.get(name)?.definition())
    }

    /// Remote delegation info, if the namespace is served elsewhere.
    pub fn is_remote_name_space(&self, name: &str) -> Result<Option<String>, CimError> {
        Ok(self.get(name)?.remote_info.clone())
    }

    pub fn dependents(&self, name: &str) -> Result<Vec<String>, CimError> {
        Ok(self.get(name)?.dependents.clone())
    }

    /// Name of the namespace whose tree holds the schema visible from `name`.
    pub fn schema_name_space(&self, name: &str) -> Result<String, CimError> {
        Ok(self.rw_parent(name)?.name.clone())
    }

    /// Names of the namespaces consulted for schema from `name`, nearest first.
    pub fn schema_name_spaces(&self, name: &str) -> Result<Vec<String>, CimError> {
        Ok(self
            .schema_chain(name)?
            .into_iter()
            .map(|ns| ns.name.clone())
            .collect())
    }

    /// Validate a new namespace without adding it.
    pub fn check_create_name_space(&self, definition: &NamespaceDefinition) -> Result<(), CimError> {
        let name = &definition.name;
        if name.is_empty() || name.starts_with('/') || name.ends_with('/') || name.contains("//") {
            return Err(CimError::InvalidNamespace(name.clone()));
        }
        if self.name_space_exists(name) {
            return Err(CimError::AlreadyExists(name.clone()));
        }
        match &definition.parent {
            None if !definition.updates_allowed => Err(CimError::InvalidParameter(format!(
                "read-only namespace {name} needs a parent"
            ))),
            None => Ok(()),
            Some(parent_name) => {
                let parent = self
                    .namespaces
                    .get(&key(parent_name))
                    .ok_or_else(|| CimError::InvalidNamespace(parent_name.clone()))?;
                if !parent.shareable {
                    return Err(CimError::AccessDenied(format!(
                        "namespace {parent_name} is not shareable"
                    )));
                }
                if definition.updates_allowed && parent.parent.is_some() {
                    return Err(CimError::InvalidNamespace(format!(
                        "{name}: read-write namespace cannot share schema from secondary namespace {parent_name}"
                    )));
                }
                Ok(())
            }
        }
    }

    #[instrument(skip(self))]
    pub fn create_name_space(&mut self, definition: &NamespaceDefinition) -> Result<(), CimError> {
        self.check_create_name_space(definition)?;
        if let Some(parent) = &definition.parent {
            self.get_mut(parent)?.dependents.push(definition.name.clone());
        }
        self.namespaces.insert(
            key(&definition.name),
            NameSpace {
                name: definition.name.clone(),
                shareable: definition.shareable,
                updates_allowed: definition.updates_allowed,
                parent: definition.parent.clone(),
                dependents: vec![],
                remote_info: definition.remote_info.clone(),
                tree: InheritanceTree::new(),
            },
        );
        debug!(namespace = %definition.name, "namespace registered");
        Ok(())
    }

    pub fn check_delete_name_space(&self, name: &str) -> Result<(), CimError> {
        let ns = self.get(name)?;
        if !ns.dependents.is_empty() {
            return Err(CimError::Failed(format!(
                "namespace {name} has dependent namespaces: {}",
                ns.dependents.join(", ")
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_name_space(&mut self, name: &str) -> Result<(), CimError> {
        self.check_delete_name_space(name)?;
        let ns = self
            .namespaces
            .remove(&key(name))
            .ok_or_else(|| CimError::InvalidNamespace(name.to_string()))?;
        if let Some(parent) = &ns.parent {
            if let Ok(parent) = self.get_mut(parent) {
                parent.dependents.retain(|d| !same(d, &ns.name));
            }
        }
        Ok(())
    }

    pub fn check_modify_name_space(
        &self,
        name: &str,
        shareable: bool,
        updates_allowed: bool,
    ) -> Result<(), CimError> {
        let ns = self.get(name)?;
        if !shareable && !ns.dependents.is_empty() {
            return Err(CimError::Failed(format!(
                "namespace {name} has dependents and must stay shareable"
            )));
        }
        match (&ns.parent, updates_allowed) {
            (None, false) => Err(CimError::InvalidParameter(format!(
                "read-only namespace {name} needs a parent"
            ))),
            (Some(_), false) if ns.updates_allowed && !ns.tree.is_empty() => Err(CimError::Failed(
                format!("namespace {name} holds classes and cannot become read-only"),
            )),
            (Some(parent), true) if self.get(parent)?.parent.is_some() => {
                Err(CimError::InvalidNamespace(format!(
                    "{name}: read-write namespace cannot share schema from secondary namespace {parent}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn modify_name_space(
        &mut self,
        name: &str,
        shareable: bool,
        updates_allowed: bool,
    ) -> Result<(), CimError> {
        self.check_modify_name_space(name, shareable, updates_allowed)?;
        let ns = self.get_mut(name)?;
        ns.shareable = shareable;
        ns.updates_allowed = updates_allowed;
        Ok(())
    }

    pub fn check_modify_name_space_name(&self, old_name: &str, new_name: &str) -> Result<(), CimError> {
        self.get(old_name)?;
        if self.name_space_exists(new_name) {
            return Err(CimError::AlreadyExists(new_name.to_string()));
        }
        Ok(())
    }

    /// Rename a namespace; parent and dependent links follow.
    pub fn modify_name_space_name(&mut self, old_name: &str, new_name: &str) -> Result<(), CimError> {
        self.check_modify_name_space_name(old_name, new_name)?;
        let mut ns = self
            .namespaces
            .remove(&key(old_name))
            .ok_or_else(|| CimError::InvalidNamespace(old_name.to_string()))?;
        let previous = std::mem::replace(&mut ns.name, new_name.to_string());
        if let Some(parent) = &ns.parent {
            let parent = self.get_mut(parent)?;
            for dependent in parent.dependents.iter_mut().filter(|d| same(d, &previous)) {
                *dependent = new_name.to_string();
            }
        }
        for dependent in &ns.dependents {
            self.get_mut(dependent)?.parent = Some(new_name.to_string());
        }
        self.namespaces.insert(key(new_name), ns);
        Ok(())
    }

    // Classes

    /// Check that `class` is visible from namespace `ns`.
    pub fn validate_class(&self, ns: &str, class: &str) -> Result<(), CimError> {
        if self.class_exists(ns, class)? {
            Ok(())
        } else {
            Err(CimError::InvalidClass(class.to_string()))
        }
    }

    pub fn class_exists(&self, ns: &str, class: &str) -> Result<bool, CimError> {
        Ok(self
            .schema_chain(ns)?
            .iter()
            .any(|space| space.tree.contains(class)))
    }

    /// The namespace whose tree defines `class` as seen from `ns`, and its superclass.
    pub fn locate_class(&self, ns: &str, class: &str) -> Result<(String, Option<String>), CimError> {
        for space in self.schema_chain(ns)? {
            if let Some(node) = space.tree.get(class) {
                return Ok((space.name.clone(), node.super_class.clone()));
            }
        }
        Err(CimError::NotFound(class.to_string()))
    }

    pub fn get_super_class_name(&self, ns: &str, class: &str) -> Result<Option<String>, CimError> {
        Ok(self.locate_class(ns, class)?.1)
    }

    /// Every ancestor of `class`, nearest first.
    pub fn get_super_class_names(&self, ns: &str, class: &str) -> Result<Vec<String>, CimError> {
        let mut names = vec![];
        let mut current = self.get_super_class_name(ns, class)?;
        while let Some(super_class) = current {
            current = self.get_super_class_name(ns, &super_class)?;
            names.push(super_class);
        }
        Ok(names)
    }

    /// Canonical spelling of `class` as seen from `ns`.
    pub fn class_name(&self, ns: &str, class: &str) -> Result<String, CimError> {
        for space in self.schema_chain(ns)? {
            if let Some(node) = space.tree.get(class) {
                return Ok(node.name.clone());
            }
        }
        Err(CimError::NotFound(class.to_string()))
    }

    fn check_writable(&self, ns: &str) -> Result<&NameSpace, CimError> {
        let space = self.get(ns)?;
        if !space.updates_allowed {
            return Err(CimError::AccessDenied(format!("namespace {ns} is read-only")));
        }
        Ok(space)
    }

    /// Read-write dependents of a primary namespace; their class names must not collide with
    /// the primary's.
    fn rw_dependents<'a>(&'a self, space: &'a NameSpace) -> impl Iterator<Item = &'a NameSpace> + 'a {
        space
            .dependents
            .iter()
            .filter_map(|d| self.namespaces.get(&key(d)))
            .filter(|d| d.updates_allowed)
    }

    pub fn check_create_class(&self, ns: &str, class: &str, super_class: Option<&str>) -> Result<(), CimError> {
        if !is_valid_name(class) {
            return Err(CimError::InvalidParameter(format!("invalid class name {class:?}")));
        }
        let space = self.check_writable(ns)?;
        let parent = match &space.parent {
            Some(parent) => Some(self.get(parent)?),
            None => None,
        };
        let exists = space.tree.contains(class)
            || parent.is_some_and(|p| p.tree.contains(class))
            || (space.parent.is_none() && self.rw_dependents(space).any(|d| d.tree.contains(class)));
        if exists {
            return Err(CimError::AlreadyExists(class.to_string()));
        }
        if let Some(super_class) = super_class {
            if !space.tree.contains(super_class) && !parent.is_some_and(|p| p.tree.contains(super_class)) {
                return Err(CimError::InvalidSuperclass {
                    class: class.to_string(),
                    superclass: super_class.to_string(),
                });
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn create_class(&mut self, ns: &str, class: &str, super_class: Option<&str>) -> Result<(), CimError> {
        self.check_create_class(ns, class, super_class)?;
        self.with_tree(ns, |tree, parent| tree.insert(class, super_class, parent))
    }

    /// Validate a class modification. The superclass may only change when
    /// `allow_super_change` is set, and then not to the class itself or one of its
    /// subclasses. Classes with subclasses are only modifiable with `allow_non_leaf`.
    pub fn check_modify_class(
        &self,
        ns: &str,
        class: &str,
        new_super: Option<&str>,
        allow_super_change: bool,
        allow_non_leaf: bool,
    ) -> Result<(), CimError> {
        let space = self.check_writable(ns)?;
        let Some(node) = space.tree.get(class) else {
            return Err(match self.class_exists(ns, class)? {
                true => CimError::AccessDenied(format!(
                    "class {class} belongs to the parent of namespace {ns}"
                )),
                false => CimError::NotFound(class.to_string()),
            });
        };

        let changed = match (&node.super_class, new_super) {
            (None, None) => false,
            (Some(old), Some(new)) => !same(old, new),
            _ => true,
        };
        if changed {
            let invalid = || CimError::InvalidSuperclass {
                class: class.to_string(),
                superclass: new_super.unwrap_or_default().to_string(),
            };
            if !allow_super_change {
                return Err(invalid());
            }
            if let Some(new_super) = new_super {
                if !self.class_exists(ns, new_super)? || space.tree.is_same_or_ancestor(class, new_super) {
                    return Err(invalid());
                }
            }
        }

        if !allow_non_leaf && self.has_subclasses_anywhere(space, class) {
            return Err(CimError::ClassHasChildren(class.to_string()));
        }
        Ok(())
    }

    pub fn modify_class(&mut self, ns: &str, class: &str, new_super: Option<&str>) -> Result<(), CimError> {
        let current = self.get_super_class_name(ns, class)?;
        let changed = match (current.as_deref(), new_super) {
            (None, None) => false,
            (Some(old), Some(new)) => !same(old, new),
            _ => true,
        };
        if !changed {
            return Ok(());
        }
        self.with_tree(ns, |tree, parent| tree.reparent(class, new_super, parent))
    }

    pub fn check_delete_class(&self, ns: &str, class: &str) -> Result<(), CimError> {
        let space = self.get(ns)?;
        if !space.updates_allowed || !space.tree.contains(class) {
            return Err(match self.class_exists(ns, class)? {
                true => CimError::AccessDenied(format!(
                    "class {class} is not defined in namespace {ns}"
                )),
                false => CimError::NotFound(class.to_string()),
            });
        }
        if self.has_subclasses_anywhere(space, class) {
            return Err(CimError::ClassHasChildren(class.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_class(&mut self, ns: &str, class: &str) -> Result<(), CimError> {
        self.check_delete_class(ns, class)?;
        self.get_mut(ns)?.tree.remove(class).map(|_| ())
    }

    fn has_subclasses_anywhere(&self, space: &NameSpace, class: &str) -> bool {
        space.tree.has_subclasses(class)
            || (space.parent.is_none() && self.rw_dependents(space).any(|d| d.tree.has_subclasses(class)))
    }

    /// Subclasses of `class` visible from `ns`; with `class` `None`, the root classes (and,
    /// when `deep`, everything). A dependent namespace enumerating from the top always
    /// enumerates deeply.
    pub fn get_sub_class_names(&self, ns: &str, class: Option<&str>, deep: bool) -> Result<Vec<String>, CimError> {
        let chain = self.schema_chain(ns)?;
        let dependent = self.get(ns)?.parent.is_some();
        let children = |name: &str| -> Vec<String> {
            chain
                .iter()
                .flat_map(|space| space.tree.direct_subclasses(name).iter().cloned())
                .collect()
        };

        let (mut names, deep) = match class {
            Some(class) => {
                self.validate_class(ns, class)?;
                (children(class), deep)
            }
            None => {
                let mut roots: Vec<String> = chain.iter().flat_map(|s| s.tree.root_classes()).collect();
                roots.sort_by_key(|n| n.to_lowercase());
                (roots, deep || dependent)
            }
        };
        if deep {
            let mut queue: VecDeque<String> = names.iter().cloned().collect();
            while let Some(next) = queue.pop_front() {
                for child in children(&next) {
                    queue.push_back(child.clone());
                    names.push(child);
                }
            }
        }
        Ok(names)
    }

    /// Replace the class graph of a read-write namespace with the given `(class, superclass)`
    /// pairs. Its parent's graph must already be loaded.
    pub fn load_classes(&mut self, ns: &str, pairs: Vec<(String, Option<String>)>) -> Result<(), CimError> {
        let space = self.get(ns)?;
        let parent = match &space.parent {
            Some(parent) => Some(&self.get(parent)?.tree),
            None => None,
        };
        let tree = InheritanceTree::from_pairs(pairs, parent)?;
        debug!(namespace = ns, classes = tree.len(), "loaded class graph");
        self.get_mut(ns)?.tree = tree;
        Ok(())
    }

    /// Run `f` on the tree of `ns` with the parent's tree alongside it.
    fn with_tree<T>(
        &mut self,
        ns: &str,
        f: impl FnOnce(&mut InheritanceTree, Option<&InheritanceTree>) -> Result<T, CimError>,
    ) -> Result<T, CimError> {
        let key = key(ns);
        let mut space = self
            .namespaces
            .remove(&key)
            .ok_or_else(|| CimError::InvalidNamespace(ns.to_string()))?;
        let parent = space
            .parent
            .as_deref()
            .and_then(|p| self.namespaces.get(&UniCase::new(p.to_string())))
            .map(|p| &p.tree);
        let result = f(&mut space.tree, parent);
        self.namespaces.insert(key, space);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn definition(name: &str, parent: Option<&str>, shareable: bool, updates_allowed: bool) -> NamespaceDefinition {
        NamespaceDefinition {
            name: name.into(),
            shareable,
            updates_allowed,
            parent: parent.map(str::to_string),
            remote_info: None,
        }
    }

    /// `root` (primary) with read-write secondary `root/sec` and read-only `root/ro`.
    fn manager() -> NameSpaceManager {
        let mut m = NameSpaceManager::new();
        m.create_name_space(&definition("root", None, true, true)).unwrap();
        m.create_name_space(&definition("root/sec", Some("root"), true, true)).unwrap();
        m.create_name_space(&definition("root/ro", Some("root"), false, false)).unwrap();
        m.create_class("root", "Base", None).unwrap();
        m.create_class("root", "Derived", Some("Base")).unwrap();
        m.create_class("root/sec", "Local", Some("Derived")).unwrap();
        m
    }

    #[test]
    fn test_create_name_space_rules() {
        let mut m = manager();
        assert_eq!(
            m.create_name_space(&definition("ROOT", None, true, true)),
            Err(CimError::AlreadyExists("ROOT".into()))
        );
        assert_eq!(
            m.create_name_space(&definition("x", Some("missing"), true, true)),
            Err(CimError::InvalidNamespace("missing".into()))
        );
        m.create_name_space(&definition("private", None, false, true)).unwrap();
        assert!(matches!(
            m.create_name_space(&definition("private/a", Some("private"), false, true)),
            Err(CimError::AccessDenied(_))
        ));
        // At most two levels of schema sharing.
        assert!(matches!(
            m.create_name_space(&definition("root/sec/rw", Some("root/sec"), false, true)),
            Err(CimError::InvalidNamespace(_))
        ));
        m.create_name_space(&definition("root/sec/ro", Some("root/sec"), false, false)).unwrap();
        assert_eq!(m.dependents("root/sec").unwrap(), vec!["root/sec/ro"]);
    }

    #[test]
    fn test_class_resolution_through_parents() {
        let m = manager();
        assert_eq!(m.get_super_class_name("root/sec", "local").unwrap(), Some("Derived".into()));
        assert_eq!(
            m.locate_class("root/ro", "Derived").unwrap(),
            ("root".to_string(), Some("Base".to_string()))
        );
        assert_eq!(m.get_super_class_names("root/sec", "Local").unwrap(), vec!["Derived", "Base"]);
        assert_eq!(m.validate_class("root", "Local"), Err(CimError::InvalidClass("Local".into())));
        m.validate_class("root/ro", "Base").unwrap();
        assert_eq!(m.schema_name_space("root/ro").unwrap(), "root");
    }

    #[test]
    fn test_create_class_rules() {
        let mut m = manager();
        assert!(matches!(m.create_class("root/ro", "X", None), Err(CimError::AccessDenied(_))));
        // Collides with the parent's schema.
        assert_eq!(
            m.create_class("root/sec", "Base", None),
            Err(CimError::AlreadyExists("Base".into()))
        );
        // Collides with a dependent's schema.
        assert_eq!(
            m.create_class("root", "LOCAL", None),
            Err(CimError::AlreadyExists("LOCAL".into()))
        );
        assert!(matches!(
            m.create_class("root", "X", Some("Local")),
            Err(CimError::InvalidSuperclass { .. })
        ));
        assert!(matches!(m.create_class("root", "9x", None), Err(CimError::InvalidParameter(_))));
    }

    #[test]
    fn test_delete_class_rules() {
        let mut m = manager();
        assert_eq!(
            m.check_delete_class("root", "Base"),
            Err(CimError::ClassHasChildren("Base".into()))
        );
        // Derived only has a subclass in a dependent namespace.
        assert_eq!(
            m.check_delete_class("root", "Derived"),
            Err(CimError::ClassHasChildren("Derived".into()))
        );
        assert!(matches!(m.check_delete_class("root/sec", "Base"), Err(CimError::AccessDenied(_))));
        assert!(matches!(m.check_delete_class("root/ro", "Base"), Err(CimError::AccessDenied(_))));
        assert_eq!(m.check_delete_class("root", "Nope"), Err(CimError::NotFound("Nope".into())));

        m.delete_class("root/sec", "Local").unwrap();
        m.delete_class("root", "Derived").unwrap();
        m.delete_class("root", "Base").unwrap();
        assert!(m.get_sub_class_names("root", None, true).unwrap().is_empty());
    }

    #[test]
    fn test_modify_class_rules() {
        let mut m = manager();
        m.create_class("root", "Other", None).unwrap();
        assert!(matches!(
            m.check_modify_class("root", "Derived", Some("Other"), false, true),
            Err(CimError::InvalidSuperclass { .. })
        ));
        assert_eq!(
            m.check_modify_class("root", "Derived", Some("Base"), false, false),
            Err(CimError::ClassHasChildren("Derived".into()))
        );
        assert!(matches!(
            m.check_modify_class("root", "Base", Some("Derived"), true, true),
            Err(CimError::InvalidSuperclass { .. })
        ));
        m.check_modify_class("root", "Derived", Some("Other"), true, true).unwrap();
        m.modify_class("root", "Derived", Some("Other")).unwrap();
        assert_eq!(m.get_sub_class_names("root", Some("Other"), false).unwrap(), vec!["Derived"]);
        assert!(m.get_sub_class_names("root", Some("Base"), true).unwrap().is_empty());
    }

    #[test]
    fn test_sub_class_names() {
        let m = manager();
        assert_eq!(m.get_sub_class_names("root", None, false).unwrap(), vec!["Base"]);
        assert_eq!(m.get_sub_class_names("root", Some("Base"), true).unwrap(), vec!["Derived"]);
        assert_eq!(
            m.get_sub_class_names("root/sec", Some("Base"), true).unwrap(),
            vec!["Derived", "Local"]
        );
        // From the top, a dependent namespace always enumerates deeply.
        assert_eq!(
            m.get_sub_class_names("root/sec", None, false).unwrap(),
            vec!["Base", "Derived", "Local"]
        );
        assert_eq!(
            m.get_sub_class_names("root/ro", None, false).unwrap(),
            vec!["Base", "Derived"]
        );
    }

    #[test]
    fn test_modify_and_rename_name_space() {
        let mut m = manager();
        assert!(matches!(m.modify_name_space("root", false, true), Err(CimError::Failed(_))));
        assert!(matches!(m.modify_name_space("root/sec", true, false), Err(CimError::Failed(_))));
        m.modify_name_space("root/ro", false, false).unwrap();
        assert!(!m.get_name_space_attributes("root/ro").unwrap().shareable);

        m.modify_name_space_name("root", "base").unwrap();
        assert_eq!(m.get_name_space_attributes("root/sec").unwrap().parent.as_deref(), Some("base"));
        let mut deps = m.dependents("base").unwrap();
        deps.sort();
        assert_eq!(deps, vec!["root/ro", "root/sec"]);
        assert_eq!(m.get_super_class_name("root/sec", "Local").unwrap(), Some("Derived".into()));
    }

    #[test]
    fn test_delete_name_space() {
        let mut m = manager();
        assert!(matches!(m.delete_name_space("root"), Err(CimError::Failed(_))));
        m.delete_name_space("root/ro").unwrap();
        m.delete_name_space("root/sec").unwrap();
        m.delete_name_space("root").unwrap();
        assert!(m.get_name_space_names().is_empty());
        assert_eq!(
            m.delete_name_space("root"),
            Err(CimError::InvalidNamespace("root".into()))
        );
    }
}
