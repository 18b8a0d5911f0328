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

use cim_common::CimError;
use std::collections::HashMap;
use unicase::UniCase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNode {
    pub name: String,
    pub super_class: Option<String>,
}

/// Single-inheritance class graph of one namespace. Superclasses may live in the parent
/// namespace's tree, so the subclass map is keyed by name rather than by node.
#[derive(Debug, Clone, Default)]
pub struct InheritanceTree {
    nodes: HashMap<UniCase<String>, ClassNode>,
    subclasses: HashMap<UniCase<String>, Vec<String>>,
}

fn key(name: &str) -> UniCase<String> {
    UniCase::new(name.to_string())
}

impl InheritanceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(class, superclass)` pairs in any order. Fails with
    /// `InvalidSuperclass` if some superclass is in neither this set nor `parent`.
    pub fn from_pairs(
        pairs: Vec<(String, Option<String>)>,
        parent: Option<&InheritanceTree>,
    ) -> Result<Self, CimError> {
        let mut tree = Self::new();
        let mut pending = pairs;
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = vec![];
            for (class, super_class) in pending {
                let ready = match &super_class {
                    None => true,
                    Some(s) => tree.contains(s) || parent.is_some_and(|p| p.contains(s)),
                };
                if ready {
                    tree.insert(&class, super_class.as_deref(), parent)?;
                } else {
                    deferred.push((class, super_class));
                }
            }
            if deferred.len() == before {
                let (class, super_class) = deferred.swap_remove(0);
                return Err(CimError::InvalidSuperclass {
                    class,
                    superclass: super_class.unwrap_or_default(),
                });
            }
            pending = deferred;
        }
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.nodes.contains_key(&key(class))
    }

    pub fn get(&self, class: &str) -> Option<&ClassNode> {
        self.nodes.get(&key(class))
    }

    /// Add `class` under `super_class`, which must already be in this tree or in `parent`.
    pub fn insert(
        &mut self,
        class: &str,
        super_class: Option<&str>,
        parent: Option<&InheritanceTree>,
    ) -> Result<(), CimError> {
        if self.contains(class) {
            return Err(CimError::AlreadyExists(class.to_string()));
        }
        if let Some(super_class) = super_class {
            if !self.contains(super_class) && !parent.is_some_and(|p| p.contains(super_class)) {
                return Err(CimError::InvalidSuperclass {
                    class: class.to_string(),
                    superclass: super_class.to_string(),
                });
            }
            self.subclasses
                .entry(key(super_class))
                .or_default()
                .push(class.to_string());
        }
        self.nodes.insert(
            key(class),
            ClassNode {
                name: class.to_string(),
                super_class: super_class.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Remove a leaf class.
    pub fn remove(&mut self, class: &str) -> Result<ClassNode, CimError> {
        if self.has_subclasses(class) {
            return Err(CimError::ClassHasChildren(class.to_string()));
        }
        let node = self
            .nodes
            .remove(&key(class))
            .ok_or_else(|| CimError::NotFound(class.to_string()))?;
        self.unlink(&node);
        Ok(node)
    }

    /// Move `class` under `new_super`. Rejects a superclass that does not exist or that would
    /// make the class its own ancestor.
    pub fn reparent(
        &mut self,
        class: &str,
        new_super: Option<&str>,
        parent: Option<&InheritanceTree>,
    ) -> Result<(), CimError> {
        let node = self
            .get(class)
            .cloned()
            .ok_or_else(|| CimError::NotFound(class.to_string()))?;
        if let Some(new_super) = new_super {
            let invalid = || CimError::InvalidSuperclass {
                class: class.to_string(),
                superclass: new_super.to_string(),
            };
            if !self.contains(new_super) && !parent.is_some_and(|p| p.contains(new_super)) {
                return Err(invalid());
            }
            if self.is_same_or_ancestor(class, new_super) {
                return Err(invalid());
            }
        }
        self.unlink(&node);
        if let Some(new_super) = new_super {
            self.subclasses
                .entry(key(new_super))
                .or_default()
                .push(node.name.clone());
        }
        self.nodes.insert(
            key(class),
            ClassNode {
                name: node.name,
                super_class: new_super.map(str::to_string),
            },
        );
        Ok(())
    }

    /// True if `ancestor` is `class` or one of its superclasses within this tree.
    pub fn is_same_or_ancestor(&self, ancestor: &str, class: &str) -> bool {
        let target = key(ancestor);
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            if key(&name) == target {
                return true;
            }
            current = self.get(&name).and_then(|n| n.super_class.clone());
        }
        false
    }

    fn unlink(&mut self, node: &ClassNode) {
        let Some(super_class) = &node.super_class else {
            return;
        };
        let super_key = key(super_class);
        if let Some(children) = self.subclasses.get_mut(&super_key) {
            children.retain(|c| UniCase::new(c.as_str()) != UniCase::new(node.name.as_str()));
            if children.is_empty() {
                self.subclasses.remove(&super_key);
            }
        }
    }

    pub fn super_class_name(&self, class: &str) -> Option<Option<&str>> {
        self.get(class).map(|n| n.super_class.as_deref())
    }

    /// Direct subclasses of `class` recorded in this tree. `class` itself may belong to
    /// another tree.
    pub fn direct_subclasses(&self, class: &str) -> &[String] {
        self.subclasses
            .get(&key(class))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_subclasses(&self, class: &str) -> bool {
        !self.direct_subclasses(class).is_empty()
    }

    /// Classes without a superclass, sorted by name.
    pub fn root_classes(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.super_class.is_none())
            .map(|n| n.name.clone())
            .collect();
        roots.sort_by_key(|n| n.to_lowercase());
        roots
    }

    /// Subclasses of `class`, breadth first; only direct ones unless `deep`.
    #[cfg(test)]
    pub fn sub_class_names(&self, class: &str, deep: bool) -> Vec<String> {
        let mut names = vec![];
        let mut queue = std::collections::VecDeque::from([class.to_string()]);
        while let Some(next) = queue.pop_front() {
            for child in self.direct_subclasses(&next) {
                names.push(child.clone());
                if deep {
                    queue.push_back(child.clone());
                }
            }
        }
        names
    }
}
