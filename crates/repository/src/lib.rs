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

//! File-based CIM repository: per-class instance index/data files with crash-safe
//! transactions, association tables, and the namespace/inheritance catalog that validates
//! every schema operation.

pub mod assoc_table;
pub mod config;
pub mod data_file;
pub mod error;
pub mod index_file;
pub mod key_codec;
pub mod namespace;
pub mod repository;
pub mod store;
pub mod transaction;

pub use assoc_table::{AssociationEntry, AssociationTable};
pub use config::{DEFAULT_COMPACTION_THRESHOLD, RepositoryConfig};
pub use data_file::InstanceDataFile;
pub use error::RepositoryError;
pub use index_file::{IndexEntry, InstanceIndexFile};
pub use namespace::{InheritanceTree, NameSpace, NameSpaceManager};
pub use repository::{ClassModification, ROOT_NAMESPACE, Repository};
pub use store::{FileBasedStore, NamespaceDefinition, RecoveryReport};
pub use transaction::{InstanceFileSet, InstanceTransactionHandler};
