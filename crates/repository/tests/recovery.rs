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

//! Crash simulation: transactions abandoned mid-flight are undone when the store reopens.

use cim_common::{CimError, CimInstance, CimValue, KeyValue, ObjectPath};
use cim_repository::transaction::BEGIN_PROGRESS;
use cim_repository::{
    FileBasedStore, InstanceTransactionHandler, NamespaceDefinition, RepositoryConfig,
    RepositoryError,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::mem;
use tempfile::TempDir;

const NS: &str = "root/cimv2";

fn employee(ssn: &str) -> (ObjectPath, CimInstance) {
    let path = ObjectPath::class("Employee").with_key("ssn", KeyValue::String(ssn.into()));
    let instance = CimInstance::new("Employee").with_property("ssn", CimValue::String(ssn.into()));
    (path, instance)
}

fn store_with_employee(tmpdir: &TempDir) -> FileBasedStore {
    let mut store = FileBasedStore::open(RepositoryConfig::new(tmpdir.path())).unwrap();
    store
        .create_namespace(&NamespaceDefinition::primary(NS))
        .unwrap();
    let (path, instance) = employee("1");
    store.create_instance(NS, &path, &instance, false).unwrap();
    store
}

#[test]
fn test_abandoned_create_is_rolled_back_on_open() {
    let tmpdir = TempDir::new().unwrap();
    let store = store_with_employee(&tmpdir);
    let files = store.instance_files(NS, "Employee").unwrap();
    let index_before = fs::read(files.index.path()).unwrap();
    let data_before = fs::read(files.data.path()).unwrap();

    let (path, instance) = employee("2");
    let handler = InstanceTransactionHandler::new(&files).unwrap();
    let offset = files
        .data
        .append_instance(format!("{instance:?}").as_bytes())
        .unwrap();
    files.index.create_entry(&path, offset, 8).unwrap();
    // The process dies here: neither complete() nor the drop-time rollback runs.
    mem::forget(handler);
    drop(store);

    let store = FileBasedStore::open(RepositoryConfig::new(tmpdir.path())).unwrap();
    let report = store.recovery_report();
    assert_eq!(report.orphan_rollbacks, vec![files.index.path().to_path_buf()]);
    assert!(!files.has_rollback());

    assert_eq!(fs::read(files.index.path()).unwrap(), index_before);
    assert_eq!(fs::read(files.data.path()).unwrap(), data_before);
    assert_eq!(files.data.size().unwrap(), data_before.len() as u64);
    assert!(matches!(
        store.get_instance(NS, &path),
        Err(RepositoryError::Cim(CimError::NotFound(_)))
    ));
    assert_eq!(store.get_instance(NS, &employee("1").0).unwrap(), {
        let (path, mut instance) = employee("1");
        instance.path = Some(path);
        instance
    });
}

#[test]
fn test_append_without_index_update() {
    let tmpdir = TempDir::new().unwrap();
    let store = store_with_employee(&tmpdir);
    let files = store.instance_files(NS, "Employee").unwrap();
    let size_before = files.data.size().unwrap();

    let handler = InstanceTransactionHandler::new(&files).unwrap();
    files.data.append_instance(b"torn write").unwrap();
    mem::forget(handler);
    drop(store);

    let store = FileBasedStore::open(RepositoryConfig::new(tmpdir.path())).unwrap();
    assert!(!store.recovery_report().is_clean());
    assert_eq!(files.data.size().unwrap(), size_before);
    assert!(!store.instance_exists(NS, &employee("2").0).unwrap());
    assert_eq!(store.enumerate_instances_for_class(NS, "Employee").unwrap().len(), 1);
}

#[test]
fn test_dropped_handler_rolls_back_immediately() {
    let tmpdir = TempDir::new().unwrap();
    let store = store_with_employee(&tmpdir);
    let files = store.instance_files(NS, "Employee").unwrap();
    let index_before = fs::read(files.index.path()).unwrap();

    {
        let _handler = InstanceTransactionHandler::new(&files).unwrap();
        files.index.delete_entry(&employee("1").0).unwrap();
    }

    assert_eq!(fs::read(files.index.path()).unwrap(), index_before);
    assert!(store.instance_exists(NS, &employee("1").0).unwrap());
    drop(store);
    let store = FileBasedStore::open(RepositoryConfig::new(tmpdir.path())).unwrap();
    assert!(store.recovery_report().is_clean());
}

#[test]
fn test_torn_begin_is_discarded_not_restored() {
    let tmpdir = TempDir::new().unwrap();
    let store = store_with_employee(&tmpdir);
    let (second, instance) = employee("2");
    store.create_instance(NS, &second, &instance, false).unwrap();
    let files = store.instance_files(NS, "Employee").unwrap();
    let index_before = fs::read(files.index.path()).unwrap();

    // A begin that died while copying the index: half a snapshot and its marker.
    fs::write(files.index.rollback_path(), &index_before[..index_before.len() / 2]).unwrap();
    fs::write(files.instance_dir.join(BEGIN_PROGRESS), b"").unwrap();

    // Reads leave the files alone.
    assert!(store.instance_exists(NS, &employee("1").0).unwrap());
    assert_eq!(fs::read(files.index.path()).unwrap(), index_before);
    assert!(files.has_rollback());

    // The next write discards the partial snapshot instead of restoring from it.
    let (third, instance) = employee("3");
    store.create_instance(NS, &third, &instance, false).unwrap();
    assert!(!files.has_rollback());
    assert!(!files.instance_dir.join(BEGIN_PROGRESS).exists());
    for ssn in ["1", "2", "3"] {
        assert!(store.instance_exists(NS, &employee(ssn).0).unwrap());
    }

    drop(store);
    let store = FileBasedStore::open(RepositoryConfig::new(tmpdir.path())).unwrap();
    assert!(store.recovery_report().is_clean());
    assert_eq!(store.enumerate_instances_for_class(NS, "Employee").unwrap().len(), 3);
}

#[test]
fn test_torn_begin_found_at_open() {
    let tmpdir = TempDir::new().unwrap();
    let store = store_with_employee(&tmpdir);
    let files = store.instance_files(NS, "Employee").unwrap();
    let index_before = fs::read(files.index.path()).unwrap();
    fs::write(files.index.rollback_path(), &index_before[..index_before.len() / 2]).unwrap();
    fs::write(files.instance_dir.join(BEGIN_PROGRESS), b"").unwrap();
    drop(store);

    let store = FileBasedStore::open(RepositoryConfig::new(tmpdir.path())).unwrap();
    assert_eq!(store.recovery_report().undone_begins, vec![files.index.path().to_path_buf()]);
    assert_eq!(fs::read(files.index.path()).unwrap(), index_before);
    assert!(store.instance_exists(NS, &employee("1").0).unwrap());
}
