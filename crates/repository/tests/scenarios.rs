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

//! End-to-end namespace, class and instance scenarios through the repository facade.

use cim_common::{CimClass, CimError, CimInstance, CimProperty, CimType, CimValue, KeyValue, ObjectPath};
use cim_repository::{
    ClassModification, NamespaceDefinition, Repository, RepositoryConfig, RepositoryError,
};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use test_case::test_case;

const CIMV2: &str = "root/cimv2";

fn open(tmpdir: &TempDir) -> Repository {
    Repository::open(RepositoryConfig::new(tmpdir.path())).unwrap()
}

fn cim_error(result: Result<impl std::fmt::Debug, RepositoryError>) -> CimError {
    match result.unwrap_err() {
        RepositoryError::Cim(e) => e,
        other => panic!("expected a CIM error, got {other:?}"),
    }
}

fn namespace(name: &str, parent: Option<&str>, shareable: bool, updates_allowed: bool) -> NamespaceDefinition {
    NamespaceDefinition {
        name: name.into(),
        shareable,
        updates_allowed,
        parent: parent.map(str::to_string),
        remote_info: None,
    }
}

fn employee_class() -> CimClass {
    CimClass::new("Employee", None)
        .with_property(CimProperty::new("ssn", CimType::String).key())
        .with_property(CimProperty::new("salary", CimType::Uint64))
}

fn employee(ssn: &str, salary: u64) -> CimInstance {
    CimInstance::new("Employee")
        .with_property("ssn", CimValue::String(ssn.into()))
        .with_property("salary", CimValue::Uint64(salary))
}

fn with_cimv2(tmpdir: &TempDir) -> Repository {
    let repo = open(tmpdir);
    repo.create_name_space(&NamespaceDefinition::primary(CIMV2)).unwrap();
    repo
}

#[test]
fn test_class_hierarchy_in_new_namespace() {
    let tmpdir = TempDir::new().unwrap();
    let repo = with_cimv2(&tmpdir);
    repo.create_class(CIMV2, &CimClass::new("Base", None)).unwrap();
    repo.create_class(CIMV2, &CimClass::new("Derived", Some("Base")))
        .unwrap();

    assert_eq!(
        repo.get_super_class_name(CIMV2, "Derived").unwrap(),
        Some("Base".to_string())
    );
    assert_eq!(
        cim_error(repo.delete_class(CIMV2, "Base")),
        CimError::ClassHasChildren("Base".into())
    );

    repo.delete_class(CIMV2, "Derived").unwrap();
    repo.delete_class(CIMV2, "Base").unwrap();
    assert!(repo.enumerate_class_names(CIMV2, None, true).unwrap().is_empty());
}

#[test]
fn test_repeated_modification_compacts() {
    let tmpdir = TempDir::new().unwrap();
    let repo = with_cimv2(&tmpdir);
    repo.create_class(CIMV2, &employee_class()).unwrap();

    let path = repo.create_instance(CIMV2, &employee("444332222", 0)).unwrap();
    assert_eq!(path.to_string(), r#"Employee.ssn="444332222""#);

    for salary in 1..=17 {
        repo.modify_instance(CIMV2, &path, &employee("444332222", salary))
            .unwrap();
    }

    let stored = repo.get_instance(CIMV2, &path).unwrap();
    assert_eq!(stored.property("salary"), Some(&CimValue::Uint64(17)));

    // Compaction ran at the 16th freed entry; one more modification followed.
    let index = tmpdir.path().join("root#cimv2/instances/employee.idx");
    let text = fs::read_to_string(&index).unwrap();
    assert!(text.starts_with("00000001\n"), "unexpected header in {text:?}");
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_instance_crud_and_enumeration_over_subclasses() {
    let tmpdir = TempDir::new().unwrap();
    let repo = with_cimv2(&tmpdir);
    repo.create_class(CIMV2, &employee_class()).unwrap();
    repo.create_class(
        CIMV2,
        &CimClass::new("Manager", Some("Employee"))
            .with_property(CimProperty::new("ssn", CimType::String).key()),
    )
    .unwrap();

    let worker = repo.create_instance(CIMV2, &employee("1", 10)).unwrap();
    let boss = repo
        .create_instance(
            CIMV2,
            &CimInstance::new("Manager").with_property("ssn", CimValue::String("2".into())),
        )
        .unwrap();
    assert_eq!(
        cim_error(repo.create_instance(CIMV2, &employee("1", 99))),
        CimError::AlreadyExists(r#"Employee.ssn="1""#.into())
    );

    let names = repo.enumerate_instance_names(CIMV2, "Employee").unwrap();
    assert_eq!(names, vec![worker.clone(), boss.clone()]);
    assert_eq!(repo.enumerate_instances(CIMV2, "Manager").unwrap().len(), 1);

    assert_eq!(
        cim_error(repo.delete_class(CIMV2, "Manager")),
        CimError::ClassHasInstances("Manager".into())
    );
    repo.delete_instance(CIMV2, &boss).unwrap();
    repo.delete_class(CIMV2, "Manager").unwrap();

    assert!(matches!(
        cim_error(repo.get_instance(CIMV2, &boss)),
        CimError::InvalidClass(_)
    ));
    let missing = ObjectPath::class("Employee").with_key("ssn", KeyValue::String("3".into()));
    assert!(matches!(
        cim_error(repo.get_instance(CIMV2, &missing)),
        CimError::NotFound(_)
    ));
}

#[test]
fn test_shared_schema() {
    let tmpdir = TempDir::new().unwrap();
    let repo = open(&tmpdir);
    repo.create_name_space(&NamespaceDefinition::primary("root")).unwrap();
    repo.create_name_space(&namespace("root/rw", Some("root"), true, true))
        .unwrap();
    repo.create_name_space(&namespace("root/ro", Some("root"), false, false))
        .unwrap();
    repo.create_class("root", &employee_class()).unwrap();
    repo.create_class(
        "root/rw",
        &CimClass::new("Contractor", Some("Employee"))
            .with_property(CimProperty::new("ssn", CimType::String).key()),
    )
    .unwrap();

    // Schema writes into a read-only namespace are refused, instances are not.
    assert!(matches!(
        cim_error(repo.create_class("root/ro", &CimClass::new("X", None))),
        CimError::AccessDenied(_)
    ));
    let path = repo.create_instance("root/ro", &employee("7", 1)).unwrap();
    assert_eq!(repo.get_instance("root/ro", &path).unwrap().class_name, "Employee");
    assert!(repo.enumerate_instance_names("root", "Employee").unwrap().is_empty());

    // A class in use by a dependent namespace cannot be deleted from the primary.
    assert_eq!(
        cim_error(repo.delete_class("root", "Employee")),
        CimError::ClassHasChildren("Employee".into())
    );
    repo.delete_class("root/rw", "Contractor").unwrap();
    assert_eq!(
        cim_error(repo.delete_class("root", "Employee")),
        CimError::ClassHasInstances("Employee".into())
    );

    assert_eq!(
        repo.enumerate_class_names("root/rw", None, false).unwrap(),
        vec!["Employee"]
    );
}

#[test]
fn test_dependent_namespace_enumerates_deeply_from_top() {
    let tmpdir = TempDir::new().unwrap();
    let repo = open(&tmpdir);
    repo.create_name_space(&NamespaceDefinition::primary("root")).unwrap();
    repo.create_name_space(&namespace("root/ro", Some("root"), false, false))
        .unwrap();
    repo.create_class("root", &CimClass::new("Base", None)).unwrap();
    repo.create_class("root", &CimClass::new("Derived", Some("Base")))
        .unwrap();

    assert_eq!(repo.enumerate_class_names("root", None, false).unwrap(), vec!["Base"]);
    assert_eq!(
        repo.enumerate_class_names("root/ro", None, false).unwrap(),
        vec!["Base", "Derived"]
    );
    assert_eq!(
        repo.enumerate_class_names("root/ro", Some("Base"), false).unwrap(),
        vec!["Derived"]
    );
}

#[test_case(Some("root/sec"), true, CimError::InvalidNamespace(String::new()); "read-write below a secondary")]
#[test_case(Some("private"), false, CimError::AccessDenied(String::new()); "parent not shareable")]
#[test_case(Some("missing"), false, CimError::InvalidNamespace(String::new()); "missing parent")]
fn test_namespace_sharing_depth(parent: Option<&str>, updates_allowed: bool, expected: CimError) {
    let tmpdir = TempDir::new().unwrap();
    let repo = open(&tmpdir);
    repo.create_name_space(&NamespaceDefinition::primary("root")).unwrap();
    repo.create_name_space(&namespace("root/sec", Some("root"), true, true))
        .unwrap();
    repo.create_name_space(&namespace("private", None, false, true))
        .unwrap();

    let err = cim_error(repo.create_name_space(&namespace("child", parent, false, updates_allowed)));
    assert_eq!(err.status_code(), expected.status_code());
    assert!(!tmpdir.path().join("child").exists());
}

#[test]
fn test_namespace_lifecycle() {
    let tmpdir = TempDir::new().unwrap();
    let repo = open(&tmpdir);
    repo.create_name_space(&NamespaceDefinition::primary("root")).unwrap();
    repo.create_name_space(&NamespaceDefinition {
        remote_info: Some("https://broker.example:5989".into()),
        ..namespace("root/remote", Some("root"), true, true)
    })
    .unwrap();
    assert_eq!(
        repo.is_remote_name_space("root/remote").unwrap().as_deref(),
        Some("https://broker.example:5989")
    );
    assert!(matches!(
        cim_error(repo.delete_name_space("root")),
        CimError::AccessDenied(_)
    ));

    repo.create_class("root/remote", &CimClass::new("Thing", None))
        .unwrap();
    assert!(matches!(
        cim_error(repo.delete_name_space("root/remote")),
        CimError::Failed(_)
    ));
    repo.delete_class("root/remote", "Thing").unwrap();

    repo.modify_name_space_name("root/remote", "root/moved").unwrap();
    repo.modify_name_space("root/moved", false, true).unwrap();
    let attributes = repo.get_name_space_attributes("root/moved").unwrap();
    assert!(!attributes.shareable);
    assert_eq!(attributes.parent.as_deref(), Some("root"));

    repo.delete_name_space("root/moved").unwrap();
    assert_eq!(repo.enumerate_name_spaces(), vec!["root"]);
    drop(repo);
    assert_eq!(open(&tmpdir).enumerate_name_spaces(), vec!["root"]);
}

#[test]
fn test_modify_class() {
    let tmpdir = TempDir::new().unwrap();
    let repo = with_cimv2(&tmpdir);
    repo.create_class(CIMV2, &CimClass::new("A", None)).unwrap();
    repo.create_class(CIMV2, &CimClass::new("B", None)).unwrap();
    repo.create_class(CIMV2, &CimClass::new("C", Some("A"))).unwrap();

    let moved = CimClass::new("C", Some("B"));
    assert!(matches!(
        cim_error(repo.modify_class(CIMV2, &moved, ClassModification::default())),
        CimError::InvalidSuperclass { .. }
    ));
    repo.modify_class(
        CIMV2,
        &moved,
        ClassModification {
            allow_superclass_change: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(repo.get_super_class_name(CIMV2, "C").unwrap(), Some("B".into()));
    assert_eq!(repo.get_class(CIMV2, "c").unwrap().super_class_name, Some("B".into()));
    assert_eq!(
        cim_error(repo.modify_class(CIMV2, &CimClass::new("B", None), ClassModification::default())),
        CimError::ClassHasChildren("B".into())
    );
    repo.modify_class(
        CIMV2,
        &CimClass::new("B", None).with_property(CimProperty::new("note", CimType::String)),
        ClassModification {
            allow_non_leaf_modification: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(repo.get_class(CIMV2, "B").unwrap().properties.len(), 1);

    drop(repo);
    let repo = open(&tmpdir);
    assert_eq!(
        repo.enumerate_class_names(CIMV2, Some("B"), false).unwrap(),
        vec!["C"]
    );
}
