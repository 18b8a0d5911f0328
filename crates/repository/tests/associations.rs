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

//! Association tables maintained through the repository facade.

use cim_common::{CimClass, CimInstance, CimProperty, CimType, CimValue, ObjectPath};
use cim_repository::{NamespaceDefinition, Repository, RepositoryConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const NS: &str = "root/cimv2";

fn setup(tmpdir: &TempDir) -> Repository {
    let repo = Repository::open(RepositoryConfig::new(tmpdir.path())).unwrap();
    repo.create_name_space(&NamespaceDefinition::primary(NS)).unwrap();
    for name in ["Person", "Company"] {
        repo.create_class(
            NS,
            &CimClass::new(name, None).with_property(CimProperty::new("id", CimType::String).key()),
        )
        .unwrap();
    }
    repo.create_class(
        NS,
        &CimClass::new("Works", None)
            .association()
            .with_property(CimProperty::reference("emp", "Person").key())
            .with_property(CimProperty::reference("org", "Company")),
    )
    .unwrap();
    repo
}

fn create(repo: &Repository, class: &str, id: &str) -> ObjectPath {
    repo.create_instance(
        NS,
        &CimInstance::new(class).with_property("id", CimValue::String(id.into())),
    )
    .unwrap()
}

fn works(repo: &Repository, person: &ObjectPath, company: &ObjectPath) -> ObjectPath {
    repo.create_instance(
        NS,
        &CimInstance::new("Works")
            .with_property("emp", CimValue::Reference(person.clone()))
            .with_property("org", CimValue::Reference(company.clone())),
    )
    .unwrap()
}

#[test]
fn test_instance_association_is_symmetric() {
    let tmpdir = TempDir::new().unwrap();
    let repo = setup(&tmpdir);
    let pat = create(&repo, "Person", "pat");
    let acme = create(&repo, "Company", "acme");
    let link = works(&repo, &pat, &acme);

    assert_eq!(
        repo.associator_names(NS, &pat, None, None, "", "").unwrap(),
        vec![acme.clone()]
    );
    assert_eq!(
        repo.associator_names(NS, &acme, Some("Works"), Some("Person"), "org", "emp")
            .unwrap(),
        vec![pat.clone()]
    );
    assert_eq!(
        repo.reference_names(NS, &pat, None, "").unwrap(),
        vec![link.clone()]
    );
    assert!(repo.reference_names(NS, &pat, None, "org").unwrap().is_empty());
    assert!(
        repo.associator_names(NS, &pat, None, Some("Person"), "", "")
            .unwrap()
            .is_empty()
    );

    repo.delete_instance(NS, &link).unwrap();
    assert!(repo.associator_names(NS, &pat, None, None, "", "").unwrap().is_empty());
    assert!(repo.reference_names(NS, &acme, None, "").unwrap().is_empty());
}

#[test]
fn test_modified_association_follows_new_references() {
    let tmpdir = TempDir::new().unwrap();
    let repo = setup(&tmpdir);
    let pat = create(&repo, "Person", "pat");
    let acme = create(&repo, "Company", "acme");
    let initech = create(&repo, "Company", "initech");
    let link = works(&repo, &pat, &acme);

    // Same key, the non-key end moves.
    let mut moved = repo.get_instance(NS, &link).unwrap();
    moved.set_property("org", CimValue::Reference(initech.clone()));
    repo.modify_instance(NS, &link, &moved).unwrap();

    assert_eq!(
        repo.associator_names(NS, &pat, None, None, "", "").unwrap(),
        vec![initech.clone()]
    );
    assert!(repo.reference_names(NS, &acme, None, "").unwrap().is_empty());
    assert_eq!(repo.reference_names(NS, &initech, None, "").unwrap(), vec![link]);
}

#[test]
fn test_class_level_associations() {
    let tmpdir = TempDir::new().unwrap();
    let repo = setup(&tmpdir);
    let person = ObjectPath::class("Person");

    assert_eq!(
        repo.associator_names(NS, &person, None, None, "", "").unwrap(),
        vec![ObjectPath::class("Company")]
    );
    assert_eq!(
        repo.reference_names(NS, &person, None, "emp").unwrap(),
        vec![ObjectPath::class("Works")]
    );

    repo.delete_class(NS, "Works").unwrap();
    assert!(repo.reference_names(NS, &person, None, "").unwrap().is_empty());
}
