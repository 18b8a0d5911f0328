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

//! The slice of the CIM object model the repository needs to see. The repository treats these
//! as opaque payloads apart from names, superclass, key and reference properties.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use strum::Display;
use unicase::UniCase;

use crate::model::errors::CimError;
use crate::model::object_path::{KeyValue, ObjectPath};

/// Name of the qualifier that marks a class as an association.
pub const ASSOCIATION_QUALIFIER: &str = "Association";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Encode, Decode, Serialize, Deserialize)]
pub enum CimType {
    Boolean,
    String,
    Sint64,
    Uint64,
    Real64,
    DateTime,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub enum CimValue {
    Null,
    Boolean(bool),
    String(String),
    Sint64(i64),
    Uint64(u64),
    Real64(f64),
    DateTime(String),
    Reference(ObjectPath),
}

impl CimValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CimValue::Null)
    }

    /// The key-binding form of this value, if it can be used as a key.
    pub fn to_key_value(&self) -> Option<KeyValue> {
        match self {
            CimValue::Null => None,
            CimValue::Boolean(b) => Some(KeyValue::Boolean(*b)),
            CimValue::String(s) | CimValue::DateTime(s) => Some(KeyValue::String(s.clone())),
            CimValue::Sint64(i) => Some(KeyValue::Numeric(i.to_string())),
            CimValue::Uint64(u) => Some(KeyValue::Numeric(u.to_string())),
            CimValue::Real64(r) => Some(KeyValue::Numeric(r.to_string())),
            CimValue::Reference(p) => Some(KeyValue::String(p.normalized().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct CimQualifier {
    pub name: String,
    pub value: CimValue,
}

impl CimQualifier {
    pub fn new(name: impl Into<String>, value: CimValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Encode, Decode, Serialize, Deserialize)]
pub enum QualifierScope {
    Any,
    Class,
    Association,
    Property,
    Reference,
    Method,
}

/// A qualifier type declaration, as stored per namespace.
#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct CimQualifierDecl {
    pub name: String,
    pub cim_type: CimType,
    pub value: CimValue,
    pub scopes: Vec<QualifierScope>,
}

impl CimQualifierDecl {
    pub fn new(name: impl Into<String>, cim_type: CimType, value: CimValue) -> Self {
        Self {
            name: name.into(),
            cim_type,
            value,
            scopes: vec![QualifierScope::Any],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct CimProperty {
    pub name: String,
    pub cim_type: CimType,
    pub value: CimValue,
    pub is_key: bool,
    /// For reference properties, the class the reference points at.
    pub reference_class: Option<String>,
    pub qualifiers: Vec<CimQualifier>,
}

impl CimProperty {
    pub fn new(name: impl Into<String>, cim_type: CimType) -> Self {
        Self {
            name: name.into(),
            cim_type,
            value: CimValue::Null,
            is_key: false,
            reference_class: None,
            qualifiers: vec![],
        }
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn reference(name: impl Into<String>, reference_class: impl Into<String>) -> Self {
        Self {
            reference_class: Some(reference_class.into()),
            ..Self::new(name, CimType::Reference)
        }
    }

    pub fn with_default(mut self, value: CimValue) -> Self {
        self.value = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct CimClass {
    pub class_name: String,
    pub super_class_name: Option<String>,
    pub qualifiers: Vec<CimQualifier>,
    pub properties: Vec<CimProperty>,
}

impl CimClass {
    pub fn new(class_name: impl Into<String>, super_class_name: Option<&str>) -> Self {
        Self {
            class_name: class_name.into(),
            super_class_name: super_class_name.map(str::to_string),
            qualifiers: vec![],
            properties: vec![],
        }
    }

    pub fn with_property(mut self, property: CimProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_qualifier(mut self, qualifier: CimQualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// Mark this class as an association.
    pub fn association(self) -> Self {
        self.with_qualifier(CimQualifier::new(
            ASSOCIATION_QUALIFIER,
            CimValue::Boolean(true),
        ))
    }

    pub fn is_association(&self) -> bool {
        self.qualifier(ASSOCIATION_QUALIFIER)
            .is_some_and(|q| q.value == CimValue::Boolean(true))
    }

    pub fn qualifier(&self, name: &str) -> Option<&CimQualifier> {
        self.qualifiers
            .iter()
            .find(|q| UniCase::new(q.name.as_str()) == UniCase::new(name))
    }

    pub fn property(&self, name: &str) -> Option<&CimProperty> {
        self.properties
            .iter()
            .find(|p| UniCase::new(p.name.as_str()) == UniCase::new(name))
    }

    pub fn key_properties(&self) -> impl Iterator<Item = &CimProperty> {
        self.properties.iter().filter(|p| p.is_key)
    }

    pub fn reference_properties(&self) -> impl Iterator<Item = &CimProperty> {
        self.properties
            .iter()
            .filter(|p| p.cim_type == CimType::Reference)
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct CimPropertyValue {
    pub name: String,
    pub value: CimValue,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct CimInstance {
    pub class_name: String,
    pub properties: Vec<CimPropertyValue>,
    pub path: Option<ObjectPath>,
}

impl CimInstance {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            properties: vec![],
            path: None,
        }
    }

    /// Set (or replace) a property value.
    pub fn with_property(mut self, name: impl Into<String>, value: CimValue) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: CimValue) {
        let name = name.into();
        match self
            .properties
            .iter_mut()
            .find(|p| UniCase::new(p.name.as_str()) == UniCase::new(name.as_str()))
        {
            Some(existing) => existing.value = value,
            None => self.properties.push(CimPropertyValue { name, value }),
        }
    }

    pub fn property(&self, name: &str) -> Option<&CimValue> {
        self.properties
            .iter()
            .find(|p| UniCase::new(p.name.as_str()) == UniCase::new(name))
            .map(|p| &p.value)
    }

    /// Reference-valued properties, in declaration order.
    pub fn reference_values(&self) -> impl Iterator<Item = (&str, &ObjectPath)> {
        self.properties.iter().filter_map(|p| match &p.value {
            CimValue::Reference(path) => Some((p.name.as_str(), path)),
            _ => None,
        })
    }

    /// Derive this instance's object path from the key properties of its class. Key values
    /// missing from the instance fall back to the class default.
    pub fn build_path(&self, class: &CimClass) -> Result<ObjectPath, CimError> {
        let mut path = ObjectPath::class(class.class_name.clone());
        for key in class.key_properties() {
            let value = self
                .property(&key.name)
                .filter(|v| !v.is_null())
                .unwrap_or(&key.value);
            let Some(value) = value.to_key_value() else {
                return Err(CimError::InvalidParameter(format!(
                    "{}: key property {} has no value",
                    class.class_name, key.name
                )));
            };
            path = path.with_key(key.name.clone(), value);
        }
        if path.is_class_path() {
            return Err(CimError::InvalidParameter(format!(
                "{} declares no key properties",
                class.class_name
            )));
        }
        path.normalize();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee_class() -> CimClass {
        CimClass::new("Employee", Some("Person"))
            .with_property(CimProperty::new("ssn", CimType::String).key())
            .with_property(
                CimProperty::new("Region", CimType::Sint64)
                    .key()
                    .with_default(CimValue::Sint64(1)),
            )
            .with_property(CimProperty::new("name", CimType::String))
    }

    #[test]
    fn test_build_path_uses_keys_and_defaults() {
        let instance = CimInstance::new("Employee")
            .with_property("SSN", CimValue::String("444332222".into()))
            .with_property("name", CimValue::String("Pat".into()));
        let path = instance.build_path(&employee_class()).unwrap();
        assert_eq!(path.to_string(), r#"Employee.Region=1,ssn="444332222""#);
    }

    #[test]
    fn test_build_path_requires_key_values() {
        let instance = CimInstance::new("Employee");
        assert!(matches!(
            instance.build_path(&employee_class()),
            Err(CimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_association_flag() {
        let class = CimClass::new("Works", None)
            .association()
            .with_property(CimProperty::reference("Employee", "Employee").key())
            .with_property(CimProperty::reference("Employer", "Company").key());
        assert!(class.is_association());
        assert_eq!(class.reference_properties().count(), 2);
        assert!(!employee_class().is_association());
    }
}
