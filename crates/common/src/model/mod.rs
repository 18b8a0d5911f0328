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

mod errors;
mod object_path;
mod objects;

pub use errors::{CimError, CimStatusCode};
pub use object_path::{KeyBinding, KeyValue, ObjectPath, ObjectPathError};
pub use objects::{
    ASSOCIATION_QUALIFIER, CimClass, CimInstance, CimProperty, CimPropertyValue, CimQualifier,
    CimQualifierDecl, CimType, CimValue, QualifierScope,
};

/// True if `name` is a legal CIM class, property or qualifier name.
pub fn is_valid_name(name: &str) -> bool {
    object_path::is_valid_name(name)
}
