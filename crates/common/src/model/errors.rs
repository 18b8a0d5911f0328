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

use bincode::{Decode, Encode};
use strum::{Display, FromRepr};
use thiserror::Error;

/// WBEM status codes, as carried on the wire by the dispatch layer.
#[repr(u16)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, FromRepr, Encode, Decode)]
pub enum CimStatusCode {
    Failed = 1,
    AccessDenied = 2,
    InvalidNamespace = 3,
    InvalidParameter = 4,
    InvalidClass = 5,
    NotFound = 6,
    NotSupported = 7,
    ClassHasChildren = 8,
    ClassHasInstances = 9,
    InvalidSuperclass = 10,
    AlreadyExists = 11,
}

/// Errors raised by the repository and namespace manager which the dispatch layer reports to
/// clients verbatim. Each carries the name(s) of the offending namespace, class or object.
#[derive(Error, Debug, Eq, PartialEq, Clone, Encode, Decode)]
pub enum CimError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid superclass {superclass} for class {class}")]
    InvalidSuperclass { class: String, superclass: String },
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Class has subclasses: {0}")]
    ClassHasChildren(String),
    #[error("Class has instances: {0}")]
    ClassHasInstances(String),
    #[error("Invalid class: {0}")]
    InvalidClass(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Operation failed: {0}")]
    Failed(String),
}

impl CimError {
    pub fn status_code(&self) -> CimStatusCode {
        match self {
            Self::NotFound(_) => CimStatusCode::NotFound,
            Self::AlreadyExists(_) => CimStatusCode::AlreadyExists,
            Self::InvalidSuperclass { .. } => CimStatusCode::InvalidSuperclass,
            Self::InvalidNamespace(_) => CimStatusCode::InvalidNamespace,
            Self::AccessDenied(_) => CimStatusCode::AccessDenied,
            Self::ClassHasChildren(_) => CimStatusCode::ClassHasChildren,
            Self::ClassHasInstances(_) => CimStatusCode::ClassHasInstances,
            Self::InvalidClass(_) => CimStatusCode::InvalidClass,
            Self::InvalidParameter(_) => CimStatusCode::InvalidParameter,
            Self::NotSupported(_) => CimStatusCode::NotSupported,
            Self::Failed(_) => CimStatusCode::Failed,
        }
    }
}
