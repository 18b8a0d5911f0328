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

//! Values and interfaces shared between the CIM repository core and the layers that call into
//! it: object paths, the (deliberately small) class/instance/qualifier model, the protocol
//! error taxonomy and the object streamer used to turn those values into bytes.

pub mod model;
pub mod streamer;
pub mod tracing;

pub use model::{
    CimClass, CimError, CimInstance, CimProperty, CimPropertyValue, CimQualifier,
    CimQualifierDecl, CimStatusCode, CimType, CimValue, KeyBinding, KeyValue, ObjectPath,
    ObjectPathError, QualifierScope,
};
pub use streamer::{BinaryStreamer, ObjectStreamer, StreamerError};
