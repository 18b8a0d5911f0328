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

//! Turning qualifiers, classes and instances into bytes and back. The repository never looks
//! inside the encoded form; it only stores the buffers and asks for them to be decoded again.

use bincode::{Decode, Encode};
use thiserror::Error;

use crate::model::{CimClass, CimInstance, CimQualifierDecl};

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StreamerError {
    #[error("could not encode {0}: {1}")]
    Encode(&'static str, String),
    #[error("could not decode {0} at offset {1}: {2}")]
    Decode(&'static str, usize, String),
}

/// Encode/decode interface the repository uses for everything it persists.
///
/// `decode_*` take the full buffer and an offset into it, and return the decoded object along
/// with the number of bytes consumed, so that a bulk-loaded data file can be walked record by
/// record.
pub trait ObjectStreamer: Send + Sync {
    fn encode_qualifier(&self, qualifier: &CimQualifierDecl) -> Result<Vec<u8>, StreamerError>;
    fn decode_qualifier(
        &self,
        bytes: &[u8],
        offset: usize,
    ) -> Result<(CimQualifierDecl, usize), StreamerError>;

    fn encode_class(&self, class: &CimClass) -> Result<Vec<u8>, StreamerError>;
    fn decode_class(&self, bytes: &[u8], offset: usize) -> Result<(CimClass, usize), StreamerError>;

    fn encode_instance(&self, instance: &CimInstance) -> Result<Vec<u8>, StreamerError>;
    fn decode_instance(
        &self,
        bytes: &[u8],
        offset: usize,
    ) -> Result<(CimInstance, usize), StreamerError>;
}

/// Compact binary streamer backed by bincode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryStreamer;

impl BinaryStreamer {
    pub fn new() -> Self {
        Self
    }

    fn encode<T: Encode>(&self, what: &'static str, value: &T) -> Result<Vec<u8>, StreamerError> {
        bincode::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| StreamerError::Encode(what, e.to_string()))
    }

    fn decode<T: Decode<()>>(
        &self,
        what: &'static str,
        bytes: &[u8],
        offset: usize,
    ) -> Result<(T, usize), StreamerError> {
        let Some(slice) = bytes.get(offset..) else {
            return Err(StreamerError::Decode(
                what,
                offset,
                format!("offset past end of {}-byte buffer", bytes.len()),
            ));
        };
        bincode::decode_from_slice(slice, bincode::config::standard())
            .map_err(|e| StreamerError::Decode(what, offset, e.to_string()))
    }
}

impl ObjectStreamer for BinaryStreamer {
    fn encode_qualifier(&self, qualifier: &CimQualifierDecl) -> Result<Vec<u8>, StreamerError> {
        self.encode("qualifier", qualifier)
    }

    fn decode_qualifier(
        &self,
        bytes: &[u8],
        offset: usize,
    ) -> Result<(CimQualifierDecl, usize), StreamerError> {
        self.decode("qualifier", bytes, offset)
    }

    fn encode_class(&self, class: &CimClass) -> Result<Vec<u8>, StreamerError> {
        self.encode("class", class)
    }

    fn decode_class(&self, bytes: &[u8], offset: usize) -> Result<(CimClass, usize), StreamerError> {
        self.decode("class", bytes, offset)
    }

    fn encode_instance(&self, instance: &CimInstance) -> Result<Vec<u8>, StreamerError> {
        self.encode("instance", instance)
    }

    fn decode_instance(
        &self,
        bytes: &[u8],
        offset: usize,
    ) -> Result<(CimInstance, usize), StreamerError> {
        self.decode("instance", bytes, offset)
    }
}
