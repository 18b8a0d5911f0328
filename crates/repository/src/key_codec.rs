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

//! Canonical text keys for the line-oriented repository files.
//!
//! Every stored text field goes through [`escape`] so that it fits on one line: newline,
//! carriage return, tab and form feed become two-character sequences and the backslash is
//! doubled. [`unescape`] is the exact inverse.

use cim_common::ObjectPath;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyCodecError {
    #[error("dangling escape at end of {0:?}")]
    DanglingEscape(String),
    #[error("unknown escape \\{1} in {0:?}")]
    UnknownEscape(String, char),
    #[error("{0}")]
    InvalidPath(#[from] cim_common::ObjectPathError),
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\x0c' => escaped.push_str("\\f"),
            '\\' => escaped.push_str("\\\\"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn unescape(text: &str) -> Result<String, KeyCodecError> {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('t') => unescaped.push('\t'),
            Some('f') => unescaped.push('\x0c'),
            Some('\\') => unescaped.push('\\'),
            Some(other) => return Err(KeyCodecError::UnknownEscape(text.to_string(), other)),
            None => return Err(KeyCodecError::DanglingEscape(text.to_string())),
        }
    }
    Ok(unescaped)
}

/// The canonical (normalized, unescaped) key text for an object path.
pub fn canonical_key(path: &ObjectPath) -> String {
    path.normalized().to_string()
}

/// The escaped key text written to index files.
pub fn encode_key(path: &ObjectPath) -> String {
    escape(&canonical_key(path))
}

pub fn decode_key(escaped: &str) -> Result<ObjectPath, KeyCodecError> {
    Ok(unescape(escaped)?.parse()?)
}

/// Hash stored beside each key; always computed over the normalized path.
pub fn key_hash(path: &ObjectPath) -> u32 {
    path.hash_code()
}
