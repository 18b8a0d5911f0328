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
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;
use unicase::UniCase;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object path {path:?}: {reason}")]
pub struct ObjectPathError {
    pub path: String,
    pub reason: &'static str,
}

/// The value half of a key binding. Numeric keys keep their textual form so that the
/// canonical rendering is stable regardless of the integer/real width used by the class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize)]
pub enum KeyValue {
    String(String),
    Boolean(bool),
    Numeric(String),
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")
            }
            KeyValue::Boolean(true) => f.write_str("TRUE"),
            KeyValue::Boolean(false) => f.write_str("FALSE"),
            KeyValue::Numeric(n) => f.write_str(n),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode, Serialize, Deserialize)]
pub struct KeyBinding {
    pub name: String,
    pub value: KeyValue,
}

impl KeyBinding {
    pub fn new(name: impl Into<String>, value: KeyValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Key property names compare without regard to case; values compare exactly.
impl PartialEq for KeyBinding {
    fn eq(&self, other: &Self) -> bool {
        UniCase::new(self.name.as_str()) == UniCase::new(other.name.as_str())
            && self.value == other.value
    }
}

impl Eq for KeyBinding {}

/// Identifies a class (no key bindings) or an instance (class name plus key bindings) within a
/// namespace. Host and namespace qualification are handled by the caller.
#[derive(Debug, Clone, Encode, Decode, Serialize, Deserialize)]
pub struct ObjectPath {
    pub class_name: String,
    pub key_bindings: Vec<KeyBinding>,
}

impl ObjectPath {
    pub fn class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            key_bindings: vec![],
        }
    }

    pub fn instance(class_name: impl Into<String>, key_bindings: Vec<KeyBinding>) -> Self {
        Self {
            class_name: class_name.into(),
            key_bindings,
        }
    }

    pub fn with_key(mut self, name: impl Into<String>, value: KeyValue) -> Self {
        self.key_bindings.push(KeyBinding::new(name, value));
        self
    }

    pub fn is_class_path(&self) -> bool {
        self.key_bindings.is_empty()
    }

    pub fn key(&self, name: &str) -> Option<&KeyValue> {
        self.key_bindings
            .iter()
            .find(|b| UniCase::new(b.name.as_str()) == UniCase::new(name))
            .map(|b| &b.value)
    }

    /// Sort key bindings by (case-folded) name so that two paths naming the same instance
    /// render identically.
    pub fn normalize(&mut self) {
        self.key_bindings
            .sort_by_cached_key(|b| b.name.to_lowercase());
    }

    pub fn normalized(&self) -> Self {
        let mut path = self.clone();
        path.normalize();
        path
    }

    /// A stable 32-bit hash of the normalized path, used as a cheap pre-filter before a full
    /// key comparison. Stable across processes and platforms, since it is persisted.
    pub fn hash_code(&self) -> u32 {
        crc32fast::hash(self.folded_text().as_bytes())
    }

    /// Normalized text with class and key names case-folded; the basis of both `Hash` and
    /// `hash_code`.
    fn folded_text(&self) -> String {
        let mut text = self.class_name.to_lowercase();
        for (i, binding) in self.sorted_bindings().into_iter().enumerate() {
            text.push(if i == 0 { '.' } else { ',' });
            text.push_str(&binding.name.to_lowercase());
            text.push('=');
            text.push_str(&binding.value.to_string());
        }
        text
    }

    fn sorted_bindings(&self) -> Vec<&KeyBinding> {
        let mut bindings: Vec<&KeyBinding> = self.key_bindings.iter().collect();
        bindings.sort_by_cached_key(|b| b.name.to_lowercase());
        bindings
    }
}

impl PartialEq for ObjectPath {
    fn eq(&self, other: &Self) -> bool {
        UniCase::new(self.class_name.as_str()) == UniCase::new(other.class_name.as_str())
            && self.key_bindings.len() == other.key_bindings.len()
            && self
                .sorted_bindings()
                .iter()
                .zip(other.sorted_bindings())
                .all(|(a, b)| *a == b)
    }
}

impl Eq for ObjectPath {}

impl Hash for ObjectPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded_text().hash(state);
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.class_name)?;
        for (i, binding) in self.key_bindings.iter().enumerate() {
            f.write_str(if i == 0 { "." } else { "," })?;
            write!(f, "{}={}", binding.name, binding.value)?;
        }
        Ok(())
    }
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl FromStr for ObjectPath {
    type Err = ObjectPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ObjectPathError {
            path: s.to_string(),
            reason,
        };

        let (class_name, keys) = match s.split_once('.') {
            Some((class_name, keys)) => (class_name, Some(keys)),
            None => (s, None),
        };
        if !is_valid_name(class_name) {
            return Err(invalid("invalid class name"));
        }
        let mut path = ObjectPath::class(class_name);
        let Some(keys) = keys else {
            return Ok(path);
        };

        let mut chars = keys.chars().peekable();
        loop {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('=') => break,
                    Some(c) => name.push(c),
                    None => return Err(invalid("key binding without a value")),
                }
            }
            if !is_valid_name(&name) {
                return Err(invalid("invalid key property name"));
            }

            let value = if chars.peek() == Some(&'"') {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(c @ ('\\' | '"')) => value.push(c),
                            _ => return Err(invalid("bad escape in quoted key value")),
                        },
                        Some('"') => break,
                        Some(c) => value.push(c),
                        None => return Err(invalid("unterminated quoted key value")),
                    }
                }
                KeyValue::String(value)
            } else {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                if value.eq_ignore_ascii_case("true") {
                    KeyValue::Boolean(true)
                } else if value.eq_ignore_ascii_case("false") {
                    KeyValue::Boolean(false)
                } else if value.is_empty() || value.contains(['"', '=']) {
                    return Err(invalid("malformed key value"));
                } else {
                    KeyValue::Numeric(value)
                }
            };
            path.key_bindings.push(KeyBinding::new(name, value));

            match chars.next() {
                None => break,
                Some(',') => continue,
                Some(_) => return Err(invalid("expected ',' between key bindings")),
            }
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn employee() -> ObjectPath {
        ObjectPath::class("Employee")
            .with_key("ssn", KeyValue::String("444332222".into()))
            .with_key("Active", KeyValue::Boolean(true))
            .with_key("dept", KeyValue::Numeric("12".into()))
    }

    #[test]
    fn test_display_and_parse() {
        let path = employee();
        let text = path.to_string();
        assert_eq!(text, r#"Employee.ssn="444332222",Active=TRUE,dept=12"#);
        let parsed: ObjectPath = text.parse().unwrap();
        assert_eq!(parsed, path);
        assert_eq!(parsed.key("SSN"), Some(&KeyValue::String("444332222".into())));
    }

    #[test]
    fn test_quoted_values_survive() {
        let inner = employee().to_string();
        let path = ObjectPath::class("Assoc").with_key("antecedent", KeyValue::String(inner));
        let parsed: ObjectPath = path.to_string().parse().unwrap();
        assert_eq!(parsed, path);
        let KeyValue::String(inner) = parsed.key("antecedent").unwrap() else {
            panic!("expected a string key");
        };
        assert_eq!(inner.parse::<ObjectPath>().unwrap(), employee());
    }

    #[test]
    fn test_equality_ignores_case_and_order() {
        let a = employee();
        let b = ObjectPath::class("EMPLOYEE")
            .with_key("DEPT", KeyValue::Numeric("12".into()))
            .with_key("active", KeyValue::Boolean(true))
            .with_key("SSN", KeyValue::String("444332222".into()));
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());

        let c = ObjectPath::class("Employee")
            .with_key("ssn", KeyValue::String("444332223".into()))
            .with_key("Active", KeyValue::Boolean(true))
            .with_key("dept", KeyValue::Numeric("12".into()));
        assert_ne!(a, c);
    }

    #[test]
    fn test_normalize_sorts_bindings() {
        let normalized = employee().normalized();
        let names: Vec<_> = normalized
            .key_bindings
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["Active", "dept", "ssn"]);
    }

    #[test]
    fn test_class_path() {
        let path: ObjectPath = "CIM_ManagedElement".parse().unwrap();
        assert!(path.is_class_path());
        assert_eq!(path.to_string(), "CIM_ManagedElement");
    }

    #[test_case(""; "empty")]
    #[test_case("9Class"; "leading digit")]
    #[test_case("Class.key"; "missing value")]
    #[test_case("Class.key=\"open"; "unterminated")]
    #[test_case("Class.key=\"a\"x"; "junk after quoted value")]
    #[test_case("Class.=1"; "empty key name")]
    fn test_rejects_malformed(text: &str) {
        assert!(text.parse::<ObjectPath>().is_err());
    }
}
