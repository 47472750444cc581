//! Container object types
//!
//! These types describe the members of a group as returned by a backend.

use std::fmt;

/// Kind of object a link resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectKind {
    /// Group (may contain further members)
    Group = 0,
    /// Dataset
    Dataset = 1,
    /// Committed (named) datatype
    NamedDatatype = 2,
    /// Anything the backend cannot classify
    Unknown = 255,
}

impl ObjectKind {
    /// Check if this is a group
    pub fn is_group(&self) -> bool {
        *self == ObjectKind::Group
    }
}

/// Identity of an object inside one file
///
/// Two links resolving to the same object carry equal keys, which is how
/// the walker visits hard-linked objects only once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One member of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Link name within the parent group
    pub name: String,

    /// Kind of the object the link resolves to
    pub kind: ObjectKind,

    /// Object identity within the file
    pub key: ObjectKey,
}

impl Member {
    pub fn new(name: impl Into<String>, kind: ObjectKind, key: ObjectKey) -> Self {
        Self {
            name: name.into(),
            kind,
            key,
        }
    }
}
