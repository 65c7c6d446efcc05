//! Document versioning and the compatibility gate.
//!
//! Every project document carries the version of the release that saved it in
//! its `GDVersion` element. The gate compares it against the running
//! implementation before any migration happens.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GdError, GdResult};

/// Name of the element holding the version stamp.
pub const VERSION_ELEMENT: &str = "GDVersion";

/// Version of the running implementation. Encoded documents are always
/// stamped with it.
pub const CURRENT_VERSION: VersionTuple = VersionTuple::new(2, 2, 11120, 0);

/// Four-part release version.
///
/// Deliberately not `Ord`: release ordering is decided by [`compare`], which
/// does not rank the fields lexicographically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionTuple {
    #[serde(rename = "Major", default)]
    pub major: u32,
    #[serde(rename = "Minor", default)]
    pub minor: u32,
    #[serde(rename = "Build", default)]
    pub build: u32,
    #[serde(rename = "Revision", default)]
    pub revision: u32,
}

impl VersionTuple {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Reads the version stamp of a document root. A missing element, or a
    /// missing/non-integer field, reads as zero.
    pub fn from_document(root: &Value) -> Self {
        root.get(VERSION_ELEMENT)
            .map(Self::from_element)
            .unwrap_or_default()
    }

    /// Reads a `GDVersion` element.
    pub fn from_element(element: &Value) -> Self {
        Self {
            major: read_field(element, "Major"),
            minor: read_field(element, "Minor"),
            build: read_field(element, "Build"),
            revision: read_field(element, "Revision"),
        }
    }

    /// The `GDVersion` element for this version.
    pub fn to_element(self) -> Value {
        let mut element = Map::new();
        element.insert("Major".to_string(), Value::from(self.major));
        element.insert("Minor".to_string(), Value::from(self.minor));
        element.insert("Build".to_string(), Value::from(self.build));
        element.insert("Revision".to_string(), Value::from(self.revision));
        Value::Object(element)
    }
}

impl fmt::Display for VersionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

fn read_field(element: &Value, key: &str) -> u32 {
    element
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(0)
}

/// Outcome of comparing a document version with the runtime version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compatibility {
    Ok,
    /// The document was saved by a newer release. Loading continues.
    Newer,
}

/// Compares a document version against the runtime version.
///
/// Within the same major version, a document is newer as soon as any of
/// minor, build or revision exceeds the runtime's, independently of the
/// others.
pub fn compare(doc: VersionTuple, runtime: VersionTuple) -> Compatibility {
    if doc.major > runtime.major {
        return Compatibility::Newer;
    }
    if doc.major == runtime.major
        && (doc.build > runtime.build
            || doc.minor > runtime.minor
            || doc.revision > runtime.revision)
    {
        return Compatibility::Newer;
    }
    Compatibility::Ok
}

/// Rejects documents from the first major release line, which cannot be
/// migrated directly.
pub fn ensure_supported(doc: VersionTuple) -> GdResult<()> {
    if doc.major <= 1 {
        return Err(GdError::VersionTooOld { found: doc });
    }
    Ok(())
}

/// Applies the hard failure first, then the newer-than-runtime comparison.
pub fn check(doc: VersionTuple, runtime: VersionTuple) -> GdResult<Compatibility> {
    ensure_supported(doc)?;
    Ok(compare(doc, runtime))
}

#[cfg(test)]
#[path = "tests/version_tests.rs"]
mod tests;
