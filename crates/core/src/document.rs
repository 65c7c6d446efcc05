//! Parsed project document tree.
//!
//! The tree itself is a `serde_json::Value`; this wrapper only knows about the
//! top-level sections and the version stamp.

use serde_json::{Map, Value};

use crate::error::{GdError, GdResult};
use crate::version::{VersionTuple, VERSION_ELEMENT};

pub mod sections {
    pub const INFO: &str = "Info";
    pub const RESOURCES: &str = "Resources";
    pub const OBJECTS: &str = "Objects";
    pub const OBJECT_GROUPS: &str = "ObjectGroups";
    pub const VARIABLES: &str = "Variables";
    pub const SCENES: &str = "Scenes";
    pub const EXTERNAL_EVENTS: &str = "ExternalEvents";
    pub const EXTERNAL_SOURCE_FILES: &str = "ExternalSourceFiles";
    pub const EXTERNAL_LAYOUTS: &str = "ExternalLayouts";

    /// Flat image list written by releases before the resource manager.
    pub const LEGACY_IMAGES: &str = "Images";
    pub const LEGACY_IMAGE_FOLDERS: &str = "ImageFolders";

    /// Key of the used-extensions list inside `Info`.
    pub const USED_EXTENSIONS: &str = "Extensions";
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectDocument {
    root: Map<String, Value>,
}

impl ProjectDocument {
    /// Wraps an already parsed tree. The root must be an object.
    pub fn from_value(root: Value) -> GdResult<Self> {
        match root {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(GdError::MalformedDocument(
                "document root must be an object".to_string(),
            )),
        }
    }

    pub fn from_map(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Parses document text.
    pub fn parse(text: &str) -> GdResult<Self> {
        let root: Value = serde_json::from_str(text).map_err(|err| GdError::syntax(&err, text))?;
        Self::from_value(root)
    }

    pub fn version(&self) -> VersionTuple {
        self.root
            .get(VERSION_ELEMENT)
            .map(VersionTuple::from_element)
            .unwrap_or_default()
    }

    pub fn set_version(&mut self, version: VersionTuple) {
        self.root
            .insert(VERSION_ELEMENT.to_string(), version.to_element());
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.root.get(name).is_some()
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    pub fn to_string_pretty(&self) -> GdResult<String> {
        serde_json::to_string_pretty(&self.root)
            .map_err(|err| GdError::Serialization(err.to_string()))
    }
}
