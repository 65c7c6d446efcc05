//! Instruction signature lookup.
//!
//! The catalog is produced by the extension metadata and only read here: the
//! migrator needs to know which parameter positions of an instruction are
//! code-only so that documents from older releases can be padded.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GdError, GdResult};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSignature {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Parameter filled by generated code, never shown in the editor.
    #[serde(rename = "codeOnly", default)]
    pub code_only: bool,
}

impl ParameterSignature {
    pub fn visible(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            code_only: false,
        }
    }

    pub fn code_only(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            code_only: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSignature {
    #[serde(default)]
    pub parameters: Vec<ParameterSignature>,
}

#[derive(Clone, Debug, Default)]
pub struct InstructionCatalog {
    signatures: HashMap<String, InstructionSignature>,
}

impl InstructionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a catalog file: an object keyed by instruction type.
    pub fn from_json(text: &str) -> GdResult<Self> {
        let signatures: HashMap<String, InstructionSignature> =
            serde_json::from_str(text).map_err(|err| GdError::Catalog(err.to_string()))?;
        Ok(Self { signatures })
    }

    pub fn load(path: &Path) -> GdResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| GdError::Catalog(format!("{}: {err}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn insert(&mut self, kind: impl Into<String>, parameters: Vec<ParameterSignature>) {
        self.signatures
            .insert(kind.into(), InstructionSignature { parameters });
    }

    pub fn with(mut self, kind: impl Into<String>, parameters: Vec<ParameterSignature>) -> Self {
        self.insert(kind, parameters);
        self
    }

    /// Ordered parameter list of `kind`, or `None` when the type is unknown.
    pub fn signature(&self, kind: &str) -> Option<&[ParameterSignature]> {
        self.signatures
            .get(kind)
            .map(|signature| signature.parameters.as_slice())
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signatures_keyed_by_type() {
        let catalog = InstructionCatalog::from_json(
            r#"{
                "Create": { "parameters": [
                    { "type": "currentScene", "codeOnly": true },
                    { "type": "objectList" },
                    { "type": "expression" }
                ] },
                "Wait": {}
            }"#,
        )
        .expect("catalog parses");
        assert_eq!(catalog.len(), 2);
        let create = catalog.signature("Create").expect("Create is known");
        assert_eq!(create.len(), 3);
        assert!(create[0].code_only);
        assert!(!create[1].code_only);
        assert_eq!(catalog.signature("Wait"), Some(&[][..]));
        assert_eq!(catalog.signature("Missing"), None);
    }

    #[test]
    fn malformed_catalog_is_a_catalog_error() {
        let err = InstructionCatalog::from_json("[1, 2]").expect_err("array is not a catalog");
        assert!(matches!(err, GdError::Catalog(_)));
    }
}
