//! Object construction keyed by type name.

use std::collections::BTreeSet;

use crate::model::Object;

/// Type given to objects that do not declare one.
pub const DEFAULT_OBJECT_KIND: &str = "Sprite";

const BUILTIN_KINDS: &[&str] = &[
    "Sprite",
    "TextObject::Text",
    "TiledSpriteObject::TiledSprite",
    "PanelSpriteObject::PanelSprite",
    "ParticleSystem::ParticleEmitter",
    "PrimitiveDrawing::Drawer",
    "TextEntryObject::TextEntry",
];

/// Result of asking the factory for an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Creation {
    Created(Object),
    /// No registered kind matches. The object is still returned as a generic
    /// object so its data survives a round trip.
    WrongKind(Object),
}

impl Creation {
    pub fn into_object(self) -> Object {
        match self {
            Creation::Created(object) | Creation::WrongKind(object) => object,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Creation::Created(_))
    }
}

#[derive(Clone, Debug)]
pub struct ObjectFactory {
    kinds: BTreeSet<String>,
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self {
            kinds: BUILTIN_KINDS.iter().map(|kind| kind.to_string()).collect(),
        }
    }
}

impl ObjectFactory {
    /// Factory that knows no kind at all.
    pub fn empty() -> Self {
        Self {
            kinds: BTreeSet::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>) {
        self.kinds.insert(kind.into());
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(String::as_str)
    }

    pub fn create(&self, kind: &str, name: &str) -> Creation {
        let object = Object::new(name, kind);
        if self.knows(kind) {
            Creation::Created(object)
        } else {
            Creation::WrongKind(object)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kind_is_created() {
        let factory = ObjectFactory::default();
        let creation = factory.create("Sprite", "Hero");
        assert!(creation.is_created());
        let object = creation.into_object();
        assert_eq!(object.name, "Hero");
        assert_eq!(object.kind, "Sprite");
    }

    #[test]
    fn unknown_kind_is_reported_but_kept() {
        let factory = ObjectFactory::default();
        let creation = factory.create("Custom::Thing", "Boss");
        assert!(matches!(&creation, Creation::WrongKind(object) if object.kind == "Custom::Thing"));
        assert_eq!(creation.into_object().name, "Boss");
    }

    #[test]
    fn registered_kinds_become_known() {
        let mut factory = ObjectFactory::empty();
        assert!(!factory.knows("Sprite"));
        factory.register("Sprite");
        assert!(factory.create("Sprite", "A").is_created());
    }
}
