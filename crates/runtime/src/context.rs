//! Services shared by every scene of a session.
//!
//! The context is created before the first scene and torn down explicitly,
//! in reverse order of creation, when the session quits.

use std::collections::HashMap;

use gd_assets::{BundleError, ResourceBundle};
use gd_project::{InstructionCatalog, ObjectFactory};
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};

/// Source of raw resource bytes.
pub trait AssetStore {
    fn load_bytes(&self, id: &str) -> RuntimeResult<Vec<u8>>;
}

impl<T: AssetStore + ?Sized> AssetStore for Box<T> {
    fn load_bytes(&self, id: &str) -> RuntimeResult<Vec<u8>> {
        (**self).load_bytes(id)
    }
}

impl AssetStore for ResourceBundle {
    fn load_bytes(&self, id: &str) -> RuntimeResult<Vec<u8>> {
        Ok(self.read(id)?)
    }
}

/// In-memory store, for tests and tools.
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetStore {
    pub fn insert(&mut self, id: impl Into<String>, data: Vec<u8>) {
        self.assets.insert(id.into(), data);
    }
}

impl AssetStore for MemoryAssetStore {
    fn load_bytes(&self, id: &str) -> RuntimeResult<Vec<u8>> {
        self.assets
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::Bundle(BundleError::ResourceNotFound(id.to_string())))
    }
}

#[derive(Debug, Default)]
struct ResourceCache {
    entries: HashMap<String, Vec<u8>>,
}

impl ResourceCache {
    fn get_or_load(&mut self, store: &dyn AssetStore, name: &str) -> RuntimeResult<&[u8]> {
        if !self.entries.contains_key(name) {
            let bytes = store.load_bytes(name)?;
            self.entries.insert(name.to_string(), bytes);
        }
        Ok(self
            .entries
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    fn clear(&mut self) -> usize {
        let released = self.entries.len();
        self.entries.clear();
        released
    }
}

#[derive(Debug, Default)]
pub struct FontManager {
    cache: ResourceCache,
}

impl FontManager {
    pub fn loaded(&self) -> usize {
        self.cache.entries.len()
    }
}

#[derive(Debug, Default)]
pub struct SoundManager {
    cache: ResourceCache,
}

impl SoundManager {
    pub fn loaded(&self) -> usize {
        self.cache.entries.len()
    }
}

pub struct RuntimeContext {
    catalog: InstructionCatalog,
    factory: ObjectFactory,
    assets: Box<dyn AssetStore>,
    fonts: FontManager,
    sounds: SoundManager,
    shut_down: bool,
}

impl RuntimeContext {
    pub fn new(
        catalog: InstructionCatalog,
        factory: ObjectFactory,
        assets: Box<dyn AssetStore>,
    ) -> Self {
        Self {
            catalog,
            factory,
            assets,
            fonts: FontManager::default(),
            sounds: SoundManager::default(),
            shut_down: false,
        }
    }

    pub fn catalog(&self) -> &InstructionCatalog {
        &self.catalog
    }

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    pub fn assets(&self) -> &dyn AssetStore {
        self.assets.as_ref()
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn sounds(&self) -> &SoundManager {
        &self.sounds
    }

    pub fn load_font(&mut self, name: &str) -> RuntimeResult<&[u8]> {
        self.fonts.cache.get_or_load(self.assets.as_ref(), name)
    }

    pub fn load_sound(&mut self, name: &str) -> RuntimeResult<&[u8]> {
        self.sounds.cache.get_or_load(self.assets.as_ref(), name)
    }

    /// Releases sounds, then fonts. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let sounds = self.sounds.cache.clear();
        let fonts = self.fonts.cache.clear();
        debug!(sounds, fonts, "resource managers released");
        self.shut_down = true;
        info!("runtime context shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}
