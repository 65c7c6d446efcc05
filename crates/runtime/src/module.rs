//! Scene code modules.
//!
//! Each scene's logic is compiled ahead of time into a module exporting one
//! entry point per scene, named after the mangled scene name. At most one
//! module is loaded at a time: the previous one is released before the next
//! one is opened.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gd_project::scene_entry_symbol;
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};
use crate::scene::RuntimeScene;

/// File stem tried after `<executable name>`.
pub const FALLBACK_MODULE_STEM: &str = "Code";

/// Extension of shared libraries on the build target.
pub fn platform_module_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// One loaded scene entry point.
pub trait SceneCode {
    /// Runs one frame of scene logic and returns the raw step code.
    fn step(&mut self, scene: &mut RuntimeScene) -> i32;
}

impl<F> SceneCode for F
where
    F: FnMut(&mut RuntimeScene) -> i32,
{
    fn step(&mut self, scene: &mut RuntimeScene) -> i32 {
        self(scene)
    }
}

#[derive(Debug)]
pub enum OpenError {
    /// No candidate file exists.
    Missing,
    /// A file exists but could not be opened as a module.
    Open { path: PathBuf, reason: String },
    /// The module does not export the entry symbol.
    Symbol { path: PathBuf },
}

/// Where scene code comes from.
pub trait ModuleBackend {
    fn open(
        &mut self,
        candidates: &[PathBuf],
        symbol: &str,
    ) -> Result<(PathBuf, Box<dyn SceneCode>), OpenError>;
}

impl<T: ModuleBackend + ?Sized> ModuleBackend for Box<T> {
    fn open(
        &mut self,
        candidates: &[PathBuf],
        symbol: &str,
    ) -> Result<(PathBuf, Box<dyn SceneCode>), OpenError> {
        (**self).open(candidates, symbol)
    }
}

/// Signature of the symbol exported by native modules. The pointer is the
/// active [`RuntimeScene`].
pub type NativeSceneEntry = unsafe extern "C" fn(*mut c_void) -> i32;

/// Loads shared libraries from disk.
#[derive(Debug, Default)]
pub struct NativeBackend;

struct NativeModule {
    entry: NativeSceneEntry,
    // Must outlive `entry`.
    _library: libloading::Library,
}

impl SceneCode for NativeModule {
    fn step(&mut self, scene: &mut RuntimeScene) -> i32 {
        let scene: *mut RuntimeScene = scene;
        // SAFETY: the library is kept alive alongside the entry pointer and
        // the exported function takes exactly one pointer argument.
        unsafe { (self.entry)(scene.cast::<c_void>()) }
    }
}

impl ModuleBackend for NativeBackend {
    fn open(
        &mut self,
        candidates: &[PathBuf],
        symbol: &str,
    ) -> Result<(PathBuf, Box<dyn SceneCode>), OpenError> {
        let path = candidates
            .iter()
            .find(|path| path.is_file())
            .ok_or(OpenError::Missing)?
            .clone();
        // SAFETY: loading a module runs its initialisers; scene modules are
        // produced by the game compiler alongside the player.
        let library = unsafe { libloading::Library::new(&path) }.map_err(|err| OpenError::Open {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        // SAFETY: the symbol type matches the exported scene entry ABI.
        let entry = unsafe { library.get::<NativeSceneEntry>(symbol.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|_| OpenError::Symbol { path: path.clone() })?;
        Ok((
            path,
            Box::new(NativeModule {
                entry,
                _library: library,
            }),
        ))
    }
}

pub type SceneConstructor = Arc<dyn Fn() -> Box<dyn SceneCode>>;

/// Scene code linked into the player, keyed by entry symbol. Every open
/// builds a new instance.
#[derive(Clone, Default)]
pub struct StaticBackend {
    constructors: HashMap<String, SceneConstructor>,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the code of the scene named `scene_name`.
    pub fn register<F>(&mut self, scene_name: &str, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn SceneCode> + 'static,
    {
        self.constructors
            .insert(scene_entry_symbol(scene_name), Arc::new(constructor));
        self
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl ModuleBackend for StaticBackend {
    fn open(
        &mut self,
        candidates: &[PathBuf],
        symbol: &str,
    ) -> Result<(PathBuf, Box<dyn SceneCode>), OpenError> {
        let path = candidates.first().cloned().unwrap_or_default();
        let constructor = self
            .constructors
            .get(symbol)
            .ok_or(OpenError::Symbol { path: path.clone() })?;
        Ok((path, (constructor.as_ref())()))
    }
}

/// Computes the candidate module paths for a player executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleLocator {
    pub directory: PathBuf,
    pub executable_name: String,
    pub extension: String,
}

impl ModuleLocator {
    pub fn new(
        directory: impl Into<PathBuf>,
        executable_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            executable_name: executable_name.into(),
            extension: extension.into(),
        }
    }

    /// Locator for the running executable.
    pub fn for_current_exe(extension: impl Into<String>) -> RuntimeResult<Self> {
        let exe = std::env::current_exe()?;
        let directory = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let executable_name = exe
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| RuntimeError::Config("executable name is not UTF-8".to_string()))?
            .to_string();
        Ok(Self::new(directory, executable_name, extension))
    }

    /// `<dir>/<executable>.<ext>`, then `<dir>/Code.<ext>`.
    pub fn candidates(&self) -> Vec<PathBuf> {
        [self.executable_name.as_str(), FALLBACK_MODULE_STEM]
            .iter()
            .map(|stem| {
                self.directory
                    .join(format!("{stem}.{}", self.extension))
            })
            .collect()
    }
}

struct ActiveModule {
    scene_name: String,
    path: PathBuf,
    code: Box<dyn SceneCode>,
}

/// Owns the single active code module.
pub struct CodeModuleLoader {
    locator: ModuleLocator,
    backend: Box<dyn ModuleBackend>,
    active: Option<ActiveModule>,
    loads: usize,
    unloads: usize,
}

impl CodeModuleLoader {
    pub fn new(locator: ModuleLocator, backend: Box<dyn ModuleBackend>) -> Self {
        Self {
            locator,
            backend,
            active: None,
            loads: 0,
            unloads: 0,
        }
    }

    pub fn locator(&self) -> &ModuleLocator {
        &self.locator
    }

    /// Releases the active module, if any, then loads the one for
    /// `scene_name`.
    pub fn load(&mut self, scene_name: &str) -> RuntimeResult<()> {
        self.unload();
        let symbol = scene_entry_symbol(scene_name);
        let candidates = self.locator.candidates();
        let (path, code) = self
            .backend
            .open(&candidates, &symbol)
            .map_err(|err| match err {
                OpenError::Missing => RuntimeError::ModuleLoadFailure {
                    scene: scene_name.to_string(),
                    candidates: candidates.clone(),
                    reason: "no code module found".to_string(),
                },
                OpenError::Open { path, reason } => RuntimeError::ModuleLoadFailure {
                    scene: scene_name.to_string(),
                    candidates: vec![path],
                    reason,
                },
                OpenError::Symbol { path } => RuntimeError::SymbolResolutionFailure {
                    symbol: symbol.clone(),
                    module: path,
                },
            })?;
        info!(scene = scene_name, %symbol, module = %path.display(), "code module loaded");
        self.active = Some(ActiveModule {
            scene_name: scene_name.to_string(),
            path,
            code,
        });
        self.loads += 1;
        Ok(())
    }

    pub fn unload(&mut self) {
        if let Some(module) = self.active.take() {
            debug!(scene = %module.scene_name, module = %module.path.display(), "code module released");
            drop(module);
            self.unloads += 1;
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.active.as_ref().map(|module| module.scene_name.as_str())
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|module| module.path.as_path())
    }

    /// Runs one step of the active module. `None` when nothing is loaded.
    pub fn step(&mut self, scene: &mut RuntimeScene) -> Option<i32> {
        self.active
            .as_mut()
            .map(|module| module.code.step(scene))
    }

    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn unloads(&self) -> usize {
        self.unloads
    }

    /// Modules loaded and not yet released. Never more than one.
    pub fn live_modules(&self) -> usize {
        self.loads - self.unloads
    }
}

#[cfg(test)]
#[path = "tests/module_tests.rs"]
mod tests;
