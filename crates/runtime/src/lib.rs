//! Player runtime: scene code modules, the shared context and the loop that
//! drives scenes until the game quits.

pub mod abort;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod context;
mod error;
pub mod logging;
pub mod module;
pub mod scene;
pub mod session;

pub use cli::PlayerArgs;
pub use config::{ResolvedConfig, RuntimeConfig};
pub use context::{AssetStore, FontManager, MemoryAssetStore, RuntimeContext, SoundManager};
pub use error::{RuntimeError, RuntimeResult};
pub use module::{
    CodeModuleLoader, ModuleBackend, ModuleLocator, NativeBackend, SceneCode, StaticBackend,
};
pub use scene::{RuntimeScene, SceneObject};
pub use session::{RuntimeSession, RuntimeState, StepOutcome, WindowHandle};
