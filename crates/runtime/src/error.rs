use std::path::PathBuf;

use gd_assets::BundleError;
use gd_project::GdError;
use miette::Diagnostic;
use thiserror::Error;

use crate::session::RuntimeState;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Diagnostic)]
pub enum RuntimeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] GdError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Bundle(#[from] BundleError),
    #[error("no scene to load")]
    #[diagnostic(
        code("gd.no_scene"),
        help("the project must contain at least one scene")
    )]
    NoSceneToLoad,
    #[error("could not load the code module for scene '{scene}': {reason}")]
    #[diagnostic(
        code("gd.module_load_failure"),
        help("the compiled scene code must sit next to the player executable")
    )]
    ModuleLoadFailure {
        scene: String,
        candidates: Vec<PathBuf>,
        reason: String,
    },
    #[error("code module {} does not export '{symbol}'", module.display())]
    #[diagnostic(
        code("gd.symbol_resolution_failure"),
        help("recompile the game so the code module matches the project")
    )]
    SymbolResolutionFailure { symbol: String, module: PathBuf },
    #[error("cannot build scene #{index}: the project has {count} scenes")]
    #[diagnostic(code("gd.scene_construction"))]
    SceneConstruction { index: usize, count: usize },
    #[error("runtime is {state:?}, expected {expected:?}")]
    #[diagnostic(code("gd.runtime_state"))]
    InvalidState {
        state: RuntimeState,
        expected: RuntimeState,
    },
    #[error("invalid runtime configuration: {0}")]
    #[diagnostic(code("gd.config"))]
    Config(String),
    #[error("io error: {0}")]
    #[diagnostic(code("gd.io"))]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn is_malformed_document(&self) -> bool {
        matches!(self, RuntimeError::Document(err) if err.is_malformed_document())
    }
}
