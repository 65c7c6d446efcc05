//! From a bundle on disk to a running session.

use gd_assets::ResourceBundle;
use gd_project::{
    Compatibility, Decoded, GdError, InstructionCatalog, ObjectFactory, ProjectCodec,
};
use tracing::{info, instrument, warn};

use crate::config::ResolvedConfig;
use crate::context::RuntimeContext;
use crate::error::RuntimeResult;
use crate::module::{CodeModuleLoader, ModuleBackend, ModuleLocator};
use crate::session::RuntimeSession;

/// Instruction catalog named by the configuration, or an empty one.
pub fn load_catalog(config: &ResolvedConfig) -> RuntimeResult<InstructionCatalog> {
    match &config.catalog_path {
        Some(path) => {
            let catalog = InstructionCatalog::load(path)?;
            info!(path = %path.display(), instructions = catalog.len(), "instruction catalog loaded");
            Ok(catalog)
        }
        None => {
            info!("no instruction catalog configured, legacy parameter lists stay as saved");
            Ok(InstructionCatalog::new())
        }
    }
}

/// Decrypts, migrates and decodes the project stored in `bundle`.
pub fn load_project(
    bundle: &ResourceBundle,
    catalog: &InstructionCatalog,
    factory: &ObjectFactory,
) -> RuntimeResult<Decoded> {
    let bytes = bundle.read_project_source()?;
    let text = String::from_utf8(bytes).map_err(|err| {
        GdError::MalformedDocument(format!("project source is not UTF-8: {err}"))
    })?;
    let decoded = ProjectCodec::new(catalog, factory).decode_str(&text)?;

    if decoded.compatibility == Compatibility::Newer {
        warn!("project was saved by a newer version, some features may be missing");
    }
    for warning in &decoded.migration.warnings {
        warn!(%warning, "migration");
    }
    for warning in &decoded.warnings {
        warn!(%warning, "decode");
    }
    Ok(decoded)
}

/// Opens the bundle, decodes the project and enters its first scene.
/// Nothing past a failing step is touched.
#[instrument(skip_all, fields(bundle = %config.bundle_path.display()))]
pub fn start(
    config: &ResolvedConfig,
    locator: ModuleLocator,
    backend: Box<dyn ModuleBackend>,
) -> RuntimeResult<RuntimeSession> {
    let bundle = ResourceBundle::open(&config.bundle_path)?;
    let catalog = load_catalog(config)?;
    let factory = ObjectFactory::default();
    let decoded = load_project(&bundle, &catalog, &factory)?;

    let context = RuntimeContext::new(catalog, factory, Box::new(bundle));
    let loader = CodeModuleLoader::new(locator, backend);
    RuntimeSession::start(decoded.project, context, loader)
}
