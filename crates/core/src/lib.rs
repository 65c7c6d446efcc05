//! Project documents: versioning, migration, and the in-memory model.

pub mod catalog;
pub mod codec;
pub mod document;
mod error;
pub mod factory;
pub mod mangler;
pub mod migration;
pub mod model;
pub mod version;

pub use catalog::{InstructionCatalog, ParameterSignature};
pub use codec::{DecodeWarning, Decoded, LoadProfile, ProjectCodec};
pub use document::ProjectDocument;
pub use error::{GdError, GdResult};
pub use factory::{Creation, ObjectFactory};
pub use mangler::{demangle_scene_name, mangled_scene_name, scene_entry_symbol};
pub use migration::{DocumentMigrator, MigrationError, MigrationReport, MigrationWarning};
pub use model::{
    Event, ExternalEvents, ExternalLayout, Instance, Instruction, Layer, Object, ObjectGroup,
    Project, ProjectProperties, Resource, ResourceFolder, ResourcesManager, Scene, SourceFile,
    Variable,
};
pub use version::{Compatibility, VersionTuple, CURRENT_VERSION};
