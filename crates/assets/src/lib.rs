//! Packed game resources: the bundle container and the project source cipher.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub mod bundle;
pub mod cipher;

pub use bundle::{
    BundleBuilder, BundleEntry, BundleLimits, ResourceBundle, DEFAULT_BUNDLE_FILE,
    PROJECT_SOURCE_ENTRY,
};

#[derive(Debug, Error, Diagnostic)]
pub enum BundleError {
    #[error("resource bundle not found: {}", path.display())]
    #[diagnostic(
        code("gd.bundle_not_found"),
        help("start the player from the game directory or pass -cwd=<dir>")
    )]
    NotFound { path: PathBuf },
    #[error("io error: {0}")]
    #[diagnostic(code("gd.bundle_io"))]
    Io(#[from] std::io::Error),
    #[error("not a resource bundle (bad magic bytes)")]
    #[diagnostic(code("gd.bundle_format"))]
    InvalidMagic,
    #[error("unsupported bundle format version {found} (expected {expected})")]
    #[diagnostic(code("gd.bundle_format"))]
    IncompatibleVersion { found: u16, expected: u16 },
    #[error("bundle is truncated: {0}")]
    #[diagnostic(code("gd.bundle_format"))]
    Truncated(String),
    #[error("bundle declares {count} entries (max {max})")]
    #[diagnostic(code("gd.bundle_format"))]
    TooManyEntries { count: u32, max: u32 },
    #[error("invalid bundle entry name '{0}'")]
    #[diagnostic(code("gd.bundle_entry_name"))]
    InvalidEntryName(String),
    #[error("bundle entry '{0}' appears twice")]
    #[diagnostic(code("gd.bundle_format"))]
    DuplicateEntry(String),
    #[error("resource '{0}' not found in bundle")]
    #[diagnostic(code("gd.resource_not_found"))]
    ResourceNotFound(String),
    #[error("bundle entry '{name}' is too large: {size} bytes (max {max})")]
    #[diagnostic(code("gd.bundle_entry_size"))]
    TooLarge { name: String, size: u64, max: u64 },
    #[error("checksum mismatch for bundle entry '{0}'")]
    #[diagnostic(code("gd.bundle_checksum"), help("the bundle file is corrupted; rebuild it"))]
    ChecksumMismatch(String),
    #[error("could not decrypt the project source: {0}")]
    #[diagnostic(code("gd.decryption_failure"))]
    DecryptionFailure(String),
}
