//! Packed resource bundle.
//!
//! Layout, little-endian:
//!
//! ```text
//! magic "GDDF" | u16 format version | u32 entry count
//! entry*: u16 name length | name (UTF-8) | u64 offset | u64 size | u32 crc32
//! blob data
//! ```
//!
//! Offsets are absolute. Blobs are read on demand and checked against their
//! CRC. The project source entry is additionally encrypted, see
//! [`crate::cipher`].

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use crate::{cipher, BundleError};

pub const BUNDLE_MAGIC: [u8; 4] = *b"GDDF";
pub const BUNDLE_FORMAT_VERSION: u16 = 1;
/// File name of the bundle next to the player.
pub const DEFAULT_BUNDLE_FILE: &str = "gam.egd";
/// Entry holding the encrypted project document.
pub const PROJECT_SOURCE_ENTRY: &str = "src";

const HEADER_LEN: u64 = 4 + 2 + 4;
const ENTRY_FIXED_LEN: u64 = 2 + 8 + 8 + 4;

#[derive(Clone, Debug)]
pub struct BundleLimits {
    pub max_entries: u32,
    pub max_entry_bytes: u64,
}

impl Default for BundleLimits {
    fn default() -> Self {
        Self {
            max_entries: 65_536,
            max_entry_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BundleEntry {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    pub crc32: u32,
}

#[derive(Debug)]
pub struct ResourceBundle {
    path: PathBuf,
    entries: Vec<BundleEntry>,
    by_name: HashMap<String, usize>,
    limits: BundleLimits,
    file: Mutex<File>,
}

impl ResourceBundle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        Self::open_with_limits(path, BundleLimits::default())
    }

    pub fn open_with_limits(
        path: impl AsRef<Path>,
        limits: BundleLimits,
    ) -> Result<Self, BundleError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => BundleError::NotFound { path: path.clone() },
            _ => BundleError::Io(err),
        })?;
        let file_len = file.metadata()?.len();

        let mut header = [0u8; HEADER_LEN as usize];
        read_exact(&mut file, &mut header, "header")?;
        if header[0..4] != BUNDLE_MAGIC {
            return Err(BundleError::InvalidMagic);
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != BUNDLE_FORMAT_VERSION {
            return Err(BundleError::IncompatibleVersion {
                found: version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }
        let count = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
        if count > limits.max_entries {
            return Err(BundleError::TooManyEntries {
                count,
                max: limits.max_entries,
            });
        }

        let mut entries = Vec::with_capacity(count as usize);
        let mut by_name = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let entry = read_index_entry(&mut file)?;
            let end = entry.offset.checked_add(entry.size);
            if end.map_or(true, |end| end > file_len) {
                return Err(BundleError::Truncated(format!(
                    "entry '{}' points past the end of the bundle",
                    entry.name
                )));
            }
            if by_name.insert(entry.name.clone(), entries.len()).is_some() {
                return Err(BundleError::DuplicateEntry(entry.name));
            }
            entries.push(entry);
        }

        info!(path = %path.display(), entries = entries.len(), "resource bundle opened");
        Ok(Self {
            path,
            entries,
            by_name,
            limits,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in index order.
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<&BundleEntry> {
        self.by_name.get(name).map(|index| &self.entries[*index])
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, BundleError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| BundleError::ResourceNotFound(name.to_string()))?;
        if entry.size > self.limits.max_entry_bytes {
            return Err(BundleError::TooLarge {
                name: name.to_string(),
                size: entry.size,
                max: self.limits.max_entry_bytes,
            });
        }
        let size = usize::try_from(entry.size).map_err(|_| BundleError::TooLarge {
            name: name.to_string(),
            size: entry.size,
            max: self.limits.max_entry_bytes,
        })?;

        let mut data = vec![0u8; size];
        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            file.seek(SeekFrom::Start(entry.offset))?;
            read_exact(&mut *file, &mut data, name)?;
        }
        if crc32fast::hash(&data) != entry.crc32 {
            return Err(BundleError::ChecksumMismatch(name.to_string()));
        }
        debug!(entry = name, bytes = data.len(), "bundle entry read");
        Ok(data)
    }

    /// Reads and decrypts the project document. The bytes are returned
    /// unparsed.
    pub fn read_project_source(&self) -> Result<Vec<u8>, BundleError> {
        let raw = self.read(PROJECT_SOURCE_ENTRY)?;
        cipher::decrypt(&raw)
    }
}

fn read_exact(reader: &mut impl Read, buffer: &mut [u8], what: &str) -> Result<(), BundleError> {
    reader.read_exact(buffer).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => BundleError::Truncated(format!("unexpected end of file in {what}")),
        _ => BundleError::Io(err),
    })
}

fn read_index_entry(reader: &mut impl Read) -> Result<BundleEntry, BundleError> {
    let mut len = [0u8; 2];
    read_exact(reader, &mut len, "index")?;
    let mut name = vec![0u8; usize::from(u16::from_le_bytes(len))];
    read_exact(reader, &mut name, "index")?;
    let name = String::from_utf8(name)
        .map_err(|_| BundleError::InvalidEntryName("entry name is not UTF-8".to_string()))?;
    validate_entry_name(&name)?;

    let mut fixed = [0u8; (ENTRY_FIXED_LEN - 2) as usize];
    read_exact(reader, &mut fixed, "index")?;
    let offset = u64::from_le_bytes(fixed[0..8].try_into().map_err(|_| index_error())?);
    let size = u64::from_le_bytes(fixed[8..16].try_into().map_err(|_| index_error())?);
    let crc32 = u32::from_le_bytes(fixed[16..20].try_into().map_err(|_| index_error())?);
    Ok(BundleEntry {
        name,
        offset,
        size,
        crc32,
    })
}

fn index_error() -> BundleError {
    BundleError::Truncated("index entry is too short".to_string())
}

/// Rejects names that could escape the bundle when extracted.
pub fn validate_entry_name(name: &str) -> Result<(), BundleError> {
    let invalid = name.is_empty()
        || name.len() > usize::from(u16::MAX)
        || name.contains('\0')
        || name.contains('\\')
        || name.starts_with('/')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        return Err(BundleError::InvalidEntryName(name.to_string()));
    }
    Ok(())
}

/// Writes bundles. Entries keep their insertion order.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, data: Vec<u8>) -> Result<&mut Self, BundleError> {
        let name = name.into();
        validate_entry_name(&name)?;
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            return Err(BundleError::DuplicateEntry(name));
        }
        self.entries.push((name, data));
        Ok(self)
    }

    /// Encrypts `text` and stores it as the project source entry.
    pub fn add_project_source(&mut self, text: &str) -> Result<&mut Self, BundleError> {
        let encrypted = cipher::encrypt(text.as_bytes())?;
        self.add(PROJECT_SOURCE_ENTRY, encrypted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BundleError> {
        let count = u32::try_from(self.entries.len()).map_err(|_| BundleError::TooManyEntries {
            count: u32::MAX,
            max: u32::MAX,
        })?;
        let index_len: u64 = self
            .entries
            .iter()
            .map(|(name, _)| ENTRY_FIXED_LEN + name.len() as u64)
            .sum();
        let data_len: usize = self.entries.iter().map(|(_, data)| data.len()).sum();

        let mut output = Vec::with_capacity((HEADER_LEN + index_len) as usize + data_len);
        output.extend_from_slice(&BUNDLE_MAGIC);
        output.extend_from_slice(&BUNDLE_FORMAT_VERSION.to_le_bytes());
        output.extend_from_slice(&count.to_le_bytes());

        let mut offset = HEADER_LEN + index_len;
        for (name, data) in &self.entries {
            let name_len = u16::try_from(name.len())
                .map_err(|_| BundleError::InvalidEntryName(name.clone()))?;
            output.extend_from_slice(&name_len.to_le_bytes());
            output.extend_from_slice(name.as_bytes());
            output.extend_from_slice(&offset.to_le_bytes());
            output.extend_from_slice(&(data.len() as u64).to_le_bytes());
            output.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
            offset += data.len() as u64;
        }
        for (_, data) in &self.entries {
            output.extend_from_slice(data);
        }
        Ok(output)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), BundleError> {
        let bytes = self.to_bytes()?;
        fs::write(path.as_ref(), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/bundle_tests.rs"]
mod tests;
