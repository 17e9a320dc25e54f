//! Compound container connector - items are entries of a zip package

use super::{Connector, PackageStream, normalize_name};
use crate::error::{Error, Result};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use zip::ZipArchive;
use zip::result::ZipError;

/// Package manifest entry that is never the hierarchy markup
const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";

/// Largest entry a container may hold once inflated
const MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

/// Ceiling on the buffer reserved up front from the declared entry size
const MAX_PREALLOCATION: u64 = 1024 * 1024;

/// Connector over an in-memory compound container
///
/// The container bytes are read once from the parent connector; every
/// `open` builds a fresh archive view over them, so no reader outlives the
/// call that created it.
#[derive(Clone)]
pub struct ContainerConnector {
    container_name: String,
    bytes: Arc<Vec<u8>>,
    /// (normalized name, raw entry name)
    entries: Vec<(String, String)>,
}

impl ContainerConnector {
    /// Index a container already held in memory
    pub fn from_bytes(container_name: &str, bytes: Vec<u8>) -> Result<Self> {
        let entries = {
            let archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
            archive
                .file_names()
                .filter(|raw| !raw.ends_with('/'))
                .map(|raw| (normalize_name(raw), raw.to_string()))
                .collect()
        };

        Ok(Self {
            container_name: container_name.to_string(),
            bytes: Arc::new(bytes),
            entries,
        })
    }

    /// Locate the markup entry for a container item name
    ///
    /// The markup shares the container's file stem with an `.xml` extension.
    /// A container holding a single root-level markup file is accepted
    /// whatever that file is called.
    pub fn markup_entry(&self, item_name: &str) -> Option<String> {
        let expected = markup_name_for(item_name);
        if let Some(found) = self.lookup(&expected) {
            return Some(found.0.clone());
        }

        let mut root_markup = self.entries.iter().filter(|(name, _)| {
            !name.contains('/')
                && name != CONTENT_TYPES_ENTRY
                && name.to_ascii_lowercase().ends_with(".xml")
        });
        match (root_markup.next(), root_markup.next()) {
            (Some((name, _)), None) => Some(name.clone()),
            _ => None,
        }
    }

    fn lookup(&self, name: &str) -> Option<&(String, String)> {
        let name = normalize_name(name);
        self.entries
            .iter()
            .find(|(normalized, _)| *normalized == name)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(normalized, _)| normalized.eq_ignore_ascii_case(&name))
            })
    }
}

impl Connector for ContainerConnector {
    fn open(&self, name: &str) -> Result<Box<dyn PackageStream>> {
        let (_, raw) = self
            .lookup(name)
            .ok_or_else(|| Error::not_found(format!("{}!{}", self.container_name, name)))?;

        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut entry = match archive.by_name(raw) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(Error::not_found(format!("{}!{}", self.container_name, name)));
            }
            Err(e) => return Err(e.into()),
        };

        let declared = entry.size();
        let item = format!("{}!{}", self.container_name, name);
        let content = read_entry(&mut entry, declared, MAX_ENTRY_SIZE, &item)?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn describe(&self) -> String {
        format!("container {}", self.container_name)
    }
}

impl fmt::Debug for ContainerConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerConnector")
            .field("container_name", &self.container_name)
            .field("size", &self.bytes.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Inflate one entry, reading at most `limit` bytes
///
/// The declared size comes from the archive headers and only sizes the
/// initial buffer, never beyond [`MAX_PREALLOCATION`].
fn read_entry(reader: impl Read, declared: u64, limit: u64, item: &str) -> Result<Vec<u8>> {
    let mut content = Vec::with_capacity(declared.min(limit).min(MAX_PREALLOCATION) as usize);
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut content)
        .map_err(|e| Error::invalid_package(item, format!("unreadable entry: {e}")))?;
    if content.len() as u64 > limit {
        return Err(Error::invalid_package(
            item,
            format!("entry is larger than {limit} bytes"),
        ));
    }
    Ok(content)
}

/// `packages/site.pnp` -> `site.xml`
pub fn markup_name_for(item_name: &str) -> String {
    let normalized = normalize_name(item_name);
    let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    format!("{stem}.xml")
}
