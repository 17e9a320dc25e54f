//! Connectors - uniform file access over package storage backends
//!
//! The deserializer and the handlers only ever see [`Connector`]. Which
//! backend answers (a directory, a document library, a zip container) is
//! decided once by the resolver.

use crate::error::Result;
use std::fmt;
use std::io::{Read, Seek};

mod container;
mod filesystem;
mod library;

pub use container::ContainerConnector;
pub use filesystem::FileSystemConnector;
pub use library::LibraryConnector;

/// A readable, rewindable byte stream handed out by a connector
pub trait PackageStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> PackageStream for T {}

/// File access capability shared by every package backend
pub trait Connector: Send + Sync + fmt::Debug {
    /// Open a named item for reading
    ///
    /// The returned stream is owned by the caller and closed when dropped;
    /// connectors keep no open handles between calls.
    fn open(&self, name: &str) -> Result<Box<dyn PackageStream>>;

    /// Check whether a named item exists
    fn exists(&self, name: &str) -> bool;

    /// Human-readable location, used in logs and error messages
    fn describe(&self) -> String;

    /// Read a named item fully into memory
    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        let mut stream = self.open(name)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Normalize an item name: forward slashes, no leading `./` or `/`
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.trim().replace('\\', "/");
    loop {
        if let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest.to_string();
        } else if let Some(rest) = normalized.strip_prefix('/') {
            normalized = rest.to_string();
        } else {
            break;
        }
    }
    normalized
}
