//! Remote document library connector

use super::{Connector, PackageStream, normalize_name};
use crate::error::Result;
use crate::retry::{LogCallback, RetryConfig, with_retry};
use crate::tenant::Site;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Connector bound to one document library of one site
#[derive(Clone)]
pub struct LibraryConnector {
    site: Arc<dyn Site>,
    library: String,
    retry: RetryConfig,
}

impl LibraryConnector {
    pub fn new(site: Arc<dyn Site>, library: impl Into<String>) -> Self {
        Self {
            site,
            library: library.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Use a specific retry policy for downloads
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    fn item_path(&self, name: &str) -> String {
        format!("{}/{}", self.library.trim_matches('/'), normalize_name(name))
    }
}

impl Connector for LibraryConnector {
    fn open(&self, name: &str) -> Result<Box<dyn PackageStream>> {
        let path = self.item_path(name);
        log::debug!("Downloading {} from {}", path, self.site.url());
        let content = with_retry(&self.retry, Some(&LogCallback), || self.site.read_file(&path))?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn exists(&self, name: &str) -> bool {
        let path = self.item_path(name);
        let (folder, file) = match path.rsplit_once('/') {
            Some(split) => split,
            None => return false,
        };
        with_retry(&self.retry, Some(&LogCallback), || {
            self.site.file_exists(folder, file)
        })
        .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.site.url().trim_end_matches('/'), self.library)
    }
}

impl fmt::Debug for LibraryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryConnector")
            .field("site", &self.site.url())
            .field("library", &self.library)
            .finish()
    }
}
