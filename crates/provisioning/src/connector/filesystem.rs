//! Filesystem connector - items are files below a root directory

use super::{Connector, PackageStream, normalize_name};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Connector rooted at a local directory
#[derive(Debug, Clone)]
pub struct FileSystemConnector {
    root: PathBuf,
}

impl FileSystemConnector {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, name: &str) -> PathBuf {
        let name = normalize_name(name);
        let candidate = Path::new(&name);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

impl Connector for FileSystemConnector {
    fn open(&self, name: &str) -> Result<Box<dyn PackageStream>> {
        let path = self.item_path(name);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.item_path(name).is_file()
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_and_exists() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/logo.png"), b"png").unwrap();

        let connector = FileSystemConnector::new(dir.path());
        assert!(connector.exists("images/logo.png"));
        assert!(connector.exists("./images\\logo.png"));
        assert!(!connector.exists("images"));
        assert_eq!(connector.read_all("images/logo.png").unwrap(), b"png");
    }

    #[test]
    fn test_missing_item_is_not_found() {
        let dir = TempDir::new().unwrap();
        let connector = FileSystemConnector::new(dir.path());

        let Err(err) = connector.open("missing.xml") else {
            panic!("missing item opened");
        };
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
