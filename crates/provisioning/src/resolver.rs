//! Package resolution and loading
//!
//! [`resolve`] turns a package reference into a connector plus the name of
//! the package item inside it, without reading any content. [`load_hierarchy`]
//! then sniffs the format and deserializes the hierarchy.

use crate::connector::{Connector, ContainerConnector, FileSystemConnector, LibraryConnector};
use crate::error::{Error, Result};
use crate::format::{self, Format};
use crate::model::Hierarchy;
use crate::schema::HierarchyFormatter;
use crate::tenant::Tenant;
use std::fmt;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a package lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageReference {
    LocalPath(PathBuf),
    /// Absolute url of a file in a document library
    RemoteUrl(String),
}

impl PackageReference {
    /// `http://` and `https://` references are remote, everything else is a path
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Self::RemoteUrl(trimmed.to_string())
        } else {
            Self::LocalPath(PathBuf::from(trimmed))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteUrl(_))
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalPath(path) => write!(f, "{}", path.display()),
            Self::RemoteUrl(url) => f.write_str(url),
        }
    }
}

/// A reference bound to a connector
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub reference: PackageReference,
    pub connector: Arc<dyn Connector>,
    /// Name of the package item, relative to the connector
    pub item_name: String,
}

impl ResolvedPackage {
    pub fn is_remote(&self) -> bool {
        self.reference.is_remote()
    }
}

/// Resolve a reference to a connector and item name
///
/// Relative local paths are taken relative to `base_dir`, or the working
/// directory without one. A missing local file fails before anything else
/// happens. Remote references need a tenant to locate the owning site.
pub fn resolve(
    reference: &PackageReference,
    base_dir: Option<&Path>,
    tenant: Option<&dyn Tenant>,
) -> Result<ResolvedPackage> {
    match reference {
        PackageReference::LocalPath(path) => resolve_local(reference, path, base_dir),
        PackageReference::RemoteUrl(url) => {
            let tenant = tenant.ok_or_else(|| Error::UnsupportedSource {
                reference: url.clone(),
                reason: "remote packages need a tenant connection".to_string(),
            })?;
            resolve_remote(reference, url, tenant)
        }
    }
}

fn resolve_local(
    reference: &PackageReference,
    path: &Path,
    base_dir: Option<&Path>,
) -> Result<ResolvedPackage> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match base_dir {
            Some(base) => base.join(path),
            None => std::env::current_dir()?.join(path),
        }
    };

    if !path.is_file() {
        return Err(Error::not_found(path.display().to_string()));
    }

    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let item_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::not_found(path.display().to_string()))?;

    log::debug!("Resolved {} in {}", item_name, root.display());
    Ok(ResolvedPackage {
        reference: reference.clone(),
        connector: Arc::new(FileSystemConnector::new(root)),
        item_name,
    })
}

fn resolve_remote(
    reference: &PackageReference,
    url: &str,
    tenant: &dyn Tenant,
) -> Result<ResolvedPackage> {
    let unsupported = |reason: &str| Error::UnsupportedSource {
        reference: url.to_string(),
        reason: reason.to_string(),
    };

    let site_url = tenant.site_url_from_item_url(url)?;
    let site_prefix = site_url.trim_end_matches('/');
    let relative = url
        .get(..site_prefix.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(site_prefix))
        .map(|_| &url[site_prefix.len()..])
        .ok_or_else(|| unsupported("url is not below its owning site"))?;

    let relative = relative.split(['?', '#']).next().unwrap_or_default();
    let relative = urlencoding::decode(relative.trim_matches('/'))
        .map_err(|e| unsupported(&format!("url is not valid UTF-8 once decoded: {e}")))?;

    let (library, item_name) = relative
        .split_once('/')
        .filter(|(library, item)| !library.is_empty() && !item.is_empty())
        .ok_or_else(|| unsupported("url does not point at a file inside a document library"))?;

    let site = tenant.open_site(&site_url)?;
    log::debug!("Resolved {} in library {} of {}", item_name, library, site_url);

    Ok(ResolvedPackage {
        reference: reference.clone(),
        connector: Arc::new(LibraryConnector::new(Arc::from(site), library)),
        item_name: item_name.to_string(),
    })
}

/// Options for [`load_hierarchy`]
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory that overrides where template assets are read from
    pub resource_folder: Option<PathBuf>,
}

/// Read, sniff and deserialize a resolved package
pub fn load_hierarchy(package: &ResolvedPackage, options: &LoadOptions) -> Result<Hierarchy> {
    let reference = package.reference.to_string();
    let mut stream = package.connector.open(&package.item_name)?;

    let (mut hierarchy, source): (Hierarchy, Arc<dyn Connector>) =
        match format::detect(&mut stream)? {
            Format::RawMarkup => {
                if package.is_remote() {
                    return Err(Error::UnsupportedSource {
                        reference,
                        reason: "only compound packages are supported from a document library"
                            .to_string(),
                    });
                }
                let hierarchy = HierarchyFormatter::latest().parse(
                    BufReader::new(stream),
                    &reference,
                    package.connector.clone(),
                )?;
                (hierarchy, package.connector.clone())
            }
            Format::CompoundContainer => {
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes)?;
                drop(stream);

                let container = ContainerConnector::from_bytes(&package.item_name, bytes)
                    .map_err(|e| Error::invalid_package(&reference, e.to_string()))?;
                let markup = container.markup_entry(&package.item_name).ok_or_else(|| {
                    Error::invalid_package(&reference, "container holds no provisioning markup")
                })?;
                let container: Arc<dyn Connector> = Arc::new(container);

                log::debug!("Reading {} from container {}", markup, reference);
                let markup_stream = container.open(&markup)?;
                let hierarchy = HierarchyFormatter::latest().parse(
                    BufReader::new(markup_stream),
                    &reference,
                    container.clone(),
                )?;
                (hierarchy, container)
            }
        };

    bind_connector(
        &mut hierarchy,
        options.resource_folder.as_deref(),
        Some(source),
    )?;
    Ok(hierarchy)
}

/// Choose the asset connector of a hierarchy
///
/// An explicit resource folder wins, then the connector the hierarchy was
/// loaded through, then the working directory.
pub fn bind_connector(
    hierarchy: &mut Hierarchy,
    resource_folder: Option<&Path>,
    source: Option<Arc<dyn Connector>>,
) -> Result<()> {
    let connector: Arc<dyn Connector> = match (resource_folder, source) {
        (Some(folder), _) => {
            if !folder.is_dir() {
                return Err(Error::not_found(folder.display().to_string()));
            }
            Arc::new(FileSystemConnector::new(folder))
        }
        (None, Some(source)) => source,
        (None, None) => Arc::new(FileSystemConnector::new(std::env::current_dir()?)),
    };

    log::debug!("Assets resolve through {}", connector.describe());
    hierarchy.set_connector(connector);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTenant;
    use std::fs;
    use tempfile::TempDir;

    const MARKUP: &str = r#"<Provisioning><Sequence ID="s" /></Provisioning>"#;

    #[test]
    fn test_parse_reference() {
        assert!(PackageReference::parse("HTTPS://contoso/x.pnp").is_remote());
        assert_eq!(
            PackageReference::parse("templates/site.xml"),
            PackageReference::LocalPath(PathBuf::from("templates/site.xml"))
        );
    }

    #[test]
    fn test_resolve_local_relative_to_base() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("site.xml"), MARKUP).unwrap();

        let reference = PackageReference::parse("site.xml");
        let package = resolve(&reference, Some(dir.path()), None).unwrap();
        assert_eq!(package.item_name, "site.xml");
        assert!(package.connector.exists("site.xml"));
    }

    #[test]
    fn test_missing_local_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let reference = PackageReference::parse("missing.pnp");
        let err = resolve(&reference, Some(dir.path()), None).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_remote_without_tenant_is_unsupported() {
        let reference = PackageReference::parse("https://contoso.sharepoint.com/sites/a/Docs/x.pnp");
        let err = resolve(&reference, None, None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource { .. }));
    }

    #[test]
    fn test_resolve_remote_library_and_item() {
        let tenant = InMemoryTenant::new("https://contoso.sharepoint.com")
            .with_site("https://contoso.sharepoint.com/sites/a");
        let reference = PackageReference::parse(
            "https://contoso.sharepoint.com/sites/A/Shared%20Documents/packages/site.pnp",
        );

        let package = resolve(&reference, None, Some(&tenant)).unwrap();
        assert_eq!(package.item_name, "packages/site.pnp");
        assert_eq!(
            package.connector.describe(),
            "https://contoso.sharepoint.com/sites/a/Shared Documents"
        );
    }

    #[test]
    fn test_remote_library_root_is_unsupported() {
        let tenant = InMemoryTenant::new("https://contoso.sharepoint.com")
            .with_site("https://contoso.sharepoint.com/sites/a");
        let reference =
            PackageReference::parse("https://contoso.sharepoint.com/sites/a/Shared%20Documents");
        let err = resolve(&reference, None, Some(&tenant)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource { .. }));
    }

    #[test]
    fn test_remote_raw_markup_is_unsupported() {
        let site = "https://contoso.sharepoint.com/sites/a";
        let tenant = InMemoryTenant::new("https://contoso.sharepoint.com").with_site(site);
        tenant.put_file(site, "Docs/site.xml", MARKUP).unwrap();

        let reference = PackageReference::parse(&format!("{site}/Docs/site.xml"));
        let package = resolve(&reference, None, Some(&tenant)).unwrap();
        let err = load_hierarchy(&package, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("only compound packages"));
    }

    #[test]
    fn test_resource_folder_overrides_source() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        fs::create_dir(&assets).unwrap();
        fs::write(dir.path().join("site.xml"), MARKUP).unwrap();

        let package = resolve(&PackageReference::parse("site.xml"), Some(dir.path()), None).unwrap();
        let options = LoadOptions {
            resource_folder: Some(assets.clone()),
        };
        let hierarchy = load_hierarchy(&package, &options).unwrap();
        assert_eq!(hierarchy.connector().describe(), assets.display().to_string());
    }

    #[test]
    fn test_missing_resource_folder() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("site.xml"), MARKUP).unwrap();
        let package = resolve(&PackageReference::parse("site.xml"), Some(dir.path()), None).unwrap();
        let options = LoadOptions {
            resource_folder: Some(dir.path().join("nope")),
        };
        assert!(matches!(
            load_hierarchy(&package, &options),
            Err(Error::NotFound { .. })
        ));
    }
}
