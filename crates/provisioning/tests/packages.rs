mod common;

use common::{FIRST, HIERARCHY, ROOT};
use provisioning::{
    Error, Format, InMemoryTenant, LoadOptions, PackageReference, detect, load_hierarchy, resolve,
};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn container(markup_name: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<Types />").unwrap();
    writer.start_file(markup_name, options).unwrap();
    writer.write_all(HIERARCHY.as_bytes()).unwrap();
    writer.start_file("files/logo.png", options).unwrap();
    writer.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
    writer.finish().unwrap().into_inner()
}

fn load_local(dir: &Path, name: &str) -> provisioning::Hierarchy {
    let reference = PackageReference::parse(name);
    let package = resolve(&reference, Some(dir), None).unwrap();
    load_hierarchy(&package, &LoadOptions::default()).unwrap()
}

#[test]
fn test_container_and_raw_markup_load_the_same_hierarchy() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("intranet.xml"), HIERARCHY).unwrap();
    fs::write(dir.path().join("intranet.pnp"), container("intranet.xml")).unwrap();

    let raw = load_local(dir.path(), "intranet.xml");
    let packed = load_local(dir.path(), "intranet.pnp");

    assert_eq!(raw.sequences, packed.sequences);
    assert_eq!(raw.templates, packed.templates);
    assert_eq!(raw.parameters, packed.parameters);
    assert_eq!(raw.schema, packed.schema);
}

#[test]
fn test_container_assets_resolve_inside_the_container() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("intranet.pnp"), container("intranet.xml")).unwrap();

    let hierarchy = load_local(dir.path(), "intranet.pnp");

    assert!(hierarchy.connector().exists("files/logo.png"));
    assert!(hierarchy.connector().describe().contains("intranet.pnp"));
}

#[test]
fn test_resource_folder_overrides_asset_location() {
    let dir = TempDir::new().unwrap();
    let assets = dir.path().join("assets");
    fs::create_dir(&assets).unwrap();
    fs::write(assets.join("banner.png"), b"png").unwrap();
    fs::write(dir.path().join("intranet.pnp"), container("intranet.xml")).unwrap();

    let package = resolve(&PackageReference::parse("intranet.pnp"), Some(dir.path()), None).unwrap();
    let options = LoadOptions {
        resource_folder: Some(assets),
    };
    let hierarchy = load_hierarchy(&package, &options).unwrap();

    assert!(hierarchy.connector().exists("banner.png"));
    assert!(!hierarchy.connector().exists("files/logo.png"));
}

#[test]
fn test_container_with_single_markup_of_other_name() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("release-7.pnp"), container("hierarchy.xml")).unwrap();

    let hierarchy = load_local(dir.path(), "release-7.pnp");
    assert_eq!(hierarchy.sequences.len(), 2);
}

#[test]
fn test_missing_local_package_fails_before_remote_calls() {
    let dir = TempDir::new().unwrap();
    let tenant = InMemoryTenant::new(ROOT);

    let err = resolve(
        &PackageReference::parse("missing.pnp"),
        Some(dir.path()),
        Some(&tenant),
    )
    .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert!(tenant.journal().is_empty());
}

#[test]
fn test_container_from_document_library() {
    let tenant = InMemoryTenant::new(ROOT).with_site(FIRST);
    tenant
        .put_file(FIRST, "Shared Documents/Templates/intranet.pnp", container("intranet.xml"))
        .unwrap();

    let url = format!("{FIRST}/Shared%20Documents/Templates/intranet.pnp");
    let reference = PackageReference::parse(&url);
    assert!(reference.is_remote());

    let package = resolve(&reference, None, Some(&tenant)).unwrap();
    assert_eq!(package.item_name, "Templates/intranet.pnp");

    let hierarchy = load_hierarchy(&package, &LoadOptions::default()).unwrap();
    assert_eq!(hierarchy.sequence_ids(), vec!["FIRST", "SECOND"]);
}

#[test]
fn test_raw_markup_from_document_library_is_unsupported() {
    let tenant = InMemoryTenant::new(ROOT).with_site(FIRST);
    tenant
        .put_file(FIRST, "Shared Documents/intranet.xml", HIERARCHY)
        .unwrap();

    let reference = PackageReference::parse(&format!("{FIRST}/Shared Documents/intranet.xml"));
    let package = resolve(&reference, None, Some(&tenant)).unwrap();
    let err = load_hierarchy(&package, &LoadOptions::default()).unwrap_err();

    assert!(matches!(err, Error::UnsupportedSource { .. }));
}

#[test]
fn test_detect_sniffs_both_formats() {
    let mut raw = Cursor::new(HIERARCHY.as_bytes().to_vec());
    assert_eq!(detect(&mut raw).unwrap(), Format::RawMarkup);

    let mut packed = Cursor::new(container("intranet.xml"));
    assert_eq!(detect(&mut packed).unwrap(), Format::CompoundContainer);
    assert_eq!(packed.position(), 0);
}

#[test]
fn test_corrupt_container_is_invalid_package() {
    let dir = TempDir::new().unwrap();
    let mut bytes = b"PK\x03\x04".to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    fs::write(dir.path().join("broken.pnp"), bytes).unwrap();

    let package = resolve(&PackageReference::parse("broken.pnp"), Some(dir.path()), None).unwrap();
    let err = load_hierarchy(&package, &LoadOptions::default()).unwrap_err();

    assert!(matches!(err, Error::InvalidPackage { .. }));
}
