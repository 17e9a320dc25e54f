//! In-memory provisioning hierarchy model
//!
//! Produced once by the deserializer and treated as read-only by the engine.

use crate::connector::Connector;
use crate::schema::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Top-level provisioning package
#[derive(Debug, Clone, Serialize)]
pub struct Hierarchy {
    pub schema: SchemaVersion,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub generator: Option<String>,
    pub version: Option<String>,
    /// Values for `{parameter:Name}` tokens
    pub parameters: BTreeMap<String, String>,
    pub templates: Vec<ProvisioningTemplate>,
    pub sequences: Vec<Sequence>,
    /// Resolves relative asset references found inside templates
    #[serde(skip)]
    connector: Arc<dyn Connector>,
}

impl Hierarchy {
    /// Create an empty hierarchy bound to a connector
    pub fn new(schema: SchemaVersion, connector: Arc<dyn Connector>) -> Self {
        Self {
            schema,
            display_name: None,
            description: None,
            author: None,
            generator: None,
            version: None,
            parameters: BTreeMap::new(),
            templates: Vec::new(),
            sequences: Vec::new(),
            connector,
        }
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Rebind asset resolution, e.g. to a user supplied resource folder
    pub fn set_connector(&mut self, connector: Arc<dyn Connector>) {
        self.connector = connector;
    }

    pub fn sequence(&self, id: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&ProvisioningTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn sequence_ids(&self) -> Vec<&str> {
        self.sequences.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Ordered unit of provisioning work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    pub site_collections: Vec<SiteCollection>,
}

impl Sequence {
    /// Number of sites (collections and all nested subsites)
    pub fn site_count(&self) -> usize {
        fn count(sites: &[SubSite]) -> usize {
            sites.iter().map(|s| 1 + count(&s.sites)).sum()
        }
        self.site_collections
            .iter()
            .map(|sc| 1 + count(&sc.sites))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteCollectionKind {
    #[default]
    CommunicationSite,
    /// Group-connected team site, addressed by alias
    TeamSite,
    TeamSiteNoGroup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCollection {
    pub kind: SiteCollectionKind,
    pub title: String,
    /// Absolute or token url (communication and no-group sites)
    pub url: Option<String>,
    /// Mail alias (group-connected team sites)
    pub alias: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub language: Option<u32>,
    pub is_public: bool,
    pub is_hub_site: bool,
    /// Ids of templates applied to this site, in order
    pub templates: Vec<String>,
    pub sites: Vec<SubSite>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSite {
    pub title: String,
    /// Url segment relative to the parent site
    pub url: String,
    pub description: Option<String>,
    pub language: Option<u32>,
    pub use_same_permissions_as_parent: bool,
    pub templates: Vec<String>,
    pub sites: Vec<SubSite>,
}

/// Site-level (and optionally tenant-level) configuration to apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningTemplate {
    pub id: String,
    pub version: Option<String>,
    pub tenant: Option<TenantSettings>,
    pub security: Option<SiteSecurity>,
    pub features: Vec<Feature>,
    pub fields: Vec<Field>,
    pub content_types: Vec<ContentType>,
    pub lists: Vec<ListInstance>,
    pub files: Vec<FileAsset>,
    pub navigation: Option<Navigation>,
    pub property_bag_entries: Vec<PropertyBagEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub themes: Vec<Theme>,
    pub site_scripts: Vec<SiteScript>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub is_inverted: bool,
    /// JSON palette
    pub palette: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteScript {
    pub title: String,
    pub description: Option<String>,
    /// Package-relative path to the script JSON
    pub json_file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSecurity {
    pub additional_administrators: Vec<String>,
    pub site_groups: Vec<SiteGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteGroup {
    pub title: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureScope {
    Site,
    #[default]
    Web,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub scope: FeatureScope,
    pub deactivate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub field_type: String,
    pub group: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: String,
    pub name: String,
    pub group: Option<String>,
    pub description: Option<String>,
    pub field_refs: Vec<FieldRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub id: String,
    pub name: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInstance {
    pub title: String,
    /// Site-relative url, e.g. `Lists/Projects`
    pub url: String,
    pub template_type: u32,
    pub description: Option<String>,
    pub on_quick_launch: bool,
    pub enable_versioning: bool,
    pub content_type_bindings: Vec<ContentTypeBinding>,
    pub data_rows: Option<DataRows>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeBinding {
    pub content_type_id: String,
    pub default: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateBehavior {
    #[default]
    Overwrite,
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRows {
    /// Column used to match rows against existing items
    pub key_column: Option<String>,
    pub update_behavior: UpdateBehavior,
    pub rows: Vec<DataRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRow {
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    /// Package-relative source path
    pub src: String,
    /// Site-relative target folder
    pub folder: String,
    /// Target file name, defaults to the source file name
    pub target_name: Option<String>,
    pub overwrite: bool,
}

impl FileAsset {
    pub fn file_name(&self) -> &str {
        self.target_name.as_deref().unwrap_or_else(|| {
            self.src
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(self.src.as_str())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationLocation {
    /// Top navigation bar
    Global,
    /// Quick launch
    Current,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub global: Option<StructuralNavigation>,
    pub current: Option<StructuralNavigation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralNavigation {
    pub remove_existing_nodes: bool,
    pub nodes: Vec<NavigationNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationNode {
    pub title: String,
    pub url: String,
    pub is_external: bool,
    pub children: Vec<NavigationNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBagEntry {
    pub key: String,
    pub value: String,
    pub overwrite: bool,
    pub indexed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_count() {
        let sequence = Sequence {
            id: "s".into(),
            site_collections: vec![SiteCollection {
                sites: vec![
                    SubSite {
                        sites: vec![SubSite::default()],
                        ..Default::default()
                    },
                    SubSite::default(),
                ],
                ..Default::default()
            }],
        };
        assert_eq!(sequence.site_count(), 4);
    }

    #[test]
    fn test_file_asset_name() {
        let asset = FileAsset {
            src: "images\\logo.png".into(),
            ..Default::default()
        };
        assert_eq!(asset.file_name(), "logo.png");

        let renamed = FileAsset {
            target_name: Some("brand.png".into()),
            ..asset
        };
        assert_eq!(renamed.file_name(), "brand.png");
    }
}
