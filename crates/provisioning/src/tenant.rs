//! Remote capability surface
//!
//! The engine never talks to a concrete client. Everything it needs from the
//! remote collaboration platform is expressed by [`Tenant`] (tenant-wide
//! operations and site resolution) and [`Site`] (operations scoped to one
//! site, the equivalent of a cloned client context).
//!
//! Implementations must be side-effect free on lookups and should map
//! throttling and timeouts to [`Error::Transient`](crate::Error::Transient)
//! so the engine can retry them.

use crate::error::Result;
use crate::model::{
    ContentType, FeatureScope, Field, ListInstance, NavigationLocation, SiteCollection, SiteGroup,
    SubSite,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A list as seen on the remote site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInfo {
    pub title: String,
    /// Site-relative url, e.g. `Lists/Projects`
    pub url: String,
    /// Content type ids bound to the list
    pub content_types: Vec<String>,
    /// First content type in the new-button order
    pub default_content_type: Option<String>,
}

/// A navigation node as seen on the remote site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationNodeInfo {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub parent: Option<u64>,
}

/// Field values of a list item, keyed by internal field name
pub type ItemValues = BTreeMap<String, String>;

/// Operations scoped to a single site (web)
pub trait Site: Send + Sync {
    /// Absolute url of the site
    fn url(&self) -> &str;

    /// Whether this site is a subsite below a site collection root
    fn is_sub_web(&self) -> bool;

    // Features

    /// Ids of active features in the given scope
    fn active_features(&self, scope: FeatureScope) -> Result<Vec<String>>;

    /// Activate or deactivate a feature
    fn set_feature(&self, scope: FeatureScope, id: &str, active: bool) -> Result<()>;

    // Security

    /// Titles of existing site groups
    fn site_groups(&self) -> Result<Vec<String>>;

    /// Create a site group
    fn create_site_group(&self, group: &SiteGroup) -> Result<()>;

    /// Add a member (login name) to a site group
    fn add_group_member(&self, group: &str, login: &str) -> Result<()>;

    /// Login names of site collection administrators
    fn administrators(&self) -> Result<Vec<String>>;

    /// Add a site collection administrator
    fn add_administrator(&self, login: &str) -> Result<()>;

    // Fields

    /// Look up a site field by id
    fn field(&self, id: &str) -> Result<Option<Field>>;

    /// Create a site field
    fn create_field(&self, field: &Field) -> Result<()>;

    /// Update an existing site field in place
    fn update_field(&self, field: &Field) -> Result<()>;

    // Content types

    /// Look up a content type by id
    fn content_type(&self, id: &str) -> Result<Option<ContentType>>;

    /// Create a content type including its field links
    fn create_content_type(&self, content_type: &ContentType) -> Result<()>;

    /// Add a field link to an existing content type
    fn add_field_link(&self, content_type_id: &str, field_id: &str, required: bool) -> Result<()>;

    // Lists

    /// Look up a list by site-relative url
    fn list(&self, url: &str) -> Result<Option<ListInfo>>;

    /// Create a list
    fn create_list(&self, list: &ListInstance) -> Result<()>;

    /// Bind a content type to a list
    fn add_list_content_type(&self, list_url: &str, content_type_id: &str) -> Result<()>;

    /// Make a bound content type the list default
    fn set_default_content_type(&self, list_url: &str, content_type_id: &str) -> Result<()>;

    // Items

    /// Find the id of the first item whose `column` equals `value`
    fn find_item(&self, list_url: &str, column: &str, value: &str) -> Result<Option<u64>>;

    /// Add an item, returning its id
    ///
    /// Implementations return [`Error::DuplicateDataRow`](crate::Error::DuplicateDataRow)
    /// when a unique-value constraint rejects the row.
    fn add_item(&self, list_url: &str, values: &ItemValues) -> Result<u64>;

    /// Overwrite values of an existing item
    fn update_item(&self, list_url: &str, id: u64, values: &ItemValues) -> Result<()>;

    // Files

    /// Whether a file exists at `folder/name` (site-relative)
    fn file_exists(&self, folder: &str, name: &str) -> Result<bool>;

    /// Upload a file into a site-relative folder
    fn upload_file(&self, folder: &str, name: &str, content: &[u8], overwrite: bool)
    -> Result<()>;

    /// Download a file by site-relative path
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    // Navigation

    /// All nodes of a navigation location, parents before children
    fn navigation_nodes(&self, location: NavigationLocation) -> Result<Vec<NavigationNodeInfo>>;

    /// Remove a navigation node (and its children)
    fn remove_navigation_node(&self, location: NavigationLocation, id: u64) -> Result<()>;

    /// Add a navigation node, returning its id
    fn add_navigation_node(
        &self,
        location: NavigationLocation,
        parent: Option<u64>,
        title: &str,
        url: &str,
        is_external: bool,
    ) -> Result<u64>;

    // Property bag

    /// Read a property bag value
    fn property(&self, key: &str) -> Result<Option<String>>;

    /// Write a property bag value
    fn set_property(&self, key: &str, value: &str) -> Result<()>;

    /// Mark a property bag key as indexed for search
    fn index_property(&self, key: &str) -> Result<()>;
}

/// Tenant-wide operations
pub trait Tenant: Send + Sync {
    /// Root url of the tenant, e.g. `https://contoso.sharepoint.com`
    fn root_url(&self) -> &str;

    /// Url of the site that owns a folder, file or page url
    fn site_url_from_item_url(&self, item_url: &str) -> Result<String>;

    /// Open a context scoped to a site
    fn open_site(&self, url: &str) -> Result<Box<dyn Site>>;

    /// Whether a site exists at `url`
    fn site_exists(&self, url: &str) -> Result<bool>;

    /// Create a site collection, returning its url
    fn create_site_collection(&self, site: &SiteCollection, url: &str) -> Result<String>;

    /// Create a subsite below `parent_url`, returning its url
    fn create_sub_site(&self, parent_url: &str, site: &SubSite, url: &str) -> Result<String>;

    /// Names of tenant themes
    fn themes(&self) -> Result<Vec<String>>;

    /// Create or replace a tenant theme
    fn upsert_theme(&self, name: &str, palette_json: &str, is_inverted: bool) -> Result<()>;

    /// Titles of registered site scripts
    fn site_scripts(&self) -> Result<Vec<String>>;

    /// Register a site script
    fn add_site_script(&self, title: &str, description: &str, content: &str) -> Result<()>;
}
