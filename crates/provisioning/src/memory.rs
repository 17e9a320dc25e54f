//! In-memory tenant
//!
//! A [`Tenant`] that keeps every site in memory. It records each call in a
//! journal, can be scripted to throttle specific operations, and enforces
//! unique list columns, which makes it the backend for tests and dry runs.

use crate::error::{Error, Result};
use crate::model::{
    ContentType, FeatureScope, Field, FieldRef, ListInstance, NavigationLocation, SiteCollection,
    SiteGroup, SubSite,
};
use crate::tenant::{ItemValues, ListInfo, NavigationNodeInfo, Site, Tenant};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Site the call was scoped to, `None` for tenant calls
    pub site: Option<String>,
    pub operation: &'static str,
    pub target: String,
}

/// A list and its items
#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub info: ListInfo,
    pub items: BTreeMap<u64, ItemValues>,
    next_id: u64,
}

/// Everything stored for one site
#[derive(Debug, Clone, Default)]
pub struct SiteState {
    pub url: String,
    pub is_sub_web: bool,
    pub site_features: BTreeSet<String>,
    pub web_features: BTreeSet<String>,
    pub administrators: Vec<String>,
    pub groups: BTreeMap<String, Vec<String>>,
    pub fields: BTreeMap<String, Field>,
    pub content_types: BTreeMap<String, ContentType>,
    /// Keyed by lower-cased site-relative url
    pub lists: BTreeMap<String, ListState>,
    /// Keyed by `folder/name`
    pub files: BTreeMap<String, Vec<u8>>,
    pub global_navigation: Vec<NavigationNodeInfo>,
    pub current_navigation: Vec<NavigationNodeInfo>,
    pub properties: BTreeMap<String, String>,
    pub indexed_properties: BTreeSet<String>,
    next_node_id: u64,
}

impl SiteState {
    fn new(url: &str, is_sub_web: bool) -> Self {
        Self {
            url: url.to_string(),
            is_sub_web,
            ..Default::default()
        }
    }

    fn navigation(&mut self, location: NavigationLocation) -> &mut Vec<NavigationNodeInfo> {
        match location {
            NavigationLocation::Global => &mut self.global_navigation,
            NavigationLocation::Current => &mut self.current_navigation,
        }
    }

    fn list_mut(&mut self, url: &str) -> Result<&mut ListState> {
        self.lists
            .get_mut(&url_key(url))
            .ok_or_else(|| Error::not_found(format!("list {url}")))
    }

    pub fn list(&self, url: &str) -> Option<&ListState> {
        self.lists.get(&url_key(url))
    }
}

#[derive(Debug, Default)]
struct TenantState {
    /// Keyed by lower-cased absolute url
    sites: BTreeMap<String, SiteState>,
    themes: BTreeMap<String, (String, bool)>,
    site_scripts: Vec<(String, String)>,
    journal: Vec<Call>,
    /// Remaining scripted transient failures per operation
    throttled: HashMap<&'static str, u32>,
    /// (site, list) -> unique columns
    unique_columns: HashMap<(String, String), Vec<String>>,
}

impl TenantState {
    fn record(&mut self, site: Option<&str>, operation: &'static str, target: &str) -> Result<()> {
        self.journal.push(Call {
            site: site.map(String::from),
            operation,
            target: target.to_string(),
        });

        if let Some(remaining) = self.throttled.get_mut(operation)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::Transient {
                message: format!("{operation} throttled"),
                status: Some(429),
            });
        }
        Ok(())
    }

    fn site_mut(&mut self, url: &str) -> Result<&mut SiteState> {
        self.sites
            .get_mut(&url_key(url))
            .ok_or_else(|| Error::not_found(url.to_string()))
    }
}

fn url_key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

fn file_key(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

fn lock(state: &Mutex<TenantState>) -> Result<MutexGuard<'_, TenantState>> {
    state
        .lock()
        .map_err(|_| Error::Other("tenant state lock poisoned".to_string()))
}

/// Tenant backed by memory
#[derive(Debug, Clone)]
pub struct InMemoryTenant {
    root_url: String,
    state: Arc<Mutex<TenantState>>,
}

impl InMemoryTenant {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into().trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(TenantState::default())),
        }
    }

    /// Add an existing site collection
    pub fn with_site(self, url: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.sites.insert(url_key(url), SiteState::new(url, false));
        }
        self
    }

    /// Put a file on a site, e.g. a package in a document library
    pub fn put_file(&self, site_url: &str, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let mut state = lock(&self.state)?;
        let site = state.site_mut(site_url)?;
        site.files
            .insert(path.trim_matches('/').to_string(), content.into());
        Ok(())
    }

    /// Make the next `times` calls of `operation` fail with HTTP 429
    pub fn throttle(&self, operation: &'static str, times: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.throttled.insert(operation, times);
        }
    }

    /// Reject items whose `columns` values already exist in the list
    pub fn set_unique_columns(&self, site_url: &str, list_url: &str, columns: &[&str]) {
        if let Ok(mut state) = self.state.lock() {
            state.unique_columns.insert(
                (url_key(site_url), url_key(list_url)),
                columns.iter().map(|c| (*c).to_string()).collect(),
            );
        }
    }

    /// Calls recorded so far
    pub fn journal(&self) -> Vec<Call> {
        self.state
            .lock()
            .map(|s| s.journal.clone())
            .unwrap_or_default()
    }

    /// Copy of a site's state
    pub fn site(&self, url: &str) -> Option<SiteState> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.sites.get(&url_key(url)).cloned())
    }

    /// Urls of all sites, sorted
    pub fn site_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.sites.values().map(|site| site.url.clone()).collect())
            .unwrap_or_default()
    }

    pub fn theme(&self, name: &str) -> Option<(String, bool)> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.themes.get(name).cloned())
    }
}

impl Tenant for InMemoryTenant {
    fn root_url(&self) -> &str {
        &self.root_url
    }

    fn site_url_from_item_url(&self, item_url: &str) -> Result<String> {
        let mut state = lock(&self.state)?;
        state.record(None, "site_url_from_item_url", item_url)?;

        let item = url_key(item_url);
        state
            .sites
            .iter()
            .filter(|(key, _)| item == **key || item.starts_with(&format!("{key}/")))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, site)| site.url.clone())
            .ok_or_else(|| Error::not_found(item_url.to_string()))
    }

    fn open_site(&self, url: &str) -> Result<Box<dyn Site>> {
        let mut state = lock(&self.state)?;
        state.record(None, "open_site", url)?;
        let site = state.site_mut(url)?;
        Ok(Box::new(InMemorySite {
            url: site.url.clone(),
            is_sub_web: site.is_sub_web,
            state: self.state.clone(),
        }))
    }

    fn site_exists(&self, url: &str) -> Result<bool> {
        let mut state = lock(&self.state)?;
        state.record(None, "site_exists", url)?;
        Ok(state.sites.contains_key(&url_key(url)))
    }

    fn create_site_collection(&self, site: &SiteCollection, url: &str) -> Result<String> {
        let mut state = lock(&self.state)?;
        state.record(None, "create_site_collection", url)?;
        let key = url_key(url);
        if state.sites.contains_key(&key) {
            return Err(Error::Remote {
                message: format!("site {url} already exists"),
                status: Some(409),
            });
        }
        log::debug!("Creating {:?} site {} ({})", site.kind, url, site.title);
        state.sites.insert(key, SiteState::new(url, false));
        Ok(url.to_string())
    }

    fn create_sub_site(&self, parent_url: &str, site: &SubSite, url: &str) -> Result<String> {
        let mut state = lock(&self.state)?;
        state.record(None, "create_sub_site", url)?;
        state.site_mut(parent_url)?;
        log::debug!("Creating subsite {} ({})", url, site.title);
        state.sites.insert(url_key(url), SiteState::new(url, true));
        Ok(url.to_string())
    }

    fn themes(&self) -> Result<Vec<String>> {
        let mut state = lock(&self.state)?;
        state.record(None, "themes", "")?;
        Ok(state.themes.keys().cloned().collect())
    }

    fn upsert_theme(&self, name: &str, palette_json: &str, is_inverted: bool) -> Result<()> {
        let mut state = lock(&self.state)?;
        state.record(None, "upsert_theme", name)?;
        state
            .themes
            .insert(name.to_string(), (palette_json.to_string(), is_inverted));
        Ok(())
    }

    fn site_scripts(&self) -> Result<Vec<String>> {
        let mut state = lock(&self.state)?;
        state.record(None, "site_scripts", "")?;
        Ok(state.site_scripts.iter().map(|(t, _)| t.clone()).collect())
    }

    fn add_site_script(&self, title: &str, _description: &str, content: &str) -> Result<()> {
        let mut state = lock(&self.state)?;
        state.record(None, "add_site_script", title)?;
        state
            .site_scripts
            .push((title.to_string(), content.to_string()));
        Ok(())
    }
}

/// Site context handed out by [`InMemoryTenant::open_site`]
struct InMemorySite {
    url: String,
    is_sub_web: bool,
    state: Arc<Mutex<TenantState>>,
}

impl InMemorySite {
    /// Record the call, apply scripted throttling, then run `f` on the site
    fn with<T>(
        &self,
        operation: &'static str,
        target: &str,
        f: impl FnOnce(&mut SiteState) -> Result<T>,
    ) -> Result<T> {
        let mut state = lock(&self.state)?;
        state.record(Some(&self.url), operation, target)?;
        f(state.site_mut(&self.url)?)
    }
}

impl Site for InMemorySite {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_sub_web(&self) -> bool {
        self.is_sub_web
    }

    fn active_features(&self, scope: FeatureScope) -> Result<Vec<String>> {
        self.with("active_features", "", |site| {
            let features = match scope {
                FeatureScope::Site => &site.site_features,
                FeatureScope::Web => &site.web_features,
            };
            Ok(features.iter().cloned().collect())
        })
    }

    fn set_feature(&self, scope: FeatureScope, id: &str, active: bool) -> Result<()> {
        self.with("set_feature", id, |site| {
            let features = match scope {
                FeatureScope::Site => &mut site.site_features,
                FeatureScope::Web => &mut site.web_features,
            };
            let id = id.to_ascii_lowercase();
            if active {
                features.insert(id);
            } else {
                features.remove(&id);
            }
            Ok(())
        })
    }

    fn site_groups(&self) -> Result<Vec<String>> {
        self.with("site_groups", "", |site| Ok(site.groups.keys().cloned().collect()))
    }

    fn create_site_group(&self, group: &SiteGroup) -> Result<()> {
        self.with("create_site_group", &group.title, |site| {
            site.groups.entry(group.title.clone()).or_default();
            Ok(())
        })
    }

    fn add_group_member(&self, group: &str, login: &str) -> Result<()> {
        self.with("add_group_member", login, |site| {
            let members = site
                .groups
                .get_mut(group)
                .ok_or_else(|| Error::not_found(format!("group {group}")))?;
            if !members.iter().any(|m| m.eq_ignore_ascii_case(login)) {
                members.push(login.to_string());
            }
            Ok(())
        })
    }

    fn administrators(&self) -> Result<Vec<String>> {
        self.with("administrators", "", |site| Ok(site.administrators.clone()))
    }

    fn add_administrator(&self, login: &str) -> Result<()> {
        self.with("add_administrator", login, |site| {
            site.administrators.push(login.to_string());
            Ok(())
        })
    }

    fn field(&self, id: &str) -> Result<Option<Field>> {
        self.with("field", id, |site| {
            Ok(site.fields.get(&id.to_ascii_lowercase()).cloned())
        })
    }

    fn create_field(&self, field: &Field) -> Result<()> {
        self.with("create_field", &field.name, |site| {
            site.fields
                .insert(field.id.to_ascii_lowercase(), field.clone());
            Ok(())
        })
    }

    fn update_field(&self, field: &Field) -> Result<()> {
        self.with("update_field", &field.name, |site| {
            let key = field.id.to_ascii_lowercase();
            match site.fields.get_mut(&key) {
                Some(existing) => {
                    *existing = field.clone();
                    Ok(())
                }
                None => Err(Error::not_found(format!("field {}", field.id))),
            }
        })
    }

    fn content_type(&self, id: &str) -> Result<Option<ContentType>> {
        self.with("content_type", id, |site| {
            Ok(site.content_types.get(&id.to_ascii_lowercase()).cloned())
        })
    }

    fn create_content_type(&self, content_type: &ContentType) -> Result<()> {
        self.with("create_content_type", &content_type.name, |site| {
            site.content_types
                .insert(content_type.id.to_ascii_lowercase(), content_type.clone());
            Ok(())
        })
    }

    fn add_field_link(&self, content_type_id: &str, field_id: &str, required: bool) -> Result<()> {
        self.with("add_field_link", field_id, |site| {
            let content_type = site
                .content_types
                .get_mut(&content_type_id.to_ascii_lowercase())
                .ok_or_else(|| Error::not_found(format!("content type {content_type_id}")))?;
            content_type.field_refs.push(FieldRef {
                id: field_id.to_string(),
                name: None,
                required,
            });
            Ok(())
        })
    }

    fn list(&self, url: &str) -> Result<Option<ListInfo>> {
        self.with("list", url, |site| Ok(site.list(url).map(|l| l.info.clone())))
    }

    fn create_list(&self, list: &ListInstance) -> Result<()> {
        self.with("create_list", &list.url, |site| {
            site.lists.insert(
                url_key(&list.url),
                ListState {
                    info: ListInfo {
                        title: list.title.clone(),
                        url: list.url.clone(),
                        content_types: Vec::new(),
                        default_content_type: None,
                    },
                    items: BTreeMap::new(),
                    next_id: 1,
                },
            );
            Ok(())
        })
    }

    fn add_list_content_type(&self, list_url: &str, content_type_id: &str) -> Result<()> {
        self.with("add_list_content_type", content_type_id, |site| {
            let info = &mut site.list_mut(list_url)?.info;
            if !info.content_types.iter().any(|c| c == content_type_id) {
                info.content_types.push(content_type_id.to_string());
            }
            if info.default_content_type.is_none() {
                info.default_content_type = Some(content_type_id.to_string());
            }
            Ok(())
        })
    }

    fn set_default_content_type(&self, list_url: &str, content_type_id: &str) -> Result<()> {
        self.with("set_default_content_type", content_type_id, |site| {
            let info = &mut site.list_mut(list_url)?.info;
            if !info
                .content_types
                .iter()
                .any(|c| c.eq_ignore_ascii_case(content_type_id))
            {
                return Err(Error::Remote {
                    message: format!("{content_type_id} is not bound to {list_url}"),
                    status: Some(400),
                });
            }
            info.default_content_type = Some(content_type_id.to_string());
            Ok(())
        })
    }

    fn find_item(&self, list_url: &str, column: &str, value: &str) -> Result<Option<u64>> {
        self.with("find_item", value, |site| {
            let list = site.list_mut(list_url)?;
            Ok(list
                .items
                .iter()
                .find(|(_, values)| values.get(column).is_some_and(|v| v == value))
                .map(|(id, _)| *id))
        })
    }

    fn add_item(&self, list_url: &str, values: &ItemValues) -> Result<u64> {
        let mut state = lock(&self.state)?;
        let target = values.values().next().cloned().unwrap_or_default();
        state.record(Some(&self.url), "add_item", &target)?;

        let unique = state
            .unique_columns
            .get(&(url_key(&self.url), url_key(list_url)))
            .cloned()
            .unwrap_or_default();
        let list = state.site_mut(&self.url)?.list_mut(list_url)?;

        for column in &unique {
            if let Some(value) = values.get(column)
                && list.items.values().any(|item| item.get(column) == Some(value))
            {
                return Err(Error::DuplicateDataRow {
                    list: list_url.to_string(),
                    key: value.clone(),
                });
            }
        }

        let id = list.next_id.max(1);
        list.next_id = id + 1;
        list.items.insert(id, values.clone());
        Ok(id)
    }

    fn update_item(&self, list_url: &str, id: u64, values: &ItemValues) -> Result<()> {
        self.with("update_item", &id.to_string(), |site| {
            let item = site
                .list_mut(list_url)?
                .items
                .get_mut(&id)
                .ok_or_else(|| Error::not_found(format!("item {id} in {list_url}")))?;
            item.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        })
    }

    fn file_exists(&self, folder: &str, name: &str) -> Result<bool> {
        let key = file_key(folder, name);
        self.with("file_exists", &key, |site| Ok(site.files.contains_key(&key)))
    }

    fn upload_file(&self, folder: &str, name: &str, content: &[u8], overwrite: bool) -> Result<()> {
        let key = file_key(folder, name);
        self.with("upload_file", &key, |site| {
            if site.files.contains_key(&key) && !overwrite {
                return Err(Error::Remote {
                    message: format!("{key} already exists"),
                    status: Some(409),
                });
            }
            site.files.insert(key.clone(), content.to_vec());
            Ok(())
        })
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let key = path.trim_matches('/').to_string();
        self.with("read_file", &key, |site| {
            site.files
                .get(&key)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("{}/{}", site.url, key)))
        })
    }

    fn navigation_nodes(&self, location: NavigationLocation) -> Result<Vec<NavigationNodeInfo>> {
        self.with("navigation_nodes", "", |site| Ok(site.navigation(location).clone()))
    }

    fn remove_navigation_node(&self, location: NavigationLocation, id: u64) -> Result<()> {
        self.with("remove_navigation_node", &id.to_string(), |site| {
            let nodes = site.navigation(location);
            let mut removed = vec![id];
            // Children are stored after their parents
            for node in nodes.iter() {
                if node.parent.is_some_and(|p| removed.contains(&p)) {
                    removed.push(node.id);
                }
            }
            nodes.retain(|n| !removed.contains(&n.id));
            Ok(())
        })
    }

    fn add_navigation_node(
        &self,
        location: NavigationLocation,
        parent: Option<u64>,
        title: &str,
        url: &str,
        is_external: bool,
    ) -> Result<u64> {
        self.with("add_navigation_node", title, |site| {
            site.next_node_id += 1;
            let id = site.next_node_id;
            log::trace!("Adding node {} (external: {})", title, is_external);
            site.navigation(location).push(NavigationNodeInfo {
                id,
                title: title.to_string(),
                url: url.to_string(),
                parent,
            });
            Ok(id)
        })
    }

    fn property(&self, key: &str) -> Result<Option<String>> {
        self.with("property", key, |site| Ok(site.properties.get(key).cloned()))
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.with("set_property", key, |site| {
            site.properties.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn index_property(&self, key: &str) -> Result<()> {
        self.with("index_property", key, |site| {
            site.indexed_properties.insert(key.to_string());
            Ok(())
        })
    }
}
