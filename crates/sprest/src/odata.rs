//! Response payloads and request encoding helpers

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use provisioning::{Error, ItemValues, NavigationNodeInfo, Result};
use serde::Deserialize;
use serde_json::{Value, json};

/// SharePoint error code for a unique-value constraint violation
const DUPLICATE_VALUE_ERROR: i64 = -2_130_575_169;

#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Scalar<T> {
    pub value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SiteUrl {
    pub url: String,
}

/// `SPSiteManager` and `GroupSiteManager` creation status
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SiteStatus {
    pub site_status: u8,
    #[serde(default)]
    pub site_url: Option<String>,
}

impl SiteStatus {
    pub const READY: u8 = 2;
    pub const ERROR: u8 = 3;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Titled {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ThemingOptions {
    #[serde(default)]
    pub theme_previews: Vec<ThemePreview>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThemePreview {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Feature {
    pub definition_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct User {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub login_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Field {
    pub internal_name: String,
    pub title: String,
    pub type_as_string: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContentType {
    pub string_id: String,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field_links: Vec<FieldLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FieldLink {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContentTypeId {
    pub string_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct List {
    pub title: String,
    #[serde(default)]
    pub content_types: Vec<ContentTypeId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ItemId {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FormResult {
    pub field_name: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub has_exception: bool,
    #[serde(default)]
    pub item_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NavigationNode {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub children: Vec<NavigationNode>,
}

/// CSOM `ProcessQuery` response header
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ProcessQueryHeader {
    #[serde(default)]
    pub error_info: Option<ProcessQueryError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ProcessQueryError {
    pub error_message: String,
}

/// Quote a value as an OData string literal usable in a url path
///
/// Single quotes are doubled and each path segment is percent-encoded,
/// keeping `/` separators readable.
pub(crate) fn literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    let encoded: Vec<String> = escaped
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("'{}'", encoded.join("/"))
}

/// `$filter` clause matching one column value
pub(crate) fn equals_filter(column: &str, value: &str) -> String {
    let clause = format!("{} eq '{}'", column, value.replace('\'', "''"));
    urlencoding::encode(&clause).into_owned()
}

/// `https://host/sites/a` -> `/sites/a`, the root site -> empty
pub(crate) fn server_relative(url: &str) -> String {
    let url = url.trim_end_matches('/');
    match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or(String::new(), |i| rest[i..].to_string()),
        None => url.to_string(),
    }
}

/// Join a site's server-relative path and a site-relative path
pub(crate) fn join_path(site_path: &str, relative: &str) -> String {
    let relative = relative.trim_matches('/');
    if relative.is_empty() {
        site_path.to_string()
    } else {
        format!("{}/{}", site_path.trim_end_matches('/'), relative)
    }
}

/// Guid without braces, as the REST endpoints expect it
pub(crate) fn bare_guid(id: &str) -> &str {
    id.trim().trim_matches(['{', '}'])
}

/// Site content type a list content type was derived from
///
/// List copies append `00` and a 32 digit suffix to the parent id.
pub(crate) fn parent_content_type_id(list_content_type_id: &str) -> &str {
    let len = list_content_type_id.len();
    if len > 34 && list_content_type_id.get(len - 34..len - 32) == Some("00") {
        &list_content_type_id[..len - 34]
    } else {
        list_content_type_id
    }
}

/// Property bag key as exposed by `web/allproperties`
pub(crate) fn encode_property_name(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            encoded.push(c);
        } else {
            encoded.push_str(&format!("_x{:04x}_", u32::from(c)));
        }
    }
    encoded
}

/// Add `key` to the encoded `vti_indexedpropertykeys` value
///
/// Returns `None` when the key is already indexed.
pub(crate) fn add_indexed_key(current: Option<&str>, key: &str) -> Option<String> {
    let mut keys: Vec<String> = current
        .unwrap_or_default()
        .split('|')
        .filter(|part| !part.is_empty())
        .filter_map(|part| STANDARD.decode(part).ok())
        .map(|bytes| {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        })
        .collect();
    if keys.iter().any(|k| k == key) {
        return None;
    }
    keys.push(key.to_string());

    let encoded: String = keys
        .iter()
        .map(|k| {
            let bytes: Vec<u8> = k.encode_utf16().flat_map(u16::to_le_bytes).collect();
            format!("{}|", STANDARD.encode(bytes))
        })
        .collect();
    Some(encoded)
}

/// Item values in the shape `ValidateUpdateListItem` expects
pub(crate) fn form_values(values: &ItemValues) -> Value {
    Value::Array(
        values
            .iter()
            .map(|(name, value)| json!({ "FieldName": name, "FieldValue": value }))
            .collect(),
    )
}

/// Item id from validated form results, or the first field error
pub(crate) fn item_id_from_results(list_url: &str, key: &str, results: &[FormResult]) -> Result<u64> {
    if let Some(failed) = results.iter().find(|r| r.has_exception) {
        let message = failed.error_message.clone().unwrap_or_default();
        if failed.error_code == DUPLICATE_VALUE_ERROR || message.to_ascii_lowercase().contains("duplicate") {
            return Err(Error::DuplicateDataRow {
                list: list_url.to_string(),
                key: key.to_string(),
            });
        }
        return Err(Error::Remote {
            message: format!("{}: {} ({})", list_url, message, failed.field_name),
            status: None,
        });
    }
    Ok(results.iter().map(|r| r.item_id).max().unwrap_or_default())
}

/// Nested navigation nodes, parents before children
pub(crate) fn flatten_navigation(nodes: Vec<NavigationNode>) -> Vec<NavigationNodeInfo> {
    fn walk(nodes: Vec<NavigationNode>, parent: Option<u64>, out: &mut Vec<NavigationNodeInfo>) {
        for node in nodes {
            out.push(NavigationNodeInfo {
                id: node.id,
                title: node.title,
                url: node.url,
                parent,
            });
            walk(node.children, Some(node.id), out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, None, &mut out);
    out
}
