//! Operations scoped to one site

use crate::client::{Payload, RestClient, Verb};
use crate::odata::{
    self, Collection, ContentTypeId, FormResult, ItemId, NavigationNode, ProcessQueryHeader,
    Scalar, Titled, User, bare_guid, equals_filter, join_path, literal, parent_content_type_id,
};
use crate::xml;
use provisioning::model::{
    ContentType, FeatureScope, Field, FieldRef, ListInstance, NavigationLocation, SiteGroup,
};
use provisioning::{Error, ItemValues, ListInfo, NavigationNodeInfo, Result, Site};
use serde_json::{Map, Value, json};

const INDEXED_KEYS_PROPERTY: &str = "vti_indexedpropertykeys";

/// A site (web) reached through the REST API
#[derive(Debug, Clone)]
pub struct RestSite {
    url: String,
    /// Server-relative path, empty for the tenant root
    path: String,
    is_sub_web: bool,
    client: RestClient,
}

impl RestSite {
    pub fn new(url: &str, is_sub_web: bool, client: RestClient) -> Self {
        let url = url.trim_end_matches('/').to_string();
        Self {
            path: odata::server_relative(&url),
            url,
            is_sub_web,
            client,
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/_api/{}", self.url, path)
    }

    fn list_api(&self, list_url: &str, rest: &str) -> String {
        let list = literal(&join_path(&self.path, list_url));
        if rest.is_empty() {
            self.api(&format!("web/GetList({list})"))
        } else {
            self.api(&format!("web/GetList({list})/{rest}"))
        }
    }

    fn file_api(&self, path: &str, rest: &str) -> String {
        self.api(&format!(
            "web/GetFileByServerRelativePath(decodedurl={})/{}",
            literal(&join_path(&self.path, path)),
            rest
        ))
    }

    fn scope_path(scope: FeatureScope) -> &'static str {
        match scope {
            FeatureScope::Site => "site",
            FeatureScope::Web => "web",
        }
    }

    fn navigation_path(location: NavigationLocation) -> &'static str {
        match location {
            NavigationLocation::Global => "topnavigationbar",
            NavigationLocation::Current => "quicklaunch",
        }
    }

    fn post(&self, url: &str, body: &Value) -> Result<()> {
        self.client.execute(Verb::Post, url, Payload::Json(body))
    }

    fn merge(&self, url: &str, body: &Value) -> Result<()> {
        self.client.execute(Verb::Merge, url, Payload::Json(body))
    }

    /// List content type ids in new-button order
    fn list_content_types(&self, list_url: &str) -> Result<Vec<String>> {
        let types: Collection<ContentTypeId> = self
            .client
            .get_json(&self.list_api(list_url, "ContentTypes?$select=StringId"))?;
        Ok(types.value.into_iter().map(|c| c.string_id).collect())
    }

    /// Run a CSOM `ProcessQuery` request
    fn process_query(&self, body: &str) -> Result<()> {
        let url = format!("{}/_vti_bin/client.svc/ProcessQuery", self.url);
        let mut response = self.client.send(
            Verb::Post,
            &url,
            Payload::Bytes {
                content_type: "text/xml",
                bytes: body.as_bytes(),
            },
        )?;
        let headers: Vec<Value> = response.body_mut().read_json().map_err(|e| Error::Remote {
            message: format!("{url}: unexpected response: {e}"),
            status: None,
        })?;

        let header = headers
            .into_iter()
            .next()
            .and_then(|h| serde_json::from_value::<ProcessQueryHeader>(h).ok());
        match header.and_then(|h| h.error_info) {
            Some(error) => Err(Error::Remote {
                message: format!("{}: {}", self.url, error.error_message),
                status: None,
            }),
            None => Ok(()),
        }
    }

    fn validate_update(&self, list_url: &str, url: &str, key: &str, body: &Value) -> Result<u64> {
        let results: Collection<FormResult> = self.client.post_json(url, body)?;
        odata::item_id_from_results(list_url, key, &results.value)
    }
}

impl Site for RestSite {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_sub_web(&self) -> bool {
        self.is_sub_web
    }

    fn active_features(&self, scope: FeatureScope) -> Result<Vec<String>> {
        let features: Collection<odata::Feature> = self.client.get_json(&self.api(&format!(
            "{}/features?$select=DefinitionId",
            Self::scope_path(scope)
        )))?;
        Ok(features.value.into_iter().map(|f| f.definition_id).collect())
    }

    fn set_feature(&self, scope: FeatureScope, id: &str, active: bool) -> Result<()> {
        let operation = if active { "add" } else { "remove" };
        let url = self.api(&format!(
            "{}/features/{}(featureId=guid'{}',force=false)",
            Self::scope_path(scope),
            operation,
            bare_guid(id)
        ));
        self.client.execute(Verb::Post, &url, Payload::Empty)
    }

    fn site_groups(&self) -> Result<Vec<String>> {
        let groups: Collection<Titled> = self
            .client
            .get_json(&self.api("web/sitegroups?$select=Title"))?;
        Ok(groups.value.into_iter().map(|g| g.title).collect())
    }

    fn create_site_group(&self, group: &SiteGroup) -> Result<()> {
        self.post(
            &self.api("web/sitegroups"),
            &json!({
                "Title": group.title,
                "Description": group.description.clone().unwrap_or_default(),
            }),
        )
    }

    fn add_group_member(&self, group: &str, login: &str) -> Result<()> {
        self.post(
            &self.api(&format!("web/sitegroups/getbyname({})/users", literal(group))),
            &json!({ "LoginName": login }),
        )
    }

    fn administrators(&self) -> Result<Vec<String>> {
        let filter = urlencoding::encode("IsSiteAdmin eq true");
        let users: Collection<User> = self.client.get_json(&self.api(&format!(
            "web/siteusers?$filter={filter}&$select=Id,LoginName"
        )))?;
        Ok(users.value.into_iter().map(|u| u.login_name).collect())
    }

    fn add_administrator(&self, login: &str) -> Result<()> {
        let user: User = self
            .client
            .post_json(&self.api("web/ensureuser"), &json!({ "logonName": login }))?;
        self.merge(
            &self.api(&format!("web/getuserbyid({})", user.id)),
            &json!({ "IsSiteAdmin": true }),
        )
    }

    fn field(&self, id: &str) -> Result<Option<Field>> {
        let url = self.api(&format!(
            "web/fields/getbyid('{}')?$select=InternalName,Title,TypeAsString,Group,Required",
            bare_guid(id)
        ));
        let found: Option<odata::Field> = self.client.get_optional(&url)?;
        Ok(found.map(|f| Field {
            id: id.to_string(),
            name: f.internal_name,
            display_name: f.title,
            field_type: f.type_as_string,
            group: f.group.filter(|g| !g.is_empty()),
            required: f.required,
        }))
    }

    fn create_field(&self, field: &Field) -> Result<()> {
        self.post(
            &self.api("web/fields/createfieldasxml"),
            &json!({
                "parameters": {
                    "SchemaXml": xml::field_schema(field),
                    "Options": 0,
                }
            }),
        )
    }

    fn update_field(&self, field: &Field) -> Result<()> {
        self.merge(
            &self.api(&format!("web/fields/getbyid('{}')", bare_guid(&field.id))),
            &json!({
                "Title": field.display_name,
                "Group": field.group.clone().unwrap_or_default(),
                "Required": field.required,
            }),
        )
    }

    fn content_type(&self, id: &str) -> Result<Option<ContentType>> {
        let url = self.api(&format!(
            "web/contenttypes('{id}')?$select=StringId,Name,Group,Description,FieldLinks/Id,FieldLinks/Name,FieldLinks/Required&$expand=FieldLinks"
        ));
        let found: Option<odata::ContentType> = self.client.get_optional(&url)?;
        Ok(found.map(|c| ContentType {
            id: c.string_id,
            name: c.name,
            group: c.group.filter(|g| !g.is_empty()),
            description: c.description.filter(|d| !d.is_empty()),
            field_refs: c
                .field_links
                .into_iter()
                .map(|link| FieldRef {
                    id: link.id,
                    name: link.name,
                    required: link.required,
                })
                .collect(),
        }))
    }

    fn create_content_type(&self, content_type: &ContentType) -> Result<()> {
        self.post(
            &self.api("web/contenttypes"),
            &json!({
                "Id": { "StringValue": content_type.id },
                "Name": content_type.name,
                "Group": content_type.group.clone().unwrap_or_default(),
                "Description": content_type.description.clone().unwrap_or_default(),
            }),
        )?;
        for field_ref in &content_type.field_refs {
            self.add_field_link(&content_type.id, &field_ref.id, field_ref.required)?;
        }
        Ok(())
    }

    fn add_field_link(&self, content_type_id: &str, field_id: &str, required: bool) -> Result<()> {
        let field = self
            .field(field_id)?
            .ok_or_else(|| Error::not_found(format!("field {field_id} on {}", self.url)))?;
        self.post(
            &self.api(&format!("web/contenttypes('{content_type_id}')/fieldlinks")),
            &json!({
                "FieldInternalName": field.name,
                "Required": required,
            }),
        )
    }

    fn list(&self, url: &str) -> Result<Option<ListInfo>> {
        let api = format!(
            "{}?$select=Title,ContentTypes/StringId&$expand=ContentTypes",
            self.list_api(url, "")
        );
        let found: Option<odata::List> = self.client.get_optional(&api)?;
        Ok(found.map(|list| {
            let content_types: Vec<String> = list
                .content_types
                .iter()
                .map(|c| parent_content_type_id(&c.string_id).to_string())
                .collect();
            ListInfo {
                title: list.title,
                url: url.to_string(),
                default_content_type: content_types.first().cloned(),
                content_types,
            }
        }))
    }

    fn create_list(&self, list: &ListInstance) -> Result<()> {
        self.post(
            &self.api("web/lists/add"),
            &json!({
                "parameters": {
                    "Title": list.title,
                    "Url": list.url,
                    "Description": list.description.clone().unwrap_or_default(),
                    "TemplateType": list.template_type,
                    "QuickLaunchOption": u8::from(list.on_quick_launch),
                }
            }),
        )?;

        let mut settings = Map::new();
        if list.enable_versioning {
            settings.insert("EnableVersioning".into(), Value::Bool(true));
        }
        if !list.content_type_bindings.is_empty() {
            settings.insert("ContentTypesEnabled".into(), Value::Bool(true));
        }
        if !settings.is_empty() {
            self.merge(&self.list_api(&list.url, ""), &Value::Object(settings))?;
        }
        Ok(())
    }

    fn add_list_content_type(&self, list_url: &str, content_type_id: &str) -> Result<()> {
        self.post(
            &self.list_api(list_url, "ContentTypes/AddAvailableContentType"),
            &json!({ "contentTypeId": content_type_id }),
        )
    }

    fn set_default_content_type(&self, list_url: &str, content_type_id: &str) -> Result<()> {
        let bound = self.list_content_types(list_url)?;
        let (default, others): (Vec<String>, Vec<String>) = bound
            .into_iter()
            .partition(|id| parent_content_type_id(id).eq_ignore_ascii_case(content_type_id));
        if default.is_empty() {
            return Err(Error::Remote {
                message: format!("{content_type_id} is not bound to {list_url}"),
                status: Some(400),
            });
        }

        let order: Vec<Value> = default
            .into_iter()
            .chain(others.into_iter().filter(|id| !id.starts_with("0x0120")))
            .map(|id| json!({ "StringValue": id }))
            .collect();
        self.merge(
            &self.list_api(list_url, "RootFolder"),
            &json!({ "UniqueContentTypeOrder": order }),
        )
    }

    fn find_item(&self, list_url: &str, column: &str, value: &str) -> Result<Option<u64>> {
        let items: Collection<ItemId> = self.client.get_json(&self.list_api(
            list_url,
            &format!("items?$select=Id&$top=1&$filter={}", equals_filter(column, value)),
        ))?;
        Ok(items.value.first().map(|item| item.id))
    }

    fn add_item(&self, list_url: &str, values: &ItemValues) -> Result<u64> {
        let key = values.values().next().cloned().unwrap_or_default();
        let body = json!({
            "listItemCreateInfo": {
                "FolderPath": { "DecodedUrl": join_path(&self.path, list_url) },
                "UnderlyingObjectType": 0,
            },
            "formValues": odata::form_values(values),
            "bNewDocumentUpdate": false,
        });
        let url = self.list_api(list_url, "AddValidateUpdateItemUsingPath");
        self.validate_update(list_url, &url, &key, &body)
    }

    fn update_item(&self, list_url: &str, id: u64, values: &ItemValues) -> Result<()> {
        let body = json!({
            "formValues": odata::form_values(values),
            "bNewDocumentUpdate": false,
        });
        let url = self.list_api(list_url, &format!("items({id})/ValidateUpdateListItem"));
        self.validate_update(list_url, &url, &id.to_string(), &body)
            .map(drop)
    }

    fn file_exists(&self, folder: &str, name: &str) -> Result<bool> {
        let path = format!("{}/{}", folder.trim_matches('/'), name);
        let exists: Option<Scalar<bool>> = self.client.get_optional(&self.file_api(&path, "Exists"))?;
        Ok(exists.is_some_and(|e| e.value))
    }

    fn upload_file(&self, folder: &str, name: &str, content: &[u8], overwrite: bool) -> Result<()> {
        let url = self.api(&format!(
            "web/GetFolderByServerRelativePath(decodedurl={})/Files/AddUsingPath(decodedurl={},overwrite={})",
            literal(&join_path(&self.path, folder)),
            literal(name),
            overwrite
        ));
        self.client.execute(
            Verb::Post,
            &url,
            Payload::Bytes {
                content_type: "application/octet-stream",
                bytes: content,
            },
        )
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.client.get_bytes(&self.file_api(path, "$value"))
    }

    fn navigation_nodes(&self, location: NavigationLocation) -> Result<Vec<NavigationNodeInfo>> {
        let nodes: Collection<NavigationNode> = self.client.get_json(&self.api(&format!(
            "web/navigation/{}?$select=Id,Title,Url,Children/Id,Children/Title,Children/Url&$expand=Children",
            Self::navigation_path(location)
        )))?;
        Ok(odata::flatten_navigation(nodes.value))
    }

    fn remove_navigation_node(&self, _location: NavigationLocation, id: u64) -> Result<()> {
        self.client.execute(
            Verb::Delete,
            &self.api(&format!("web/navigation/getnodebyid({id})")),
            Payload::Empty,
        )
    }

    fn add_navigation_node(
        &self,
        location: NavigationLocation,
        parent: Option<u64>,
        title: &str,
        url: &str,
        is_external: bool,
    ) -> Result<u64> {
        let api = match parent {
            Some(parent) => self.api(&format!("web/navigation/getnodebyid({parent})/children")),
            None => self.api(&format!("web/navigation/{}", Self::navigation_path(location))),
        };
        let node: NavigationNode = self.client.post_json(
            &api,
            &json!({ "Title": title, "Url": url, "IsExternal": is_external }),
        )?;
        Ok(node.id)
    }

    fn property(&self, key: &str) -> Result<Option<String>> {
        let properties: Map<String, Value> = self.client.get_json(&self.api("web/allproperties"))?;
        Ok(properties
            .get(&odata::encode_property_name(key))
            .and_then(|value| match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }))
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.process_query(&xml::set_property_request(key, value))
    }

    fn index_property(&self, key: &str) -> Result<()> {
        let current = self.property(INDEXED_KEYS_PROPERTY)?;
        match odata::add_indexed_key(current.as_deref(), key) {
            Some(updated) => self.set_property(INDEXED_KEYS_PROPERTY, &updated),
            None => Ok(()),
        }
    }
}
