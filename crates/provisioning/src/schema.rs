//! Provisioning schema reader
//!
//! Decodes provisioning markup into a [`Hierarchy`]. Documents are read into
//! a small element tree first and then mapped onto the model by local name,
//! so namespace prefixes do not matter and elements this reader does not know
//! about are skipped together with their subtree.

use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::model::{
    ContentType, ContentTypeBinding, DataRow, DataRows, Feature, FeatureScope, Field, FieldRef,
    FileAsset, Hierarchy, ListInstance, Navigation, NavigationNode, PropertyBagEntry,
    ProvisioningTemplate, Sequence, SiteCollection, SiteCollectionKind, SiteGroup, SiteScript,
    SiteSecurity, StructuralNavigation, SubSite, TenantSettings, Theme, UpdateBehavior,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

/// Known provisioning schema versions, oldest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SchemaVersion {
    V201805,
    V201807,
    V201903,
    V201909,
    V202002,
}

impl SchemaVersion {
    /// Version used to read documents
    pub const LATEST: Self = Self::V202002;

    pub const ALL: [Self; 5] = [
        Self::V201805,
        Self::V201807,
        Self::V201903,
        Self::V201909,
        Self::V202002,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            Self::V201805 => "http://schemas.dev.office.com/PnP/2018/05/ProvisioningSchema",
            Self::V201807 => "http://schemas.dev.office.com/PnP/2018/07/ProvisioningSchema",
            Self::V201903 => "http://schemas.dev.office.com/PnP/2019/03/ProvisioningSchema",
            Self::V201909 => "http://schemas.dev.office.com/PnP/2019/09/ProvisioningSchema",
            Self::V202002 => "http://schemas.dev.office.com/PnP/2020/02/ProvisioningSchema",
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.namespace().eq_ignore_ascii_case(namespace.trim()))
    }
}

/// Reads provisioning markup with the rules of one schema version
#[derive(Debug, Clone, Copy)]
pub struct HierarchyFormatter {
    version: SchemaVersion,
}

impl HierarchyFormatter {
    /// Formatter bound to the latest known schema version
    pub fn latest() -> Self {
        Self {
            version: SchemaVersion::LATEST,
        }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Parse a hierarchy document
    ///
    /// `reference` names the source in error messages. `connector` resolves
    /// `ProvisioningTemplateFile` references and becomes the hierarchy's
    /// asset connector.
    pub fn parse<R: BufRead>(
        &self,
        reader: R,
        reference: &str,
        connector: Arc<dyn Connector>,
    ) -> Result<Hierarchy> {
        let root = read_document(reader).map_err(|e| Error::invalid_package(reference, e))?;

        if root.name != "Provisioning" {
            return Err(Error::invalid_package(
                reference,
                format!(
                    "root element <{}> is not a provisioning hierarchy",
                    root.name
                ),
            ));
        }

        let schema = self.detect_version(&root, reference);
        let mut hierarchy = Hierarchy::new(schema, connector.clone());

        hierarchy.display_name = root.attr("DisplayName").map(String::from);
        hierarchy.description = root.attr("Description").map(String::from);

        if let Some(preferences) = root.child("Preferences") {
            hierarchy.author = preferences.attr("Author").map(String::from);
            hierarchy.generator = preferences.attr("Generator").map(String::from);
            hierarchy.version = preferences.attr("Version").map(String::from);
            if let Some(parameters) = preferences.child("Parameters") {
                for parameter in parameters.children_named("Parameter") {
                    if let Some(key) = parameter.attr("Key") {
                        hierarchy
                            .parameters
                            .insert(key.to_string(), parameter.text.clone());
                    }
                }
            }
        }

        for templates in root.children_named("Templates") {
            if hierarchy.display_name.is_none() {
                hierarchy.display_name = templates.attr("DisplayName").map(String::from);
            }
            if hierarchy.description.is_none() {
                hierarchy.description = templates.attr("Description").map(String::from);
            }
            for child in &templates.children {
                match child.name.as_str() {
                    "ProvisioningTemplate" => {
                        hierarchy.templates.push(read_template(child, reference)?);
                    }
                    "ProvisioningTemplateFile" => {
                        hierarchy
                            .templates
                            .push(load_template_file(child, connector.as_ref(), reference)?);
                    }
                    other => log::debug!("Skipping <{}> in <Templates>", other),
                }
            }
        }

        for sequence in root.children_named("Sequence") {
            hierarchy.sequences.push(read_sequence(sequence, reference)?);
        }

        validate(&hierarchy, reference)?;
        Ok(hierarchy)
    }

    fn detect_version(&self, root: &Element, reference: &str) -> SchemaVersion {
        let declared: Vec<&str> = root
            .attributes
            .iter()
            .filter(|(key, _)| key == "xmlns" || key.starts_with("xmlns:"))
            .map(|(_, value)| value.as_str())
            .collect();

        if let Some(version) = declared
            .iter()
            .find_map(|ns| SchemaVersion::from_namespace(ns))
        {
            return version;
        }

        if let Some(unknown) = declared.iter().find(|ns| ns.contains("ProvisioningSchema")) {
            log::warn!(
                "{}: unknown schema namespace {}, reading with {:?} rules",
                reference,
                unknown,
                self.version
            );
        }
        self.version
    }
}

fn validate(hierarchy: &Hierarchy, reference: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for sequence in &hierarchy.sequences {
        if !seen.insert(sequence.id.as_str()) {
            return Err(Error::invalid_package(
                reference,
                format!("sequence {} is declared more than once", sequence.id),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Element tree
// ============================================================================

#[derive(Debug, Default)]
struct Element {
    /// Local name, prefix stripped
    name: String,
    /// Attributes with their qualified keys
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| e.to_string())?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    /// Attribute by local name (`xsi:type` matches `type`)
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| {
                !key.starts_with("xmlns") && key.rsplit(':').next().is_some_and(|k| k == name)
            })
            .map(|(_, value)| value.as_str())
    }

    fn attr_string(&self, name: &str) -> String {
        self.attr(name).unwrap_or_default().to_string()
    }

    fn attr_bool(&self, name: &str) -> bool {
        self.attr(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }

    fn attr_u32(&self, name: &str) -> Option<u32> {
        self.attr(name).and_then(|v| v.trim().parse().ok())
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Children of the first `container` child named `item`
    fn nested<'a>(&'a self, container: &str, item: &'a str) -> Vec<&'a Element> {
        self.child(container)
            .map(|c| c.children_named(item).collect())
            .unwrap_or_default()
    }
}

fn read_document<R: BufRead>(source: R) -> std::result::Result<Element, String> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => stack.push(Element::from_start(&start)?),
            Ok(Event::Empty(start)) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or("unbalanced end tag")?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

// ============================================================================
// Sequences
// ============================================================================

fn read_sequence(element: &Element, reference: &str) -> Result<Sequence> {
    let id = element
        .attr("ID")
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::invalid_package(reference, "<Sequence> without an ID"))?;

    let site_collections = element
        .nested("SiteCollections", "SiteCollection")
        .into_iter()
        .map(read_site_collection)
        .collect();

    Ok(Sequence {
        id: id.to_string(),
        site_collections,
    })
}

fn read_site_collection(element: &Element) -> SiteCollection {
    let kind = match element.attr("type").map(|t| t.rsplit(':').next().unwrap_or(t)) {
        Some("TeamSite") => SiteCollectionKind::TeamSite,
        Some("TeamNoGroupSite") => SiteCollectionKind::TeamSiteNoGroup,
        _ => SiteCollectionKind::CommunicationSite,
    };

    SiteCollection {
        kind,
        title: element.attr_string("Title"),
        url: element.attr("Url").map(String::from),
        alias: element.attr("Alias").map(String::from),
        description: element.attr("Description").map(String::from),
        owner: element.attr("Owner").map(String::from),
        language: element.attr_u32("Language"),
        is_public: element.attr_bool("IsPublic"),
        is_hub_site: element.attr_bool("IsHubSite"),
        templates: template_references(element),
        sites: element
            .nested("Sites", "Site")
            .into_iter()
            .map(read_sub_site)
            .collect(),
    }
}

fn read_sub_site(element: &Element) -> SubSite {
    SubSite {
        title: element.attr_string("Title"),
        url: element.attr_string("Url"),
        description: element.attr("Description").map(String::from),
        language: element.attr_u32("Language"),
        use_same_permissions_as_parent: element.attr_bool("UseSamePermissionsAsParentSite"),
        templates: template_references(element),
        sites: element
            .nested("Sites", "Site")
            .into_iter()
            .map(read_sub_site)
            .collect(),
    }
}

fn template_references(element: &Element) -> Vec<String> {
    element
        .nested("Templates", "ProvisioningTemplateReference")
        .into_iter()
        .filter_map(|r| r.attr("ID").map(String::from))
        .collect()
}

// ============================================================================
// Templates
// ============================================================================

fn load_template_file(
    element: &Element,
    connector: &dyn Connector,
    reference: &str,
) -> Result<ProvisioningTemplate> {
    let file = element
        .attr("File")
        .ok_or_else(|| Error::invalid_package(reference, "<ProvisioningTemplateFile> without File"))?;
    let wanted_id = element.attr("ID");

    let stream = connector.open(file).map_err(|e| {
        Error::invalid_package(reference, format!("template file {file} could not be read: {e}"))
    })?;
    let root = read_document(BufReader::new(stream))
        .map_err(|e| Error::invalid_package(file, e))?;

    let mut template = match root.name.as_str() {
        "ProvisioningTemplate" => read_template(&root, file)?,
        "Provisioning" => {
            let candidates: Vec<&Element> = root
                .children_named("Templates")
                .flat_map(|t| t.children_named("ProvisioningTemplate"))
                .collect();
            let chosen = candidates
                .iter()
                .find(|t| wanted_id.is_some() && t.attr("ID") == wanted_id)
                .or_else(|| candidates.first())
                .ok_or_else(|| Error::invalid_package(file, "no <ProvisioningTemplate> found"))?;
            read_template(chosen, file)?
        }
        other => {
            return Err(Error::invalid_package(
                file,
                format!("root element <{other}> is not a provisioning template"),
            ));
        }
    };

    if let Some(id) = wanted_id {
        template.id = id.to_string();
    }
    Ok(template)
}

fn read_template(element: &Element, reference: &str) -> Result<ProvisioningTemplate> {
    let id = element
        .attr("ID")
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::invalid_package(reference, "<ProvisioningTemplate> without an ID"))?;

    Ok(ProvisioningTemplate {
        id: id.to_string(),
        version: element.attr("Version").map(String::from),
        tenant: element.child("Tenant").map(read_tenant),
        security: element.child("Security").map(read_security),
        features: read_features(element),
        fields: element
            .nested("SiteFields", "Field")
            .into_iter()
            .map(read_field)
            .collect(),
        content_types: element
            .nested("ContentTypes", "ContentType")
            .into_iter()
            .map(read_content_type)
            .collect(),
        lists: element
            .nested("Lists", "ListInstance")
            .into_iter()
            .map(read_list)
            .collect(),
        files: element
            .nested("Files", "File")
            .into_iter()
            .map(|f| FileAsset {
                src: f.attr_string("Src"),
                folder: f.attr_string("Folder"),
                target_name: f.attr("TargetFileName").map(String::from),
                overwrite: f.attr_bool("Overwrite"),
            })
            .collect(),
        navigation: element.child("Navigation").map(read_navigation),
        property_bag_entries: element
            .nested("PropertyBagEntries", "PropertyBagEntry")
            .into_iter()
            .map(|p| PropertyBagEntry {
                key: p.attr_string("Key"),
                value: p.attr_string("Value"),
                overwrite: p.attr_bool("Overwrite"),
                indexed: p.attr_bool("Indexed"),
            })
            .collect(),
    })
}

fn read_tenant(element: &Element) -> TenantSettings {
    TenantSettings {
        themes: element
            .nested("Themes", "Theme")
            .into_iter()
            .map(|t| Theme {
                name: t.attr_string("Name"),
                is_inverted: t.attr_bool("IsInverted"),
                palette: t.text.trim().to_string(),
            })
            .collect(),
        site_scripts: element
            .nested("SiteScripts", "SiteScript")
            .into_iter()
            .map(|s| SiteScript {
                title: s.attr_string("Title"),
                description: s.attr("Description").map(String::from),
                json_file_path: s.attr_string("JsonFilePath"),
            })
            .collect(),
    }
}

fn read_security(element: &Element) -> SiteSecurity {
    SiteSecurity {
        additional_administrators: element
            .nested("AdditionalAdministrators", "User")
            .into_iter()
            .filter_map(|u| u.attr("Name").map(String::from))
            .collect(),
        site_groups: element
            .nested("SiteGroups", "SiteGroup")
            .into_iter()
            .map(|g| SiteGroup {
                title: g.attr_string("Title"),
                description: g.attr("Description").map(String::from),
                owner: g.attr("Owner").map(String::from),
                members: g
                    .nested("Members", "User")
                    .into_iter()
                    .filter_map(|u| u.attr("Name").map(String::from))
                    .collect(),
            })
            .collect(),
    }
}

fn read_features(element: &Element) -> Vec<Feature> {
    let Some(features) = element.child("Features") else {
        return Vec::new();
    };
    let scoped = [
        ("SiteFeatures", FeatureScope::Site),
        ("WebFeatures", FeatureScope::Web),
    ];
    scoped
        .into_iter()
        .flat_map(|(container, scope)| {
            features
                .nested(container, "Feature")
                .into_iter()
                .map(move |f| Feature {
                    id: f.attr_string("ID"),
                    scope,
                    deactivate: f.attr_bool("Deactivate"),
                })
        })
        .collect()
}

fn read_field(element: &Element) -> Field {
    let name = element
        .attr("Name")
        .or_else(|| element.attr("StaticName"))
        .unwrap_or_default()
        .to_string();
    Field {
        id: element.attr_string("ID"),
        display_name: element.attr("DisplayName").unwrap_or(&name).to_string(),
        name,
        field_type: element.attr("Type").unwrap_or("Text").to_string(),
        group: element.attr("Group").map(String::from),
        required: element.attr_bool("Required"),
    }
}

fn read_content_type(element: &Element) -> ContentType {
    ContentType {
        id: element.attr_string("ID"),
        name: element.attr_string("Name"),
        group: element.attr("Group").map(String::from),
        description: element.attr("Description").map(String::from),
        field_refs: element
            .nested("FieldRefs", "FieldRef")
            .into_iter()
            .map(|r| FieldRef {
                id: r.attr_string("ID"),
                name: r.attr("Name").map(String::from),
                required: r.attr_bool("Required"),
            })
            .collect(),
    }
}

fn read_list(element: &Element) -> ListInstance {
    ListInstance {
        title: element.attr_string("Title"),
        url: element.attr_string("Url"),
        template_type: element.attr_u32("TemplateType").unwrap_or(100),
        description: element.attr("Description").map(String::from),
        on_quick_launch: element.attr_bool("OnQuickLaunch"),
        enable_versioning: element.attr_bool("EnableVersioning"),
        content_type_bindings: element
            .nested("ContentTypeBindings", "ContentTypeBinding")
            .into_iter()
            .map(|b| ContentTypeBinding {
                content_type_id: b.attr_string("ContentTypeID"),
                default: b.attr_bool("Default"),
            })
            .collect(),
        data_rows: element.child("DataRows").map(|rows| DataRows {
            key_column: rows.attr("KeyColumn").map(String::from),
            update_behavior: match rows.attr("UpdateBehavior") {
                Some(b) if b.eq_ignore_ascii_case("Skip") => UpdateBehavior::Skip,
                _ => UpdateBehavior::Overwrite,
            },
            rows: rows
                .children_named("DataRow")
                .map(|row| DataRow {
                    values: row
                        .children_named("DataValue")
                        .filter_map(|v| {
                            v.attr("FieldName")
                                .map(|name| (name.to_string(), v.text.clone()))
                        })
                        .collect(),
                })
                .collect(),
        }),
    }
}

fn read_navigation(element: &Element) -> Navigation {
    let structural = |name: &str| {
        element
            .child(name)
            .and_then(|n| n.child("StructuralNavigation"))
            .map(|s| StructuralNavigation {
                remove_existing_nodes: s.attr_bool("RemoveExistingNodes"),
                nodes: s
                    .children_named("NavigationNode")
                    .map(read_navigation_node)
                    .collect(),
            })
    };
    Navigation {
        global: structural("GlobalNavigation"),
        current: structural("CurrentNavigation"),
    }
}

fn read_navigation_node(element: &Element) -> NavigationNode {
    NavigationNode {
        title: element.attr_string("Title"),
        url: element.attr_string("Url"),
        is_external: element.attr_bool("IsExternal"),
        children: element
            .children_named("NavigationNode")
            .map(read_navigation_node)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::FileSystemConnector;
    use std::fs;
    use tempfile::TempDir;

    const HIERARCHY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<pnp:Provisioning xmlns:pnp="http://schemas.dev.office.com/PnP/2019/09/ProvisioningSchema"
                  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <pnp:Preferences Author="Ops" Generator="hand">
    <pnp:Parameters>
      <pnp:Parameter Key="Prefix">ops</pnp:Parameter>
    </pnp:Parameters>
  </pnp:Preferences>
  <pnp:Templates ID="CONTAINER" DisplayName="Intranet">
    <pnp:ProvisioningTemplate ID="TEAM" Version="2">
      <pnp:PropertyBagEntries>
        <pnp:PropertyBagEntry Key="Department" Value="Ops" Overwrite="true" Indexed="true" />
      </pnp:PropertyBagEntries>
      <pnp:SiteFields>
        <Field ID="{0c0b6f65-1b63-4d61-8f3f-3b1f4f1e0a01}" Name="ProjectCode" DisplayName="Project code" Type="Text" Group="Ops" Required="TRUE" />
      </pnp:SiteFields>
      <pnp:ContentTypes>
        <pnp:ContentType ID="0x0100AA" Name="Project" Group="Ops">
          <pnp:FieldRefs>
            <pnp:FieldRef ID="{0c0b6f65-1b63-4d61-8f3f-3b1f4f1e0a01}" Name="ProjectCode" Required="true" />
          </pnp:FieldRefs>
        </pnp:ContentType>
      </pnp:ContentTypes>
      <pnp:Lists>
        <pnp:ListInstance Title="Projects" Url="Lists/Projects" TemplateType="100">
          <pnp:ContentTypeBindings>
            <pnp:ContentTypeBinding ContentTypeID="0x0100AA" Default="true" />
          </pnp:ContentTypeBindings>
          <pnp:DataRows KeyColumn="Title" UpdateBehavior="Skip">
            <pnp:DataRow>
              <pnp:DataValue FieldName="Title">Alpha &amp; Beta</pnp:DataValue>
            </pnp:DataRow>
          </pnp:DataRows>
        </pnp:ListInstance>
      </pnp:Lists>
      <pnp:Navigation>
        <pnp:CurrentNavigation NavigationType="Structural">
          <pnp:StructuralNavigation RemoveExistingNodes="true">
            <pnp:NavigationNode Title="Home" Url="{site}">
              <pnp:NavigationNode Title="Projects" Url="{site}/Lists/Projects" />
            </pnp:NavigationNode>
          </pnp:StructuralNavigation>
        </pnp:CurrentNavigation>
      </pnp:Navigation>
      <pnp:FutureElement><pnp:Nested Value="ignored" /></pnp:FutureElement>
    </pnp:ProvisioningTemplate>
  </pnp:Templates>
  <pnp:Sequence ID="SEQ-1">
    <pnp:SiteCollections>
      <pnp:SiteCollection xsi:type="pnp:TeamNoGroupSite" Title="Ops" Url="{hosturl}/sites/ops" IsHubSite="true">
        <pnp:Templates>
          <pnp:ProvisioningTemplateReference ID="TEAM" />
        </pnp:Templates>
        <pnp:Sites>
          <pnp:Site xsi:type="pnp:TeamNoGroupSubSite" Title="Archive" Url="archive">
            <pnp:Templates>
              <pnp:ProvisioningTemplateReference ID="TEAM" />
            </pnp:Templates>
          </pnp:Site>
        </pnp:Sites>
      </pnp:SiteCollection>
    </pnp:SiteCollections>
  </pnp:Sequence>
</pnp:Provisioning>"#;

    fn connector(dir: &TempDir) -> Arc<dyn Connector> {
        Arc::new(FileSystemConnector::new(dir.path()))
    }

    fn parse(xml: &str, dir: &TempDir) -> Result<Hierarchy> {
        HierarchyFormatter::latest().parse(xml.as_bytes(), "test.xml", connector(dir))
    }

    #[test]
    fn test_parse_hierarchy() {
        let dir = TempDir::new().unwrap();
        let hierarchy = parse(HIERARCHY, &dir).unwrap();

        assert_eq!(hierarchy.schema, SchemaVersion::V201909);
        assert_eq!(hierarchy.display_name.as_deref(), Some("Intranet"));
        assert_eq!(hierarchy.author.as_deref(), Some("Ops"));
        assert_eq!(hierarchy.parameters.get("Prefix").map(String::as_str), Some("ops"));

        let template = hierarchy.template("TEAM").unwrap();
        assert_eq!(template.fields[0].name, "ProjectCode");
        assert!(template.fields[0].required);
        assert_eq!(template.content_types[0].field_refs.len(), 1);
        assert!(template.property_bag_entries[0].indexed);

        let list = &template.lists[0];
        assert!(list.content_type_bindings[0].default);
        let rows = list.data_rows.as_ref().unwrap();
        assert_eq!(rows.update_behavior, UpdateBehavior::Skip);
        assert_eq!(rows.rows[0].values["Title"], "Alpha & Beta");

        let current = template.navigation.as_ref().unwrap().current.as_ref().unwrap();
        assert!(current.remove_existing_nodes);
        assert_eq!(current.nodes[0].children[0].title, "Projects");

        let sequence = hierarchy.sequence("SEQ-1").unwrap();
        let site = &sequence.site_collections[0];
        assert_eq!(site.kind, SiteCollectionKind::TeamSiteNoGroup);
        assert!(site.is_hub_site);
        assert_eq!(site.templates, vec!["TEAM"]);
        assert_eq!(site.sites[0].url, "archive");
        assert_eq!(sequence.site_count(), 2);
    }

    #[test]
    fn test_wrong_root_is_invalid_package() {
        let dir = TempDir::new().unwrap();
        let err = parse("<Other/>", &dir).unwrap_err();
        assert!(matches!(err, Error::InvalidPackage { ref reference, .. } if reference == "test.xml"));
    }

    #[test]
    fn test_malformed_xml_is_invalid_package() {
        let dir = TempDir::new().unwrap();
        let err = parse("<Provisioning><Sequence ID=\"a\"></Provisioning>", &dir).unwrap_err();
        assert!(matches!(err, Error::InvalidPackage { .. }));

        let err = parse("", &dir).unwrap_err();
        assert!(matches!(err, Error::InvalidPackage { .. }));
    }

    #[test]
    fn test_duplicate_sequence_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let xml = r#"<Provisioning><Sequence ID="a"/><Sequence ID="a"/></Provisioning>"#;
        let err = parse(xml, &dir).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unknown_namespace_uses_latest_rules() {
        let dir = TempDir::new().unwrap();
        let xml = r#"<p:Provisioning xmlns:p="http://schemas.dev.office.com/PnP/2031/01/ProvisioningSchema">
            <p:Sequence ID="a" />
        </p:Provisioning>"#;
        let hierarchy = parse(xml, &dir).unwrap();
        assert_eq!(hierarchy.schema, SchemaVersion::LATEST);
        assert_eq!(hierarchy.sequence_ids(), vec!["a"]);
    }

    #[test]
    fn test_template_file_reference() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("team.xml"),
            r#"<pnp:ProvisioningTemplate xmlns:pnp="http://schemas.dev.office.com/PnP/2020/02/ProvisioningSchema" ID="ORIGINAL">
                 <pnp:Files><pnp:File Src="img/logo.png" Folder="SiteAssets" Overwrite="true" /></pnp:Files>
               </pnp:ProvisioningTemplate>"#,
        )
        .unwrap();
        let xml = r#"<Provisioning>
            <Templates><ProvisioningTemplateFile File="team.xml" ID="TEAM" /></Templates>
        </Provisioning>"#;

        let hierarchy = parse(xml, &dir).unwrap();
        let template = hierarchy.template("TEAM").unwrap();
        assert_eq!(template.files[0].folder, "SiteAssets");
        assert!(template.files[0].overwrite);
    }

    #[test]
    fn test_missing_template_file_is_invalid_package() {
        let dir = TempDir::new().unwrap();
        let xml = r#"<Provisioning>
            <Templates><ProvisioningTemplateFile File="missing.xml" ID="T" /></Templates>
        </Provisioning>"#;
        let err = parse(xml, &dir).unwrap_err();
        assert!(matches!(err, Error::InvalidPackage { .. }));
        assert!(err.to_string().contains("missing.xml"));
    }

    #[test]
    fn test_schema_namespace_lookup() {
        for version in SchemaVersion::ALL {
            assert_eq!(SchemaVersion::from_namespace(version.namespace()), Some(version));
        }
        assert_eq!(SchemaVersion::from_namespace("urn:other"), None);
    }
}
