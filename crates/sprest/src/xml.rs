//! XML request bodies (field schema, CSOM property bag updates)

use provisioning::model::Field;
use quick_xml::escape::escape;

/// Type id of `SP.RequestContext`, the root of CSOM object paths
const REQUEST_CONTEXT_TYPE_ID: &str = "{3747adcd-a3c3-41b9-bfab-4a64dd2f1e0a}";

/// `SchemaXml` for `fields/createfieldasxml`
pub(crate) fn field_schema(field: &Field) -> String {
    let id = field.id.trim().trim_matches(['{', '}']);
    let mut xml = format!(
        r#"<Field ID="{{{}}}" Name="{}" StaticName="{}" DisplayName="{}" Type="{}""#,
        escape(id),
        escape(&field.name),
        escape(&field.name),
        escape(&field.display_name),
        escape(&field.field_type),
    );
    if let Some(group) = &field.group {
        xml.push_str(&format!(r#" Group="{}""#, escape(group)));
    }
    xml.push_str(&format!(
        r#" Required="{}" />"#,
        if field.required { "TRUE" } else { "FALSE" }
    ));
    xml
}

/// `ProcessQuery` body setting one web property bag value
pub(crate) fn set_property_request(key: &str, value: &str) -> String {
    format!(
        concat!(
            r#"<Request AddExpandoFieldTypeSuffix="true" SchemaVersion="15.0.0.0" LibraryVersion="16.0.0.0" ApplicationName="provctl" xmlns="http://schemas.microsoft.com/sharepoint/clientquery/2009">"#,
            r#"<Actions>"#,
            r#"<Method Name="SetFieldValue" Id="1" ObjectPathId="3"><Parameters>"#,
            r#"<Parameter Type="String">{key}</Parameter><Parameter Type="String">{value}</Parameter>"#,
            r#"</Parameters></Method>"#,
            r#"<Method Name="Update" Id="2" ObjectPathId="5" />"#,
            r#"</Actions>"#,
            r#"<ObjectPaths>"#,
            r#"<Property Id="3" ParentId="5" Name="AllProperties" />"#,
            r#"<Property Id="5" ParentId="7" Name="Web" />"#,
            r#"<StaticProperty Id="7" TypeId="{type_id}" Name="Current" />"#,
            r#"</ObjectPaths>"#,
            r#"</Request>"#
        ),
        key = escape(key),
        value = escape(value),
        type_id = REQUEST_CONTEXT_TYPE_ID,
    )
}
