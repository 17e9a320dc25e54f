#![allow(dead_code)]

use provisioning::{
    Connector, FileSystemConnector, Hierarchy, HierarchyFormatter, Message, MessageCallback,
    ProgressCallback, ProgressEvent, RetryConfig,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ROOT: &str = "https://contoso.sharepoint.com";
pub const FIRST: &str = "https://contoso.sharepoint.com/sites/first";
pub const FIRST_SUB: &str = "https://contoso.sharepoint.com/sites/first/sub";
pub const SECOND: &str = "https://contoso.sharepoint.com/sites/second";

pub const HIERARCHY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<pnp:Provisioning xmlns:pnp="http://schemas.dev.office.com/PnP/2020/02/ProvisioningSchema"
                  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <pnp:Preferences Author="Ops">
    <pnp:Parameters>
      <pnp:Parameter Key="Dept">Operations</pnp:Parameter>
    </pnp:Parameters>
  </pnp:Preferences>
  <pnp:Templates ID="ALL">
    <pnp:ProvisioningTemplate ID="BASE">
      <pnp:PropertyBagEntries>
        <pnp:PropertyBagEntry Key="Department" Value="{parameter:Dept}" Overwrite="true" Indexed="true" />
        <pnp:PropertyBagEntry Key="vti_custom" Value="x" Overwrite="true" />
      </pnp:PropertyBagEntries>
      <pnp:SiteFields>
        <Field ID="{1d22ea11-1e32-424e-89ab-9fedbadb6ce1}" Name="ProjectCode" DisplayName="Project code" Type="Text" Group="Ops" />
      </pnp:SiteFields>
      <pnp:ContentTypes>
        <pnp:ContentType ID="0x0100AA" Name="Project" Group="Ops">
          <pnp:FieldRefs>
            <pnp:FieldRef ID="{1d22ea11-1e32-424e-89ab-9fedbadb6ce1}" Name="ProjectCode" />
          </pnp:FieldRefs>
        </pnp:ContentType>
      </pnp:ContentTypes>
      <pnp:Lists>
        <pnp:ListInstance Title="Projects" Url="Lists/Projects" TemplateType="100">
          <pnp:ContentTypeBindings>
            <pnp:ContentTypeBinding ContentTypeID="0x0100AA" Default="true" />
          </pnp:ContentTypeBindings>
          <pnp:DataRows>
            <pnp:DataRow><pnp:DataValue FieldName="Title">Alpha</pnp:DataValue></pnp:DataRow>
            <pnp:DataRow><pnp:DataValue FieldName="Title">Beta</pnp:DataValue></pnp:DataRow>
          </pnp:DataRows>
        </pnp:ListInstance>
      </pnp:Lists>
      <pnp:Navigation>
        <pnp:CurrentNavigation NavigationType="Structural">
          <pnp:StructuralNavigation RemoveExistingNodes="false">
            <pnp:NavigationNode Title="Projects" Url="{site}/Lists/Projects" />
          </pnp:StructuralNavigation>
        </pnp:CurrentNavigation>
      </pnp:Navigation>
    </pnp:ProvisioningTemplate>
  </pnp:Templates>
  <pnp:Sequence ID="FIRST">
    <pnp:SiteCollections>
      <pnp:SiteCollection xsi:type="pnp:CommunicationSite" Title="First" Url="{hosturl}/sites/first">
        <pnp:Templates>
          <pnp:ProvisioningTemplateReference ID="BASE" />
        </pnp:Templates>
        <pnp:Sites>
          <pnp:Site xsi:type="pnp:TeamNoGroupSubSite" Title="Sub" Url="sub">
            <pnp:Templates>
              <pnp:ProvisioningTemplateReference ID="BASE" />
            </pnp:Templates>
          </pnp:Site>
        </pnp:Sites>
      </pnp:SiteCollection>
    </pnp:SiteCollections>
  </pnp:Sequence>
  <pnp:Sequence ID="SECOND">
    <pnp:SiteCollections>
      <pnp:SiteCollection xsi:type="pnp:TeamNoGroupSite" Title="Second" Url="/sites/second">
        <pnp:Templates>
          <pnp:ProvisioningTemplateReference ID="BASE" />
        </pnp:Templates>
      </pnp:SiteCollection>
    </pnp:SiteCollections>
  </pnp:Sequence>
</pnp:Provisioning>
"#;

/// Parse the shared fixture with assets resolved from the working directory
pub fn hierarchy() -> Hierarchy {
    let connector: Arc<dyn Connector> = Arc::new(FileSystemConnector::new("."));
    HierarchyFormatter::latest()
        .parse(HIERARCHY.as_bytes(), "fixture.xml", connector)
        .unwrap()
}

/// Retries without meaningful sleeps
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        backoff_factor: 1.0,
        max_delay: Duration::from_millis(1),
    }
}

/// Records both channels
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<ProgressEvent>>,
    pub messages: Mutex<Vec<Message>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Warning(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl MessageCallback for Recorder {
    fn on_message(&self, message: &Message) {
        self.messages.lock().unwrap().push(message.clone());
    }
}
