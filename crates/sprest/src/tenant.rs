//! Tenant-wide operations

use crate::client::{Payload, RestClient, RestOptions, Verb};
use crate::odata::{Collection, Scalar, SiteStatus, SiteUrl, ThemingOptions, Titled, literal};
use crate::site::RestSite;
use provisioning::model::{SiteCollection, SiteCollectionKind, SubSite};
use provisioning::{Error, Result, RetryConfig, Site, Tenant, with_retry};
use serde_json::{Value, json};
use std::time::Duration;

const SITE_SCRIPT_UTILITY: &str =
    "Microsoft.Sharepoint.Utilities.WebTemplateExtensions.SiteScriptUtility";

/// Poll attempts while a new site collection is being provisioned
const SITE_READY_ATTEMPTS: u32 = 24;

/// Default locale of new sites
const DEFAULT_LCID: u32 = 1033;

/// A tenant reached through its root site
#[derive(Debug, Clone)]
pub struct RestTenant {
    root_url: String,
    client: RestClient,
}

impl RestTenant {
    pub fn new(root_url: &str, token: &str, options: &RestOptions) -> Self {
        Self {
            root_url: root_url.trim_end_matches('/').to_string(),
            client: RestClient::new(token, options),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/_api/{}", self.root_url, path)
    }

    /// Wait until a site collection reports ready
    fn wait_until_ready(&self, url: &str) -> Result<()> {
        let status_url = self.api(&format!("SPSiteManager/status?url={}", literal(url)));
        let policy = RetryConfig::new(SITE_READY_ATTEMPTS, Duration::from_secs(5), 1.0);

        with_retry(&policy, None, || {
            let status: SiteStatus = self.client.get_json(&status_url)?;
            match status.site_status {
                SiteStatus::READY => Ok(()),
                SiteStatus::ERROR => Err(Error::Remote {
                    message: format!("creation of {url} failed"),
                    status: None,
                }),
                _ => Err(Error::Transient {
                    message: format!("{url} is still being provisioned"),
                    status: None,
                }),
            }
        })
    }

    fn create_modern_site(&self, site: &SiteCollection, url: &str) -> Result<SiteStatus> {
        let web_template = match site.kind {
            SiteCollectionKind::TeamSiteNoGroup => "STS#3",
            _ => "SITEPAGEPUBLISHING#0",
        };
        let body = json!({
            "request": {
                "Title": site.title,
                "Url": url,
                "Lcid": site.language.unwrap_or(DEFAULT_LCID),
                "ShareByEmailEnabled": false,
                "Description": site.description.clone().unwrap_or_default(),
                "WebTemplate": web_template,
                "Owner": site.owner.clone().unwrap_or_default(),
            }
        });
        self.client.post_json(&self.api("SPSiteManager/create"), &body)
    }

    fn create_group_site(&self, site: &SiteCollection) -> Result<SiteStatus> {
        let alias = site.alias.clone().unwrap_or_default();
        let owners: Vec<&str> = site.owner.as_deref().into_iter().collect();
        let body = json!({
            "displayName": site.title,
            "alias": alias,
            "isPublic": site.is_public,
            "optionalParams": {
                "Description": site.description.clone().unwrap_or_default(),
                "CreationOptions": [format!("SPSiteLanguage:{}", site.language.unwrap_or(DEFAULT_LCID))],
                "Owners": owners,
            }
        });
        self.client
            .post_json(&self.api("GroupSiteManager/CreateGroupEx"), &body)
    }

    fn theme_json(palette_json: &str, is_inverted: bool) -> Result<String> {
        let palette: Value = serde_json::from_str(palette_json)
            .map_err(|e| Error::Other(format!("theme palette is not valid JSON: {e}")))?;
        Ok(json!({ "palette": palette, "isInverted": is_inverted }).to_string())
    }
}

impl Tenant for RestTenant {
    fn root_url(&self) -> &str {
        &self.root_url
    }

    fn site_url_from_item_url(&self, item_url: &str) -> Result<String> {
        let found: Scalar<String> = self.client.post_json(
            &self.api("SP.Web.GetWebUrlFromPageUrl"),
            &json!({ "pageFullUrl": item_url }),
        )?;
        if found.value.is_empty() {
            return Err(Error::not_found(item_url.to_string()));
        }
        Ok(found.value.trim_end_matches('/').to_string())
    }

    fn open_site(&self, url: &str) -> Result<Box<dyn Site>> {
        let url = url.trim_end_matches('/');
        let collection: SiteUrl = self
            .client
            .get_json(&format!("{url}/_api/site?$select=Url"))?;
        let is_sub_web = !collection
            .url
            .trim_end_matches('/')
            .eq_ignore_ascii_case(url);
        Ok(Box::new(RestSite::new(url, is_sub_web, self.client.clone())))
    }

    fn site_exists(&self, url: &str) -> Result<bool> {
        let url = url.trim_end_matches('/');
        let web: Option<SiteUrl> = self
            .client
            .get_optional(&format!("{url}/_api/web?$select=Url"))?;
        Ok(web.is_some())
    }

    fn create_site_collection(&self, site: &SiteCollection, url: &str) -> Result<String> {
        log::info!("Creating {:?} site {}", site.kind, url);
        let status = match site.kind {
            SiteCollectionKind::TeamSite => self.create_group_site(site)?,
            _ => self.create_modern_site(site, url)?,
        };
        let created = status
            .site_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| url.to_string());

        if status.site_status == SiteStatus::ERROR {
            return Err(Error::Remote {
                message: format!("creation of {created} failed"),
                status: None,
            });
        }
        if status.site_status != SiteStatus::READY {
            self.wait_until_ready(&created)?;
        }

        if site.is_hub_site {
            self.client.execute(
                Verb::Post,
                &format!("{created}/_api/site/RegisterHubSite"),
                Payload::Empty,
            )?;
        }
        Ok(created)
    }

    fn create_sub_site(&self, parent_url: &str, site: &SubSite, url: &str) -> Result<String> {
        let parent_url = parent_url.trim_end_matches('/');
        let leaf = url
            .strip_prefix(parent_url)
            .unwrap_or(url)
            .trim_matches('/');
        log::info!("Creating subsite {} below {}", leaf, parent_url);

        let body = json!({
            "parameters": {
                "Url": leaf,
                "Title": site.title,
                "Description": site.description.clone().unwrap_or_default(),
                "Language": site.language.unwrap_or(DEFAULT_LCID),
                "WebTemplate": "STS#3",
                "UseUniquePermissions": !site.use_same_permissions_as_parent,
            }
        });
        self.client.execute(
            Verb::Post,
            &format!("{parent_url}/_api/web/webinfos/add"),
            Payload::Json(&body),
        )?;
        Ok(format!("{parent_url}/{leaf}"))
    }

    fn themes(&self) -> Result<Vec<String>> {
        let url = self.api("thememanager/GetTenantThemingOptions");
        let body = json!({});
        let options: ThemingOptions = self.client.post_json(&url, &body)?;
        Ok(options.theme_previews.into_iter().map(|t| t.name).collect())
    }

    fn upsert_theme(&self, name: &str, palette_json: &str, is_inverted: bool) -> Result<()> {
        let exists = self.themes()?.iter().any(|t| t == name);
        let operation = if exists {
            "UpdateTenantTheme"
        } else {
            "AddTenantTheme"
        };
        let body = json!({
            "name": name,
            "themeJson": Self::theme_json(palette_json, is_inverted)?,
        });
        self.client.execute(
            Verb::Post,
            &self.api(&format!("thememanager/{operation}")),
            Payload::Json(&body),
        )
    }

    fn site_scripts(&self) -> Result<Vec<String>> {
        let url = self.api(&format!("{SITE_SCRIPT_UTILITY}.GetSiteScripts"));
        let scripts: Collection<Titled> = self.client.post_json(&url, &json!({}))?;
        Ok(scripts.value.into_iter().map(|s| s.title).collect())
    }

    fn add_site_script(&self, title: &str, description: &str, content: &str) -> Result<()> {
        let url = self.api(&format!(
            "{SITE_SCRIPT_UTILITY}.CreateSiteScript(Title=@title,Description=@description)?@title={}&@description={}",
            literal(title),
            literal(description)
        ));
        self.client.execute(
            Verb::Post,
            &url,
            Payload::Bytes {
                content_type: "application/json",
                bytes: content.as_bytes(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_url_normalized() {
        let tenant = RestTenant::new("https://contoso.sharepoint.com/", "t", &RestOptions::default());
        assert_eq!(tenant.root_url(), "https://contoso.sharepoint.com");
        assert_eq!(
            tenant.api("SPSiteManager/create"),
            "https://contoso.sharepoint.com/_api/SPSiteManager/create"
        );
    }

    #[test]
    fn test_theme_json_wraps_palette() {
        let json = RestTenant::theme_json(r##"{"themePrimary":"#0078d4"}"##, true).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["palette"]["themePrimary"], "#0078d4");
        assert_eq!(value["isInverted"], true);

        assert!(RestTenant::theme_json("not json", false).is_err());
    }
}
