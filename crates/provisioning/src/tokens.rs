//! Token expansion for urls, titles and values
//!
//! Supported tokens (case-insensitive):
//!
//! | Token | Value |
//! |---|---|
//! | `{hosturl}` | tenant root, e.g. `https://contoso.sharepoint.com` |
//! | `{fqdn}` | tenant host name |
//! | `{sitecollection}` | server-relative url of the site collection |
//! | `{site}` | server-relative url of the current site |
//! | `{parameter:Name}` | hierarchy parameter |
//!
//! Unknown tokens are left untouched.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct TokenParser {
    host_url: String,
    fqdn: String,
    site_collection: String,
    site: String,
    parameters: BTreeMap<String, String>,
}

impl TokenParser {
    /// Parser for tenant-level values, before any site is known
    pub fn new(host_url: &str, parameters: &BTreeMap<String, String>) -> Self {
        let host_url = host_url.trim_end_matches('/').to_string();
        let fqdn = host_url
            .split_once("://")
            .map_or(host_url.as_str(), |(_, rest)| rest)
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            host_url,
            fqdn,
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
            ..Default::default()
        }
    }

    /// Same parser scoped to a site collection and one of its sites
    pub fn for_site(&self, site_collection_url: &str, site_url: &str) -> Self {
        Self {
            site_collection: self.server_relative(site_collection_url),
            site: self.server_relative(site_url),
            ..self.clone()
        }
    }

    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    /// Expand every known token in `input`
    pub fn parse(&self, input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let candidate = &rest[open..];
            match candidate.find('}') {
                Some(close) => {
                    let token = &candidate[1..close];
                    match self.value(token) {
                        Some(value) => output.push_str(&value),
                        None => output.push_str(&candidate[..=close]),
                    }
                    rest = &candidate[close + 1..];
                }
                None => {
                    output.push_str(candidate);
                    rest = "";
                }
            }
        }
        output.push_str(rest);
        output
    }

    fn value(&self, token: &str) -> Option<String> {
        let lowered = token.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "hosturl" => Some(self.host_url.clone()),
            "fqdn" => Some(self.fqdn.clone()),
            "sitecollection" => Some(self.site_collection.clone()),
            "site" => Some(self.site.clone()),
            _ => lowered
                .strip_prefix("parameter:")
                .and_then(|name| self.parameters.get(name.trim()))
                .cloned(),
        }
    }

    /// `https://host/sites/a` -> `/sites/a`
    fn server_relative(&self, url: &str) -> String {
        let url = url.trim_end_matches('/');
        let host = self.host_url.as_str();
        let relative = match url.get(..host.len()) {
            Some(prefix) if !host.is_empty() && prefix.eq_ignore_ascii_case(host) => {
                &url[host.len()..]
            }
            _ => match url.split_once("://") {
                Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
                None => url,
            },
        };
        relative.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TokenParser {
        let mut parameters = BTreeMap::new();
        parameters.insert("Prefix".to_string(), "ops".to_string());
        TokenParser::new("https://contoso.sharepoint.com/", &parameters)
    }

    #[test]
    fn test_tenant_tokens() {
        let tokens = parser();
        assert_eq!(
            tokens.parse("{hosturl}/sites/{parameter:Prefix}-hub"),
            "https://contoso.sharepoint.com/sites/ops-hub"
        );
        assert_eq!(tokens.parse("{FQDN}"), "contoso.sharepoint.com");
    }

    #[test]
    fn test_site_tokens() {
        let tokens = parser().for_site(
            "https://contoso.sharepoint.com/sites/ops",
            "https://contoso.sharepoint.com/sites/ops/archive",
        );
        assert_eq!(tokens.parse("{sitecollection}/SiteAssets"), "/sites/ops/SiteAssets");
        assert_eq!(tokens.parse("{site}/Lists/Projects"), "/sites/ops/archive/Lists/Projects");
    }

    #[test]
    fn test_unknown_tokens_kept() {
        let tokens = parser();
        assert_eq!(tokens.parse("{listid:Projects}"), "{listid:Projects}");
        assert_eq!(tokens.parse("{parameter:Missing}"), "{parameter:Missing}");
        assert_eq!(tokens.parse("open { brace"), "open { brace");
        assert_eq!(tokens.parse("no tokens"), "no tokens");
    }
}
