//! Authenticated HTTP plumbing

use provisioning::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

const ACCEPT: &str = "application/json;odata=nometadata";
const USER_AGENT: &str = concat!("provctl/", env!("CARGO_PKG_VERSION"));

/// Maximum download size for packages and assets.
const MAX_BODY_SIZE: u64 = 250 * 1024 * 1024;

/// Connection settings
#[derive(Debug, Clone)]
pub struct RestOptions {
    /// Upper bound for a whole request, connect to last byte
    pub timeout: Duration,
}

impl Default for RestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }
}

/// How a POST is interpreted by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
    Post,
    Merge,
    Delete,
}

impl Verb {
    fn override_header(self) -> Option<&'static str> {
        match self {
            Self::Post => None,
            Self::Merge => Some("MERGE"),
            Self::Delete => Some("DELETE"),
        }
    }
}

/// Request body
pub(crate) enum Payload<'a> {
    Empty,
    Json(&'a Value),
    Bytes {
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

/// Blocking client carrying the bearer token
#[derive(Clone)]
pub struct RestClient {
    agent: ureq::Agent,
    authorization: String,
}

impl RestClient {
    pub fn new(token: &str, options: &RestOptions) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(options.timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            authorization: format!("Bearer {token}"),
        }
    }

    pub(crate) fn get(&self, url: &str) -> Result<Response<Body>> {
        log::trace!("GET {}", url);
        let response = self
            .agent
            .get(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| transport(url, &e))?;
        check(url, response)
    }

    pub(crate) fn send(&self, verb: Verb, url: &str, payload: Payload<'_>) -> Result<Response<Body>> {
        log::trace!("POST {} ({:?})", url, verb);
        let mut request = self
            .agent
            .post(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT);
        if let Some(method) = verb.override_header() {
            request = request.header("X-HTTP-Method", method).header("IF-MATCH", "*");
        }

        let result = match payload {
            Payload::Empty => request.send_empty(),
            Payload::Json(body) => request.header("Content-Type", ACCEPT).send_json(body),
            Payload::Bytes {
                content_type,
                bytes,
            } => request.header("Content-Type", content_type).send(bytes),
        };
        check(url, result.map_err(|e| transport(url, &e))?)
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        read_json(url, self.get(url)?)
    }

    /// GET that maps 404 to `None`
    pub(crate) fn get_optional<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        match self.get_json(url) {
            Ok(value) => Ok(Some(value)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self.get(url)?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(|e| transport(url, &e))
    }

    pub(crate) fn post_json<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T> {
        read_json(url, self.send(Verb::Post, url, Payload::Json(body))?)
    }

    /// POST whose response body is not needed
    pub(crate) fn execute(&self, verb: Verb, url: &str, payload: Payload<'_>) -> Result<()> {
        self.send(verb, url, payload).map(drop)
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient").finish_non_exhaustive()
    }
}

fn read_json<T: DeserializeOwned>(url: &str, mut response: Response<Body>) -> Result<T> {
    response
        .body_mut()
        .read_json::<T>()
        .map_err(|e| Error::Remote {
            message: format!("{url}: unexpected response: {e}"),
            status: None,
        })
}

/// Turn non-2xx responses into categorized errors
fn check(url: &str, mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }

    if let Some(after) = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
    {
        log::debug!("{} asked to retry after {}s", url, after);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
    Err(Error::from_status(status, format!("{url}: {message}")))
}

/// Message of an OData error body, verbose or JSON light
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["/odata.error/message/value", "/error/message/value", "/error/message"]
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .map(String::from)
}

fn transport(url: &str, error: &ureq::Error) -> Error {
    match error {
        ureq::Error::Timeout(_) | ureq::Error::Io(_) | ureq::Error::ConnectionFailed => {
            Error::Transient {
                message: format!("{url}: {error}"),
                status: None,
            }
        }
        _ => Error::Remote {
            message: format!("{url}: {error}"),
            status: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        let verbose = r#"{"odata.error":{"code":"-2147024894","message":{"lang":"en-US","value":"File Not Found."}}}"#;
        assert_eq!(error_message(verbose).as_deref(), Some("File Not Found."));

        let light = r#"{"error":{"code":"accessDenied","message":"Access denied"}}"#;
        assert_eq!(error_message(light).as_deref(), Some("Access denied"));

        assert_eq!(error_message("<html>busy</html>"), None);
    }

    #[test]
    fn test_verb_override() {
        assert_eq!(Verb::Post.override_header(), None);
        assert_eq!(Verb::Merge.override_header(), Some("MERGE"));
        assert_eq!(Verb::Delete.override_header(), Some("DELETE"));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = RestClient::new("secret-token", &RestOptions::default());
        assert!(!format!("{client:?}").contains("secret-token"));
    }
}
