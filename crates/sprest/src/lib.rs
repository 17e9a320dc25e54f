//! # sprest
//!
//! [`Tenant`](provisioning::Tenant) and [`Site`](provisioning::Site) over the
//! SharePoint REST API.
//!
//! Requests are blocking and authenticated with a bearer token obtained
//! elsewhere. Throttling (429/503) and timeouts surface as
//! [`Error::Transient`](provisioning::Error::Transient) so the engine's retry
//! policy applies; a missing resource is
//! [`Error::NotFound`](provisioning::Error::NotFound).
//!
//! ## Example
//!
//! ```no_run
//! use provisioning::Tenant;
//! use sprest::{RestOptions, RestTenant};
//!
//! let token = std::env::var("SPO_TOKEN").unwrap();
//! let tenant = RestTenant::new("https://contoso.sharepoint.com", &token, &RestOptions::default());
//! let exists = tenant.site_exists("https://contoso.sharepoint.com/sites/ops").unwrap();
//! ```

mod client;
mod odata;
mod site;
mod tenant;
mod xml;

pub use client::{RestClient, RestOptions};
pub use site::RestSite;
pub use tenant::RestTenant;
