//! # Provisioning
//!
//! Engine that applies a provisioning hierarchy to a remote collaboration
//! tenant.
//!
//! ## Pipeline
//!
//! 1. [`resolve`] a [`PackageReference`] (local path or document library
//!    url) to a [`Connector`] and item name
//! 2. [`load_hierarchy`] sniffs the [`Format`] and deserializes the markup,
//!    opening compound containers through [`ContainerConnector`]
//! 3. [`select`] the handlers to run from include/exclude sets
//! 4. [`apply`] runs the selected handlers over one or all sequences,
//!    reporting through [`ProgressCallback`] and [`MessageCallback`]
//!
//! ## Example
//!
//! ```ignore
//! use provisioning::{
//!     apply, load_hierarchy, resolve, select, ApplyOptions, InMemoryTenant, LoadOptions,
//!     PackageReference,
//! };
//!
//! let tenant = InMemoryTenant::new("https://contoso.sharepoint.com");
//! let reference = PackageReference::parse("templates/intranet.pnp");
//! let package = resolve(&reference, None, Some(&tenant))?;
//! let hierarchy = load_hierarchy(&package, &LoadOptions::default())?;
//!
//! let options = ApplyOptions::default()
//!     .with_handlers(select(None, Some("Navigation".parse()?)));
//! let report = apply(&tenant, &hierarchy, None, &options)?;
//! ```
//!
//! ## Seams
//!
//! - [`Tenant`] / [`Site`]: the remote capability surface
//! - [`Connector`]: file access over package storage
//! - [`ObjectHandler`]: built-in handlers and extensibility hooks
//! - [`ProgressCallback`] / [`MessageCallback`]: presentation

pub mod connector;
pub mod context;
pub mod engine;
pub mod error;
pub mod format;
pub mod handlers;
pub mod memory;
pub mod messages;
pub mod model;
pub mod resolver;
pub mod retry;
pub mod schema;
pub mod tenant;
pub mod tokens;
pub mod types;

// Re-export main types at crate root
pub use connector::{
    Connector, ContainerConnector, FileSystemConnector, LibraryConnector, PackageStream,
};
pub use context::HandlerContext;
pub use engine::apply;
pub use error::{Error, ErrorCategory, Result};
pub use format::{Format, detect};
pub use handlers::{HandlerKind, HandlerSet, ObjectHandler, select};
pub use memory::InMemoryTenant;
pub use messages::{
    Message, MessageBus, MessageCallback, MessageKind, NoMessages, NoProgress, ProgressCallback,
    ProgressEvent, SubStatus,
};
pub use model::Hierarchy;
pub use resolver::{
    LoadOptions, PackageReference, ResolvedPackage, bind_connector, load_hierarchy, resolve,
};
pub use retry::{RetryCallback, RetryConfig, with_retry};
pub use schema::{HierarchyFormatter, SchemaVersion};
pub use tenant::{ItemValues, ListInfo, NavigationNodeInfo, Site, Tenant};
pub use tokens::TokenParser;
pub use types::{
    ApplyOptions, ApplyReport, ApplyResult, CancelToken, ExecuteSummary, HandlerFailureRecord,
    Overrides, SequenceReport,
};
