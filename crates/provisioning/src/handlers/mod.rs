//! Object handlers and handler selection
//!
//! Every handler owns one slice of a template (fields, lists, navigation,
//! ...) and converges the target site towards it. Handlers run in
//! [`HandlerKind`] declaration order: structural handlers before content
//! handlers.

use crate::context::HandlerContext;
use crate::error::{Error, Result};
use crate::model::ProvisioningTemplate;
use crate::types::ExecuteSummary;
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

mod content_types;
mod data_rows;
mod features;
mod fields;
mod files;
mod lists;
mod navigation;
mod property_bag;
mod security;
mod tenant_settings;

pub use content_types::ContentTypesHandler;
pub use data_rows::DataRowsHandler;
pub use features::FeaturesHandler;
pub use fields::FieldsHandler;
pub use files::FilesHandler;
pub use lists::ListsHandler;
pub use navigation::NavigationHandler;
pub use property_bag::{PropertyBagHandler, is_reserved_property};
pub use security::SiteSecurityHandler;
pub use tenant_settings::TenantSettingsHandler;

/// Closed set of handler kinds, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HandlerKind {
    Tenant,
    SiteSecurity,
    Features,
    Fields,
    ContentTypes,
    Lists,
    Files,
    DataRows,
    Navigation,
    PropertyBagEntries,
    ExtensibilityProviders,
}

impl HandlerKind {
    /// Every concrete kind, in execution order
    pub const ALL: [Self; 11] = [
        Self::Tenant,
        Self::SiteSecurity,
        Self::Features,
        Self::Fields,
        Self::ContentTypes,
        Self::Lists,
        Self::Files,
        Self::DataRows,
        Self::Navigation,
        Self::PropertyBagEntries,
        Self::ExtensibilityProviders,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tenant => "Tenant",
            Self::SiteSecurity => "SiteSecurity",
            Self::Features => "Features",
            Self::Fields => "Fields",
            Self::ContentTypes => "ContentTypes",
            Self::Lists => "Lists",
            Self::Files => "Files",
            Self::DataRows => "DataRows",
            Self::Navigation => "Navigation",
            Self::PropertyBagEntries => "PropertyBagEntries",
            Self::ExtensibilityProviders => "ExtensibilityProviders",
        }
    }

    /// Structural handlers whose failure leaves later handlers without the
    /// schema they build on
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Fields | Self::ContentTypes | Self::Lists)
    }

    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HandlerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .or_else(|| match wanted.to_ascii_lowercase().as_str() {
                "propertybag" => Some(Self::PropertyBagEntries),
                "security" => Some(Self::SiteSecurity),
                "extensibility" => Some(Self::ExtensibilityProviders),
                _ => None,
            })
            .ok_or_else(|| Error::Other(format!("unknown handler: {wanted}")))
    }
}

/// Bitmask over [`HandlerKind`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HandlerSet(u32);

impl HandlerSet {
    pub const EMPTY: Self = Self(0);

    /// Every concrete kind
    pub const ALL: Self = Self::all_bits();

    const fn all_bits() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < HandlerKind::ALL.len() {
            bits |= HandlerKind::ALL[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub const fn of(kind: HandlerKind) -> Self {
        Self(kind.bit())
    }

    pub fn contains(&self, kind: HandlerKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: HandlerKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: HandlerKind) {
        self.0 &= !kind.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in execution order
    pub fn iter(&self) -> impl Iterator<Item = HandlerKind> + '_ {
        HandlerKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl FromIterator<HandlerKind> for HandlerSet {
    fn from_iter<I: IntoIterator<Item = HandlerKind>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl BitOr for HandlerSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<HandlerKind> for HandlerSet {
    fn from(kind: HandlerKind) -> Self {
        Self::of(kind)
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("All");
        }
        let names: Vec<&str> = self.iter().map(|k| k.name()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for HandlerSet {
    type Err = Error;

    /// Parse a comma separated list of kind names, `All` for every kind
    fn from_str(s: &str) -> Result<Self> {
        let mut set = Self::EMPTY;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.eq_ignore_ascii_case("all") {
                set = set | Self::ALL;
            } else {
                set.insert(part.parse()?);
            }
        }
        Ok(set)
    }
}

impl Serialize for HandlerSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Compute the effective handler set
///
/// An include set is used as given and any exclude set is ignored. Without
/// one, every concrete kind not in `exclude` is selected.
pub fn select(include: Option<HandlerSet>, exclude: Option<HandlerSet>) -> HandlerSet {
    match (include, exclude) {
        (Some(include), exclude) => {
            if exclude.is_some() {
                log::debug!("Both include and exclude handler sets given, using include");
            }
            include
        }
        (None, Some(exclude)) => HandlerKind::ALL
            .into_iter()
            .filter(|kind| !exclude.contains(*kind))
            .collect(),
        (None, None) => HandlerSet::ALL,
    }
}

/// A unit of provisioning work bound to one [`HandlerKind`]
///
/// Built-in handlers and caller supplied extensibility hooks share this
/// trait. Hooks run directly after the built-in handler of their kind.
pub trait ObjectHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    /// Display name used in progress messages
    fn name(&self) -> String {
        self.kind().to_string()
    }

    /// Whether the template carries anything for this handler
    fn will_provision(&self, template: &ProvisioningTemplate, ctx: &HandlerContext<'_>) -> bool;

    /// Converge the target site towards the template
    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary>;
}

/// Built-in handlers in execution order
pub fn built_in() -> Vec<Box<dyn ObjectHandler>> {
    vec![
        Box::new(TenantSettingsHandler),
        Box::new(SiteSecurityHandler),
        Box::new(FeaturesHandler),
        Box::new(FieldsHandler),
        Box::new(ContentTypesHandler),
        Box::new(ListsHandler),
        Box::new(FilesHandler),
        Box::new(DataRowsHandler),
        Box::new(NavigationHandler),
        Box::new(PropertyBagHandler),
    ]
}
