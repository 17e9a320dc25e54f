//! Handler context - everything a handler sees while it runs

use crate::connector::Connector;
use crate::error::Result;
use crate::messages::{MessageBus, SubStatus};
use crate::model::Hierarchy;
use crate::retry::{LogCallback, with_retry};
use crate::tenant::{Site, Tenant};
use crate::tokens::TokenParser;
use crate::types::{ApplyOptions, Overrides};
use std::sync::Arc;

/// Context passed to every handler invocation
///
/// Built-in handlers and extensibility hooks of the same site and template
/// receive the same context.
pub struct HandlerContext<'a> {
    pub hierarchy: &'a Hierarchy,
    pub options: &'a ApplyOptions,
    pub tenant: &'a dyn Tenant,
    pub site: &'a dyn Site,
    pub tokens: &'a TokenParser,
    bus: &'a MessageBus,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        hierarchy: &'a Hierarchy,
        options: &'a ApplyOptions,
        tenant: &'a dyn Tenant,
        site: &'a dyn Site,
        tokens: &'a TokenParser,
        bus: &'a MessageBus,
    ) -> Self {
        Self {
            hierarchy,
            options,
            tenant,
            site,
            tokens,
            bus,
        }
    }

    pub fn overrides(&self) -> &Overrides {
        &self.options.overrides
    }

    /// Asset connector of the hierarchy
    pub fn connector(&self) -> &Arc<dyn Connector> {
        self.hierarchy.connector()
    }

    /// Whether the current site sits below a site collection root
    pub fn is_sub_web(&self) -> bool {
        self.site.is_sub_web()
    }

    /// Run a remote call under the run's retry policy
    pub fn call<T>(&self, operation: impl FnMut() -> Result<T>) -> Result<T> {
        with_retry(&self.options.retry, Some(&LogCallback), operation)
    }

    /// Expand tokens in a template value
    pub fn parse(&self, value: &str) -> String {
        self.tokens.parse(value)
    }

    /// Emit a warning (de-duplicated per run)
    pub fn warn(&self, text: impl Into<String>) {
        self.bus.warn(text);
    }

    /// Report the item currently being worked on
    pub fn status(&self, activity: &str, status: impl Into<String>, current: usize, total: usize) {
        self.bus
            .sub_status(SubStatus::determinate(activity, status, current, total));
    }

    /// Report free text on the sub-status channel
    pub fn note(&self, text: impl Into<String>) {
        self.bus.sub_status(SubStatus::Indeterminate(text.into()));
    }
}
