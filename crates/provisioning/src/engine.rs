//! Apply engine - runs the handler pipeline over the sequences of a hierarchy
//!
//! Sequences run one after another in declared order. Within a sequence,
//! sites are visited depth first (a parent before its subsites), and for
//! every template referenced by a site the selected handlers run in
//! [`HandlerKind`] order.
//!
//! One progress step is emitted per (site, template, selected kind) slot, so
//! the step counter only moves forward and reaches the total exactly when
//! the run finishes, including slots of sites that could not be created.

use crate::context::HandlerContext;
use crate::error::{Error, Result};
use crate::handlers::{self, HandlerKind, ObjectHandler};
use crate::messages::MessageBus;
use crate::model::{Hierarchy, Sequence, SiteCollection, SubSite};
use crate::retry::{LogCallback, with_retry};
use crate::tenant::Tenant;
use crate::tokens::TokenParser;
use crate::types::{ApplyOptions, ApplyReport, ApplyResult, HandlerFailureRecord, SequenceReport};

/// Apply a hierarchy to a tenant
///
/// With `sequence_id` only that sequence runs; otherwise every sequence runs
/// in declared order.
///
/// # Errors
///
/// Returns an error before touching the tenant when the sequence does not
/// exist or a site references an unknown template. During the run, only
/// terminal errors (invalid package, cancellation) and critical handlers
/// that exhausted their retries stop it; other handler failures are
/// recorded in the report.
pub fn apply(
    tenant: &dyn Tenant,
    hierarchy: &Hierarchy,
    sequence_id: Option<&str>,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    let sequences = target_sequences(hierarchy, sequence_id)?;
    validate(hierarchy, &sequences)?;

    let slots_per_template = options.handlers.len();
    let total = sequences
        .iter()
        .map(|s| template_slots_of_sequence(s))
        .sum::<usize>()
        * slots_per_template;

    let bus = MessageBus::new(options.progress.clone(), options.messages.clone(), total);
    let built_in = handlers::built_in();
    let tokens = TokenParser::new(tenant.root_url(), &hierarchy.parameters);
    let run = Run {
        tenant,
        hierarchy,
        options,
        bus: &bus,
        built_in: &built_in,
        tokens: &tokens,
    };

    log::debug!(
        "Applying {} sequence(s), {} handler(s) selected, {} step(s)",
        sequences.len(),
        slots_per_template,
        total
    );

    let mut report = ApplyReport::default();
    for sequence in sequences {
        options.cancel.check()?;

        bus.report(format!("Applying sequence {}", sequence.id));
        let result = run.sequence(sequence);
        bus.completed(format!("Sequence {} completed", sequence.id));

        report.sequences.push(result?);
    }

    report.warnings = bus.warnings();
    Ok(report)
}

fn target_sequences<'h>(hierarchy: &'h Hierarchy, sequence_id: Option<&str>) -> Result<Vec<&'h Sequence>> {
    match sequence_id {
        Some(id) => hierarchy
            .sequence(id)
            .map(|s| vec![s])
            .ok_or_else(|| Error::SequenceNotFound(id.to_string())),
        None => Ok(hierarchy.sequences.iter().collect()),
    }
}

/// Reject references that would only fail halfway through a run
fn validate(hierarchy: &Hierarchy, sequences: &[&Sequence]) -> Result<()> {
    fn check_templates(hierarchy: &Hierarchy, owner: &str, templates: &[String]) -> Result<()> {
        for id in templates {
            if hierarchy.template(id).is_none() {
                return Err(Error::invalid_package(
                    owner,
                    format!("references unknown template {id}"),
                ));
            }
        }
        Ok(())
    }

    fn check_sub_sites(hierarchy: &Hierarchy, sites: &[SubSite]) -> Result<()> {
        for site in sites {
            if site.url.trim().is_empty() {
                return Err(Error::invalid_package(&site.title, "subsite without Url"));
            }
            check_templates(hierarchy, &site.url, &site.templates)?;
            check_sub_sites(hierarchy, &site.sites)?;
        }
        Ok(())
    }

    for sequence in sequences {
        for collection in &sequence.site_collections {
            let has_address = collection.url.as_deref().is_some_and(|u| !u.trim().is_empty())
                || collection.alias.as_deref().is_some_and(|a| !a.trim().is_empty());
            if !has_address {
                return Err(Error::invalid_package(
                    &collection.title,
                    "site collection has neither Url nor Alias",
                ));
            }
            check_templates(hierarchy, &collection.title, &collection.templates)?;
            check_sub_sites(hierarchy, &collection.sites)?;
        }
    }
    Ok(())
}

fn template_slots_of_sequence(sequence: &Sequence) -> usize {
    sequence
        .site_collections
        .iter()
        .map(|c| c.templates.len() + template_slots_of_sub_sites(&c.sites))
        .sum()
}

fn template_slots_of_sub_sites(sites: &[SubSite]) -> usize {
    sites
        .iter()
        .map(|s| s.templates.len() + template_slots_of_sub_sites(&s.sites))
        .sum()
}

struct Run<'a> {
    tenant: &'a dyn Tenant,
    hierarchy: &'a Hierarchy,
    options: &'a ApplyOptions,
    bus: &'a MessageBus,
    built_in: &'a [Box<dyn ObjectHandler>],
    tokens: &'a TokenParser,
}

impl Run<'_> {
    fn call<T>(&self, operation: impl FnMut() -> Result<T>) -> Result<T> {
        with_retry(&self.options.retry, Some(&LogCallback), operation)
    }

    fn slots(&self, templates: usize) -> usize {
        templates * self.options.handlers.len()
    }

    fn sequence(&self, sequence: &Sequence) -> Result<SequenceReport> {
        let mut report = SequenceReport {
            id: sequence.id.clone(),
            ..Default::default()
        };

        for collection in &sequence.site_collections {
            self.options.cancel.check()?;
            self.site_collection(collection, &mut report)?;
        }

        report.completed = true;
        Ok(report)
    }

    fn site_collection(&self, collection: &SiteCollection, report: &mut SequenceReport) -> Result<()> {
        let url = self.site_collection_url(collection);

        let ensured = self.ensure_site(&url, report, || {
            self.tenant.create_site_collection(collection, &url)
        });
        let url = match ensured {
            Ok(url) => url,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                let slots = collection.templates.len() + template_slots_of_sub_sites(&collection.sites);
                self.skip_site(&url, e, slots, report);
                return Ok(());
            }
        };

        self.apply_templates(&url, &url, &collection.templates, report)?;
        for site in &collection.sites {
            self.sub_site(&url, &url, site, report)?;
        }
        Ok(())
    }

    fn sub_site(
        &self,
        collection_url: &str,
        parent_url: &str,
        site: &SubSite,
        report: &mut SequenceReport,
    ) -> Result<()> {
        self.options.cancel.check()?;

        let segment = self.tokens.parse(&site.url);
        let url = if segment.contains("://") {
            segment
        } else {
            format!(
                "{}/{}",
                parent_url.trim_end_matches('/'),
                segment.trim_matches('/')
            )
        };

        let ensured = self.ensure_site(&url, report, || {
            self.tenant.create_sub_site(parent_url, site, &url)
        });
        let url = match ensured {
            Ok(url) => url,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                let slots = site.templates.len() + template_slots_of_sub_sites(&site.sites);
                self.skip_site(&url, e, slots, report);
                return Ok(());
            }
        };

        self.apply_templates(collection_url, &url, &site.templates, report)?;
        for child in &site.sites {
            self.sub_site(collection_url, &url, child, report)?;
        }
        Ok(())
    }

    /// Create the site when it does not exist yet, returning its url
    fn ensure_site(
        &self,
        url: &str,
        report: &mut SequenceReport,
        mut create: impl FnMut() -> Result<String>,
    ) -> Result<String> {
        if self.call(|| self.tenant.site_exists(url))? {
            log::debug!("Site {} exists", url);
            return Ok(url.to_string());
        }

        self.bus.report(format!("Creating site {url}"));
        let created = self.call(&mut create)?;
        report.summary.add_result(&ApplyResult::Created);
        Ok(created)
    }

    fn skip_site(&self, url: &str, error: Error, slots: usize, report: &mut SequenceReport) {
        let record = HandlerFailureRecord {
            site_url: url.to_string(),
            template_id: None,
            handler: None,
            message: error.to_string(),
        };
        self.bus.warn(record.to_string());
        report.failures.push(record);
        self.bus.advance(self.slots(slots), format!("Skipped {url}"));
    }

    fn apply_templates(
        &self,
        collection_url: &str,
        site_url: &str,
        templates: &[String],
        report: &mut SequenceReport,
    ) -> Result<()> {
        report.sites.push(site_url.to_string());
        if templates.is_empty() {
            return Ok(());
        }

        let site = match self.call(|| self.tenant.open_site(site_url)) {
            Ok(site) => site,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                self.skip_site(site_url, e, templates.len(), report);
                return Ok(());
            }
        };
        let tokens = self.tokens.for_site(collection_url, site_url);
        let ctx = HandlerContext::new(
            self.hierarchy,
            self.options,
            self.tenant,
            site.as_ref(),
            &tokens,
            self.bus,
        );

        for template_id in templates {
            let template = self
                .hierarchy
                .template(template_id)
                .ok_or_else(|| Error::invalid_package(site_url, format!("unknown template {template_id}")))?;

            for kind in self.options.handlers.iter() {
                self.options.cancel.check()?;
                self.bus
                    .advance(1, format!("{} ({}) on {}", kind, template.id, site_url));

                for handler in self.handlers_for(kind) {
                    if !handler.will_provision(template, &ctx) {
                        continue;
                    }
                    log::debug!("Running {} on {}", handler.name(), site_url);
                    match handler.provision(template, &ctx) {
                        Ok(summary) => report.summary.merge(&summary),
                        Err(e) => self.escalate(e, kind, &template.id, site_url, report)?,
                    }
                }
            }
        }
        Ok(())
    }

    /// Built-in handler of a kind followed by the hooks declared for it
    fn handlers_for(&self, kind: HandlerKind) -> Vec<&dyn ObjectHandler> {
        self.built_in
            .iter()
            .filter(|h| h.kind() == kind)
            .map(|h| &**h)
            .chain(self.options.hooks_for(kind).map(|h| &**h))
            .collect()
    }

    /// Record a handler failure, or stop the run when it cannot go on
    fn escalate(
        &self,
        error: Error,
        kind: HandlerKind,
        template_id: &str,
        site_url: &str,
        report: &mut SequenceReport,
    ) -> Result<()> {
        if error.is_terminal() {
            return Err(error);
        }
        if kind.is_critical() && matches!(error, Error::RetriesExhausted { .. }) {
            return Err(Error::HandlerFailure {
                handler: kind,
                message: format!("{template_id} on {site_url}: {error}"),
            });
        }

        let record = HandlerFailureRecord {
            site_url: site_url.to_string(),
            template_id: Some(template_id.to_string()),
            handler: Some(kind),
            message: error.to_string(),
        };
        self.bus.warn(record.to_string());
        report.failures.push(record);
        Ok(())
    }

    fn site_collection_url(&self, collection: &SiteCollection) -> String {
        let host = self.tokens.host_url();
        match collection.url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let url = self.tokens.parse(url);
                if url.contains("://") {
                    url.trim_end_matches('/').to_string()
                } else {
                    format!("{}/{}", host, url.trim_matches('/'))
                }
            }
            None => {
                let alias = collection.alias.as_deref().unwrap_or_default();
                format!("{}/sites/{}", host, self.tokens.parse(alias).trim_matches('/'))
            }
        }
    }
}
