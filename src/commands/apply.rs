//! `provctl apply`

use crate::Context;
use crate::cli::{ApplyArgs, OverrideArgs};
use crate::config::Config;
use crate::paths;
use crate::progress::TerminalProgress;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use provisioning::{
    ApplyOptions, ApplyReport, CancelToken, InMemoryTenant, LoadOptions, Overrides,
    PackageReference, Tenant, apply, load_hierarchy, resolve, select,
};
use sprest::{RestOptions, RestTenant};
use std::sync::Arc;

/// Root url of the in-memory tenant when no tenant is configured
const DRY_RUN_TENANT: &str = "https://dry-run.sharepoint.com";

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let config = Config::load()?;
    run_with_config(ctx, args, &config)
}

fn run_with_config(ctx: &Context, args: ApplyArgs, config: &Config) -> Result<()> {
    let tenant = connect(&args, config)?;

    if !ctx.quiet {
        ui::header("Applying Provisioning Hierarchy");
        ui::kv("package", &args.package);
        ui::kv("tenant", tenant.root_url());
        if args.dry_run {
            ui::warn("Dry run - changes go to an in-memory tenant");
        }
    }

    let reference = PackageReference::parse(&args.package);
    let package = resolve(&reference, None, Some(tenant.as_ref()))
        .with_context(|| format!("Could not resolve {reference}"))?;
    let load = LoadOptions {
        resource_folder: args.resource_folder.as_deref().map(paths::expand),
    };
    let hierarchy =
        load_hierarchy(&package, &load).with_context(|| format!("Could not load {reference}"))?;

    let handlers = select(args.handlers, args.exclude_handlers);
    log::info!("Selected handlers: {handlers}");

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || interrupt.cancel()).context("Could not install Ctrl-C handler")?;

    let progress = Arc::new(TerminalProgress::new(ctx.quiet));
    let options = ApplyOptions::default()
        .with_handlers(handlers)
        .with_overrides(overrides(&args.overrides))
        .with_retry(config.retry_config(args.retries))
        .with_cancel_token(cancel)
        .with_progress(progress.clone())
        .with_messages(progress.clone());

    let result = apply(
        tenant.as_ref(),
        &hierarchy,
        args.sequence.as_deref(),
        &options,
    );
    let completed = progress.finish();
    log::debug!("Completed sequences: {}", completed.join(", "));

    let report = result.context("Provisioning stopped")?;
    print_report(ctx, &report, progress.shows_warnings());

    let failures = report.failures().count() + report.summary().failed;
    if !report.is_success() {
        bail!("Provisioning finished with {failures} failure(s)");
    }

    if !ctx.quiet {
        println!();
        ui::success("Provisioning complete!");
    }
    Ok(())
}

fn connect(args: &ApplyArgs, config: &Config) -> Result<Box<dyn Tenant>> {
    let url = config.tenant_url(args.tenant.as_deref());

    if args.dry_run {
        let url = url.unwrap_or_else(|| DRY_RUN_TENANT.to_string());
        return Ok(Box::new(InMemoryTenant::new(url)));
    }

    let Some(url) = url else {
        bail!("No tenant configured: pass --tenant, set PROVCTL_TENANT or add [tenant] url to the config file");
    };
    let token = config.token()?;
    let options = RestOptions {
        timeout: config.timeout(args.timeout),
    };
    Ok(Box::new(RestTenant::new(&url, &token, &options)))
}

fn overrides(args: &OverrideArgs) -> Overrides {
    Overrides {
        overwrite_system_property_bag_values: args.overwrite_system_properties,
        ignore_duplicate_data_row_errors: args.ignore_duplicate_rows,
        clear_navigation: args.clear_navigation,
        provision_content_types_to_subwebs: args.content_types_to_subwebs,
        provision_fields_to_subwebs: args.fields_to_subwebs,
    }
}

fn print_report(ctx: &Context, report: &ApplyReport, shown_live: bool) {
    if !ctx.quiet {
        ui::header("Summary");
        for sequence in &report.sequences {
            ui::section(&format!("Sequence: {}", sequence.id));
            let s = &sequence.summary;
            ui::kv("sites", &sequence.sites.len().to_string());
            ui::kv(
                "objects",
                &ui::counts(&[
                    ("created", s.created),
                    ("modified", s.modified),
                    ("removed", s.removed),
                    ("skipped", s.skipped),
                    ("unchanged", s.no_change),
                    ("failed", s.failed),
                ]),
            );
            if ctx.verbose > 0 {
                for site in &sequence.sites {
                    ui::dim(site);
                }
            }
            if !sequence.completed {
                ui::warn("Sequence did not complete");
            }
        }
        if !report.warnings.is_empty() {
            println!();
            ui::info(&format!("{} distinct warning(s)", report.warnings.len()));
        }
    }

    let lines = report_lines(report, shown_live, ctx.quiet);
    if !lines.is_empty() {
        println!();
        for line in lines {
            match line {
                ReportLine::Failure(text) => ui::error(&text),
                ReportLine::Warning(text) => ui::warn(&text),
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ReportLine {
    Failure(String),
    Warning(String),
}

/// Warnings and failures still to print after the run
///
/// Every failure is also a warning, so each text appears once. Nothing is
/// repeated when the warnings were already drawn during the run. Quiet runs
/// keep failures only.
fn report_lines(report: &ApplyReport, shown_live: bool, quiet: bool) -> Vec<ReportLine> {
    if shown_live {
        return Vec::new();
    }

    let mut failures: Vec<String> = Vec::new();
    for failure in report.failures() {
        let text = failure.to_string();
        if !failures.contains(&text) {
            failures.push(text);
        }
    }

    let mut lines = Vec::new();
    for warning in &report.warnings {
        if let Some(index) = failures.iter().position(|f| f == warning) {
            lines.push(ReportLine::Failure(failures.remove(index)));
        } else if !quiet {
            lines.push(ReportLine::Warning(warning.clone()));
        }
    }
    lines.extend(failures.into_iter().map(ReportLine::Failure));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use provisioning::{HandlerFailureRecord, HandlerKind, SequenceReport};

    fn apply_args(extra: &[&str]) -> ApplyArgs {
        let mut argv = vec!["provctl", "apply", "package.xml"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Apply(args) => args,
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_override_mapping() {
        let args = apply_args(&["--overwrite-system-properties", "--fields-to-subwebs"]);
        let mapped = overrides(&args.overrides);
        assert!(mapped.overwrite_system_property_bag_values);
        assert!(mapped.provision_fields_to_subwebs);
        assert!(!mapped.clear_navigation);
        assert!(!mapped.ignore_duplicate_data_row_errors);
        assert!(!mapped.provision_content_types_to_subwebs);
    }

    #[test]
    fn test_dry_run_uses_in_memory_tenant() {
        let args = apply_args(&["--dry-run", "--tenant", "https://contoso.sharepoint.com/"]);
        let tenant = connect(&args, &Config::default()).unwrap();
        assert_eq!(tenant.root_url(), "https://contoso.sharepoint.com");
    }

    #[test]
    fn test_dry_run_without_tenant() {
        let mut args = apply_args(&["--dry-run"]);
        args.tenant = None;
        let tenant = connect(&args, &Config::default()).unwrap();
        assert_eq!(tenant.root_url(), DRY_RUN_TENANT);
    }

    #[test]
    fn test_missing_tenant_is_an_error() {
        let mut args = apply_args(&[]);
        args.tenant = None;
        let Err(err) = connect(&args, &Config::default()) else {
            panic!("connected without a tenant");
        };
        assert!(err.to_string().contains("No tenant configured"));
    }

    fn report_with_failure() -> ApplyReport {
        let failure = HandlerFailureRecord {
            site_url: "https://contoso.sharepoint.com/sites/intranet".to_string(),
            template_id: Some("BASE".to_string()),
            handler: Some(HandlerKind::PropertyBagEntries),
            message: "access denied".to_string(),
        };
        ApplyReport {
            warnings: vec![
                "Throttled, retrying".to_string(),
                failure.to_string(),
            ],
            sequences: vec![SequenceReport {
                id: "MAIN".to_string(),
                failures: vec![failure],
                completed: true,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_live_warnings_are_not_repeated() {
        let report = report_with_failure();
        assert!(report_lines(&report, true, false).is_empty());
    }

    #[test]
    fn test_hidden_warnings_print_once() {
        let report = report_with_failure();
        let failure = report.failures().next().unwrap().to_string();
        assert_eq!(
            report_lines(&report, false, false),
            vec![
                ReportLine::Warning("Throttled, retrying".to_string()),
                ReportLine::Failure(failure),
            ]
        );
    }

    #[test]
    fn test_quiet_keeps_failures_only() {
        let report = report_with_failure();
        let failure = report.failures().next().unwrap().to_string();
        assert_eq!(
            report_lines(&report, false, true),
            vec![ReportLine::Failure(failure)]
        );
    }

    #[test]
    fn test_failure_missing_from_warnings_is_still_printed() {
        let mut report = report_with_failure();
        report.warnings.clear();
        let lines = report_lines(&report, false, false);
        assert_eq!(lines.len(), 1);
        assert!(matches!(&lines[0], ReportLine::Failure(text) if text.contains("access denied")));
    }
}
