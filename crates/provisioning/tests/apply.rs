mod common;

use common::{FIRST, FIRST_SUB, HIERARCHY, ROOT, Recorder, SECOND, fast_retry, hierarchy};
use provisioning::model::{NavigationLocation, ProvisioningTemplate};
use provisioning::{
    ApplyOptions, CancelToken, Error, ExecuteSummary, HandlerContext, HandlerKind, HandlerSet,
    InMemoryTenant, Message, ObjectHandler, Overrides, Result, Tenant, apply,
};
use std::sync::{Arc, Mutex};

fn options(recorder: &Arc<Recorder>) -> ApplyOptions {
    ApplyOptions::default()
        .with_retry(fast_retry(3))
        .with_progress(recorder.clone())
        .with_messages(recorder.clone())
}

#[test]
fn test_full_run_provisions_every_site() {
    let tenant = InMemoryTenant::new(ROOT);
    let recorder = Arc::new(Recorder::default());

    let report = apply(&tenant, &hierarchy(), None, &options(&recorder)).unwrap();

    assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(tenant.site_urls(), vec![FIRST, FIRST_SUB, SECOND]);

    let first = tenant.site(FIRST).unwrap();
    assert_eq!(first.properties.get("Department").map(String::as_str), Some("Operations"));
    assert!(first.indexed_properties.contains("Department"));
    assert!(first.fields.contains_key("{1d22ea11-1e32-424e-89ab-9fedbadb6ce1}"));

    let list = first.list("Lists/Projects").unwrap();
    assert_eq!(list.items.len(), 2);
    assert_eq!(list.info.default_content_type.as_deref(), Some("0x0100AA"));

    let sub = tenant.site(FIRST_SUB).unwrap();
    assert_eq!(sub.current_navigation.len(), 1);
    assert_eq!(sub.current_navigation[0].url, "/sites/first/sub/Lists/Projects");
}

#[test]
fn test_target_sequence_touches_only_that_sequence() {
    let tenant = InMemoryTenant::new(ROOT);
    let recorder = Arc::new(Recorder::default());

    let report = apply(&tenant, &hierarchy(), Some("SECOND"), &options(&recorder)).unwrap();

    assert_eq!(report.sequences.len(), 1);
    assert_eq!(report.sequences[0].id, "SECOND");
    assert_eq!(tenant.site_urls(), vec![SECOND]);
    for call in tenant.journal() {
        let scope = call.site.unwrap_or(call.target);
        assert!(
            scope.is_empty() || scope.starts_with(SECOND),
            "{} touched {}",
            call.operation,
            scope
        );
    }
}

#[test]
fn test_unknown_sequence_fails_before_any_call() {
    let tenant = InMemoryTenant::new(ROOT);
    let err = apply(&tenant, &hierarchy(), Some("THIRD"), &ApplyOptions::default()).unwrap_err();

    assert!(matches!(err, Error::SequenceNotFound(ref id) if id == "THIRD"));
    assert!(tenant.journal().is_empty());
}

#[test]
fn test_sequences_run_in_declared_order() {
    let tenant = InMemoryTenant::new(ROOT);
    let recorder = Arc::new(Recorder::default());

    let report = apply(&tenant, &hierarchy(), None, &options(&recorder)).unwrap();

    let ids: Vec<&str> = report.sequences.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["FIRST", "SECOND"]);
    assert_eq!(report.sequences[0].sites, vec![FIRST, FIRST_SUB]);

    let created: Vec<String> = tenant
        .journal()
        .into_iter()
        .filter(|c| c.operation.starts_with("create_s"))
        .map(|c| c.target)
        .collect();
    assert_eq!(created, vec![FIRST, FIRST_SUB, SECOND]);

    let completed: Vec<String> = recorder
        .messages()
        .into_iter()
        .filter_map(|m| match m {
            Message::Completed(text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(completed.len(), 2);
    assert!(completed[0].contains("FIRST"));
    assert!(completed[1].contains("SECOND"));
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    let tenant = InMemoryTenant::new(ROOT);
    let recorder = Arc::new(Recorder::default());

    apply(&tenant, &hierarchy(), None, &options(&recorder)).unwrap();

    let events = recorder.events();
    assert!(!events.is_empty());
    let total = events[0].total;
    assert_eq!(total, 3 * HandlerKind::ALL.len());
    for pair in events.windows(2) {
        assert!(pair[0].step <= pair[1].step);
        assert_eq!(pair[1].total, total);
    }
    let last = events.last().unwrap();
    assert_eq!(last.step, total);
    assert_eq!(last.percent(), 100);
}

#[test]
fn test_progress_total_follows_selection() {
    let tenant = InMemoryTenant::new(ROOT);
    let recorder = Arc::new(Recorder::default());
    let selected: HandlerSet = [HandlerKind::Lists, HandlerKind::DataRows].into_iter().collect();

    apply(
        &tenant,
        &hierarchy(),
        Some("FIRST"),
        &options(&recorder).with_handlers(selected),
    )
    .unwrap();

    let last = recorder.events().pop().unwrap();
    assert_eq!(last.total, 4);
    assert_eq!(last.step, 4);
}

#[test]
fn test_reapply_with_duplicate_tolerance_is_clean() {
    let tenant = InMemoryTenant::new(ROOT);
    for site in [FIRST, FIRST_SUB, SECOND] {
        tenant.set_unique_columns(site, "Lists/Projects", &["Title"]);
    }
    let recorder = Arc::new(Recorder::default());
    let options = options(&recorder).with_overrides(Overrides {
        ignore_duplicate_data_row_errors: true,
        ..Default::default()
    });

    let first_run = apply(&tenant, &hierarchy(), None, &options).unwrap();
    assert!(first_run.is_success());

    let second_run = apply(&tenant, &hierarchy(), None, &options).unwrap();
    assert!(second_run.is_success(), "{:?}", second_run.failures().collect::<Vec<_>>());
    assert_eq!(second_run.summary().created, 0);
    assert!(second_run.summary().no_change > 0);
    assert_eq!(tenant.site(FIRST).unwrap().list("Lists/Projects").unwrap().items.len(), 2);
}

#[test]
fn test_duplicate_rows_fail_without_override() {
    let tenant = InMemoryTenant::new(ROOT);
    tenant.set_unique_columns(FIRST, "Lists/Projects", &["Title"]);
    let recorder = Arc::new(Recorder::default());

    apply(&tenant, &hierarchy(), Some("FIRST"), &options(&recorder)).unwrap();
    let report = apply(&tenant, &hierarchy(), Some("FIRST"), &options(&recorder)).unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].handler, Some(HandlerKind::DataRows));
    assert_eq!(failures[0].site_url, FIRST);
    assert!(report.sequences[0].completed);
}

#[test]
fn test_system_properties_need_override() {
    let recorder = Arc::new(Recorder::default());

    let tenant = InMemoryTenant::new(ROOT);
    apply(&tenant, &hierarchy(), Some("SECOND"), &options(&recorder)).unwrap();
    assert!(!tenant.site(SECOND).unwrap().properties.contains_key("vti_custom"));

    let tenant = InMemoryTenant::new(ROOT);
    let overrides = Overrides {
        overwrite_system_property_bag_values: true,
        ..Default::default()
    };
    apply(
        &tenant,
        &hierarchy(),
        Some("SECOND"),
        &options(&recorder).with_overrides(overrides),
    )
    .unwrap();
    assert_eq!(
        tenant.site(SECOND).unwrap().properties.get("vti_custom").map(String::as_str),
        Some("x")
    );
}

#[test]
fn test_fields_reach_subwebs_only_with_override() {
    let recorder = Arc::new(Recorder::default());

    let tenant = InMemoryTenant::new(ROOT);
    apply(&tenant, &hierarchy(), Some("FIRST"), &options(&recorder)).unwrap();
    let sub = tenant.site(FIRST_SUB).unwrap();
    assert!(sub.fields.is_empty());
    assert!(sub.content_types.is_empty());

    let tenant = InMemoryTenant::new(ROOT);
    let overrides = Overrides {
        provision_fields_to_subwebs: true,
        provision_content_types_to_subwebs: true,
        ..Default::default()
    };
    apply(
        &tenant,
        &hierarchy(),
        Some("FIRST"),
        &options(&recorder).with_overrides(overrides),
    )
    .unwrap();
    let sub = tenant.site(FIRST_SUB).unwrap();
    assert_eq!(sub.fields.len(), 1);
    assert_eq!(sub.content_types.len(), 1);
}

#[test]
fn test_clear_navigation_removes_existing_nodes() {
    let tenant = InMemoryTenant::new(ROOT).with_site(SECOND);
    {
        let site = tenant.open_site(SECOND).unwrap();
        site.add_navigation_node(NavigationLocation::Current, None, "Old", "/old", false)
            .unwrap();
    }
    let recorder = Arc::new(Recorder::default());
    let overrides = Overrides {
        clear_navigation: true,
        ..Default::default()
    };

    apply(
        &tenant,
        &hierarchy(),
        Some("SECOND"),
        &options(&recorder).with_overrides(overrides),
    )
    .unwrap();

    let titles: Vec<String> = tenant
        .site(SECOND)
        .unwrap()
        .current_navigation
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles, vec!["Projects"]);
}

#[test]
fn test_include_selection_limits_work() {
    let tenant = InMemoryTenant::new(ROOT);
    let recorder = Arc::new(Recorder::default());

    apply(
        &tenant,
        &hierarchy(),
        Some("SECOND"),
        &options(&recorder).with_handlers(HandlerSet::of(HandlerKind::Navigation)),
    )
    .unwrap();

    let site = tenant.site(SECOND).unwrap();
    assert_eq!(site.current_navigation.len(), 1);
    assert!(site.fields.is_empty());
    assert!(site.lists.is_empty());
    assert!(site.properties.is_empty());
}

#[test]
fn test_transient_failures_are_retried() {
    let tenant = InMemoryTenant::new(ROOT);
    tenant.throttle("create_list", 2);
    let recorder = Arc::new(Recorder::default());

    let report = apply(&tenant, &hierarchy(), Some("SECOND"), &options(&recorder)).unwrap();

    assert!(report.is_success());
    assert!(tenant.site(SECOND).unwrap().list("Lists/Projects").is_some());
    let attempts = tenant
        .journal()
        .iter()
        .filter(|c| c.operation == "create_list")
        .count();
    assert_eq!(attempts, 3);
}

#[test]
fn test_critical_handler_exhausting_retries_stops_run() {
    let tenant = InMemoryTenant::new(ROOT);
    tenant.throttle("create_field", 100);
    let recorder = Arc::new(Recorder::default());

    let err = apply(&tenant, &hierarchy(), None, &options(&recorder)).unwrap_err();

    assert!(matches!(err, Error::HandlerFailure { handler: HandlerKind::Fields, .. }));
    assert!(!tenant.site_urls().contains(&SECOND.to_string()));
    assert!(
        recorder
            .messages()
            .iter()
            .any(|m| matches!(m, Message::Completed(text) if text.contains("FIRST")))
    );
}

#[test]
fn test_non_critical_failure_is_recorded_and_run_continues() {
    let tenant = InMemoryTenant::new(ROOT);
    tenant.throttle("add_navigation_node", 100);
    let recorder = Arc::new(Recorder::default());

    let report = apply(&tenant, &hierarchy(), None, &options(&recorder)).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.sequences.len(), 2);
    assert!(report.sequences.iter().all(|s| s.completed));
    assert!(report
        .failures()
        .all(|f| f.handler == Some(HandlerKind::Navigation)));
    assert_eq!(report.failures().count(), 3);
    assert_eq!(recorder.warnings().len(), 3);
    assert!(tenant.site(SECOND).unwrap().list("Lists/Projects").is_some());
}

#[test]
fn test_cancelled_run_stops_before_creating_sites() {
    let tenant = InMemoryTenant::new(ROOT);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = apply(
        &tenant,
        &hierarchy(),
        None,
        &ApplyOptions::default().with_cancel_token(cancel),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(tenant.site_urls().is_empty());
}

/// Hook that checks what the built-in handler of its kind left behind
struct ListProbe {
    seen: Mutex<Vec<(String, bool, usize)>>,
}

impl ObjectHandler for ListProbe {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Lists
    }

    fn will_provision(&self, _template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        true
    }

    fn provision(
        &self,
        _template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let list = ctx.site.list("Lists/Projects")?;
        let items = ctx.site.find_item("Lists/Projects", "Title", "Alpha")?;
        self.seen.lock().unwrap().push((
            ctx.site.url().to_string(),
            list.is_some(),
            usize::from(items.is_some()),
        ));
        ctx.warn("Lists probe ran");
        Ok(ExecuteSummary::default())
    }
}

#[test]
fn test_hooks_run_after_built_in_handler_of_their_kind() {
    let tenant = InMemoryTenant::new(ROOT);
    let recorder = Arc::new(Recorder::default());
    let probe = Arc::new(ListProbe {
        seen: Mutex::new(Vec::new()),
    });

    apply(
        &tenant,
        &hierarchy(),
        None,
        &options(&recorder).with_hook(probe.clone()),
    )
    .unwrap();

    let seen = probe.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    for (site, list_exists, rows) in seen {
        assert!(list_exists, "list missing on {site} when the hook ran");
        assert_eq!(rows, 0, "data rows ran before the hook on {site}");
    }

    // Same warning from three sites is reported once
    let warnings = recorder.warnings();
    assert_eq!(warnings.iter().filter(|w| *w == "Lists probe ran").count(), 1);
}

#[test]
fn test_hierarchy_fixture_is_stable() {
    assert!(HIERARCHY.contains("ProvisioningSchema"));
    assert_eq!(hierarchy().sequence_ids(), vec!["FIRST", "SECOND"]);
}
