//! Structural navigation (top bar and quick launch)

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::{NavigationLocation, NavigationNode, ProvisioningTemplate, StructuralNavigation};
use crate::tenant::NavigationNodeInfo;
use crate::types::{ApplyResult, ExecuteSummary};

pub struct NavigationHandler;

impl ObjectHandler for NavigationHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Navigation
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        template
            .navigation
            .as_ref()
            .is_some_and(|n| n.global.is_some() || n.current.is_some())
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();
        let Some(navigation) = &template.navigation else {
            return Ok(summary);
        };

        let locations = [
            (NavigationLocation::Global, &navigation.global),
            (NavigationLocation::Current, &navigation.current),
        ];
        for (location, structural) in locations {
            if let Some(structural) = structural {
                summary.merge(&provision_location(location, structural, ctx)?);
            }
        }

        Ok(summary)
    }
}

fn provision_location(
    location: NavigationLocation,
    structural: &StructuralNavigation,
    ctx: &HandlerContext<'_>,
) -> Result<ExecuteSummary> {
    let mut summary = ExecuteSummary::default();

    if structural.remove_existing_nodes || ctx.overrides().clear_navigation {
        let existing = ctx.call(|| ctx.site.navigation_nodes(location))?;
        for node in existing.iter().filter(|n| n.parent.is_none()) {
            ctx.note(format!("Removing navigation node {}", node.title));
            ctx.call(|| ctx.site.remove_navigation_node(location, node.id))?;
            summary.add_result(&ApplyResult::Removed);
        }
    }

    let mut existing = ctx.call(|| ctx.site.navigation_nodes(location))?;
    add_nodes(location, None, &structural.nodes, &mut existing, ctx, &mut summary)?;
    Ok(summary)
}

fn add_nodes(
    location: NavigationLocation,
    parent: Option<u64>,
    nodes: &[NavigationNode],
    existing: &mut Vec<NavigationNodeInfo>,
    ctx: &HandlerContext<'_>,
    summary: &mut ExecuteSummary,
) -> Result<()> {
    for node in nodes {
        let title = ctx.parse(&node.title);
        let url = ctx.parse(&node.url);

        let current = existing
            .iter()
            .find(|n| n.parent == parent && n.title == title)
            .cloned();
        let id = match current {
            Some(found) if found.url == url => {
                summary.add_result(&ApplyResult::NoChange);
                found.id
            }
            Some(stale) => {
                ctx.call(|| ctx.site.remove_navigation_node(location, stale.id))?;
                existing.retain(|n| n.id != stale.id && n.parent != Some(stale.id));
                let id = ctx.call(|| {
                    ctx.site
                        .add_navigation_node(location, parent, &title, &url, node.is_external)
                })?;
                summary.add_result(&ApplyResult::Modified);
                id
            }
            None => {
                let id = ctx.call(|| {
                    ctx.site
                        .add_navigation_node(location, parent, &title, &url, node.is_external)
                })?;
                summary.add_result(&ApplyResult::Created);
                id
            }
        };
        existing.push(NavigationNodeInfo {
            id,
            title,
            url,
            parent,
        });

        add_nodes(location, Some(id), &node.children, existing, ctx, summary)?;
    }
    Ok(())
}
