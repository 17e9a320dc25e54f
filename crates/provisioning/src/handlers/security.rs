//! Site collection administrators and site groups

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::{ProvisioningTemplate, SiteGroup};
use crate::types::{ApplyResult, ExecuteSummary};

pub struct SiteSecurityHandler;

impl ObjectHandler for SiteSecurityHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::SiteSecurity
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        template.security.as_ref().is_some_and(|s| {
            !s.additional_administrators.is_empty() || !s.site_groups.is_empty()
        })
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();
        let Some(security) = &template.security else {
            return Ok(summary);
        };

        // Administrators belong to the site collection
        if ctx.is_sub_web() {
            if !security.additional_administrators.is_empty() {
                log::debug!("Skipping administrators on subsite {}", ctx.site.url());
            }
        } else if !security.additional_administrators.is_empty() {
            let admins = ctx.call(|| ctx.site.administrators())?;
            for login in &security.additional_administrators {
                let login = ctx.parse(login);
                if admins.iter().any(|a| a.eq_ignore_ascii_case(&login)) {
                    summary.add_result(&ApplyResult::NoChange);
                } else {
                    ctx.call(|| ctx.site.add_administrator(&login))?;
                    summary.add_result(&ApplyResult::Created);
                }
            }
        }

        if security.site_groups.is_empty() {
            return Ok(summary);
        }

        let existing = ctx.call(|| ctx.site.site_groups())?;
        let total = security.site_groups.len();
        for (i, group) in security.site_groups.iter().enumerate() {
            let group = SiteGroup {
                title: ctx.parse(&group.title),
                description: group.description.as_deref().map(|d| ctx.parse(d)),
                owner: group.owner.as_deref().map(|o| ctx.parse(o)),
                members: group.members.iter().map(|m| ctx.parse(m)).collect(),
            };
            ctx.status("Site groups", &group.title, i + 1, total);

            if existing.iter().any(|g| g.eq_ignore_ascii_case(&group.title)) {
                summary.add_result(&ApplyResult::NoChange);
            } else {
                ctx.call(|| ctx.site.create_site_group(&group))?;
                summary.add_result(&ApplyResult::Created);
            }

            for member in &group.members {
                ctx.call(|| ctx.site.add_group_member(&group.title, member))?;
            }
        }

        Ok(summary)
    }
}
