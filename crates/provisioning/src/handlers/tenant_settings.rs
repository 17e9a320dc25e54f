//! Tenant themes and site scripts

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::{Error, Result};
use crate::model::ProvisioningTemplate;
use crate::types::{ApplyResult, ExecuteSummary};

pub struct TenantSettingsHandler;

impl ObjectHandler for TenantSettingsHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Tenant
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        template
            .tenant
            .as_ref()
            .is_some_and(|t| !t.themes.is_empty() || !t.site_scripts.is_empty())
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();
        let Some(settings) = &template.tenant else {
            return Ok(summary);
        };

        if !settings.themes.is_empty() {
            let existing = ctx.call(|| ctx.tenant.themes())?;
            let total = settings.themes.len();
            for (i, theme) in settings.themes.iter().enumerate() {
                let name = ctx.parse(&theme.name);
                ctx.status("Themes", &name, i + 1, total);
                let palette = ctx.parse(&theme.palette);
                serde_json::from_str::<serde_json::Value>(&palette).map_err(|e| {
                    Error::Other(format!("palette of theme {name} is not valid JSON: {e}"))
                })?;
                ctx.call(|| ctx.tenant.upsert_theme(&name, &palette, theme.is_inverted))?;

                let known = existing.iter().any(|t| t.eq_ignore_ascii_case(&name));
                summary.add_result(if known {
                    &ApplyResult::Modified
                } else {
                    &ApplyResult::Created
                });
            }
        }

        if !settings.site_scripts.is_empty() {
            let existing = ctx.call(|| ctx.tenant.site_scripts())?;
            let total = settings.site_scripts.len();
            for (i, script) in settings.site_scripts.iter().enumerate() {
                let title = ctx.parse(&script.title);
                ctx.status("Site scripts", &title, i + 1, total);

                if existing.iter().any(|t| t == &title) {
                    log::debug!("Site script {} already registered", title);
                    summary.add_result(&ApplyResult::NoChange);
                    continue;
                }

                let content = ctx.connector().read_all(&script.json_file_path)?;
                let content = ctx.parse(&String::from_utf8_lossy(&content));
                let description = script.description.as_deref().unwrap_or_default();
                ctx.call(|| ctx.tenant.add_site_script(&title, description, &content))?;
                summary.add_result(&ApplyResult::Created);
            }
        }

        Ok(summary)
    }
}
