//! Site content types and their field links

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::{ContentType, ProvisioningTemplate};
use crate::types::{ApplyResult, ExecuteSummary};

pub struct ContentTypesHandler;

impl ObjectHandler for ContentTypesHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::ContentTypes
    }

    fn will_provision(&self, template: &ProvisioningTemplate, ctx: &HandlerContext<'_>) -> bool {
        if template.content_types.is_empty() {
            return false;
        }
        if ctx.is_sub_web() && !ctx.overrides().provision_content_types_to_subwebs {
            log::debug!(
                "Content types are provisioned on the root site only, skipping {}",
                ctx.site.url()
            );
            return false;
        }
        true
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();
        let total = template.content_types.len();

        for (i, content_type) in template.content_types.iter().enumerate() {
            let content_type = ContentType {
                name: ctx.parse(&content_type.name),
                group: content_type.group.as_deref().map(|g| ctx.parse(g)),
                description: content_type.description.as_deref().map(|d| ctx.parse(d)),
                ..content_type.clone()
            };
            ctx.status("Content types", &content_type.name, i + 1, total);

            let Some(existing) = ctx.call(|| ctx.site.content_type(&content_type.id))? else {
                ctx.call(|| ctx.site.create_content_type(&content_type))?;
                summary.add_result(&ApplyResult::Created);
                continue;
            };

            let mut changed = false;
            for field_ref in &content_type.field_refs {
                let linked = existing
                    .field_refs
                    .iter()
                    .any(|r| same_field_id(&r.id, &field_ref.id));
                if !linked {
                    ctx.call(|| {
                        ctx.site
                            .add_field_link(&content_type.id, &field_ref.id, field_ref.required)
                    })?;
                    changed = true;
                }
            }
            summary.add_result(if changed {
                &ApplyResult::Modified
            } else {
                &ApplyResult::NoChange
            });
        }

        Ok(summary)
    }
}

/// Field ids compare without braces and case
fn same_field_id(a: &str, b: &str) -> bool {
    a.trim_matches(['{', '}'])
        .eq_ignore_ascii_case(b.trim_matches(['{', '}']))
}
