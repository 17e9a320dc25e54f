//! Site columns

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::{Field, ProvisioningTemplate};
use crate::types::{ApplyResult, ExecuteSummary};

pub struct FieldsHandler;

impl ObjectHandler for FieldsHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Fields
    }

    fn will_provision(&self, template: &ProvisioningTemplate, ctx: &HandlerContext<'_>) -> bool {
        if template.fields.is_empty() {
            return false;
        }
        if ctx.is_sub_web() && !ctx.overrides().provision_fields_to_subwebs {
            log::debug!("Fields are provisioned on the root site only, skipping {}", ctx.site.url());
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
        let total = template.fields.len();

        for (i, field) in template.fields.iter().enumerate() {
            let field = Field {
                display_name: ctx.parse(&field.display_name),
                group: field.group.as_deref().map(|g| ctx.parse(g)),
                ..field.clone()
            };
            ctx.status("Fields", &field.display_name, i + 1, total);

            match ctx.call(|| ctx.site.field(&field.id))? {
                None => {
                    ctx.call(|| ctx.site.create_field(&field))?;
                    summary.add_result(&ApplyResult::Created);
                }
                Some(existing) if existing == field => {
                    summary.add_result(&ApplyResult::NoChange);
                }
                Some(_) => {
                    ctx.call(|| ctx.site.update_field(&field))?;
                    summary.add_result(&ApplyResult::Modified);
                }
            }
        }

        Ok(summary)
    }
}
