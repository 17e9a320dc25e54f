//! List instances and their content type bindings

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::{ListInstance, ProvisioningTemplate};
use crate::tenant::ListInfo;
use crate::types::{ApplyResult, ExecuteSummary};

pub struct ListsHandler;

impl ObjectHandler for ListsHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Lists
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        !template.lists.is_empty()
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();
        let total = template.lists.len();

        for (i, list) in template.lists.iter().enumerate() {
            let list = ListInstance {
                title: ctx.parse(&list.title),
                url: ctx.parse(&list.url),
                description: list.description.as_deref().map(|d| ctx.parse(d)),
                ..list.clone()
            };
            ctx.status("Lists", &list.title, i + 1, total);

            let (info, created) = match ctx.call(|| ctx.site.list(&list.url))? {
                Some(info) => (info, false),
                None => {
                    ctx.call(|| ctx.site.create_list(&list))?;
                    let info = ctx.call(|| ctx.site.list(&list.url))?.unwrap_or(ListInfo {
                        title: list.title.clone(),
                        url: list.url.clone(),
                        content_types: Vec::new(),
                        default_content_type: None,
                    });
                    (info, true)
                }
            };

            let changed = bind_content_types(&list, &info, ctx)?;
            summary.add_result(match (created, changed) {
                (true, _) => &ApplyResult::Created,
                (false, true) => &ApplyResult::Modified,
                (false, false) => &ApplyResult::NoChange,
            });
        }

        Ok(summary)
    }
}

fn bind_content_types(list: &ListInstance, info: &ListInfo, ctx: &HandlerContext<'_>) -> Result<bool> {
    let mut changed = false;

    for binding in &list.content_type_bindings {
        let bound = info
            .content_types
            .iter()
            .any(|id| id.eq_ignore_ascii_case(&binding.content_type_id));
        if !bound {
            ctx.call(|| ctx.site.add_list_content_type(&list.url, &binding.content_type_id))?;
            changed = true;
        }
    }

    if let Some(default) = list.content_type_bindings.iter().find(|b| b.default) {
        let is_default = info
            .default_content_type
            .as_deref()
            .is_some_and(|id| id.eq_ignore_ascii_case(&default.content_type_id));
        if !is_default {
            ctx.call(|| ctx.site.set_default_content_type(&list.url, &default.content_type_id))?;
            changed = true;
        }
    }

    Ok(changed)
}
