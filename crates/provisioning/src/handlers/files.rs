//! File uploads from the package

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::ProvisioningTemplate;
use crate::types::{ApplyResult, ExecuteSummary};

pub struct FilesHandler;

impl ObjectHandler for FilesHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Files
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        !template.files.is_empty()
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();
        let total = template.files.len();

        for (i, file) in template.files.iter().enumerate() {
            let folder = ctx.parse(&file.folder);
            let name = ctx.parse(file.file_name());
            ctx.status("Files", &name, i + 1, total);

            let exists = ctx.call(|| ctx.site.file_exists(&folder, &name))?;
            if exists && !file.overwrite {
                log::debug!("{}/{} exists and overwrite is off", folder, name);
                summary.add_result(&ApplyResult::NoChange);
                continue;
            }

            let content = ctx.connector().read_all(&file.src)?;
            ctx.call(|| ctx.site.upload_file(&folder, &name, &content, file.overwrite))?;
            summary.add_result(if exists {
                &ApplyResult::Modified
            } else {
                &ApplyResult::Created
            });
        }

        Ok(summary)
    }
}
