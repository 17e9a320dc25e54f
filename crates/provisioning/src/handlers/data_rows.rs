//! List data rows

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::{Error, Result};
use crate::model::{DataRows, ProvisioningTemplate, UpdateBehavior};
use crate::tenant::ItemValues;
use crate::types::{ApplyResult, ExecuteSummary};

pub struct DataRowsHandler;

impl ObjectHandler for DataRowsHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::DataRows
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        template
            .lists
            .iter()
            .any(|l| l.data_rows.as_ref().is_some_and(|d| !d.rows.is_empty()))
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();

        for list in &template.lists {
            let Some(rows) = list.data_rows.as_ref().filter(|d| !d.rows.is_empty()) else {
                continue;
            };
            let list_url = ctx.parse(&list.url);
            if ctx.call(|| ctx.site.list(&list_url))?.is_none() {
                return Err(Error::not_found(format!(
                    "list {} on {}",
                    list_url,
                    ctx.site.url()
                )));
            }
            summary.merge(&provision_rows(&list_url, rows, ctx)?);
        }

        Ok(summary)
    }
}

fn provision_rows(list_url: &str, rows: &DataRows, ctx: &HandlerContext<'_>) -> Result<ExecuteSummary> {
    let mut summary = ExecuteSummary::default();
    let total = rows.rows.len();

    for (i, row) in rows.rows.iter().enumerate() {
        let values: ItemValues = row
            .values
            .iter()
            .map(|(field, value)| (field.clone(), ctx.parse(value)))
            .collect();
        let key = rows
            .key_column
            .as_deref()
            .and_then(|column| values.get(column).map(|value| (column, value)));
        let label = key
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| format!("row {}", i + 1));
        ctx.status("Data rows", format!("{list_url}: {label}"), i + 1, total);

        if let Some((column, value)) = key
            && let Some(id) = ctx.call(|| ctx.site.find_item(list_url, column, value))?
        {
            match rows.update_behavior {
                UpdateBehavior::Skip => summary.add_result(&ApplyResult::NoChange),
                UpdateBehavior::Overwrite => {
                    ctx.call(|| ctx.site.update_item(list_url, id, &values))?;
                    summary.add_result(&ApplyResult::Modified);
                }
            }
            continue;
        }

        match ctx.call(|| ctx.site.add_item(list_url, &values)) {
            Ok(_) => summary.add_result(&ApplyResult::Created),
            Err(e) if e.is_duplicate_row() && ctx.overrides().ignore_duplicate_data_row_errors => {
                log::debug!("Ignoring duplicate row {} in {}: {}", label, list_url, e);
                summary.add_result(&ApplyResult::NoChange);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}
