//! Web property bag entries

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::ProvisioningTemplate;
use crate::types::{ApplyResult, ExecuteSummary};

/// Key prefixes owned by the platform
const RESERVED_PREFIXES: [&str; 6] = [
    "_",
    "vti_",
    "dlc_",
    "ecm_",
    "profileschemaversion",
    "designpreview",
];

/// Whether a property bag key belongs to the platform
pub fn is_reserved_property(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    RESERVED_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

pub struct PropertyBagHandler;

impl ObjectHandler for PropertyBagHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::PropertyBagEntries
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        !template.property_bag_entries.is_empty()
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();
        let total = template.property_bag_entries.len();

        for (i, entry) in template.property_bag_entries.iter().enumerate() {
            let key = ctx.parse(&entry.key);
            ctx.status("Property bag", &key, i + 1, total);

            if is_reserved_property(&key) && !ctx.overrides().overwrite_system_property_bag_values {
                log::debug!("Skipping system property {}", key);
                summary.add_result(&ApplyResult::Skipped {
                    reason: format!("{key} is a system property"),
                });
                continue;
            }

            let value = ctx.parse(&entry.value);
            let result = match ctx.call(|| ctx.site.property(&key))? {
                None => {
                    ctx.call(|| ctx.site.set_property(&key, &value))?;
                    ApplyResult::Created
                }
                Some(current) if current == value => ApplyResult::NoChange,
                Some(_) if entry.overwrite => {
                    ctx.call(|| ctx.site.set_property(&key, &value))?;
                    ApplyResult::Modified
                }
                Some(_) => ApplyResult::NoChange,
            };
            summary.add_result(&result);

            if entry.indexed {
                ctx.call(|| ctx.site.index_property(&key))?;
            }
        }

        Ok(summary)
    }
}
