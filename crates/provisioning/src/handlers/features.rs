//! Site and web feature activation

use super::{HandlerKind, ObjectHandler};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::model::{FeatureScope, ProvisioningTemplate};
use crate::types::{ApplyResult, ExecuteSummary};

pub struct FeaturesHandler;

impl ObjectHandler for FeaturesHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Features
    }

    fn will_provision(&self, template: &ProvisioningTemplate, _ctx: &HandlerContext<'_>) -> bool {
        !template.features.is_empty()
    }

    fn provision(
        &self,
        template: &ProvisioningTemplate,
        ctx: &HandlerContext<'_>,
    ) -> Result<ExecuteSummary> {
        let mut summary = ExecuteSummary::default();

        for scope in [FeatureScope::Site, FeatureScope::Web] {
            let features: Vec<_> = template
                .features
                .iter()
                .filter(|f| f.scope == scope)
                .collect();
            if features.is_empty() {
                continue;
            }
            if scope == FeatureScope::Site && ctx.is_sub_web() {
                log::debug!("Skipping site scoped features on subsite {}", ctx.site.url());
                continue;
            }

            let active = ctx.call(|| ctx.site.active_features(scope))?;
            for feature in features {
                let wanted_id = feature.id.trim_matches(['{', '}']);
                let is_active = active
                    .iter()
                    .any(|id| id.trim_matches(['{', '}']).eq_ignore_ascii_case(wanted_id));
                let wanted = !feature.deactivate;
                if is_active == wanted {
                    summary.add_result(&ApplyResult::NoChange);
                    continue;
                }

                ctx.note(format!(
                    "{} feature {}",
                    if wanted { "Activating" } else { "Deactivating" },
                    feature.id
                ));
                ctx.call(|| ctx.site.set_feature(scope, &feature.id, wanted))?;
                summary.add_result(if wanted {
                    &ApplyResult::Created
                } else {
                    &ApplyResult::Removed
                });
            }
        }

        Ok(summary)
    }
}
