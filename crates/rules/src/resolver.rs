//! Tiered rule resolution for one workload.

use injector_core::Workload;
use tracing::debug;

use crate::registry::{RegisteredRule, RegistryState};
use crate::schema::InstrumentationRule;

/// Walks the rule tiers in fixed precedence and returns the first match:
/// namespace-scoped rules for the workload's namespace, then cluster-scoped
/// rules, then configuration-sourced rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleResolver {
    /// Skip the namespace-scoped tier.
    pub crds_disabled: bool,
}

impl RuleResolver {
    pub fn new(crds_disabled: bool) -> Self {
        Self { crds_disabled }
    }

    /// `None` means the workload stays unmodified.
    pub fn resolve<'a>(
        &self,
        state: &'a RegistryState,
        workload: &Workload,
    ) -> Option<&'a InstrumentationRule> {
        let namespaced: &[std::sync::Arc<RegisteredRule>] = if self.crds_disabled {
            &[]
        } else {
            state
                .namespaced_rules
                .get(workload.namespace())
                .map(Vec::as_slice)
                .unwrap_or_default()
        };

        let found = namespaced
            .iter()
            .map(|r| ("namespaced", r))
            .chain(state.cluster_rules.iter().map(|r| ("cluster", r)))
            .chain(state.config_rules.iter().map(|r| ("config", r)))
            .find(|(_, r)| r.matcher.matches(workload));

        match found {
            Some((tier, r)) => {
                debug!(rule = %r.name(), tier, workload = %workload.name(), "Rule matched");
                Some(&r.rule)
            }
            None => {
                debug!(workload = %workload.name(), namespace = %workload.namespace(), "No rule matched");
                None
            }
        }
    }
}
