//! Core [`Registry`]: copy-on-write rule tiers behind a single lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::inheritance::{self, InjectionDefaults};
use crate::matcher::CompiledMatcher;
use crate::schema::{
    CollectorBinding, ControllerConfig, InjectionSpec, InjectionTemplate, InstrumentationRule,
};
use crate::validation::{self, ValidationResult};

use super::collectors::CollectorRegistry;
use super::error::{RegistryError, Result};

/// Which CRD-sourced tier a write targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleScope {
    Namespace(String),
    Cluster,
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleScope::Namespace(ns) => write!(f, "namespace/{}", ns),
            RuleScope::Cluster => write!(f, "cluster"),
        }
    }
}

/// A resolved rule with its match regexes compiled.
#[derive(Debug, Clone)]
pub struct RegisteredRule {
    pub rule: InstrumentationRule,
    pub matcher: CompiledMatcher,
}

impl RegisteredRule {
    fn compile(rule: InstrumentationRule) -> Result<Self> {
        let matcher = CompiledMatcher::compile(&rule.match_rules).map_err(|source| {
            RegistryError::Regex {
                rule: rule.name.clone(),
                source,
            }
        })?;
        Ok(Self { rule, matcher })
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }
}

/// The contents of the configuration ConfigMap, parsed but not validated.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBatch {
    pub controller: ControllerConfig,
    pub rules: Vec<InstrumentationRule>,
    pub templates: Vec<InjectionTemplate>,
}

/// Outcome of a successful configuration-tier replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub registered: usize,
    /// Rules dropped because they reference an unknown template.
    pub excluded: Vec<String>,
}

/// One immutable generation of registry contents.
#[derive(Debug, Clone, Default)]
pub struct RegistryState {
    pub controller: Option<Arc<ControllerConfig>>,
    pub templates: HashMap<String, InjectionSpec>,
    /// Configuration-sourced rules in registration order.
    pub config_rules: Vec<Arc<RegisteredRule>>,
    /// Cluster-scoped rules, ascending priority.
    pub cluster_rules: Vec<Arc<RegisteredRule>>,
    /// Namespace-scoped rules per namespace, ascending priority.
    pub namespaced_rules: HashMap<String, Vec<Arc<RegisteredRule>>>,
    pub collectors: CollectorRegistry,
    pub generation: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RegistryState {
    /// Rules of one CRD-sourced tier, in the order they are tried.
    pub fn tier(&self, scope: &RuleScope) -> &[Arc<RegisteredRule>] {
        match scope {
            RuleScope::Cluster => &self.cluster_rules,
            RuleScope::Namespace(ns) => self
                .namespaced_rules
                .get(ns)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }

    fn tier_mut(&mut self, scope: &RuleScope) -> &mut Vec<Arc<RegisteredRule>> {
        match scope {
            RuleScope::Cluster => &mut self.cluster_rules,
            RuleScope::Namespace(ns) => self.namespaced_rules.entry(ns.clone()).or_default(),
        }
    }
}

/// Thread-safe registry. Cheap to share behind an `Arc`.
pub struct Registry {
    state: RwLock<Arc<RegistryState>>,
    defaults: InjectionDefaults,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(InjectionDefaults::default())
    }
}

impl Registry {
    pub fn new(defaults: InjectionDefaults) -> Self {
        Self {
            state: RwLock::new(Arc::new(RegistryState::default())),
            defaults,
        }
    }

    /// Current state. Holds no lock once returned.
    ///
    /// The lock only ever guards a whole `Arc` swap, so a poisoned lock
    /// still holds the last published generation and is read through.
    pub fn snapshot(&self) -> Arc<RegistryState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply `change` to a copy of the current state and publish it.
    fn commit<T>(&self, change: impl FnOnce(&mut RegistryState) -> T) -> T {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = RegistryState::clone(&guard);
        let out = change(&mut next);
        next.generation += 1;
        next.updated_at = Some(Utc::now());
        *guard = Arc::new(next);
        out
    }

    // ── Configuration tier ──────────────────────────────────────

    /// Replace the controller configuration, templates and
    /// configuration-sourced rules as one unit.
    ///
    /// A rule that references an unknown template is excluded; any other
    /// validation failure rejects the whole batch.
    pub fn replace_config_tier(&self, batch: ConfigurationBatch) -> Result<ReplaceSummary> {
        let mut report = validation::validate_controller(&batch.controller);
        report.absorb(validation::validate_templates(&batch.templates));
        if !report.valid {
            return Err(RegistryError::Invalid(report));
        }

        let templates = inheritance::template_index(&batch.templates);
        let mut resolved = Vec::with_capacity(batch.rules.len());
        let mut excluded = Vec::new();
        for rule in &batch.rules {
            match inheritance::resolve_rule(rule, &templates, &self.defaults) {
                Ok(rule) => resolved.push(rule),
                Err(e) => {
                    warn!(rule = %rule.name, error = %e, "Excluding rule with unknown template");
                    excluded.push(rule.name.clone());
                }
            }
        }

        let report = validation::validate_rules(&resolved);
        if !report.valid {
            return Err(RegistryError::Invalid(report));
        }
        log_warnings(&report);

        let rules = resolved
            .into_iter()
            .map(|rule| RegisteredRule::compile(rule).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let registered = rules.len();
        let controller = Arc::new(batch.controller);

        let generation = self.commit(move |state| {
            state.controller = Some(controller);
            state.templates = templates;
            state.config_rules = rules;
            state.generation + 1
        });
        info!(rules = registered, excluded = excluded.len(), generation, "Configuration tier replaced");
        Ok(ReplaceSummary {
            registered,
            excluded,
        })
    }

    // ── CRD tiers ───────────────────────────────────────────────

    /// Insert or replace (by name) a rule in a CRD-sourced tier, then
    /// re-sort the tier by ascending priority keeping insertion order on ties.
    ///
    /// The live controller configuration is re-checked when one is loaded;
    /// before the first configuration arrives rules may still be staged,
    /// since synthesis refuses to run without a controller.
    pub fn upsert(&self, scope: &RuleScope, rule: InstrumentationRule) -> Result<()> {
        let current = self.snapshot();
        let templates = current.templates.clone();

        let mut report = match current.controller.as_deref() {
            Some(controller) => validation::validate_controller(controller),
            None => ValidationResult::new(),
        };
        report.absorb(validation::validate_rule(&rule));
        report.absorb(validation::validate_template_refs(&rule, &templates));
        if !report.valid {
            return Err(RegistryError::Invalid(report));
        }
        log_warnings(&report);

        let resolved = inheritance::resolve_rule(&rule, &templates, &self.defaults)?;
        let registered = Arc::new(RegisteredRule::compile(resolved)?);
        let name = registered.rule.name.clone();

        let replaced = self.commit(|state| {
            let tier = state.tier_mut(scope);
            let replaced = match tier.iter().position(|r| r.rule.name == name) {
                Some(idx) => {
                    tier[idx] = registered;
                    true
                }
                None => {
                    tier.push(registered);
                    false
                }
            };
            tier.sort_by_key(|r| r.rule.priority);
            replaced
        });
        info!(rule = %name, scope = %scope, replaced, "Rule upserted");
        Ok(())
    }

    /// Remove a rule by name. Returns whether it existed.
    pub fn delete(&self, scope: &RuleScope, name: &str) -> bool {
        if !self.snapshot().tier(scope).iter().any(|r| r.rule.name == name) {
            return false;
        }
        let removed = self.commit(|state| {
            let tier = state.tier_mut(scope);
            let before = tier.len();
            tier.retain(|r| r.rule.name != name);
            let removed = tier.len() != before;
            if let RuleScope::Namespace(ns) = scope {
                if state.namespaced_rules.get(ns).is_some_and(Vec::is_empty) {
                    state.namespaced_rules.remove(ns);
                }
            }
            removed
        });
        if removed {
            info!(rule = %name, scope = %scope, "Rule deleted");
        }
        removed
    }

    // ── Collectors ──────────────────────────────────────────────

    /// Replace the global collector registry.
    pub fn replace_global_collectors(&self, bindings: Vec<CollectorBinding>) {
        let count = bindings.len();
        self.commit(|state| {
            state.collectors.global = bindings
                .into_iter()
                .map(|b| (b.name.clone(), b))
                .collect();
        });
        info!(collectors = count, "Global collectors replaced");
    }

    pub fn register_collector(&self, namespace: &str, binding: CollectorBinding) {
        let name = binding.name.clone();
        let mode = binding.mode;
        self.commit(|state| state.collectors.register(namespace, binding));
        info!(collector = %name, namespace = %namespace, mode = %mode, "Collector registered");
    }

    pub fn unregister_collector(&self, namespace: &str, name: &str) -> bool {
        let removed = self.commit(|state| state.collectors.unregister(namespace, name));
        if removed {
            info!(collector = %name, namespace = %namespace, "Collector unregistered");
        }
        removed
    }

    // ── Introspection ───────────────────────────────────────────

    /// JSON dump of every tier and collector registry. Secrets are masked.
    pub fn describe(&self) -> Value {
        let state = self.snapshot();
        let rules = |tier: &[Arc<RegisteredRule>]| -> Vec<Value> {
            tier.iter()
                .filter_map(|r| serde_json::to_value(&r.rule).ok())
                .collect()
        };
        let namespaced: serde_json::Map<String, Value> = state
            .namespaced_rules
            .iter()
            .map(|(ns, tier)| (ns.clone(), Value::Array(rules(tier))))
            .collect();
        let mut template_names: Vec<&String> = state.templates.keys().collect();
        template_names.sort();

        json!({
            "generation": state.generation,
            "updatedAt": state.updated_at.map(|t| t.to_rfc3339()),
            "controller": state.controller.as_deref().map(masked_controller),
            "templates": template_names,
            "rules": {
                "namespaced": namespaced,
                "cluster": rules(&state.cluster_rules),
                "config": rules(&state.config_rules),
            },
            "collectors": serde_json::to_value(&state.collectors).unwrap_or(Value::Null),
        })
    }
}

fn masked_controller(config: &ControllerConfig) -> Value {
    let mut masked = config.clone();
    for secret in [&mut masked.access_key, &mut masked.proxy_password] {
        if !secret.is_empty() {
            *secret = "****".to_string();
        }
    }
    serde_json::to_value(masked).unwrap_or(Value::Null)
}

fn log_warnings(report: &ValidationResult) {
    for w in &report.warnings {
        warn!(path = %w.path, "{}", w.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn poisoned_lock_keeps_last_generation() {
        let registry = Registry::default();
        registry.commit(|state| state.templates.clear());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            registry.commit(|_| -> () { panic!("writer died mid-change") })
        }));
        assert!(outcome.is_err());
        assert!(registry.state.is_poisoned());

        assert_eq!(registry.snapshot().generation, 1);
        registry.commit(|_| ());
        assert_eq!(registry.snapshot().generation, 2);
    }
}
