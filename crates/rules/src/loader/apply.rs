//! Applying parsed objects to the registry, and undoing them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::registry::{parse_collector_map, ConfigurationBatch, Registry, RuleScope};
use crate::schema::{
    ClusterObject, CollectorBinding, CollectorMode, CollectorObject, ConfigMapObject,
    ControllerConfig, InjectionTemplate, InstrumentationRule, RuleObject,
};

use super::error::{Result, RuleError};

/// Name prefix for cluster-scoped rules.
pub const CLUSTER_SCOPE_PREFIX: &str = "*cluster*";

/// Init image used to write resource-sourced sidecar configuration.
pub const DEFAULT_SIDECAR_INIT_IMAGE: &str = "alpine:latest";

/// What an applied object put into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedObject {
    Configuration,
    GlobalCollectors,
    Rule { scope: RuleScope, name: String },
    Collector { namespace: String, name: String },
}

impl fmt::Display for AppliedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliedObject::Configuration => write!(f, "configuration"),
            AppliedObject::GlobalCollectors => write!(f, "global collectors"),
            AppliedObject::Rule { scope, name } => write!(f, "rule {} ({})", name, scope),
            AppliedObject::Collector { namespace, name } => {
                write!(f, "collector {}/{}", namespace, name)
            }
        }
    }
}

/// Parse the configuration ConfigMap payload.
///
/// `controller` and `instrumentation` are required; `injectionTemplates`
/// is optional.
pub fn parse_configuration(data: &BTreeMap<String, String>) -> Result<ConfigurationBatch> {
    let required = |key: &str| {
        data.get(key)
            .ok_or_else(|| RuleError::Invalid(format!("configuration key '{}' is missing", key)))
    };
    let controller: ControllerConfig = serde_yaml::from_str(required("controller")?)?;
    let rules: Vec<InstrumentationRule> = serde_yaml::from_str(required("instrumentation")?)?;
    let templates: Vec<InjectionTemplate> = match data.get("injectionTemplates") {
        Some(raw) => serde_yaml::from_str(raw)?,
        None => Vec::new(),
    };
    Ok(ConfigurationBatch {
        controller,
        rules,
        templates,
    })
}

/// Scope and registry-side rule for a rule resource.
///
/// Names are qualified as `<namespace>/<name>` or `*cluster*/<name>`; a
/// namespaced rule only ever matches its own namespace.
pub fn qualified_rule(object: &RuleObject, cluster: bool) -> (RuleScope, InstrumentationRule) {
    let mut rule = object.spec.clone();
    if cluster {
        rule.name = format!("{}/{}", CLUSTER_SCOPE_PREFIX, object.metadata.name);
        (RuleScope::Cluster, rule)
    } else {
        let namespace = object.metadata.namespace.clone();
        rule.name = format!("{}/{}", namespace, object.metadata.name);
        rule.match_rules.namespace_regex = format!("^{}$", namespace);
        (RuleScope::Namespace(namespace), rule)
    }
}

/// Binding registered for a collector resource. `None` without a mode.
pub fn collector_binding(object: &CollectorObject) -> Option<CollectorBinding> {
    let spec = &object.spec;
    let mode = spec.mode?;
    let name = &object.metadata.name;
    let mut binding = CollectorBinding::new(name.clone(), mode);
    binding.image = spec.image.clone();
    binding.image_pull_policy = spec.image_pull_policy.clone();
    binding.config = spec.config.clone();
    match mode {
        CollectorMode::Sidecar => binding.init_image = DEFAULT_SIDECAR_INIT_IMAGE.to_string(),
        CollectorMode::Deployment => {
            binding.service_name = format!(
                "otel-collector-{}.{}.svc.cluster.local",
                name, object.metadata.namespace
            )
        }
        CollectorMode::External => binding.service_name = spec.otlp_endpoint.clone(),
    }
    binding.spec = Some(spec.clone());
    Some(binding)
}

/// Routes parsed objects into a shared [`Registry`].
#[derive(Clone)]
pub struct ObjectApplier {
    registry: Arc<Registry>,
    namespace: String,
    config_map_name: String,
    collector_config_map_name: String,
}

impl ObjectApplier {
    pub fn new(registry: Arc<Registry>, config: &injector_core::Config) -> Self {
        Self {
            registry,
            namespace: config.namespace.clone(),
            config_map_name: config.config_map_name.clone(),
            collector_config_map_name: config.collector_config_map_name.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Apply one object. `Ok(None)` means the object is not ours to handle.
    pub fn apply(&self, object: &ClusterObject) -> Result<Option<AppliedObject>> {
        match object {
            ClusterObject::ConfigMap(map) => self.apply_config_map(map),
            ClusterObject::Instrumentation(rule) => self.apply_rule(rule, false).map(Some),
            ClusterObject::ClusterInstrumentation(rule) => self.apply_rule(rule, true).map(Some),
            ClusterObject::Collector(collector) => self.apply_collector(collector).map(Some),
        }
    }

    fn apply_config_map(&self, map: &ConfigMapObject) -> Result<Option<AppliedObject>> {
        let namespace = &map.metadata.namespace;
        if !namespace.is_empty() && *namespace != self.namespace {
            return Ok(None);
        }
        if map.metadata.name == self.config_map_name {
            let batch = parse_configuration(&map.data)?;
            let summary = self.registry.replace_config_tier(batch)?;
            info!(
                configmap = %map.metadata.name,
                rules = summary.registered,
                excluded = ?summary.excluded,
                "Applied configuration"
            );
            Ok(Some(AppliedObject::Configuration))
        } else if map.metadata.name == self.collector_config_map_name {
            self.registry
                .replace_global_collectors(parse_collector_map(&map.data));
            Ok(Some(AppliedObject::GlobalCollectors))
        } else {
            Ok(None)
        }
    }

    fn apply_rule(&self, object: &RuleObject, cluster: bool) -> Result<AppliedObject> {
        if !cluster && object.metadata.namespace.is_empty() {
            return Err(RuleError::Invalid(format!(
                "Instrumentation '{}' has no namespace",
                object.metadata.name
            )));
        }
        let (scope, rule) = qualified_rule(object, cluster);
        let name = rule.name.clone();
        self.registry.upsert(&scope, rule)?;
        Ok(AppliedObject::Rule { scope, name })
    }

    fn apply_collector(&self, object: &CollectorObject) -> Result<AppliedObject> {
        let namespace = object.metadata.namespace.clone();
        if namespace.is_empty() {
            return Err(RuleError::Invalid(format!(
                "OpenTelemetryCollector '{}' has no namespace",
                object.metadata.name
            )));
        }
        let binding = collector_binding(object).ok_or_else(|| {
            RuleError::Invalid(format!(
                "OpenTelemetryCollector '{}' has no mode",
                object.metadata.name
            ))
        })?;
        let name = binding.name.clone();
        self.registry.register_collector(&namespace, binding);
        Ok(AppliedObject::Collector { namespace, name })
    }

    /// Undo a previously applied object.
    ///
    /// ConfigMap-sourced state is kept: only a replacement supersedes it.
    pub fn remove(&self, applied: &AppliedObject) {
        match applied {
            AppliedObject::Rule { scope, name } => {
                self.registry.delete(scope, name);
            }
            AppliedObject::Collector { namespace, name } => {
                self.registry.unregister_collector(namespace, name);
            }
            AppliedObject::Configuration | AppliedObject::GlobalCollectors => {
                warn!(object = %applied, "ConfigMap removed, keeping last applied state");
            }
        }
    }
}
