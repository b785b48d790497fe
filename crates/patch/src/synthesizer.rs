//! Patch synthesis for one (workload, rule) pair.
//!
//! Emits the list initializers the appends depend on, dispatches every spec
//! of the rule onto one shared [`PatchList`], and for rule sets keeps only
//! the last env append of each name.

use std::collections::HashSet;
use std::sync::Arc;

use injector_core::{InjectorError, PatchOperation, Workload};
use injector_rules::schema::InstrumentationRule;
use injector_rules::RegistryState;
use serde_json::{json, Map};
use tracing::{debug, warn};

use crate::builders::{self, BuildContext};
use crate::collector::CollectorBinder;
use crate::error::{Result, SynthError};
use crate::naming::{NameResolver, NamespaceLookup};
use crate::patch_list::{PatchList, PRIMARY_CONTAINER};

/// Turns a resolved rule into patch operations against one registry snapshot.
pub struct PatchSynthesizer<'a> {
    state: Arc<RegistryState>,
    namespaces: &'a dyn NamespaceLookup,
}

impl<'a> PatchSynthesizer<'a> {
    pub fn new(state: Arc<RegistryState>, namespaces: &'a dyn NamespaceLookup) -> Self {
        Self { state, namespaces }
    }

    pub fn synthesize(
        &self,
        workload: &Workload,
        rule: &InstrumentationRule,
    ) -> Result<Vec<PatchOperation>> {
        let controller = self
            .state
            .controller
            .as_deref()
            .ok_or(SynthError::MissingConfiguration)?;

        let specs: Vec<_> = rule.specs().into_iter().filter(|s| !s.skipped()).collect();
        if specs.is_empty() {
            debug!(rule = %rule.name, workload = %workload.name(), "Rule excludes workload");
            return Ok(Vec::new());
        }

        let mut list = PatchList::new();
        initializers(workload, &mut list);
        if workload.spec.containers.is_empty() {
            warn!(workload = %workload.name(), rule = %rule.name, "Workload has no containers");
            return Ok(list.into_vec());
        }

        let binder = CollectorBinder::new(&self.state);
        for spec in specs {
            builders::dispatch(&mut list, &rule.name, spec, || {
                let container = workload
                    .container(PRIMARY_CONTAINER)
                    .ok_or(InjectorError::ContainerIndex(PRIMARY_CONTAINER))?;
                let names = NameResolver::new(workload, self.namespaces);
                let collector = if spec.open_telemetry_collector.is_empty() {
                    None
                } else {
                    binder
                        .bind(workload, &spec.open_telemetry_collector)
                        .map_err(|e| {
                            warn!(error = %e, workload = %workload.name(), "Skipping collector integration");
                        })
                        .ok()
                };
                Ok(BuildContext {
                    workload,
                    container,
                    spec,
                    controller,
                    application_name: names.application_name(spec),
                    tier_name: names.tier_name(spec),
                    collector,
                })
            })?;
        }

        let ops = list.into_vec();
        Ok(if rule.is_rule_set() { dedup_env(ops) } else { ops })
    }
}

/// Empty lists and maps the later appends need.
fn initializers(workload: &Workload, list: &mut PatchList) {
    if workload.metadata.annotations.is_empty() {
        list.push(PatchOperation::add("/metadata/annotations", json!(Map::new())));
    }
    let Some(container) = workload.container(PRIMARY_CONTAINER) else {
        return;
    };
    if container.env.is_empty() {
        list.push(PatchOperation::add(
            format!("/spec/containers/{}/env", PRIMARY_CONTAINER),
            json!([]),
        ));
    }
    if container.volume_mounts.is_empty() {
        list.push(PatchOperation::add(
            format!("/spec/containers/{}/volumeMounts", PRIMARY_CONTAINER),
            json!([]),
        ));
    }
    if workload.spec.volumes.is_empty() {
        list.push(PatchOperation::add("/spec/volumes/", json!([])));
    }
    if workload.spec.init_containers.is_empty() {
        list.push(PatchOperation::add("/spec/initContainers", json!([])));
    }
}

/// Keep only the last env append per (path, name); everything else keeps
/// its relative order.
pub fn dedup_env(ops: Vec<PatchOperation>) -> Vec<PatchOperation> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut kept: Vec<PatchOperation> = ops
        .into_iter()
        .rev()
        .filter(|op| match op.appended_env_name() {
            Some(name) => seen.insert((op.path.clone(), name.to_string())),
            None => true,
        })
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::StaticNamespaces;
    use injector_core::{container_env_path, NamespaceMeta};
    use injector_rules::schema::{ControllerConfig, OptionalBool};

    fn state(with_controller: bool) -> Arc<RegistryState> {
        let mut state = RegistryState::default();
        if with_controller {
            state.controller = Some(Arc::new(ControllerConfig {
                host: "ctl.example.com".into(),
                port: "443".into(),
                is_secure: true,
                account_name: "acme".into(),
                access_key: "secret-key".into(),
                ..Default::default()
            }));
        }
        Arc::new(state)
    }

    fn rule(yaml: &str) -> InstrumentationRule {
        let mut rule: InstrumentationRule = serde_yaml::from_str(yaml).unwrap();
        for spec in rule.specs_mut() {
            spec.java_env_var = "JAVA_TOOL_OPTIONS".into();
            spec.netviz_port = "3892".into();
            spec.use_pod_name_for_node_name = OptionalBool::Set(false);
            spec.inject_k8s_otel_resource_attrs = OptionalBool::Set(false);
        }
        rule
    }

    fn namespaces() -> StaticNamespaces {
        let mut namespaces = StaticNamespaces::new();
        namespaces.insert(NamespaceMeta {
            name: "payments".into(),
            ..Default::default()
        });
        namespaces
    }

    fn env_op(name: &str, value: &str) -> PatchOperation {
        PatchOperation::add(container_env_path(0), json!({"name": name, "value": value}))
    }

    #[test]
    fn missing_controller_is_an_error() {
        let namespaces = namespaces();
        let synth = PatchSynthesizer::new(state(false), &namespaces);
        let rule = rule("name: r\ninjectionRules:\n  technology: java\n");
        let err = synth
            .synthesize(&builders::fixtures::workload(), &rule)
            .unwrap_err();
        assert!(matches!(err, SynthError::MissingConfiguration));
        assert_eq!(err.to_string(), "instrumentor configuration not read from configmap");
    }

    #[test]
    fn initializers_precede_dispatch() {
        let namespaces = namespaces();
        let synth = PatchSynthesizer::new(state(true), &namespaces);
        let rule = rule("name: r\ninjectionRules:\n  technology: nodejs/otel\n");
        let ops = synth
            .synthesize(&builders::fixtures::workload(), &rule)
            .unwrap();
        let paths: Vec<_> = ops.iter().take(6).map(|op| op.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "/metadata/annotations",
                "/spec/containers/0/env",
                "/spec/containers/0/volumeMounts",
                "/spec/volumes/",
                "/spec/initContainers",
                "/metadata/annotations/OTEL_INSTRUMENTATION_VIA_RULE",
            ]
        );
    }

    #[test]
    fn exclusion_rule_yields_nothing() {
        let namespaces = namespaces();
        let synth = PatchSynthesizer::new(state(true), &namespaces);
        let rule = rule("name: r\ninjectionRules:\n  technology: java\n  doNotInstrument: true\n");
        let ops = synth
            .synthesize(&builders::fixtures::workload(), &rule)
            .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn rule_set_keeps_last_env_value() {
        let namespaces = namespaces();
        let synth = PatchSynthesizer::new(state(true), &namespaces);
        let rule = rule(
            r#"
name: both
injectionRuleSet:
  - technology: java
    javaCustomConfig: -Dfirst=1
  - technology: java/otel
    javaCustomConfig: -Dsecond=2
"#,
        );
        let ops = synth
            .synthesize(&builders::fixtures::workload(), &rule)
            .unwrap();
        let java: Vec<_> = ops
            .iter()
            .filter(|op| op.appended_env_name() == Some("JAVA_TOOL_OPTIONS"))
            .collect();
        assert_eq!(java.len(), 1);
        let value = java[0].value.as_ref().unwrap()["value"].as_str().unwrap();
        assert!(value.contains("-Dsecond=2"));
        assert!(!value.contains("-Dfirst=1"));
    }

    #[test]
    fn dedup_keeps_last_and_preserves_order() {
        let ops = vec![
            env_op("A", "1"),
            env_op("B", "1"),
            PatchOperation::add("/spec/volumes/-", json!({"name": "v"})),
            env_op("A", "2"),
            PatchOperation::add(container_env_path(1), json!({"name": "A", "value": "other"})),
        ];
        let out = dedup_env(ops);
        let summary: Vec<_> = out
            .iter()
            .map(|op| {
                let value = op.value.as_ref().unwrap();
                format!("{}:{}", value["name"].as_str().unwrap(), value["value"].as_str().unwrap_or("-"))
            })
            .collect();
        assert_eq!(summary, ["B:1", "v:-", "A:2", "A:other"]);
    }
}
