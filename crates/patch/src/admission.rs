//! Admission of pods and instrumentation custom resources.
//!
//! Pods are resolved against a registry snapshot and synthesized into
//! patches. `Instrumentation`, `ClusterInstrumentation` and
//! `OpenTelemetryCollector` objects are registered (or removed) and admitted
//! unmodified.

use std::sync::Arc;

use injector_core::{PatchOperation, Workload};
use injector_rules::loader::{collector_binding, parse_object, qualified_rule, AppliedObject, ObjectApplier};
use injector_rules::schema::ClusterObject;
use injector_rules::RuleResolver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SynthError};
use crate::naming::NamespaceLookup;
use crate::synthesizer::PatchSynthesizer;

/// Resource plural an admission request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Pods,
    Instrumentations,
    Clusterinstrumentations,
    Opentelemetrycollectors,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// The parts of an admission request the engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub resource: Resource,
    pub operation: Operation,
    /// Request namespace; fills an empty object namespace.
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dry_run: bool,
    /// The object as YAML or JSON text.
    pub object: String,
}

impl AdmissionRequest {
    /// A pod creation request.
    pub fn pod(namespace: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            resource: Resource::Pods,
            operation: Operation::Create,
            namespace: namespace.into(),
            name: String::new(),
            dry_run: false,
            object: object.into(),
        }
    }
}

pub struct AdmissionEngine {
    applier: ObjectApplier,
    resolver: RuleResolver,
    namespaces: Arc<dyn NamespaceLookup>,
}

impl AdmissionEngine {
    pub fn new(
        applier: ObjectApplier,
        resolver: RuleResolver,
        namespaces: Arc<dyn NamespaceLookup>,
    ) -> Self {
        Self {
            applier,
            resolver,
            namespaces,
        }
    }

    pub fn applier(&self) -> &ObjectApplier {
        &self.applier
    }

    /// Patches for `req`. Any error fails the request.
    pub fn admit(&self, req: &AdmissionRequest) -> Result<Vec<PatchOperation>> {
        match req.resource {
            Resource::Pods => self.admit_pod(req),
            Resource::Instrumentations
            | Resource::Clusterinstrumentations
            | Resource::Opentelemetrycollectors => {
                self.admit_custom_resource(req)?;
                Ok(Vec::new())
            }
            Resource::Unknown => {
                debug!(name = %req.name, "Ignoring request for unhandled resource");
                Ok(Vec::new())
            }
        }
    }

    fn admit_pod(&self, req: &AdmissionRequest) -> Result<Vec<PatchOperation>> {
        let mut workload: Workload =
            serde_yaml::from_str(&req.object).map_err(|e| SynthError::Decode {
                kind: "Pod".to_string(),
                message: e.to_string(),
            })?;
        workload.prepare(&req.namespace);

        let state = self.applier.registry().snapshot();
        if state.controller.is_none() {
            return Err(SynthError::MissingConfiguration);
        }
        let Some(rule) = self.resolver.resolve(&state, &workload) else {
            return Ok(Vec::new());
        };
        info!(rule = %rule.name, workload = %workload.name(), namespace = %workload.namespace(), "Instrumenting workload");

        let synthesizer = PatchSynthesizer::new(Arc::clone(&state), self.namespaces.as_ref());
        synthesizer.synthesize(&workload, rule)
    }

    fn admit_custom_resource(&self, req: &AdmissionRequest) -> Result<()> {
        if req.dry_run {
            debug!(name = %req.name, "Dry run, nothing registered");
            return Ok(());
        }
        let mut object = parse_object(&req.object)?;
        if object.metadata().namespace.is_empty() {
            object.metadata_mut().namespace = req.namespace.clone();
        }

        if req.operation == Operation::Delete {
            if let Some(applied) = applied_identity(&object) {
                info!(object = %applied, "Removing object");
                self.applier.remove(&applied);
            }
            return Ok(());
        }
        if let Some(applied) = self.applier.apply(&object)? {
            info!(object = %applied, operation = ?req.operation, "Registered object");
        }
        Ok(())
    }
}

/// What applying `object` registers, without touching the registry.
fn applied_identity(object: &ClusterObject) -> Option<AppliedObject> {
    match object {
        ClusterObject::Instrumentation(rule) => {
            let (scope, rule) = qualified_rule(rule, false);
            Some(AppliedObject::Rule {
                scope,
                name: rule.name,
            })
        }
        ClusterObject::ClusterInstrumentation(rule) => {
            let (scope, rule) = qualified_rule(rule, true);
            Some(AppliedObject::Rule {
                scope,
                name: rule.name,
            })
        }
        ClusterObject::Collector(collector) => Some(AppliedObject::Collector {
            namespace: collector.metadata.namespace.clone(),
            name: collector_binding(collector)
                .map(|b| b.name)
                .unwrap_or_else(|| collector.metadata.name.clone()),
        }),
        ClusterObject::ConfigMap(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::StaticNamespaces;
    use injector_core::Config;
    use injector_rules::registry::RuleScope;
    use injector_rules::Registry;

    const CONFIG_MAP: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: webhook-instrumentor-config
  namespace: default
data:
  controller: |
    host: ctl.example.com
    port: "443"
    isSecure: true
    accountName: acme
    accessKey: secret-key
  instrumentation: |
    - name: java-apps
      matchRules:
        labels:
          - language: java
      injectionRules:
        technology: java
        image: appd/java-agent:latest
"#;

    const RULE_CRD: &str = r#"
apiVersion: ext.example.com/v1
kind: Instrumentation
metadata:
  name: node-apps
spec:
  matchRules:
    labels:
      - language: nodejs
  injectionRules:
    technology: nodejs/otel
    image: otel/nodejs:latest
"#;

    const POD: &str = r#"
metadata:
  name: web-0
  labels:
    language: nodejs
spec:
  containers:
    - name: web
      image: web:1
"#;

    fn engine() -> AdmissionEngine {
        let registry = Arc::new(Registry::default());
        let applier = ObjectApplier::new(registry, &Config::default());
        AdmissionEngine::new(applier, RuleResolver::default(), Arc::new(StaticNamespaces::new()))
    }

    fn crd(operation: Operation, dry_run: bool) -> AdmissionRequest {
        AdmissionRequest {
            resource: Resource::Instrumentations,
            operation,
            namespace: "shop".into(),
            name: "node-apps".into(),
            dry_run,
            object: RULE_CRD.into(),
        }
    }

    fn load_configuration(engine: &AdmissionEngine) {
        let object = parse_object(CONFIG_MAP).unwrap();
        engine.applier().apply(&object).unwrap();
    }

    #[test]
    fn pod_without_configuration_fails() {
        let engine = engine();
        let err = engine.admit(&AdmissionRequest::pod("shop", POD)).unwrap_err();
        assert!(matches!(err, SynthError::MissingConfiguration));
    }

    #[test]
    fn undecodable_pod_fails() {
        let engine = engine();
        let err = engine
            .admit(&AdmissionRequest::pod("shop", "spec: [not, a, map"))
            .unwrap_err();
        assert!(matches!(err, SynthError::Decode { ref kind, .. } if kind == "Pod"));
    }

    #[test]
    fn crd_rule_lands_in_request_namespace() {
        let engine = engine();
        load_configuration(&engine);
        assert!(engine.admit(&crd(Operation::Create, false)).unwrap().is_empty());

        let state = engine.applier().registry().snapshot();
        let tier = state.tier(&RuleScope::Namespace("shop".into()));
        assert_eq!(tier.len(), 1);
        assert_eq!(tier[0].name(), "shop/node-apps");

        let ops = engine.admit(&AdmissionRequest::pod("shop", POD)).unwrap();
        assert!(ops
            .iter()
            .any(|op| op.path == "/metadata/annotations/OTEL_INSTRUMENTATION_VIA_RULE"));

        // Other namespaces fall through to the configuration tier, which does not match.
        let ops = engine.admit(&AdmissionRequest::pod("other", POD)).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn dry_run_registers_nothing() {
        let engine = engine();
        engine.admit(&crd(Operation::Create, true)).unwrap();
        let state = engine.applier().registry().snapshot();
        assert!(state.namespaced_rules.is_empty());
    }

    #[test]
    fn delete_removes_by_qualified_name() {
        let engine = engine();
        engine.admit(&crd(Operation::Create, false)).unwrap();
        engine.admit(&crd(Operation::Delete, false)).unwrap();
        let state = engine.applier().registry().snapshot();
        assert!(state.tier(&RuleScope::Namespace("shop".into())).is_empty());
    }

    #[test]
    fn unknown_resource_is_admitted_unmodified() {
        let req: AdmissionRequest = serde_json::from_str(
            r#"{"resource": "deployments", "operation": "CREATE", "object": "{}"}"#,
        )
        .unwrap();
        assert_eq!(req.resource, Resource::Unknown);
        assert!(engine().admit(&req).unwrap().is_empty());
    }
}
