//! Application and tier naming strategies.
//!
//! Names come from a spec value, a workload label or annotation, the
//! namespace, namespace metadata, the owning workload (tier only) or a
//! minijinja expression over workload and namespace metadata. Every lookup
//! failure degrades to a fallback name; naming never fails a request.
//!
//! Expressions are arbitrary strings, so a fresh [`minijinja::Environment`]
//! is created per render.

use std::collections::{BTreeMap, HashMap};

use injector_core::{NamespaceMeta, Workload};
use injector_rules::schema::{InjectionSpec, NameSource};
use serde::Serialize;
use tracing::warn;

use crate::error::{Result, SynthError};

pub const DEFAULT_APP_NAME: &str = "DEFAULT_APP_NAME";
pub const DEFAULT_TIER_NAME: &str = "DEFAULT_TIER_NAME";

/// Read access to namespace metadata.
pub trait NamespaceLookup: Send + Sync {
    fn namespace(&self, name: &str) -> Result<NamespaceMeta>;
}

/// In-memory namespace metadata, e.g. loaded from a YAML file.
#[derive(Debug, Clone, Default)]
pub struct StaticNamespaces {
    namespaces: HashMap<String, NamespaceMeta>,
}

impl StaticNamespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, namespace: NamespaceMeta) {
        self.namespaces.insert(namespace.name.clone(), namespace);
    }

    /// Parse a YAML list of `{name, labels, annotations}` entries.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let entries: Vec<NamespaceMeta> =
            serde_yaml::from_str(contents).map_err(|e| SynthError::Decode {
                kind: "Namespace".to_string(),
                message: e.to_string(),
            })?;
        let mut namespaces = Self::new();
        for entry in entries {
            namespaces.insert(entry);
        }
        Ok(namespaces)
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl NamespaceLookup for StaticNamespaces {
    fn namespace(&self, name: &str) -> Result<NamespaceMeta> {
        self.namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| SynthError::NamespaceNotFound(name.to_string()))
    }
}

/// Values visible to name expressions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExpressionContext<'a> {
    labels: &'a BTreeMap<String, String>,
    annotations: &'a BTreeMap<String, String>,
    namespace_labels: &'a BTreeMap<String, String>,
    namespace_annotations: &'a BTreeMap<String, String>,
    namespace: &'a str,
}

/// One naming strategy: where to look and what to fall back to.
struct NameSelector<'a> {
    source: Option<NameSource>,
    value: &'a str,
    label: &'a str,
    annotation: &'a str,
    expression: &'a str,
    fallback: &'static str,
}

/// Resolves application and tier names for one workload.
pub struct NameResolver<'a> {
    workload: &'a Workload,
    namespaces: &'a dyn NamespaceLookup,
}

impl<'a> NameResolver<'a> {
    pub fn new(workload: &'a Workload, namespaces: &'a dyn NamespaceLookup) -> Self {
        Self {
            workload,
            namespaces,
        }
    }

    pub fn application_name(&self, spec: &InjectionSpec) -> String {
        let selector = NameSelector {
            source: spec.application_name_source,
            value: &spec.application_name,
            label: &spec.application_name_label,
            annotation: &spec.application_name_annotation,
            expression: &spec.application_name_expression,
            fallback: DEFAULT_APP_NAME,
        };
        match selector.source {
            Some(NameSource::Auto) | None => DEFAULT_APP_NAME.to_string(),
            Some(_) => self.select(&selector),
        }
    }

    pub fn tier_name(&self, spec: &InjectionSpec) -> String {
        let selector = NameSelector {
            source: spec.tier_name_source,
            value: &spec.tier_name,
            label: &spec.tier_name_label,
            annotation: &spec.tier_name_annotation,
            expression: &spec.tier_name_expression,
            fallback: DEFAULT_TIER_NAME,
        };
        match selector.source {
            Some(NameSource::Auto) => self.owner_name(),
            None => DEFAULT_TIER_NAME.to_string(),
            Some(_) => self.select(&selector),
        }
    }

    fn select(&self, selector: &NameSelector<'_>) -> String {
        let workload = self.workload;
        let found = match selector.source {
            Some(NameSource::Manual) => Some(selector.value.to_string()),
            Some(NameSource::Label) => workload.label(selector.label).map(str::to_string),
            Some(NameSource::Annotation) => {
                workload.annotation(selector.annotation).map(str::to_string)
            }
            Some(NameSource::Namespace) => Some(workload.namespace().to_string()),
            Some(NameSource::NamespaceLabel) => {
                return self.from_namespace(selector, |ns| ns.labels.get(selector.label).cloned());
            }
            Some(NameSource::NamespaceAnnotation) => {
                return self
                    .from_namespace(selector, |ns| ns.annotations.get(selector.annotation).cloned());
            }
            Some(NameSource::Expression) => return self.render(selector),
            Some(NameSource::Auto) | None => None,
        };
        found.unwrap_or_else(|| selector.fallback.to_string())
    }

    /// A namespace read failure yields the namespace name itself.
    fn from_namespace(
        &self,
        selector: &NameSelector<'_>,
        pick: impl Fn(&NamespaceMeta) -> Option<String>,
    ) -> String {
        let name = self.workload.namespace();
        match self.namespaces.namespace(name) {
            Ok(ns) => pick(&ns).unwrap_or_else(|| selector.fallback.to_string()),
            Err(e) => {
                warn!(namespace = %name, error = %e, "Namespace lookup failed, using namespace name");
                name.to_string()
            }
        }
    }

    fn render(&self, selector: &NameSelector<'_>) -> String {
        let name = self.workload.namespace();
        let ns = match self.namespaces.namespace(name) {
            Ok(ns) => ns,
            Err(e) => {
                warn!(namespace = %name, error = %e, "Namespace lookup failed, using namespace name");
                return name.to_string();
            }
        };
        let ctx = ExpressionContext {
            labels: &self.workload.metadata.labels,
            annotations: &self.workload.metadata.annotations,
            namespace_labels: &ns.labels,
            namespace_annotations: &ns.annotations,
            namespace: name,
        };
        let env = minijinja::Environment::new();
        match env.render_str(&normalize_expression(selector.expression), &ctx) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(expression = %selector.expression, error = %e, "Name expression failed to render");
                selector.fallback.to_string()
            }
        }
    }

    /// Tier from the first owner reference.
    ///
    /// ReplicaSet and ReplicationController names lose their trailing hash
    /// segment; a pod without owners uses its own name.
    fn owner_name(&self) -> String {
        let Some(owner) = self.workload.metadata.owner_references.first() else {
            return self.workload.name().to_string();
        };
        match owner.kind.as_str() {
            "ReplicaSet" | "ReplicationController" => owner
                .name
                .rsplit_once('-')
                .map(|(prefix, _)| prefix.to_string())
                .unwrap_or_default(),
            _ => owner.name.clone(),
        }
    }
}

/// Accept dotted field access (`{{ .Labels.app }}`) as written for Go-style
/// templates.
fn normalize_expression(expression: &str) -> String {
    expression.replace("{{ .", "{{ ").replace("{{.", "{{ ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use injector_core::OwnerReference;

    fn workload() -> Workload {
        let mut w = Workload::default();
        w.metadata.name = "checkout-7d9f8c6b5-".into();
        w.metadata.namespace = "payments".into();
        w.metadata.labels.insert("app".into(), "checkout".into());
        w.metadata.annotations.insert("team".into(), "core".into());
        w.metadata.owner_references.push(OwnerReference {
            api_version: "apps/v1".into(),
            kind: "ReplicaSet".into(),
            name: "checkout-7d9f8c6b5".into(),
        });
        w
    }

    fn namespaces() -> StaticNamespaces {
        let mut ns = StaticNamespaces::new();
        ns.insert(NamespaceMeta {
            name: "payments".into(),
            labels: [("appName".to_string(), "Payments".to_string())].into(),
            annotations: [("owner".to_string(), "fin".to_string())].into(),
        });
        ns
    }

    fn spec(source: NameSource) -> InjectionSpec {
        InjectionSpec {
            application_name_source: Some(source),
            application_name: "manual-app".into(),
            application_name_label: "app".into(),
            application_name_annotation: "team".into(),
            tier_name_source: Some(source),
            tier_name_label: "appName".into(),
            ..Default::default()
        }
    }

    #[test]
    fn direct_sources() {
        let w = workload();
        let ns = namespaces();
        let names = NameResolver::new(&w, &ns);
        assert_eq!(names.application_name(&spec(NameSource::Manual)), "manual-app");
        assert_eq!(names.application_name(&spec(NameSource::Label)), "checkout");
        assert_eq!(names.application_name(&spec(NameSource::Annotation)), "core");
        assert_eq!(names.application_name(&spec(NameSource::Namespace)), "payments");
        assert_eq!(names.application_name(&spec(NameSource::Auto)), DEFAULT_APP_NAME);
    }

    #[test]
    fn missing_label_falls_back_to_default() {
        let w = workload();
        let ns = namespaces();
        let names = NameResolver::new(&w, &ns);
        let mut s = spec(NameSource::Label);
        s.application_name_label = "missing".into();
        s.tier_name_label = "missing".into();
        assert_eq!(names.application_name(&s), DEFAULT_APP_NAME);
        assert_eq!(names.tier_name(&s), DEFAULT_TIER_NAME);
    }

    #[test]
    fn namespace_metadata_and_read_failure() {
        let mut w = workload();
        let ns = namespaces();
        let s = InjectionSpec {
            application_name_source: Some(NameSource::NamespaceLabel),
            application_name_label: "appName".into(),
            ..Default::default()
        };
        assert_eq!(NameResolver::new(&w, &ns).application_name(&s), "Payments");

        w.metadata.namespace = "unknown".into();
        assert_eq!(NameResolver::new(&w, &ns).application_name(&s), "unknown");
    }

    #[test]
    fn expression_renders_with_go_style_fields() {
        let w = workload();
        let ns = namespaces();
        let s = InjectionSpec {
            application_name_source: Some(NameSource::Expression),
            application_name_expression: "{{.NamespaceLabels.appName}}-{{ .Labels.app }}".into(),
            ..Default::default()
        };
        assert_eq!(NameResolver::new(&w, &ns).application_name(&s), "Payments-checkout");
    }

    #[test]
    fn broken_expression_falls_back() {
        let w = workload();
        let ns = namespaces();
        let s = InjectionSpec {
            application_name_source: Some(NameSource::Expression),
            application_name_expression: "{{ Labels.app ".into(),
            ..Default::default()
        };
        assert_eq!(NameResolver::new(&w, &ns).application_name(&s), DEFAULT_APP_NAME);
    }

    #[test]
    fn auto_tier_from_owner() {
        let mut w = workload();
        let ns = namespaces();
        let s = spec(NameSource::Auto);
        assert_eq!(NameResolver::new(&w, &ns).tier_name(&s), "checkout");

        w.metadata.owner_references[0].kind = "StatefulSet".into();
        w.metadata.owner_references[0].name = "ledger".into();
        assert_eq!(NameResolver::new(&w, &ns).tier_name(&s), "ledger");

        w.metadata.owner_references[0].kind = "ReplicaSet".into();
        assert_eq!(NameResolver::new(&w, &ns).tier_name(&s), "");

        w.metadata.owner_references.clear();
        assert_eq!(NameResolver::new(&w, &ns).tier_name(&s), "checkout-7d9f8c6b5-");
    }

    #[test]
    fn namespaces_from_yaml() {
        let ns = StaticNamespaces::from_yaml(
            "- name: edge\n  labels:\n    tier: gateway\n- name: payments\n",
        )
        .unwrap();
        assert_eq!(ns.len(), 2);
        assert_eq!(ns.namespace("edge").unwrap().labels["tier"], "gateway");
        assert!(matches!(
            ns.namespace("nope"),
            Err(SynthError::NamespaceNotFound(_))
        ));
    }
}
