//! Multi-kind object container and accessors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CollectorSpec, InstrumentationRule, ObjectKind};

/// Name and namespace of an ingested object. Cluster-scoped objects leave
/// `namespace` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// A ConfigMap: string keys to string payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapObject {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMetadata,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// `Instrumentation` / `ClusterInstrumentation` custom resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleObject {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMetadata,
    #[serde(default)]
    pub spec: InstrumentationRule,
}

/// `OpenTelemetryCollector` custom resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorObject {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMetadata,
    #[serde(default)]
    pub spec: CollectorSpec,
}

/// A fully deserialized object of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterObject {
    /// Configuration or collector ConfigMap.
    ConfigMap(ConfigMapObject),
    /// Namespace-scoped rule.
    Instrumentation(RuleObject),
    /// Cluster-scoped rule.
    ClusterInstrumentation(RuleObject),
    /// Collector binding.
    Collector(CollectorObject),
}

impl ClusterObject {
    /// Get the object's metadata regardless of kind.
    pub fn metadata(&self) -> &ObjectMetadata {
        match self {
            ClusterObject::ConfigMap(o) => &o.metadata,
            ClusterObject::Instrumentation(o) => &o.metadata,
            ClusterObject::ClusterInstrumentation(o) => &o.metadata,
            ClusterObject::Collector(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMetadata {
        match self {
            ClusterObject::ConfigMap(o) => &mut o.metadata,
            ClusterObject::Instrumentation(o) => &mut o.metadata,
            ClusterObject::ClusterInstrumentation(o) => &mut o.metadata,
            ClusterObject::Collector(o) => &mut o.metadata,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ClusterObject::ConfigMap(_) => ObjectKind::ConfigMap,
            ClusterObject::Instrumentation(_) => ObjectKind::Instrumentation,
            ClusterObject::ClusterInstrumentation(_) => ObjectKind::ClusterInstrumentation,
            ClusterObject::Collector(_) => ObjectKind::OpenTelemetryCollector,
        }
    }

    pub fn as_config_map(&self) -> Option<&ConfigMapObject> {
        match self {
            ClusterObject::ConfigMap(o) => Some(o),
            _ => None,
        }
    }

    /// Either rule kind.
    pub fn as_rule(&self) -> Option<&RuleObject> {
        match self {
            ClusterObject::Instrumentation(o) | ClusterObject::ClusterInstrumentation(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_collector(&self) -> Option<&CollectorObject> {
        match self {
            ClusterObject::Collector(o) => Some(o),
            _ => None,
        }
    }
}
