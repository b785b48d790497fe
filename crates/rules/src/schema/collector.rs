//! Telemetry collector bindings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use injector_core::{EnvVar, ResourceRequirements, Volume, VolumeMount};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a collector is reached from an instrumented workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorMode {
    /// Injected into the pod next to the application.
    Sidecar,
    /// Standalone in-cluster deployment behind a service.
    Deployment,
    /// Explicitly configured address outside the engine's control.
    External,
}

impl fmt::Display for CollectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorMode::Sidecar => write!(f, "sidecar"),
            CollectorMode::Deployment => write!(f, "deployment"),
            CollectorMode::External => write!(f, "external"),
        }
    }
}

impl FromStr for CollectorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sidecar" => Ok(CollectorMode::Sidecar),
            "deployment" => Ok(CollectorMode::Deployment),
            "external" => Ok(CollectorMode::External),
            other => Err(format!("unknown collector mode: '{}'", other)),
        }
    }
}

/// `OpenTelemetryCollector` resource spec.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_pull_policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CollectorMode>,
    #[serde(default)]
    pub config: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub otlp_endpoint: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub resources: ResourceRequirements,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Value>,
}

/// A registered collector.
///
/// `service_name` holds the in-cluster service address for deployment mode
/// and the explicit endpoint for external mode. `spec` is present only for
/// resource-sourced bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorBinding {
    pub name: String,
    pub mode: CollectorMode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_pull_policy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub init_image: String,
    #[serde(default)]
    pub config: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<CollectorSpec>,
}

impl CollectorBinding {
    pub fn new(name: impl Into<String>, mode: CollectorMode) -> Self {
        Self {
            name: name.into(),
            mode,
            image: String::new(),
            image_pull_policy: String::new(),
            init_image: String::new(),
            config: String::new(),
            service_name: String::new(),
            spec: None,
        }
    }
}
