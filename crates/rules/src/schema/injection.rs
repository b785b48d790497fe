//! Injection spec: how a matched workload gets instrumented.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::OptionalBool;

/// Where an application or tier name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameSource {
    Manual,
    Label,
    Annotation,
    Namespace,
    NamespaceLabel,
    NamespaceAnnotation,
    Expression,
    /// Owner workload name (tier only).
    Auto,
}

impl fmt::Display for NameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NameSource::Manual => "manual",
            NameSource::Label => "label",
            NameSource::Annotation => "annotation",
            NameSource::Namespace => "namespace",
            NameSource::NamespaceLabel => "namespaceLabel",
            NameSource::NamespaceAnnotation => "namespaceAnnotation",
            NameSource::Expression => "expression",
            NameSource::Auto => "auto",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// CPU and memory requested for the agent init container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReservation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpu: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory: String,
}

/// Raw or resolved injection spec.
///
/// Empty strings and [`OptionalBool::Unset`] mean "not set" and are filled
/// from the referenced template, then from defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub technology: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub java_env_var: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub java_custom_config: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name_source: Option<NameSource>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application_name_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application_name_annotation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application_name_expression: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_name_source: Option<NameSource>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tier_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tier_name_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tier_name_annotation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tier_name_expression: String,

    #[serde(default, skip_serializing_if = "OptionalBool::is_unset")]
    pub use_pod_name_for_node_name: OptionalBool,
    #[serde(default, skip_serializing_if = "OptionalBool::is_unset")]
    pub do_not_instrument: OptionalBool,
    #[serde(
        rename = "injectK8SOtelResourceAttrs",
        default,
        skip_serializing_if = "OptionalBool::is_unset"
    )]
    pub inject_k8s_otel_resource_attrs: OptionalBool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_reservation: Option<ResourceReservation>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub netviz_port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub open_telemetry_collector: String,

    /// Extra env vars for the instrumented container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<NameValue>,
    /// Vendor agent options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<NameValue>,
}

impl InjectionSpec {
    pub fn reservation(&self) -> ResourceReservation {
        self.resource_reservation.clone().unwrap_or_default()
    }

    pub fn skipped(&self) -> bool {
        self.do_not_instrument.resolve(false)
    }
}
