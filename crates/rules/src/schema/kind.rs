//! Object kind enum for two-pass deserialization dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object kinds the engine ingests from configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    ConfigMap,
    Instrumentation,
    ClusterInstrumentation,
    OpenTelemetryCollector,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::ConfigMap => write!(f, "ConfigMap"),
            ObjectKind::Instrumentation => write!(f, "Instrumentation"),
            ObjectKind::ClusterInstrumentation => write!(f, "ClusterInstrumentation"),
            ObjectKind::OpenTelemetryCollector => write!(f, "OpenTelemetryCollector"),
        }
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ConfigMap" => Ok(ObjectKind::ConfigMap),
            "Instrumentation" => Ok(ObjectKind::Instrumentation),
            "ClusterInstrumentation" => Ok(ObjectKind::ClusterInstrumentation),
            "OpenTelemetryCollector" => Ok(ObjectKind::OpenTelemetryCollector),
            other => Err(format!("unknown object kind: '{}'", other)),
        }
    }
}
