//! Object envelope for lightweight first-pass deserialization.

use serde::{Deserialize, Serialize};

use super::{ClusterObject, ObjectKind, ObjectMetadata};

/// First-pass deserializer that reads only the header fields.
///
/// Used during two-pass loading: first extract `kind` to pick the concrete
/// object type, then deserialize the full document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEnvelope {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMetadata,
    /// Remaining fields captured as raw YAML for second-pass deserialization.
    #[serde(flatten)]
    pub rest: serde_yaml::Value,
}

impl ObjectEnvelope {
    /// Parse the `kind` field into a typed [`ObjectKind`].
    pub fn object_kind(&self) -> std::result::Result<ObjectKind, String> {
        self.kind.parse()
    }

    /// Two-pass: reconstruct the full YAML and deserialize into the concrete type.
    pub fn parse_full(&self) -> std::result::Result<ClusterObject, String> {
        let kind = self.object_kind()?;
        let yaml = serde_yaml::to_string(self).map_err(|e| e.to_string())?;
        match kind {
            ObjectKind::ConfigMap => {
                let map: super::ConfigMapObject =
                    serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;
                Ok(ClusterObject::ConfigMap(map))
            }
            ObjectKind::Instrumentation => {
                let rule: super::RuleObject =
                    serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;
                Ok(ClusterObject::Instrumentation(rule))
            }
            ObjectKind::ClusterInstrumentation => {
                let rule: super::RuleObject =
                    serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;
                Ok(ClusterObject::ClusterInstrumentation(rule))
            }
            ObjectKind::OpenTelemetryCollector => {
                let collector: super::CollectorObject =
                    serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;
                Ok(ClusterObject::Collector(collector))
            }
        }
    }
}
