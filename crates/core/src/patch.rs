//! JSON-Patch-like operations returned to the admission transport.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOp::Add => write!(f, "add"),
            PatchOp::Remove => write!(f, "remove"),
        }
    }
}

/// One `{op, path, value}` instruction.
///
/// A trailing `-` path segment appends to an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    /// Serialize `value` and wrap it in an `add` operation.
    pub fn add_serialized<T: Serialize>(path: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Self::add(path, serde_json::to_value(value)?))
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }

    /// Name of the env var this operation appends, when it is an env append.
    pub fn appended_env_name(&self) -> Option<&str> {
        if self.op != PatchOp::Add || !self.path.ends_with("/env/-") {
            return None;
        }
        self.value.as_ref()?.get("name")?.as_str()
    }
}

/// Path appending to the env list of container `idx`.
pub fn container_env_path(idx: usize) -> String {
    format!("/spec/containers/{}/env/-", idx)
}

/// Path appending to the volume-mount list of container `idx`.
pub fn container_volume_mount_path(idx: usize) -> String {
    format!("/spec/containers/{}/volumeMounts/-", idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remove_has_no_value_on_the_wire() {
        let op = PatchOperation::remove("/spec/containers/0/volumeMounts/2");
        let wire = serde_json::to_value(&op).unwrap();
        assert_eq!(wire, json!({"op": "remove", "path": "/spec/containers/0/volumeMounts/2"}));
    }

    #[test]
    fn appended_env_name_only_for_env_appends() {
        let env = PatchOperation::add(container_env_path(0), json!({"name": "A", "value": "1"}));
        assert_eq!(env.appended_env_name(), Some("A"));

        let mount = PatchOperation::add(container_volume_mount_path(0), json!({"name": "A"}));
        assert_eq!(mount.appended_env_name(), None);

        let init = PatchOperation::add("/spec/containers/0/env", json!([]));
        assert_eq!(init.appended_env_name(), None);
    }
}
