//! Ordered patch accumulator targeting the instrumented container.

use injector_core::{
    container_env_path, container_volume_mount_path, Container, EnvVar, PatchOperation, Volume,
    VolumeMount,
};

use crate::error::Result;

/// Index of the container every builder instruments.
pub const PRIMARY_CONTAINER: usize = 0;

/// Patch operations in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchList {
    ops: Vec<PatchOperation>,
}

impl PatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: PatchOperation) {
        self.ops.push(op);
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = PatchOperation>) {
        self.ops.extend(ops);
    }

    /// Set `/metadata/annotations/<key>`.
    pub fn annotation(&mut self, key: &str, value: &str) {
        self.ops.push(PatchOperation::add(
            format!("/metadata/annotations/{}", key),
            serde_json::Value::String(value.to_string()),
        ));
    }

    /// Append a literal env var to the primary container.
    pub fn env(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.env_var(&EnvVar::literal(name, value))
    }

    pub fn env_var(&mut self, var: &EnvVar) -> Result<()> {
        self.add(container_env_path(PRIMARY_CONTAINER), var)
    }

    pub fn volume_mount(&mut self, mount: &VolumeMount) -> Result<()> {
        self.add(container_volume_mount_path(PRIMARY_CONTAINER), mount)
    }

    pub fn volume(&mut self, volume: &Volume) -> Result<()> {
        self.add("/spec/volumes/-".to_string(), volume)
    }

    pub fn init_container(&mut self, container: &Container) -> Result<()> {
        self.add("/spec/initContainers/-".to_string(), container)
    }

    pub fn container(&mut self, container: &Container) -> Result<()> {
        self.add("/spec/containers/-".to_string(), container)
    }

    /// Remove volume mount `idx` of the primary container.
    pub fn remove_volume_mount(&mut self, idx: usize) {
        self.ops.push(PatchOperation::remove(format!(
            "/spec/containers/{}/volumeMounts/{}",
            PRIMARY_CONTAINER, idx
        )));
    }

    fn add<T: serde::Serialize>(&mut self, path: String, value: &T) -> Result<()> {
        self.ops.push(PatchOperation::add_serialized(path, value)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn as_slice(&self) -> &[PatchOperation] {
        &self.ops
    }

    pub fn into_vec(self) -> Vec<PatchOperation> {
        self.ops
    }
}
