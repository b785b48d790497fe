//! Collector binder: resolves a collector reference to an endpoint and,
//! for sidecar collectors, the patches that run it inside the pod.

use injector_core::{
    Container, ContainerPort, EnvVar, PatchOperation, ResourceRequirements, Volume, VolumeMount,
    Workload,
};
use injector_rules::loader::DEFAULT_SIDECAR_INIT_IMAGE;
use injector_rules::schema::{CollectorBinding, CollectorMode, CollectorSpec};
use injector_rules::RegistryState;
use tracing::debug;

use crate::error::{Result, SynthError};
use crate::patch_list::PatchList;

pub const DEFAULT_COLLECTOR_IMAGE: &str = "otel/opentelemetry-collector-contrib:latest";

const CONFIG_VOLUME: &str = "otel-collector-config-vol";
const CONFIG_MOUNT_PATH: &str = "/conf";
const CONFIG_WRITE_SCRIPT: &str = "echo \"$OTEL_COLL_CONFIG\" > /conf/otel-collector-config.yaml";

/// OTLP gRPC and HTTP ports every collector listens on.
pub const OTLP_GRPC_PORT: u16 = 4317;
pub const OTLP_HTTP_PORT: u16 = 4318;

/// Where an instrumented container sends telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorEndpoint {
    /// Collector runs in the same pod.
    Sidecar,
    /// In-cluster service or external address.
    Service(String),
}

impl CollectorEndpoint {
    pub fn host(&self) -> &str {
        match self {
            CollectorEndpoint::Sidecar => "localhost",
            CollectorEndpoint::Service(address) => address,
        }
    }

    /// `http://<host>:<port>`.
    pub fn url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host(), port)
    }
}

/// A resolved collector reference.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCollector {
    pub name: String,
    pub endpoint: CollectorEndpoint,
    /// Sidecar container, config init container and volumes. Empty unless
    /// the endpoint is [`CollectorEndpoint::Sidecar`].
    pub sidecar: Vec<PatchOperation>,
}

impl BoundCollector {
    pub fn is_sidecar(&self) -> bool {
        self.endpoint == CollectorEndpoint::Sidecar
    }
}

/// Looks collector references up in a registry snapshot.
pub struct CollectorBinder<'a> {
    state: &'a RegistryState,
}

impl<'a> CollectorBinder<'a> {
    pub fn new(state: &'a RegistryState) -> Self {
        Self { state }
    }

    /// Namespace-scoped binding first, then the global one.
    pub fn bind(&self, workload: &Workload, name: &str) -> Result<BoundCollector> {
        let binding = self
            .state
            .collectors
            .lookup(workload.namespace(), name)
            .ok_or_else(|| SynthError::CollectorNotFound(name.to_string()))?;
        debug!(collector = %name, mode = %binding.mode, "Collector bound");

        let (endpoint, sidecar) = match binding.mode {
            CollectorMode::Sidecar => {
                let patches = match &binding.spec {
                    Some(spec) => resource_sidecar(binding, spec)?,
                    None => configured_sidecar(binding)?,
                };
                (CollectorEndpoint::Sidecar, patches)
            }
            CollectorMode::Deployment | CollectorMode::External => (
                CollectorEndpoint::Service(binding.service_name.clone()),
                Vec::new(),
            ),
        };
        Ok(BoundCollector {
            name: name.to_string(),
            endpoint,
            sidecar,
        })
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn otlp_ports() -> Vec<ContainerPort> {
    vec![
        ContainerPort {
            name: "otlp-grpc".to_string(),
            container_port: OTLP_GRPC_PORT,
        },
        ContainerPort {
            name: "otlp-http".to_string(),
            container_port: OTLP_HTTP_PORT,
        },
    ]
}

fn config_mount() -> VolumeMount {
    VolumeMount::new(CONFIG_VOLUME, CONFIG_MOUNT_PATH)
}

/// Init container writing the collector configuration to the shared volume.
fn config_init(image: &str, config: &str, resources: ResourceRequirements) -> Container {
    Container {
        name: "otel-coll-sidecar-init".to_string(),
        image: or_default(image, DEFAULT_SIDECAR_INIT_IMAGE),
        command: vec!["/bin/sh".to_string(), "-c".to_string()],
        args: vec![CONFIG_WRITE_SCRIPT.to_string()],
        image_pull_policy: "IfNotPresent".to_string(),
        resources,
        volume_mounts: vec![config_mount()],
        env: vec![EnvVar::literal("OTEL_COLL_CONFIG", config)],
        ..Default::default()
    }
}

fn collector_container(image: &str, pull_policy: &str) -> Container {
    Container {
        name: "otel-coll-sidecar".to_string(),
        image: or_default(image, DEFAULT_COLLECTOR_IMAGE),
        args: vec![
            "--config".to_string(),
            "/conf/otel-collector-config.yaml".to_string(),
        ],
        image_pull_policy: pull_policy.to_string(),
        ports: otlp_ports(),
        ..Default::default()
    }
}

/// Sidecar for a ConfigMap-sourced binding.
fn configured_sidecar(binding: &CollectorBinding) -> Result<Vec<PatchOperation>> {
    let mut container = collector_container(&binding.image, &binding.image_pull_policy);
    container.resources = ResourceRequirements::new("1", "1Gi", "200m", "200Mi");
    container.volume_mounts = vec![config_mount()];

    let init = config_init(
        &binding.init_image,
        &binding.config,
        ResourceRequirements::new("300m", "200Mi", "50m", "100Mi"),
    );

    let mut list = PatchList::new();
    list.container(&container)?;
    list.init_container(&init)?;
    list.volume(&Volume::empty_dir(CONFIG_VOLUME))?;
    Ok(list.into_vec())
}

/// Sidecar for a resource-sourced binding, carrying the resource's
/// resources, env and extra volumes.
fn resource_sidecar(binding: &CollectorBinding, spec: &CollectorSpec) -> Result<Vec<PatchOperation>> {
    let mut container = collector_container(&spec.image, &spec.image_pull_policy);
    container.resources = spec.resources.clone();
    container.volume_mounts = spec.volume_mounts.clone();
    container.volume_mounts.push(config_mount());
    container.env = spec.env.clone();
    container.env_from = spec.env_from.clone();

    let init = config_init(
        &binding.init_image,
        &spec.config,
        ResourceRequirements::new("200m", "75M", "10m", "50M"),
    );

    let mut list = PatchList::new();
    list.container(&container)?;
    list.init_container(&init)?;
    list.volume(&Volume::empty_dir(CONFIG_VOLUME))?;
    for volume in &spec.volumes {
        list.volume(volume)?;
    }
    Ok(list.into_vec())
}
