//! Env and staging helpers shared by the vendor builders.
//!
//! Every helper appends to a [`PatchList`] aimed at the primary container, so
//! a builder reads as the ordered list of steps it performs.

use injector_core::{Container, EnvVar, ResourceRequirements, Volume, VolumeMount};
use injector_rules::schema::{ControllerConfig, InjectionSpec};

use crate::error::Result;
use crate::patch_list::PatchList;

/// Limits applied to every agent staging init container.
pub const INIT_LIMIT_CPU: &str = "200m";
pub const INIT_LIMIT_MEMORY: &str = "75M";

/// Controller address and credentials.
///
/// A configured access-key secret wins over the literal key.
pub fn controller(list: &mut PatchList, controller: &ControllerConfig) -> Result<()> {
    if !controller.access_key_secret.is_empty() {
        list.env_var(&EnvVar::secret_ref(
            "APPDYNAMICS_AGENT_ACCOUNT_ACCESS_KEY",
            controller.access_key_secret.as_str(),
            controller.access_key_secret_key.as_str(),
        ))?;
    } else {
        list.env("APPDYNAMICS_AGENT_ACCOUNT_ACCESS_KEY", controller.access_key.as_str())?;
    }
    list.env("APPDYNAMICS_CONTROLLER_HOST_NAME", controller.host.as_str())?;
    list.env("APPDYNAMICS_CONTROLLER_PORT", controller.port.as_str())?;
    list.env(
        "APPDYNAMICS_CONTROLLER_SSL_ENABLED",
        controller.is_secure.to_string(),
    )?;
    list.env("APPDYNAMICS_AGENT_ACCOUNT_NAME", controller.account_name.as_str())
}

/// Network visibility agent reached on the node IP.
pub fn netviz(list: &mut PatchList, spec: &InjectionSpec) -> Result<()> {
    list.env_var(&EnvVar::field_ref_versioned(
        "APPDYNAMICS_NETVIZ_AGENT_HOST",
        "v1",
        "status.hostIP",
    ))?;
    list.env("APPDYNAMICS_NETVIZ_AGENT_PORT", spec.netviz_port.as_str())
}

/// Agent node name taken from the pod name.
pub fn node_name(list: &mut PatchList) -> Result<()> {
    list.env_var(&EnvVar::field_ref_versioned(
        "APPDYNAMICS_AGENT_NODE_NAME",
        "v1",
        "metadata.name",
    ))
}

/// Proxy env, only when the controller is reached through a proxy.
pub fn proxy(list: &mut PatchList, controller: &ControllerConfig) -> Result<()> {
    if !controller.use_proxy {
        return Ok(());
    }
    list.env("APPDYNAMICS_PROXY_HOST_NAME", controller.proxy_host.as_str())?;
    list.env("APPDYNAMICS_PROXY_PORT", controller.proxy_port.as_str())?;
    if !controller.proxy_user.is_empty() {
        list.env("APPDYNAMICS_PROXY_AUTH_NAME", controller.proxy_user.as_str())?;
        list.env("APPDYNAMICS_PROXY_AUTH_PASSWORD", controller.proxy_password.as_str())?;
    }
    if !controller.proxy_domain.is_empty() {
        list.env("APPDYNAMICS_PROXY_AUTH_DOMAIN", controller.proxy_domain.as_str())?;
    }
    Ok(())
}

/// Proxy system properties for Java agents, each followed by a space.
pub fn java_proxy_options(controller: &ControllerConfig) -> String {
    if !controller.use_proxy {
        return String::new();
    }
    format!(
        "-Dappdynamics.http.proxyHost={} -Dappdynamics.http.proxyPort={} ",
        controller.proxy_host, controller.proxy_port
    )
}

/// Vendor options rendered as `-D<name>=<value> ` system properties.
pub fn java_system_properties(spec: &InjectionSpec) -> String {
    spec.options
        .iter()
        .map(|o| format!("-D{}={} ", o.name, o.value))
        .collect()
}

/// Downward-API pod identity plus an attribute string in `var_name`.
///
/// A value the container already sets for `var_name` is kept in front.
pub fn k8s_resource_attributes(
    list: &mut PatchList,
    container: &Container,
    var_name: &str,
) -> Result<()> {
    k8s_resource_attributes_with(list, container, var_name, "")
}

/// Like [`k8s_resource_attributes`], with `leading` attributes placed
/// between the container's preset value and the pod identity.
pub fn k8s_resource_attributes_with(
    list: &mut PatchList,
    container: &Container,
    var_name: &str,
    leading: &str,
) -> Result<()> {
    list.env_var(&EnvVar::field_ref("K8S_POD_IP", "status.podIP"))?;
    list.env_var(&EnvVar::field_ref("K8S_POD_NAME", "metadata.name"))?;
    list.env_var(&EnvVar::field_ref("K8S_NAMESPACE_NAME", "metadata.namespace"))?;

    let identity = format!(
        "k8s.pod.ip=$(K8S_POD_IP),k8s.pod.name=$(K8S_POD_NAME),k8s.namespace.name=$(K8S_NAMESPACE_NAME),k8s.container.name={},k8s.container.restart_count=0",
        container.name
    );
    let preset = container.env_value(var_name).unwrap_or_default();
    let attributes = [preset, leading, identity.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    list.env(var_name, attributes)
}

/// Extra env vars listed on the spec, in order.
pub fn spec_env(list: &mut PatchList, spec: &InjectionSpec) -> Result<()> {
    for var in &spec.env {
        list.env(&var.name, var.value.as_str())?;
    }
    Ok(())
}

/// Agents derive node names from the tier unless the pod name is used.
pub fn reuse_node_names(spec: &InjectionSpec) -> bool {
    !spec.use_pod_name_for_node_name.resolve(false)
}

/// Application, tier and node-name-prefix env common to appd agents.
pub fn appd_naming(list: &mut PatchList, app: &str, tier: &str, reuse: bool) -> Result<()> {
    list.env("APPDYNAMICS_AGENT_APPLICATION_NAME", app)?;
    list.env("APPDYNAMICS_AGENT_TIER_NAME", tier)?;
    if reuse {
        list.env("APPDYNAMICS_AGENT_REUSE_NODE_NAME_PREFIX", tier)?;
    }
    Ok(())
}

/// Init container resources: fixed limits, requests from the reservation.
pub fn init_resources(spec: &InjectionSpec) -> ResourceRequirements {
    let reservation = spec.reservation();
    ResourceRequirements::new(
        INIT_LIMIT_CPU,
        INIT_LIMIT_MEMORY,
        &reservation.cpu,
        &reservation.memory,
    )
}

/// An init container that copies the agent payload out of `spec.image`.
pub fn agent_init_container(
    name: &str,
    spec: &InjectionSpec,
    mount: &VolumeMount,
    command: Vec<String>,
    args: Vec<String>,
) -> Container {
    Container {
        name: name.to_string(),
        image: spec.image.clone(),
        command,
        args,
        image_pull_policy: "Always".to_string(),
        resources: init_resources(spec),
        volume_mounts: vec![mount.clone()],
        ..Default::default()
    }
}

/// Mount, init container, then the emptyDir volume behind the mount.
pub fn stage_agent(list: &mut PatchList, mount: &VolumeMount, init: &Container) -> Result<()> {
    list.volume_mount(mount)?;
    list.init_container(init)?;
    list.volume(&Volume::empty_dir(mount.name.as_str()))
}

/// Argument vector from string literals.
pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use injector_rules::schema::{NameValue, OptionalBool, ResourceReservation};
    use serde_json::json;

    fn values(list: PatchList) -> Vec<serde_json::Value> {
        list.into_vec().into_iter().filter_map(|op| op.value).collect()
    }

    #[test]
    fn controller_prefers_secret_reference() {
        let config = ControllerConfig {
            host: "ctl.example.com".into(),
            port: "443".into(),
            is_secure: true,
            account_name: "acme".into(),
            access_key: "plain".into(),
            access_key_secret: "appd-secret".into(),
            access_key_secret_key: "access-key".into(),
            ..Default::default()
        };
        let mut list = PatchList::new();
        controller(&mut list, &config).unwrap();
        let env = values(list);

        assert_eq!(env.len(), 5);
        assert_eq!(
            env[0]["valueFrom"]["secretKeyRef"],
            json!({"name": "appd-secret", "key": "access-key"})
        );
        assert_eq!(env[3], json!({"name": "APPDYNAMICS_CONTROLLER_SSL_ENABLED", "value": "true"}));
    }

    #[test]
    fn proxy_auth_fields_are_optional() {
        let mut config = ControllerConfig {
            use_proxy: true,
            proxy_host: "proxy".into(),
            proxy_port: "3128".into(),
            ..Default::default()
        };
        let mut list = PatchList::new();
        proxy(&mut list, &config).unwrap();
        assert_eq!(list.len(), 2);

        config.proxy_user = "u".into();
        config.proxy_password = "p".into();
        config.proxy_domain = "corp".into();
        let mut list = PatchList::new();
        proxy(&mut list, &config).unwrap();
        assert_eq!(list.len(), 5);

        config.use_proxy = false;
        let mut list = PatchList::new();
        proxy(&mut list, &config).unwrap();
        assert!(list.is_empty());
        assert_eq!(java_proxy_options(&config), "");
    }

    #[test]
    fn k8s_attributes_keep_preset_value_first() {
        let container = Container {
            name: "app".into(),
            env: vec![EnvVar::literal("OTEL_RESOURCE_ATTRIBUTES", "team=payments")],
            ..Default::default()
        };
        let mut list = PatchList::new();
        k8s_resource_attributes(&mut list, &container, "OTEL_RESOURCE_ATTRIBUTES").unwrap();
        let env = values(list);

        assert_eq!(env.len(), 4);
        assert_eq!(
            env[0],
            json!({"name": "K8S_POD_IP", "valueFrom": {"fieldRef": {"fieldPath": "status.podIP"}}})
        );
        assert_eq!(
            env[3]["value"],
            "team=payments,k8s.pod.ip=$(K8S_POD_IP),k8s.pod.name=$(K8S_POD_NAME),k8s.namespace.name=$(K8S_NAMESPACE_NAME),k8s.container.name=app,k8s.container.restart_count=0"
        );
    }

    #[test]
    fn k8s_attributes_after_leading_attributes() {
        let container = Container {
            name: "app".into(),
            ..Default::default()
        };
        let mut list = PatchList::new();
        k8s_resource_attributes_with(
            &mut list,
            &container,
            "OTEL_RESOURCE_ATTRIBUTES",
            "service.name=checkout",
        )
        .unwrap();
        let env = values(list);
        assert!(env[3]["value"]
            .as_str()
            .unwrap()
            .starts_with("service.name=checkout,k8s.pod.ip=$(K8S_POD_IP),"));
    }

    #[test]
    fn staging_emits_mount_init_volume() {
        let spec = InjectionSpec {
            image: "agent:1".into(),
            resource_reservation: Some(ResourceReservation {
                cpu: "100m".into(),
                memory: "50M".into(),
            }),
            ..Default::default()
        };
        let mount = VolumeMount::new("appd-agent-repo-nodejs", "/opt/appdynamics-nodejs");
        let init = agent_init_container(
            "appd-agent-attach-nodejs",
            &spec,
            &mount,
            argv(&["cp", "-r", "/opt/appdynamics/.", "/opt/appdynamics-nodejs"]),
            Vec::new(),
        );
        let mut list = PatchList::new();
        stage_agent(&mut list, &mount, &init).unwrap();
        let ops = list.into_vec();

        assert_eq!(ops[1].path, "/spec/initContainers/-");
        let init = ops[1].value.as_ref().unwrap();
        assert_eq!(init["imagePullPolicy"], "Always");
        assert_eq!(init["resources"]["limits"], json!({"cpu": "200m", "memory": "75M"}));
        assert_eq!(init["resources"]["requests"], json!({"cpu": "100m", "memory": "50M"}));
        assert_eq!(ops[2].value, Some(json!({"name": "appd-agent-repo-nodejs", "emptyDir": {}})));
    }

    #[test]
    fn options_become_system_properties() {
        let spec = InjectionSpec {
            options: vec![NameValue::new("a", "1"), NameValue::new("b.c", "x")],
            use_pod_name_for_node_name: OptionalBool::Set(true),
            ..Default::default()
        };
        assert_eq!(java_system_properties(&spec), "-Da=1 -Db.c=x ");
        assert!(!reuse_node_names(&spec));
    }
}
