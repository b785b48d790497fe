//! OpenTelemetry web server module for Apache httpd and nginx.
//!
//! The server's own configuration directory is copied by a clone of the
//! application container into a scratch volume, the agent init container
//! patches the copy to load the module, and the application container mounts
//! the patched copy in place of the original. Original mounts over the
//! configuration directory are removed.

use std::fmt;

use injector_core::{EnvVar, Volume, VolumeMount};

use super::BuildContext;
use crate::collector::OTLP_GRPC_PORT;
use crate::env::{self, argv};
use crate::error::Result;
use crate::patch_list::PatchList;

const AGENT_DIR: &str = "/opt/opentelemetry-webserver/agent";
const SOURCE_CONF_DIR: &str = "/opt/opentelemetry-webserver/source-conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebServer {
    Apache,
    Nginx,
}

impl fmt::Display for WebServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebServer::Apache => write!(f, "apache"),
            WebServer::Nginx => write!(f, "nginx"),
        }
    }
}

impl WebServer {
    /// Where the server reads its configuration.
    fn conf_dir(&self) -> &'static str {
        match self {
            WebServer::Apache => "/usr/local/apache2/conf",
            WebServer::Nginx => "/etc/nginx",
        }
    }

    fn conf_volume(&self) -> String {
        format!("{}-conf-dir", self)
    }

    fn agent_volume(&self) -> String {
        format!("otel-agent-repo-{}", self)
    }

    /// Script run by the application-container clone.
    fn copy_script(&self) -> String {
        match self {
            WebServer::Apache => ["cp -r /usr/local/apache2/conf/* ", SOURCE_CONF_DIR].concat(),
            WebServer::Nginx => [
                "cp -r /etc/nginx/* ",
                SOURCE_CONF_DIR,
                " && export NGINX_VERSION=$( { nginx -v ; } 2>&1 ) && echo ${NGINX_VERSION##*/} > ",
                SOURCE_CONF_DIR,
                "/version.txt",
            ]
            .concat(),
        }
    }

    /// Script run by the agent init container.
    fn attach_script(&self) -> String {
        let log_config = [
            "export agentLogDir=$(echo \"",
            AGENT_DIR,
            "/logs\" | sed 's,/,\\\\/,g') && cat ",
            AGENT_DIR,
            "/conf/appdynamics_sdk_log4cxx.xml.template | sed 's/__agent_log_dir__/'${agentLogDir}'/g'  > ",
            AGENT_DIR,
            "/conf/appdynamics_sdk_log4cxx.xml &&",
        ]
        .concat();
        match self {
            WebServer::Apache => [
                "cp -ar /opt/opentelemetry/* ",
                AGENT_DIR,
                " && ",
                &log_config,
                "echo \"$OPENTELEMETRY_MODULE_CONF\" > ",
                SOURCE_CONF_DIR,
                "/opentelemetry_module.conf && cat ",
                SOURCE_CONF_DIR,
                "/opentelemetry_module.conf && echo 'Include /usr/local/apache2/conf/opentelemetry_module.conf' >> ",
                SOURCE_CONF_DIR,
                "/httpd.conf",
            ]
            .concat(),
            WebServer::Nginx => [
                "cp -ar /opt/opentelemetry/* ",
                AGENT_DIR,
                " && export NGINX_VERSION=`cat ",
                SOURCE_CONF_DIR,
                "/version.txt` && ",
                &log_config,
                "echo \"$OPENTELEMETRY_MODULE_CONF\" > ",
                SOURCE_CONF_DIR,
                "/opentelemetry_agent.conf && sed -i \"1s,^,load_module ",
                AGENT_DIR,
                "/WebServerModule/Nginx/${NGINX_VERSION}/ngx_http_opentelemetry_module.so;\\n,g\" ",
                SOURCE_CONF_DIR,
                "/nginx.conf && sed -i \"1s,^,env OTEL_RESOURCE_ATTRIBUTES;\\n,g\" ",
                SOURCE_CONF_DIR,
                "/nginx.conf && mv ",
                SOURCE_CONF_DIR,
                "/opentelemetry_agent.conf ",
                SOURCE_CONF_DIR,
                "/conf.d",
            ]
            .concat(),
        }
    }

    /// Module configuration handed to the attach script.
    fn module_config(&self, endpoint: &str, service: &str, namespace: &str, instance: &str) -> String {
        match self {
            WebServer::Nginx => format!(
                "
NginxModuleEnabled ON;
NginxModuleOtelSpanExporter otlp;
NginxModuleOtelExporterEndpoint {endpoint};
NginxModuleServiceName {service};
NginxModuleServiceNamespace {namespace};
NginxModuleServiceInstanceId {instance};
NginxModuleResolveBackends ON;
NginxModuleTraceAsError ON;
NginxModuleSegmentType FIRST;
NginxModuleSegmentParameter 3;
"
            ),
            WebServer::Apache => format!(
                "
LoadFile {agent}/sdk_lib/lib/libopentelemetry_common.so
LoadFile {agent}/sdk_lib/lib/libopentelemetry_resources.so
LoadFile {agent}/sdk_lib/lib/libopentelemetry_trace.so
LoadFile {agent}/sdk_lib/lib/libopentelemetry_otlp_recordable.so
LoadFile {agent}/sdk_lib/lib/libopentelemetry_exporter_ostream_span.so
LoadFile {agent}/sdk_lib/lib/libopentelemetry_exporter_otlp_grpc.so
LoadFile {agent}/sdk_lib/lib/libopentelemetry_webserver_sdk.so
LoadModule otel_apache_module {agent}/WebServerModule/Apache/libmod_apache_otel.so
ApacheModuleEnabled ON
ApacheModuleOtelSpanExporter otlp
ApacheModuleOtelExporterEndpoint {endpoint}
ApacheModuleServiceName {service}
ApacheModuleServiceNamespace {namespace}
ApacheModuleServiceInstanceId {instance}
ApacheModuleResolveBackends ON
ApacheModuleTraceAsError ON
",
                agent = AGENT_DIR
            ),
        }
    }
}

pub(super) fn build(server: WebServer, ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    let spec = ctx.spec;

    if server == WebServer::Nginx {
        list.env("LD_LIBRARY_PATH", format!("{}/sdk_lib/lib", AGENT_DIR))?;
        if ctx.inject_k8s_attributes() {
            env::k8s_resource_attributes(list, ctx.container, "OTEL_RESOURCE_ATTRIBUTES")?;
        }
    }
    env::spec_env(list, spec)?;

    let conf_volume = server.conf_volume();
    let agent_volume = server.agent_volume();
    list.volume_mount(&VolumeMount::new(conf_volume.as_str(), server.conf_dir()))?;
    list.volume_mount(&VolumeMount::new(agent_volume.as_str(), AGENT_DIR))?;

    // The clone keeps the original mounts so it can read the shipped config.
    let mut copy = ctx.container.clone();
    copy.name = format!("{}-source-copy", server);
    copy.resources = env::init_resources(spec);
    copy.volume_mounts
        .push(VolumeMount::new(conf_volume.as_str(), SOURCE_CONF_DIR));
    copy.command = argv(&["/bin/sh", "-c"]);
    copy.args = vec![server.copy_script()];
    list.init_container(&copy)?;

    // Descending so earlier removals do not shift later indices.
    let shadowed: Vec<usize> = ctx
        .container
        .volume_mounts
        .iter()
        .enumerate()
        .filter(|(_, m)| m.mount_path.contains(server.conf_dir()))
        .map(|(idx, _)| idx)
        .collect();
    for idx in shadowed.into_iter().rev() {
        list.remove_volume_mount(idx);
    }

    let endpoint = ctx
        .collector
        .as_ref()
        .map(|c| c.endpoint.url(OTLP_GRPC_PORT))
        .unwrap_or_default();
    let instance = format!(
        "{}{}a",
        ctx.workload.metadata.name, ctx.workload.metadata.generate_name
    );
    let module_config = server.module_config(
        &endpoint,
        &ctx.tier_name,
        &ctx.application_name,
        &instance,
    );
    let mut attach = env::agent_init_container(
        &format!("otel-agent-attach-{}", server),
        spec,
        &VolumeMount::new(conf_volume.as_str(), SOURCE_CONF_DIR),
        argv(&["/bin/sh", "-c"]),
        vec![server.attach_script()],
    );
    attach
        .volume_mounts
        .push(VolumeMount::new(agent_volume.as_str(), AGENT_DIR));
    attach.env = vec![EnvVar::literal("OPENTELEMETRY_MODULE_CONF", module_config)];
    list.init_container(&attach)?;

    list.volume(&Volume::empty_dir(agent_volume))?;
    list.volume(&Volume::empty_dir(conf_volume))?;

    ctx.sidecar(list);
    Ok(())
}
