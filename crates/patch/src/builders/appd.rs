//! AppDynamics agents for Java, .NET Core and Node.js.

use injector_core::VolumeMount;

use super::BuildContext;
use crate::collector::{OTLP_GRPC_PORT, OTLP_HTTP_PORT};
use crate::env::{self, argv};
use crate::error::Result;
use crate::patch_list::PatchList;

const JAVA_AGENT_DIR: &str = "/opt/appdynamics-java";
const DOTNET_AGENT_DIR: &str = "/opt/appdynamics-dotnetcore";
const NODEJS_AGENT_DIR: &str = "/opt/appdynamics-nodejs";

const DOTNET_PROFILER_ID: &str = "{57e1aa68-2229-41aa-9931-a6e93bbc64d8}";

pub(super) fn java(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    let spec = ctx.spec;
    let reuse = env::reuse_node_names(spec);

    env::controller(list, ctx.controller)?;
    if ctx.inject_k8s_attributes() {
        env::k8s_resource_attributes(list, ctx.container, "OTEL_RESOURCE_ATTRIBUTES")?;
    }
    list.env(&spec.java_env_var, java_options(ctx, reuse))?;
    if !reuse {
        env::node_name(list)?;
    }
    env::appd_naming(list, &ctx.application_name, &ctx.tier_name, reuse)?;
    env::spec_env(list, spec)?;
    env::netviz(list, spec)?;

    let mount = VolumeMount::new("appd-agent-repo-java", JAVA_AGENT_DIR);
    let mut script = format!("cp -ar /opt/appdynamics/. {}", JAVA_AGENT_DIR);
    if !spec.log_level.is_empty() {
        script.push_str(&format!(
            " && for i in {}/ver*/conf/logging/log4j2.xml; do sed -i 's/level=\"info\"/level=\"{}\"/g' $i ; done",
            JAVA_AGENT_DIR, spec.log_level
        ));
    }
    let init = env::agent_init_container(
        "appd-agent-attach-java",
        spec,
        &mount,
        argv(&["/bin/sh", "-c"]),
        vec![script],
    );
    env::stage_agent(list, &mount, &init)?;

    ctx.sidecar(list);
    Ok(())
}

/// The agent options string, every component followed by a space.
fn java_options(ctx: &BuildContext<'_>, reuse: bool) -> String {
    let spec = ctx.spec;
    let mut opts = String::from(" ");
    opts.push_str(&env::java_proxy_options(ctx.controller));
    opts.push_str("-Dappdynamics.agent.accountAccessKey=$(APPDYNAMICS_AGENT_ACCOUNT_ACCESS_KEY) ");
    if reuse {
        opts.push_str("-Dappdynamics.agent.reuse.nodeName=true ");
    }
    opts.push_str("-Dappdynamics.socket.collection.bci.enable=true ");
    opts.push_str(&format!("-javaagent:{}/javaagent.jar ", JAVA_AGENT_DIR));
    opts.push_str(&spec.java_custom_config);
    opts.push(' ');
    opts.push_str(&env::java_system_properties(spec));

    // Hybrid agent: the AppDynamics agent also exports OTLP traces.
    if let Some(collector) = &ctx.collector {
        let attributes = if ctx.inject_k8s_attributes() {
            ",$(OTEL_RESOURCE_ATTRIBUTES)"
        } else {
            ""
        };
        opts.push_str("-Dappdynamics.opentelemetry.enabled=true ");
        opts.push_str(&format!(
            "-Dotel.resource.attributes=service.name={},service.namespace={}{} ",
            ctx.tier_name, ctx.application_name, attributes
        ));
        opts.push_str("-Dotel.traces.exporter=otlp,logging ");
        opts.push_str(&format!(
            "-Dotel.exporter.otlp.traces.endpoint={} ",
            collector.endpoint.url(OTLP_GRPC_PORT)
        ));
    }
    opts
}

pub(super) fn dotnet_core(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    let spec = ctx.spec;
    let reuse = env::reuse_node_names(spec);

    env::controller(list, ctx.controller)?;
    list.env("LD_LIBRARY_PATH", DOTNET_AGENT_DIR)?;
    list.env("CORECLR_PROFILER", DOTNET_PROFILER_ID)?;
    list.env(
        "CORECLR_PROFILER_PATH",
        format!("{}/libappdprofiler.so", DOTNET_AGENT_DIR),
    )?;
    list.env("CORECLR_ENABLE_PROFILING", "1")?;
    if reuse {
        list.env("APPDYNAMICS_AGENT_REUSE_NODE_NAME", "true")?;
    } else {
        env::node_name(list)?;
    }
    env::proxy(list, ctx.controller)?;

    if let Some(collector) = &ctx.collector {
        list.env("APPDYNAMICS_OPENTELEMETRY_ENABLED", "true")?;
        list.env("OTEL_TRACES_EXPORTER", "otlp")?;
        let mut attributes = "";
        if ctx.inject_k8s_attributes() {
            env::k8s_resource_attributes(list, ctx.container, "OTEL_RESOURCE_ATTRIBUTES_K8S")?;
            attributes = ",$(OTEL_RESOURCE_ATTRIBUTES_K8S)";
        }
        list.env(
            "OTEL_RESOURCE_ATTRIBUTES",
            format!(
                "service.name={},service.namespace={}{}",
                ctx.tier_name, ctx.application_name, attributes
            ),
        )?;
        list.env(
            "OTEL_EXPORTER_OTLP_ENDPOINT",
            collector.endpoint.url(OTLP_HTTP_PORT),
        )?;
        ctx.sidecar(list);
    }

    env::appd_naming(list, &ctx.application_name, &ctx.tier_name, reuse)?;
    env::spec_env(list, spec)?;
    env::netviz(list, spec)?;

    let mount = VolumeMount::new("appd-agent-repo-dotnetcore", DOTNET_AGENT_DIR);
    let init = env::agent_init_container(
        "appd-agent-attach-dotnetcore",
        spec,
        &mount,
        argv(&["cp", "-r", "/opt/appdynamics/.", DOTNET_AGENT_DIR]),
        Vec::new(),
    );
    env::stage_agent(list, &mount, &init)
}

pub(super) fn nodejs(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    let spec = ctx.spec;
    let reuse = env::reuse_node_names(spec);

    env::controller(list, ctx.controller)?;
    list.env(
        "NODE_OPTIONS",
        format!("--require {}/shim.js", NODEJS_AGENT_DIR),
    )?;
    if reuse {
        list.env("APPDYNAMICS_AGENT_REUSE_NODE_NAME", "true")?;
    } else {
        env::node_name(list)?;
    }
    env::proxy(list, ctx.controller)?;
    env::appd_naming(list, &ctx.application_name, &ctx.tier_name, reuse)?;
    env::spec_env(list, spec)?;
    env::netviz(list, spec)?;

    let mount = VolumeMount::new("appd-agent-repo-nodejs", NODEJS_AGENT_DIR);
    let init = env::agent_init_container(
        "appd-agent-attach-nodejs",
        spec,
        &mount,
        argv(&["cp", "-r", "/opt/appdynamics/.", NODEJS_AGENT_DIR]),
        Vec::new(),
    );
    env::stage_agent(list, &mount, &init)
}
