//! OpenTelemetry auto-instrumentation for Java, .NET Core and Node.js.

use injector_core::VolumeMount;

use super::BuildContext;
use crate::collector::{OTLP_GRPC_PORT, OTLP_HTTP_PORT};
use crate::env::{self, argv};
use crate::error::Result;
use crate::patch_list::PatchList;

const AGENT_DIR: &str = "/opt/opentelemetry-agent";
const DOTNET_PROFILER_ID: &str = "{918728DD-259F-4A6A-AC2B-B85E1B658318}";

fn resource_attributes(ctx: &BuildContext<'_>) -> String {
    format!(
        "service.name={},service.namespace={}",
        ctx.tier_name, ctx.application_name
    )
}

/// `OTEL_RESOURCE_ATTRIBUTES` with the service identity, extended with the
/// pod identity when the rule asks for it.
fn service_resource_attributes(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    if ctx.inject_k8s_attributes() {
        env::k8s_resource_attributes_with(
            list,
            ctx.container,
            "OTEL_RESOURCE_ATTRIBUTES",
            &resource_attributes(ctx),
        )
    } else {
        list.env("OTEL_RESOURCE_ATTRIBUTES", resource_attributes(ctx))
    }
}

/// Stage the agent payload under `/opt/opentelemetry-agent`.
fn stage(ctx: &BuildContext<'_>, list: &mut PatchList, language: &str) -> Result<()> {
    let mount = VolumeMount::new(format!("otel-agent-repo-{}", language), AGENT_DIR);
    let init = env::agent_init_container(
        &format!("otel-agent-attach-{}", language),
        ctx.spec,
        &mount,
        argv(&["cp", "-r", "/opt/opentelemetry/.", AGENT_DIR]),
        Vec::new(),
    );
    env::stage_agent(list, &mount, &init)
}

pub(super) fn java(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    let spec = ctx.spec;
    let opts = format!(
        " {}-javaagent:{}/opentelemetry-javaagent.jar {} {}",
        env::java_proxy_options(ctx.controller),
        AGENT_DIR,
        spec.java_custom_config,
        env::java_system_properties(spec)
    );
    list.env(&spec.java_env_var, opts)?;
    list.env("OTEL_TRACES_EXPORTER", "otlp")?;
    service_resource_attributes(ctx, list)?;
    list.env("OTEL_SERVICE_NAME", ctx.tier_name.as_str())?;
    env::spec_env(list, spec)?;
    stage(ctx, list, "java")?;
    ctx.exporter_endpoint(list, OTLP_GRPC_PORT, "")
}

pub(super) fn dotnet_core(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    list.env("OTEL_DOTNET_AUTO_TRACES_ENABLED", "true")?;
    list.env("OTEL_DOTNET_AUTO_METRICS_ENABLED", "false")?;
    list.env("CORECLR_ENABLE_PROFILING", "1")?;
    list.env("CORECLR_PROFILER", DOTNET_PROFILER_ID)?;
    list.env("COR_ENABLE_PROFILING", "1")?;
    list.env("COR_PROFILER", DOTNET_PROFILER_ID)?;
    list.env("DOTNET_ADDITIONAL_DEPS", format!("{}/AdditionalDeps", AGENT_DIR))?;
    list.env("DOTNET_SHARED_STORE", format!("{}/store", AGENT_DIR))?;
    list.env(
        "DOTNET_STARTUP_HOOKS",
        format!(
            "{}/netcoreapp3.1/OpenTelemetry.AutoInstrumentation.StartupHook.dll",
            AGENT_DIR
        ),
    )?;
    list.env("OTEL_DOTNET_AUTO_HOME", AGENT_DIR)?;
    list.env(
        "OTEL_DOTNET_AUTO_INTEGRATIONS_FILE",
        format!("{}/integrations.json", AGENT_DIR),
    )?;
    list.env(
        "CORECLR_PROFILER_PATH",
        format!("{}/OpenTelemetry.AutoInstrumentation.Native.so", AGENT_DIR),
    )?;

    list.env("OTEL_SERVICE_NAMESPACE", ctx.application_name.as_str())?;
    list.env("OTEL_SERVICE_NAME", ctx.tier_name.as_str())?;
    service_resource_attributes(ctx, list)?;
    list.env("OTEL_TRACES_EXPORTER", "otlp")?;
    ctx.exporter_endpoint(list, OTLP_HTTP_PORT, "")?;

    env::spec_env(list, ctx.spec)?;
    stage(ctx, list, "dotnetcore")
}

pub(super) fn nodejs(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    list.env("NODE_OPTIONS", format!("--require {}/shim.js", AGENT_DIR))?;
    list.env("OTEL_SERVICE_NAMESPACE", ctx.application_name.as_str())?;
    list.env("OTEL_SERVICE_NAME", ctx.tier_name.as_str())?;
    if ctx.inject_k8s_attributes() {
        env::k8s_resource_attributes(list, ctx.container, "OTEL_RESOURCE_ATTRIBUTES")?;
    }
    env::spec_env(list, ctx.spec)?;
    stage(ctx, list, "nodejs")?;
    ctx.exporter_endpoint(list, OTLP_GRPC_PORT, "")
}
