//! Telescope agent for Node.js.

use injector_core::VolumeMount;

use super::BuildContext;
use crate::collector::OTLP_HTTP_PORT;
use crate::env::{self, argv};
use crate::error::Result;
use crate::patch_list::PatchList;

const AGENT_DIR: &str = "/opt/telescope-agent";

pub(super) fn nodejs(ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
    list.env("NODE_OPTIONS", format!("--require {}/shim.js", AGENT_DIR))?;
    list.env("OTEL_SERVICE_NAMESPACE", ctx.application_name.as_str())?;
    list.env("OTEL_SERVICE_NAME", ctx.tier_name.as_str())?;
    if ctx.inject_k8s_attributes() {
        env::k8s_resource_attributes(list, ctx.container, "OTEL_RESOURCE_ATTRIBUTES")?;
    }
    env::spec_env(list, ctx.spec)?;

    let mount = VolumeMount::new("telescope-agent-repo-nodejs", AGENT_DIR);
    let init = env::agent_init_container(
        "telescope-agent-attach-nodejs",
        ctx.spec,
        &mount,
        argv(&["cp", "-r", "/opt/telescope/.", AGENT_DIR]),
        Vec::new(),
    );
    env::stage_agent(list, &mount, &init)?;

    // Traces go to the OTLP/HTTP traces path.
    ctx.exporter_endpoint(list, OTLP_HTTP_PORT, "/v1/traces")
}
