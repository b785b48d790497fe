//! Per technology/vendor agent builders.
//!
//! [`Builder`] is the closed set of supported (language, vendor) pairs.
//! Dispatch writes the vendor's provenance annotation and then the builder's
//! patches; a pair without a builder writes the failure status instead.

mod appd;
mod otel;
mod telescope;
mod webserver;

use injector_core::{Container, Workload};
use injector_rules::schema::{ControllerConfig, InjectionSpec, Language, Technology, Vendor};
use tracing::warn;

use crate::collector::BoundCollector;
use crate::error::Result;
use crate::patch_list::PatchList;

pub use self::webserver::WebServer;

pub const STATUS_ANNOTATION: &str = "APPD_INSTRUMENTATION_STATUS";
pub const FAILURE_REASON_ANNOTATION: &str = "APPD_INSTRUMENTATION_FAILURE_REASON";
pub const UNKNOWN_TECHNOLOGY_REASON: &str = "Technology for injection not specified or unknown";

/// Everything a builder reads for one spec.
pub struct BuildContext<'a> {
    pub workload: &'a Workload,
    /// The instrumented (first) container.
    pub container: &'a Container,
    pub spec: &'a InjectionSpec,
    pub controller: &'a ControllerConfig,
    pub application_name: String,
    pub tier_name: String,
    /// `None` when the spec names no collector or the name is unknown.
    pub collector: Option<BoundCollector>,
}

impl BuildContext<'_> {
    /// Emit the sidecar bundle when the bound collector runs in the pod.
    pub(crate) fn sidecar(&self, list: &mut PatchList) {
        if let Some(collector) = self.collector.as_ref().filter(|c| c.is_sidecar()) {
            list.extend(collector.sidecar.iter().cloned());
        }
    }

    /// `OTEL_EXPORTER_OTLP_ENDPOINT` for the bound collector, followed by
    /// the sidecar bundle when it runs in the pod.
    pub(crate) fn exporter_endpoint(&self, list: &mut PatchList, port: u16, suffix: &str) -> Result<()> {
        let Some(collector) = &self.collector else {
            return Ok(());
        };
        list.env(
            "OTEL_EXPORTER_OTLP_ENDPOINT",
            format!("{}{}", collector.endpoint.url(port), suffix),
        )?;
        self.sidecar(list);
        Ok(())
    }

    pub(crate) fn inject_k8s_attributes(&self) -> bool {
        self.spec.inject_k8s_otel_resource_attrs.resolve(true)
    }
}

/// A supported (language, vendor) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builder {
    AppdJava,
    AppdDotnetCore,
    AppdNodeJs,
    OtelJava,
    OtelDotnetCore,
    OtelNodeJs,
    OtelWebServer(WebServer),
    TelescopeNodeJs,
}

impl Builder {
    /// `None` for any pair without a builder.
    pub fn for_technology(technology: Technology) -> Option<Self> {
        let builder = match (technology.vendor?, technology.language?) {
            (Vendor::Appd, Language::Java) => Builder::AppdJava,
            (Vendor::Appd, Language::DotnetCore) => Builder::AppdDotnetCore,
            (Vendor::Appd, Language::NodeJs) => Builder::AppdNodeJs,
            (Vendor::Otel, Language::Java) => Builder::OtelJava,
            (Vendor::Otel, Language::DotnetCore) => Builder::OtelDotnetCore,
            (Vendor::Otel, Language::NodeJs) => Builder::OtelNodeJs,
            (Vendor::Otel, Language::Apache) => Builder::OtelWebServer(WebServer::Apache),
            (Vendor::Otel, Language::Nginx) => Builder::OtelWebServer(WebServer::Nginx),
            (Vendor::Telescope, Language::NodeJs) => Builder::TelescopeNodeJs,
            _ => return None,
        };
        Some(builder)
    }

    pub fn vendor(&self) -> Vendor {
        match self {
            Builder::AppdJava | Builder::AppdDotnetCore | Builder::AppdNodeJs => Vendor::Appd,
            Builder::OtelJava
            | Builder::OtelDotnetCore
            | Builder::OtelNodeJs
            | Builder::OtelWebServer(_) => Vendor::Otel,
            Builder::TelescopeNodeJs => Vendor::Telescope,
        }
    }

    pub fn build(&self, ctx: &BuildContext<'_>, list: &mut PatchList) -> Result<()> {
        match self {
            Builder::AppdJava => appd::java(ctx, list),
            Builder::AppdDotnetCore => appd::dotnet_core(ctx, list),
            Builder::AppdNodeJs => appd::nodejs(ctx, list),
            Builder::OtelJava => otel::java(ctx, list),
            Builder::OtelDotnetCore => otel::dotnet_core(ctx, list),
            Builder::OtelNodeJs => otel::nodejs(ctx, list),
            Builder::OtelWebServer(server) => webserver::build(*server, ctx, list),
            Builder::TelescopeNodeJs => telescope::nodejs(ctx, list),
        }
    }
}

/// Dispatch one spec of `rule_name`.
///
/// The context is only built for supported pairs.
pub fn dispatch<'a>(
    list: &mut PatchList,
    rule_name: &str,
    spec: &InjectionSpec,
    context: impl FnOnce() -> Result<BuildContext<'a>>,
) -> Result<()> {
    let technology = Technology::parse(&spec.technology);
    match (Builder::for_technology(technology), technology.vendor) {
        (Some(builder), _) => {
            list.annotation(builder.vendor().provenance_annotation(), rule_name);
            builder.build(&context()?, list)
        }
        (None, vendor) => {
            warn!(rule = %rule_name, technology = %spec.technology, "No builder for technology");
            if let Some(vendor) = vendor {
                list.annotation(vendor.provenance_annotation(), rule_name);
            }
            failure_status(list);
            Ok(())
        }
    }
}

/// The two-entry status marking a workload as not instrumented.
pub fn failure_status(list: &mut PatchList) {
    list.annotation(STATUS_ANNOTATION, "FAILED");
    list.annotation(FAILURE_REASON_ANNOTATION, UNKNOWN_TECHNOLOGY_REASON);
}
