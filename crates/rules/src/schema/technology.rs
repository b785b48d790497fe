//! Technology token: `<language>` or `<language>/<vendor>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Runtime or web server an injection spec targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    DotnetCore,
    NodeJs,
    Apache,
    Nginx,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Java => write!(f, "java"),
            Language::DotnetCore => write!(f, "dotnetcore"),
            Language::NodeJs => write!(f, "nodejs"),
            Language::Apache => write!(f, "apache"),
            Language::Nginx => write!(f, "nginx"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "java" => Ok(Language::Java),
            "dotnetcore" => Ok(Language::DotnetCore),
            "nodejs" => Ok(Language::NodeJs),
            "apache" => Ok(Language::Apache),
            "nginx" => Ok(Language::Nginx),
            other => Err(format!("unknown language: '{}'", other)),
        }
    }
}

/// Agent vendor. A token without a vendor part means [`Vendor::Appd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    #[default]
    Appd,
    Otel,
    Telescope,
}

impl Vendor {
    /// Annotation recording which rule instrumented the workload.
    pub fn provenance_annotation(&self) -> &'static str {
        match self {
            Vendor::Appd => "APPD_INSTRUMENTATION_VIA_RULE",
            Vendor::Otel => "OTEL_INSTRUMENTATION_VIA_RULE",
            Vendor::Telescope => "TELESCOPE_INSTRUMENTATION_VIA_RULE",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Appd => write!(f, "appd"),
            Vendor::Otel => write!(f, "otel"),
            Vendor::Telescope => write!(f, "telescope"),
        }
    }
}

impl FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "appd" => Ok(Vendor::Appd),
            "otel" => Ok(Vendor::Otel),
            "telescope" => Ok(Vendor::Telescope),
            other => Err(format!("unknown vendor: '{}'", other)),
        }
    }
}

/// A parsed technology token. Either half may be unrecognized; dispatch
/// decides what an unknown half means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Technology {
    pub language: Option<Language>,
    pub vendor: Option<Vendor>,
}

impl Technology {
    pub fn parse(token: &str) -> Self {
        let (language, vendor) = match token.split_once('/') {
            Some((language, vendor)) => (language, vendor.parse().ok()),
            None => (token, Some(Vendor::default())),
        };
        Self {
            language: language.parse().ok(),
            vendor,
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let language = self.language.map_or_else(|| "?".to_string(), |l| l.to_string());
        let vendor = self.vendor.map_or_else(|| "?".to_string(), |v| v.to_string());
        write!(f, "{}/{}", language, vendor)
    }
}
