//! Global vendor controller configuration.

use serde::{Deserialize, Serialize};

/// Controller credentials, address and proxy settings shared by every
/// appd-vendor injection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    pub host: String,
    pub port: String,
    pub is_secure: bool,
    pub account_name: String,
    /// Secret holding the access key; wins over `access_key`.
    pub access_key_secret: String,
    pub access_key_secret_key: String,
    pub access_key: String,
    pub use_proxy: bool,
    pub proxy_host: String,
    pub proxy_port: String,
    pub proxy_user: String,
    pub proxy_password: String,
    pub proxy_domain: String,
    pub otel_endpoint: String,
    pub otel_header_key: String,
}
