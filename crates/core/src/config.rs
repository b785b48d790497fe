use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    profiled_env_opt(profile, key)
        .map(|v| parse_bool(&v).unwrap_or(default))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ── Defaults ──────────────────────────────────────────────────

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_CONFIG_MAP_NAME: &str = "webhook-instrumentor-config";
pub const DEFAULT_COLLECTOR_CONFIG_MAP_NAME: &str = "otel-collector-config";

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Directory holding ConfigMap and custom-resource YAML files.
    pub config_dir: PathBuf,
    /// Namespace the engine itself runs in.
    pub namespace: String,
    pub config_map_name: String,
    pub collector_config_map_name: String,
    /// Skip the namespace-scoped rule tier during resolution.
    pub crds_disabled: bool,
    /// Hot-reload `config_dir` on change.
    pub watch: bool,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `INJECTOR_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("INJECTOR_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            config_dir: PathBuf::from(profiled_env_or(p, "INJECTOR_CONFIG_DIR", "config")),
            namespace: profiled_env_or(p, "INJECTOR_NAMESPACE", DEFAULT_NAMESPACE),
            config_map_name: profiled_env_or(
                p,
                "WEBHOOK_INSTRUMENTOR_CONFIG_MAP_NAME",
                DEFAULT_CONFIG_MAP_NAME,
            ),
            collector_config_map_name: profiled_env_or(
                p,
                "INJECTOR_COLLECTOR_CONFIG_MAP_NAME",
                DEFAULT_COLLECTOR_CONFIG_MAP_NAME,
            ),
            crds_disabled: profiled_env_bool(p, "INJECTOR_CRDS_DISABLED", false),
            watch: profiled_env_bool(p, "INJECTOR_WATCH", true),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  config_dir:  {}", self.config_dir.display());
        tracing::info!("  namespace:   {}", self.namespace);
        tracing::info!(
            "  configmaps:  rules={}, collectors={}",
            self.config_map_name,
            self.collector_config_map_name
        );
        tracing::info!("  crds:        {}", if self.crds_disabled { "disabled" } else { "enabled" });
        tracing::info!("  watch:       {}", self.watch);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            config_dir: PathBuf::from("config"),
            namespace: DEFAULT_NAMESPACE.to_string(),
            config_map_name: DEFAULT_CONFIG_MAP_NAME.to_string(),
            collector_config_map_name: DEFAULT_COLLECTOR_CONFIG_MAP_NAME.to_string(),
            crds_disabled: false,
            watch: true,
        }
    }
}
