//! Collector registries and the dot-keyed collector ConfigMap format.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::schema::{CollectorBinding, CollectorMode};

/// Namespace-scoped bindings from collector resources plus the global,
/// configuration-sourced set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectorRegistry {
    pub global: BTreeMap<String, CollectorBinding>,
    pub namespaced: BTreeMap<String, BTreeMap<String, CollectorBinding>>,
}

impl CollectorRegistry {
    /// Namespace-scoped binding first, then the global one.
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&CollectorBinding> {
        self.namespaced
            .get(namespace)
            .and_then(|bindings| bindings.get(name))
            .or_else(|| self.global.get(name))
    }

    pub(super) fn register(&mut self, namespace: &str, binding: CollectorBinding) {
        self.namespaced
            .entry(namespace.to_string())
            .or_default()
            .insert(binding.name.clone(), binding);
    }

    pub(super) fn unregister(&mut self, namespace: &str, name: &str) -> bool {
        let Some(bindings) = self.namespaced.get_mut(namespace) else {
            return false;
        };
        let removed = bindings.remove(name).is_some();
        if bindings.is_empty() {
            self.namespaced.remove(namespace);
        }
        removed
    }
}

#[derive(Default)]
struct PartialBinding {
    mode: String,
    image: String,
    image_pull_policy: String,
    init_image: String,
    config: String,
    service_name: String,
}

/// Parse `<collector>.<item>` keys into bindings.
///
/// Items: `config`, `mode`, `image.image`, `image.imagePullPolicy`,
/// `image.initImage`, `serviceName`. Unknown items are ignored. A collector
/// with a missing or unknown mode is skipped.
pub fn parse_collector_map(data: &BTreeMap<String, String>) -> Vec<CollectorBinding> {
    let mut partials: BTreeMap<&str, PartialBinding> = BTreeMap::new();
    for (key, value) in data {
        let (name, item) = key.split_once('.').unwrap_or((key.as_str(), ""));
        let partial = partials.entry(name).or_default();
        match item {
            "config" => partial.config = value.clone(),
            "mode" => partial.mode = value.clone(),
            "image.image" => partial.image = value.clone(),
            "image.imagePullPolicy" => partial.image_pull_policy = value.clone(),
            "image.initImage" => partial.init_image = value.clone(),
            "serviceName" => partial.service_name = value.clone(),
            other => warn!(collector = %name, item = %other, "Ignoring unknown collector item"),
        }
    }

    partials
        .into_iter()
        .filter_map(|(name, partial)| {
            let mode = match partial.mode.parse::<CollectorMode>() {
                Ok(mode) => mode,
                Err(e) => {
                    warn!(collector = %name, error = %e, "Skipping collector without a valid mode");
                    return None;
                }
            };
            Some(CollectorBinding {
                name: name.to_string(),
                mode,
                image: partial.image,
                image_pull_policy: partial.image_pull_policy,
                init_image: partial.init_image,
                config: partial.config,
                service_name: partial.service_name,
                spec: None,
            })
        })
        .collect()
}
