//! Core [`ConfigLoader`] struct: filesystem-backed object loading with optional hot-reload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::schema::{ClusterObject, ObjectEnvelope, ObjectKind};

use super::apply::{AppliedObject, ObjectApplier};
use super::error::{LoadResult, LoadStatus, Result, RuleError};
use super::watcher::handle_fs_event;

/// Filesystem-backed configuration loader with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, deserializes
/// them into [`ClusterObject`] instances via two-pass deserialization, and
/// applies them to the registry. Remembers which file produced which
/// registry entry so a deleted file can be undone.
pub struct ConfigLoader {
    /// Root directory containing object YAML files.
    config_dir: PathBuf,
    applier: ObjectApplier,
    /// Registry entries keyed by the file that produced them.
    pub(super) applied: Arc<RwLock<HashMap<PathBuf, AppliedObject>>>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl ConfigLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(config_dir: PathBuf, applier: ObjectApplier) -> Self {
        if !config_dir.exists() {
            if let Err(e) = fs::create_dir_all(&config_dir) {
                warn!(path = %config_dir.display(), error = %e, "failed to create config directory");
            }
        }
        Self {
            config_dir,
            applier,
            applied: Arc::new(RwLock::new(HashMap::new())),
            _watcher: None,
        }
    }

    /// Recursively scan the config directory and apply every object.
    ///
    /// ConfigMaps are applied before resources so rule resources resolve
    /// against the configured templates. Errors are reported per file and do
    /// not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        let mut parsed = Vec::new();
        self.scan_dir_recursive(&self.config_dir, &mut results, &mut parsed)?;

        parsed.sort_by_key(|(_, object)| object.kind() != ObjectKind::ConfigMap);
        for (path, object) in parsed {
            let status = self.apply_object(&path, &object);
            results.push(LoadResult { path, status });
        }
        Ok(results)
    }

    /// Recursively scan a directory for YAML object files.
    fn scan_dir_recursive(
        &self,
        dir: &Path,
        results: &mut Vec<LoadResult>,
        parsed: &mut Vec<(PathBuf, ClusterObject)>,
    ) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            // Skip dotfiles/dotdirs
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results, parsed)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(object) => parsed.push((path, object)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse object file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse a single YAML file into a [`ClusterObject`] via two-pass deserialization.
    pub fn load_file(&self, path: &Path) -> Result<ClusterObject> {
        parse_object(&fs::read_to_string(path)?)
    }

    fn apply_object(&self, path: &Path, object: &ClusterObject) -> LoadStatus {
        apply_and_track(&self.applier, &self.applied, path, object)
    }

    /// Start a filesystem watcher with 500ms debounce.
    ///
    /// On file create/modify the object is re-parsed and re-applied.
    /// On file delete the resource-sourced entry it produced is removed.
    /// Parse and registry errors are logged; the previous state is kept.
    pub fn watch(&mut self) -> Result<()> {
        let applier = self.applier.clone();
        let applied = Arc::clone(&self.applied);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &applier, &applied),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&self.config_dir, RecursiveMode::Recursive)?;

        let _ = watcher
            .configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.config_dir.display(), "watching config directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn applier(&self) -> &ObjectApplier {
        &self.applier
    }

    /// What each loaded file contributed to the registry.
    pub fn applied(&self) -> HashMap<PathBuf, AppliedObject> {
        self.applied.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

/// Parse one YAML or JSON object text. First pass reads the envelope,
/// second pass the concrete kind.
pub fn parse_object(contents: &str) -> Result<ClusterObject> {
    let envelope: ObjectEnvelope = serde_yaml::from_str(contents)?;
    if envelope.metadata.name.is_empty() {
        return Err(RuleError::Invalid(
            "object metadata.name must not be empty".to_string(),
        ));
    }
    envelope.parse_full().map_err(|e| {
        RuleError::Invalid(format!(
            "failed to parse {} '{}': {}",
            envelope.kind, envelope.metadata.name, e
        ))
    })
}

/// Apply `object` and remember what `path` now contributes. A file whose
/// object changed identity has its previous contribution undone first.
pub(super) fn apply_and_track(
    applier: &ObjectApplier,
    applied: &RwLock<HashMap<PathBuf, AppliedObject>>,
    path: &Path,
    object: &ClusterObject,
) -> LoadStatus {
    match applier.apply(object) {
        Ok(Some(entry)) => {
            info!(object = %entry, kind = %object.kind(), path = %path.display(), "applied object");
            let previous = applied
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(path.to_path_buf(), entry.clone());
            if let Some(previous) = previous.filter(|p| *p != entry) {
                applier.remove(&previous);
            }
            LoadStatus::Loaded {
                object: entry.to_string(),
            }
        }
        Ok(None) => LoadStatus::Skipped {
            reason: format!("{} '{}' is not handled", object.kind(), object.metadata().name),
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to apply object");
            LoadStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}
