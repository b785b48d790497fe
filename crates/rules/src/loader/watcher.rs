//! Hot reload: turns notify events into apply/undo calls.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{debug, info};

use super::apply::{AppliedObject, ObjectApplier};
use super::core::{apply_and_track, is_yaml, parse_object};
use super::error::{LoadResult, LoadStatus, Result};
use crate::schema::ClusterObject;

type Applied = RwLock<HashMap<PathBuf, AppliedObject>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Write,
    Delete,
}

fn classify(kind: &EventKind, path: &Path) -> Option<Change> {
    match kind {
        EventKind::Create(CreateKind::File)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Name(_)) => {
            // Renames report both ends; the vanished side is a delete.
            Some(if path.exists() { Change::Write } else { Change::Delete })
        }
        EventKind::Remove(RemoveKind::File) => Some(Change::Delete),
        _ => None,
    }
}

fn is_watched(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    is_yaml(path) && !hidden
}

pub(super) fn handle_fs_event(event: &Event, applier: &ObjectApplier, applied: &Applied) {
    for path in event.paths.iter().filter(|p| is_watched(p)) {
        match classify(&event.kind, path) {
            Some(Change::Write) => {
                let status = match reload(path) {
                    Ok(object) => apply_and_track(applier, applied, path, &object),
                    // Parse failures keep whatever the file applied last.
                    Err(e) => LoadStatus::Failed {
                        error: e.to_string(),
                    },
                };
                let result = LoadResult {
                    path: path.clone(),
                    status,
                };
                info!(%result, "hot reload");
            }
            Some(Change::Delete) => forget(applier, applied, path),
            None => debug!(path = %path.display(), kind = ?event.kind, "ignored fs event"),
        }
    }
}

fn reload(path: &Path) -> Result<ClusterObject> {
    let contents = fs::read_to_string(path)?;
    parse_object(&contents)
}

/// Undo whatever the file at `path` contributed.
fn forget(applier: &ObjectApplier, applied: &Applied, path: &Path) {
    let removed = applied.write().unwrap_or_else(PoisonError::into_inner).remove(path);
    if let Some(entry) = removed {
        info!(object = %entry, path = %path.display(), "file deleted, object removed");
        applier.remove(&entry);
    }
}
