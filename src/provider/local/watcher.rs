//! Manifest change watcher.
//!
//! Watches the manifest's directory (editors usually replace files rather than
//! write in place) and reports changes to the manifest file over a channel.
//! Each change also pokes the control loop through
//! [`ProviderCallbacks::notify_main_thread`].
//!
//! Dropping the watcher stops it.

use crossbeam_channel::{Receiver, Sender, bounded};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use crate::provider::{ProviderCallbacks, ProviderError};

/// Handle to a running manifest watcher.
pub struct ManifestWatcher {
    _watcher: RecommendedWatcher,
}

impl ManifestWatcher {
    /// Start watching `manifest`. The receiver yields one `()` per burst of changes.
    pub fn new(
        manifest: &Path,
        callbacks: Arc<dyn ProviderCallbacks>,
    ) -> Result<(Self, Receiver<()>), ProviderError> {
        let file_name = manifest
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| ProviderError::Session(format!("{} is not a file", manifest.display())))?;
        let dir = match manifest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };

        // One pending change is enough: the manifest is re-read in full
        let (tx, rx) = bounded(1);

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            handle_event(result, &file_name, &tx, callbacks.as_ref());
        })
        .map_err(|e| ProviderError::Session(format!("cannot watch library: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ProviderError::Session(format!("cannot watch {}: {}", dir.display(), e)))?;

        tracing::info!(target: "provider::local::watcher", path = %manifest.display(), "Watching library manifest");

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn handle_event(
    result: notify::Result<notify::Event>,
    file_name: &OsString,
    tx: &Sender<()>,
    callbacks: &dyn ProviderCallbacks,
) {
    let event = match result {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(target: "provider::local::watcher", error = %e, "Watch error");
            return;
        }
    };

    if !is_content_change(&event.kind) {
        return;
    }
    let touches_manifest = event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()));
    if !touches_manifest {
        return;
    }

    tracing::debug!(target: "provider::local::watcher", kind = ?event.kind, "Manifest changed");
    // Full means a change is already pending
    let _ = tx.try_send(());
    callbacks.notify_main_thread();
}

/// Opening or reading the manifest is not a change.
fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}
