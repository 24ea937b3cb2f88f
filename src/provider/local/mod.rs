//! Streaming provider backed by a TOML library manifest and local audio files.
//!
//! # Architecture
//!
//! ```text
//! library.toml ──notify──▶ ManifestWatcher ──()──▶ process_events ──▶ Catalog::sync ──▶ events
//!
//! load(track) ──▶ TrackDecoder ──▶ Streamer thread ──music_delivery──▶ callbacks
//!                                        └──────────end_of_track────▶ callbacks
//! ```
//!
//! Playlist changes made by editing the manifest (or by `remove_tracks`,
//! which rewrites it) reach the jukebox the same way a remote service's
//! pushes would.

mod catalog;
mod decoder;
mod manifest;
mod resampler;
mod streamer;
mod watcher;

use manifest::Manifest;

use crossbeam_channel::Receiver;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::provider::{
    LoginError, PlaylistHandle, ProviderCallbacks, ProviderError, ProviderEvent,
    StreamingProvider, TrackError, TrackHandle,
};

use catalog::Catalog;
use decoder::TrackDecoder;
use streamer::Streamer;
use watcher::ManifestWatcher;

/// How long the control loop may sleep when nothing is queued.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Quiet period after the last manifest change before it is re-read.
const DEBOUNCE: Duration = Duration::from_millis(250);

/// Provider serving playlists from a manifest file.
pub struct LocalProvider {
    manifest_path: PathBuf,
    base_dir: PathBuf,
    manifest: Manifest,
    catalog: Catalog,
    callbacks: Arc<dyn ProviderCallbacks>,
    subscribed: HashSet<PlaylistHandle>,
    logged_in: bool,
    login_result: Option<Result<(), LoginError>>,
    queued: Vec<ProviderEvent>,
    changes: Receiver<()>,
    /// Time of the last manifest change not yet synced
    dirty_since: Option<Instant>,
    _watcher: ManifestWatcher,
    streamer: Option<Streamer>,
}

impl LocalProvider {
    /// Create a session over the manifest at `manifest_path`.
    pub fn open(
        manifest_path: &Path,
        callbacks: Arc<dyn ProviderCallbacks>,
    ) -> Result<Self, ProviderError> {
        let manifest = Manifest::load(manifest_path).map_err(|e| {
            ProviderError::Session(format!("{}: {}", manifest_path.display(), e))
        })?;

        let base_dir = manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let (watcher, changes) = ManifestWatcher::new(manifest_path, Arc::clone(&callbacks))?;

        tracing::info!(
            target: "provider::local",
            "Opened library {:?} ({} playlists)",
            manifest_path,
            manifest.playlists.len()
        );

        Ok(Self {
            manifest_path: manifest_path.to_path_buf(),
            base_dir,
            manifest,
            catalog: Catalog::new(),
            callbacks,
            subscribed: HashSet::new(),
            logged_in: false,
            login_result: None,
            queued: Vec::new(),
            changes,
            dirty_since: None,
            _watcher: watcher,
            streamer: None,
        })
    }

    /// Queue an event and make sure the control loop comes round for it.
    fn queue(&mut self, event: ProviderEvent) {
        self.queued.push(event);
        self.callbacks.notify_main_thread();
    }

    fn finish_login(&mut self, events: &mut Vec<ProviderEvent>) {
        let Some(result) = self.login_result.take() else {
            return;
        };

        if result.is_ok() {
            self.logged_in = true;
            // Initial contents are enumerated by the caller, not announced
            self.catalog.sync(&self.manifest, &self.base_dir);
            events.push(ProviderEvent::LoggedIn(result));
            events.push(ProviderEvent::ContainerLoaded {
                playlists: self.catalog.playlists().len(),
            });
        } else {
            events.push(ProviderEvent::LoggedIn(result));
        }
    }

    fn reload_manifest(&mut self, events: &mut Vec<ProviderEvent>) {
        let manifest = match Manifest::load(&self.manifest_path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(target: "provider::local", "Ignoring unreadable library: {}", e);
                return;
            }
        };

        let changes = self.catalog.sync(&manifest, &self.base_dir);
        self.manifest = manifest;
        if !changes.is_empty() {
            tracing::debug!(target: "provider::local", "Library changed ({} events)", changes.len());
        }

        events.extend(changes.into_iter().filter(|event| {
            event
                .playlist()
                .is_none_or(|pl| self.subscribed.contains(&pl))
        }));
    }

    fn stop_streamer(&mut self) {
        if let Some(streamer) = self.streamer.take() {
            streamer.stop();
        }
    }
}

impl StreamingProvider for LocalProvider {
    fn login(&mut self, username: &str, password: &str) -> Result<(), ProviderError> {
        let result = if self.manifest.accepts(username, password) {
            tracing::info!(target: "provider::local", "Logged in as {}", username);
            Ok(())
        } else {
            Err(LoginError::BadCredentials)
        };
        self.login_result = Some(result);
        self.callbacks.notify_main_thread();
        Ok(())
    }

    fn playlists(&self) -> Vec<PlaylistHandle> {
        if self.logged_in {
            self.catalog.playlists()
        } else {
            Vec::new()
        }
    }

    fn playlist_name(&self, playlist: PlaylistHandle) -> Option<String> {
        self.catalog.playlist_name(playlist).map(str::to_string)
    }

    fn playlist_len(&self, playlist: PlaylistHandle) -> usize {
        self.catalog.tracks(playlist).len()
    }

    fn playlist_track(&self, playlist: PlaylistHandle, index: usize) -> Option<TrackHandle> {
        self.catalog.tracks(playlist).get(index).copied()
    }

    fn track_name(&self, track: TrackHandle) -> Option<String> {
        self.catalog.track_name(track).map(str::to_string)
    }

    fn track_error(&self, track: TrackHandle) -> Option<TrackError> {
        self.catalog.track_error(track)
    }

    fn subscribe(&mut self, playlist: PlaylistHandle) {
        self.subscribed.insert(playlist);
    }

    fn unsubscribe(&mut self, playlist: PlaylistHandle) {
        self.subscribed.remove(&playlist);
    }

    fn load(&mut self, track: TrackHandle) -> Result<(), ProviderError> {
        self.stop_streamer();

        let path = self
            .catalog
            .track_path(track)
            .ok_or(ProviderError::UnknownTrack)?
            .to_path_buf();

        let mut decoder = match TrackDecoder::open(&path) {
            Ok(d) => d,
            Err(e) => {
                self.catalog.mark_failed(track, e.clone());
                return Err(e.into());
            }
        };

        if let Some(name) = decoder.tagged_name()
            && self.catalog.rename_track(track, name)
        {
            self.queue(ProviderEvent::MetadataUpdated);
        }

        match Streamer::spawn(decoder, Arc::clone(&self.callbacks)) {
            Ok(streamer) => {
                self.streamer = Some(streamer);
                Ok(())
            }
            Err(e) => {
                self.catalog.mark_failed(track, e.clone());
                Err(e.into())
            }
        }
    }

    fn play(&mut self, playing: bool) {
        if let Some(streamer) = &self.streamer {
            streamer.set_playing(playing);
        }
    }

    fn unload(&mut self) {
        self.stop_streamer();
    }

    fn remove_tracks(
        &mut self,
        playlist: PlaylistHandle,
        positions: &[usize],
    ) -> Result<(), ProviderError> {
        let key = self
            .catalog
            .playlist_key(playlist)
            .ok_or(ProviderError::UnknownPlaylist)?
            .to_string();

        let removed = self.catalog.remove_positions(playlist, positions);
        if removed.is_empty() {
            return Ok(());
        }

        if let Some(entry) = self.manifest.playlist_mut(&key) {
            for &p in removed.iter().rev() {
                if p < entry.tracks.len() {
                    entry.tracks.remove(p);
                }
            }
        }
        let saved = self.manifest.save(&self.manifest_path);

        if self.subscribed.contains(&playlist) {
            self.queue(ProviderEvent::TracksRemoved {
                playlist,
                positions: removed,
            });
        }

        saved.map_err(|e| ProviderError::Library(format!("could not save library: {}", e)))
    }

    fn process_events(&mut self, events: &mut Vec<ProviderEvent>) -> Duration {
        self.finish_login(events);

        while self.changes.try_recv().is_ok() {
            self.dirty_since = Some(Instant::now());
        }

        let mut timeout = IDLE_POLL;
        if let Some(since) = self.dirty_since {
            let quiet = since.elapsed();
            if !self.logged_in {
                // Read in full at login
                self.dirty_since = None;
            } else if quiet >= DEBOUNCE {
                self.dirty_since = None;
                self.reload_manifest(events);
            } else {
                timeout = DEBOUNCE - quiet;
            }
        }

        events.append(&mut self.queued);

        if !self.changes.is_empty() || self.login_result.is_some() {
            Duration::ZERO
        } else {
            timeout
        }
    }
}

impl Drop for LocalProvider {
    fn drop(&mut self) {
        self.stop_streamer();
    }
}
