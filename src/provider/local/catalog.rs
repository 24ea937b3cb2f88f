//! In-memory catalog of playlists and tracks, kept in sync with the manifest.
//!
//! Every manifest revision is diffed against the catalog and the differences
//! are reported as [`ProviderEvent`]s, the way a remote service would push
//! playlist changes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::provider::{PlaylistHandle, ProviderEvent, TrackError, TrackHandle};

use super::manifest::{Manifest, PlaylistEntry};

#[derive(Debug)]
struct TrackEntry {
    path: PathBuf,
    name: String,
    failed: Option<TrackError>,
}

#[derive(Debug)]
struct CatalogPlaylist {
    handle: PlaylistHandle,
    key: String,
    name: String,
    tracks: Vec<TrackHandle>,
}

/// Playlists in container order plus every track ever referenced.
#[derive(Debug, Default)]
pub struct Catalog {
    playlists: Vec<CatalogPlaylist>,
    tracks: HashMap<TrackHandle, TrackEntry>,
    by_path: HashMap<PathBuf, TrackHandle>,
    next_playlist: u64,
    next_track: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playlists(&self) -> Vec<PlaylistHandle> {
        self.playlists.iter().map(|p| p.handle).collect()
    }

    pub fn playlist_name(&self, playlist: PlaylistHandle) -> Option<&str> {
        self.find(playlist).map(|p| p.name.as_str())
    }

    pub fn playlist_key(&self, playlist: PlaylistHandle) -> Option<&str> {
        self.find(playlist).map(|p| p.key.as_str())
    }

    pub fn tracks(&self, playlist: PlaylistHandle) -> &[TrackHandle] {
        self.find(playlist).map_or(&[], |p| p.tracks.as_slice())
    }

    pub fn track_name(&self, track: TrackHandle) -> Option<&str> {
        self.tracks.get(&track).map(|t| t.name.as_str())
    }

    pub fn track_path(&self, track: TrackHandle) -> Option<&Path> {
        self.tracks.get(&track).map(|t| t.path.as_path())
    }

    /// Why `track` cannot be played, if it cannot.
    pub fn track_error(&self, track: TrackHandle) -> Option<TrackError> {
        let Some(entry) = self.tracks.get(&track) else {
            return Some(TrackError::Unavailable("unknown track".to_string()));
        };
        if let Some(err) = &entry.failed {
            return Some(err.clone());
        }
        if !entry.path.is_file() {
            return Some(TrackError::Unavailable(format!(
                "{} does not exist",
                entry.path.display()
            )));
        }
        None
    }

    pub fn mark_failed(&mut self, track: TrackHandle, err: TrackError) {
        if let Some(entry) = self.tracks.get_mut(&track) {
            entry.failed = Some(err);
        }
    }

    /// Replace the display name. Returns true if it changed.
    pub fn rename_track(&mut self, track: TrackHandle, name: String) -> bool {
        match self.tracks.get_mut(&track) {
            Some(entry) if entry.name != name => {
                entry.name = name;
                true
            }
            _ => false,
        }
    }

    /// Remove `positions` from a playlist. Out-of-range positions are ignored.
    ///
    /// Returns the positions actually removed, ascending.
    pub fn remove_positions(&mut self, playlist: PlaylistHandle, positions: &[usize]) -> Vec<usize> {
        let Some(pl) = self.playlists.iter_mut().find(|p| p.handle == playlist) else {
            return Vec::new();
        };
        let removed = normalize_positions(positions, pl.tracks.len());
        for &p in removed.iter().rev() {
            pl.tracks.remove(p);
        }
        removed
    }

    /// Bring the catalog in line with `manifest`, returning what changed.
    pub fn sync(&mut self, manifest: &Manifest, base: &Path) -> Vec<ProviderEvent> {
        let mut events = Vec::new();

        let mut incoming: Vec<&PlaylistEntry> = Vec::with_capacity(manifest.playlists.len());
        let mut seen = HashSet::new();
        for entry in &manifest.playlists {
            if seen.insert(entry.key()) {
                incoming.push(entry);
            } else {
                tracing::warn!(target: "provider::local", "Duplicate playlist id {:?} ignored", entry.key());
            }
        }

        // Removed playlists, positions relative to the list as it shrinks
        let mut old = std::mem::take(&mut self.playlists);
        let mut index = 0;
        old.retain(|pl| {
            let keep = seen.contains(pl.key.as_str());
            if !keep {
                events.push(ProviderEvent::PlaylistRemoved {
                    playlist: pl.handle,
                    position: index,
                });
            } else {
                index += 1;
            }
            keep
        });

        let mut existing: HashMap<String, CatalogPlaylist> =
            old.into_iter().map(|pl| (pl.key.clone(), pl)).collect();

        for (position, entry) in incoming.into_iter().enumerate() {
            let tracks: Vec<TrackHandle> = entry
                .tracks
                .iter()
                .map(|t| self.intern(&base.join(t)))
                .collect();

            let playlist = match existing.remove(entry.key()) {
                Some(mut pl) => {
                    if pl.name != entry.name {
                        pl.name = entry.name.clone();
                        events.push(ProviderEvent::PlaylistRenamed {
                            playlist: pl.handle,
                        });
                    }
                    events.extend(diff_tracks(pl.handle, &pl.tracks, &tracks));
                    pl.tracks = tracks;
                    pl
                }
                None => {
                    self.next_playlist += 1;
                    let handle = PlaylistHandle::from_raw(self.next_playlist);
                    events.push(ProviderEvent::PlaylistAdded {
                        playlist: handle,
                        position,
                    });
                    CatalogPlaylist {
                        handle,
                        key: entry.key().to_string(),
                        name: entry.name.clone(),
                        tracks,
                    }
                }
            };
            self.playlists.push(playlist);
        }

        events
    }

    fn intern(&mut self, path: &Path) -> TrackHandle {
        if let Some(&handle) = self.by_path.get(path) {
            return handle;
        }
        self.next_track += 1;
        let handle = TrackHandle::from_raw(self.next_track);
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.tracks.insert(
            handle,
            TrackEntry {
                path: path.to_path_buf(),
                name,
                failed: None,
            },
        );
        self.by_path.insert(path.to_path_buf(), handle);
        handle
    }

    fn find(&self, playlist: PlaylistHandle) -> Option<&CatalogPlaylist> {
        self.playlists.iter().find(|p| p.handle == playlist)
    }
}

/// Sorted, deduplicated, in-range positions.
pub fn normalize_positions(positions: &[usize], len: usize) -> Vec<usize> {
    let mut sorted: Vec<usize> = positions.iter().copied().filter(|&p| p < len).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

/// Describe how `old` became `new` as removed, moved and added events.
///
/// Removed positions refer to `old`; added positions refer to `new`.
pub fn diff_tracks(
    playlist: PlaylistHandle,
    old: &[TrackHandle],
    new: &[TrackHandle],
) -> Vec<ProviderEvent> {
    let mut events = Vec::new();

    // Tracks of `old` that survive, matched by multiplicity
    let mut available = counts(new);
    let mut removed = Vec::new();
    let mut kept = Vec::with_capacity(old.len());
    for (pos, track) in old.iter().enumerate() {
        match available.get_mut(track) {
            Some(n) if *n > 0 => {
                *n -= 1;
                kept.push(*track);
            }
            _ => removed.push(pos),
        }
    }
    if !removed.is_empty() {
        events.push(ProviderEvent::TracksRemoved {
            playlist,
            positions: removed,
        });
    }

    // Survivors in their new order, and the runs that are new
    let mut surviving = counts(&kept);
    let mut reordered = Vec::with_capacity(kept.len());
    let mut added: Vec<(usize, Vec<TrackHandle>)> = Vec::new();
    for (pos, track) in new.iter().enumerate() {
        match surviving.get_mut(track) {
            Some(n) if *n > 0 => {
                *n -= 1;
                reordered.push(*track);
            }
            _ => match added.last_mut() {
                Some((start, run)) if *start + run.len() == pos => run.push(*track),
                _ => added.push((pos, vec![*track])),
            },
        }
    }

    let moved: Vec<usize> = kept
        .iter()
        .zip(&reordered)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    if let Some(&first) = moved.first() {
        events.push(ProviderEvent::TracksMoved {
            playlist,
            positions: moved,
            new_position: first,
        });
    }

    for (position, tracks) in added {
        events.push(ProviderEvent::TracksAdded {
            playlist,
            tracks,
            position,
        });
    }

    events
}

fn counts(tracks: &[TrackHandle]) -> HashMap<TrackHandle, usize> {
    let mut map = HashMap::new();
    for track in tracks {
        *map.entry(*track).or_insert(0) += 1;
    }
    map
}
