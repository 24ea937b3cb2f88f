//! Playback session bookkeeping: bound playlist, loaded track, track index.

use crate::provider::{PlaylistHandle, TrackHandle};

/// What the jukebox is tracking right now.
///
/// Mutated only from the control loop thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSession {
    /// Playlist whose name matches the target (if any)
    playlist: Option<PlaylistHandle>,
    /// Track loaded into the provider's player (if any)
    current: Option<TrackHandle>,
    /// Position of the next/current track in `playlist`
    index: usize,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playlist(&self) -> Option<PlaylistHandle> {
        self.playlist
    }

    pub fn current_track(&self) -> Option<TrackHandle> {
        self.current
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_bound_to(&self, playlist: PlaylistHandle) -> bool {
        self.playlist == Some(playlist)
    }

    /// Track `playlist` from its first track.
    pub fn bind(&mut self, playlist: PlaylistHandle) {
        self.playlist = Some(playlist);
        self.index = 0;
    }

    /// Forget the playlist. Returns the loaded track, which the caller must unload.
    pub fn unbind(&mut self) -> Option<TrackHandle> {
        self.playlist = None;
        self.current.take()
    }

    pub fn set_current(&mut self, track: TrackHandle) {
        self.current = Some(track);
    }

    pub fn take_current(&mut self) -> Option<TrackHandle> {
        self.current.take()
    }

    /// Move to the next position.
    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Keep pointing at the same logical track after `positions` were removed.
    ///
    /// `positions` are indices before the removal. Returns how far the index moved.
    pub fn shift_for_removed(&mut self, positions: &[usize]) -> usize {
        let below = positions.iter().filter(|&&p| p < self.index).count();
        self.index = self.index.saturating_sub(below);
        below
    }
}
