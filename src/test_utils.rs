//! Test utilities for jukebox tests.
//!
//! [`FakeProvider`] is an in-memory [`StreamingProvider`] that records every
//! command it receives and hands back scripted events, so the state machine
//! and control loop can be exercised without audio hardware or files.
//!
//! # Example
//!
//! ```ignore
//! let mut provider = FakeProvider::new();
//! let party = provider.add_playlist("Party", &["a", "b", "c"]);
//! provider.push_event(ProviderEvent::LoggedIn(Ok(())));
//! // ... drive the jukebox, then inspect provider.take_commands()
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::provider::{
    PlaylistHandle, ProviderError, ProviderEvent, StreamingProvider, TrackError, TrackHandle,
};

/// A command the fake provider received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Subscribe(PlaylistHandle),
    Unsubscribe(PlaylistHandle),
    Load(TrackHandle),
    Play(bool),
    Unload,
    Remove {
        playlist: PlaylistHandle,
        positions: Vec<usize>,
    },
}

#[derive(Debug)]
struct FakePlaylist {
    handle: PlaylistHandle,
    name: String,
    tracks: Vec<TrackHandle>,
}

/// In-memory provider that records commands.
#[derive(Debug, Default)]
pub struct FakeProvider {
    playlists: Vec<FakePlaylist>,
    track_names: HashMap<TrackHandle, String>,
    broken: HashSet<TrackHandle>,
    subscribed: HashSet<PlaylistHandle>,
    commands: Vec<Command>,
    pending: Vec<ProviderEvent>,
    timeouts: VecDeque<Duration>,
    next_id: u64,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a playlist whose tracks are named by `tracks`.
    ///
    /// Track names are interned: the same name is the same handle everywhere.
    pub fn add_playlist(&mut self, name: &str, tracks: &[&str]) -> PlaylistHandle {
        self.next_id += 1;
        let handle = PlaylistHandle::from_raw(self.next_id);
        let tracks = tracks.iter().map(|t| self.intern(t)).collect();
        self.playlists.push(FakePlaylist {
            handle,
            name: name.to_string(),
            tracks,
        });
        handle
    }

    /// Handle for a track name (creating it if needed).
    pub fn track(&mut self, name: &str) -> TrackHandle {
        self.intern(name)
    }

    /// Change a playlist's name without emitting an event.
    pub fn rename(&mut self, playlist: PlaylistHandle, name: &str) {
        if let Some(pl) = self.find_mut(playlist) {
            pl.name = name.to_string();
        }
    }

    /// Insert tracks without emitting an event.
    pub fn insert_tracks(&mut self, playlist: PlaylistHandle, position: usize, tracks: &[&str]) {
        let handles: Vec<_> = tracks.iter().map(|t| self.intern(t)).collect();
        if let Some(pl) = self.find_mut(playlist) {
            let at = position.min(pl.tracks.len());
            pl.tracks.splice(at..at, handles);
        }
    }

    /// Remove positions without emitting an event.
    pub fn drop_positions(&mut self, playlist: PlaylistHandle, positions: &[usize]) {
        if let Some(pl) = self.find_mut(playlist) {
            let mut sorted = positions.to_vec();
            sorted.sort_unstable();
            for &p in sorted.iter().rev() {
                if p < pl.tracks.len() {
                    pl.tracks.remove(p);
                }
            }
        }
    }

    /// Give a track an error status.
    pub fn break_track(&mut self, name: &str) {
        let handle = self.intern(name);
        self.broken.insert(handle);
    }

    /// Queue an event for the next `process_events`.
    pub fn push_event(&mut self, event: ProviderEvent) {
        self.pending.push(event);
    }

    /// Script the timeouts `process_events` returns (default 1s).
    pub fn script_timeouts(&mut self, timeouts: &[Duration]) {
        self.timeouts.extend(timeouts.iter().copied());
    }

    pub fn is_subscribed(&self, playlist: PlaylistHandle) -> bool {
        self.subscribed.contains(&playlist)
    }

    /// Drain recorded commands.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    fn intern(&mut self, name: &str) -> TrackHandle {
        if let Some((&handle, _)) = self.track_names.iter().find(|(_, n)| n.as_str() == name) {
            return handle;
        }
        self.next_id += 1;
        let handle = TrackHandle::from_raw(self.next_id);
        self.track_names.insert(handle, name.to_string());
        handle
    }

    fn find(&self, playlist: PlaylistHandle) -> Option<&FakePlaylist> {
        self.playlists.iter().find(|p| p.handle == playlist)
    }

    fn find_mut(&mut self, playlist: PlaylistHandle) -> Option<&mut FakePlaylist> {
        self.playlists.iter_mut().find(|p| p.handle == playlist)
    }
}

impl StreamingProvider for FakeProvider {
    fn login(&mut self, username: &str, _password: &str) -> Result<(), ProviderError> {
        self.commands.push(Command::Login(username.to_string()));
        Ok(())
    }

    fn playlists(&self) -> Vec<PlaylistHandle> {
        self.playlists.iter().map(|p| p.handle).collect()
    }

    fn playlist_name(&self, playlist: PlaylistHandle) -> Option<String> {
        self.find(playlist).map(|p| p.name.clone())
    }

    fn playlist_len(&self, playlist: PlaylistHandle) -> usize {
        self.find(playlist).map_or(0, |p| p.tracks.len())
    }

    fn playlist_track(&self, playlist: PlaylistHandle, index: usize) -> Option<TrackHandle> {
        self.find(playlist).and_then(|p| p.tracks.get(index).copied())
    }

    fn track_name(&self, track: TrackHandle) -> Option<String> {
        self.track_names.get(&track).cloned()
    }

    fn track_error(&self, track: TrackHandle) -> Option<TrackError> {
        self.broken
            .contains(&track)
            .then(|| TrackError::Unavailable("broken in test".to_string()))
    }

    fn subscribe(&mut self, playlist: PlaylistHandle) {
        self.subscribed.insert(playlist);
        self.commands.push(Command::Subscribe(playlist));
    }

    fn unsubscribe(&mut self, playlist: PlaylistHandle) {
        self.subscribed.remove(&playlist);
        self.commands.push(Command::Unsubscribe(playlist));
    }

    fn load(&mut self, track: TrackHandle) -> Result<(), ProviderError> {
        self.commands.push(Command::Load(track));
        Ok(())
    }

    fn play(&mut self, playing: bool) {
        self.commands.push(Command::Play(playing));
    }

    fn unload(&mut self) {
        self.commands.push(Command::Unload);
    }

    fn remove_tracks(
        &mut self,
        playlist: PlaylistHandle,
        positions: &[usize],
    ) -> Result<(), ProviderError> {
        self.commands.push(Command::Remove {
            playlist,
            positions: positions.to_vec(),
        });
        if self.find(playlist).is_none() {
            return Err(ProviderError::UnknownPlaylist);
        }
        self.drop_positions(playlist, positions);
        self.pending.push(ProviderEvent::TracksRemoved {
            playlist,
            positions: positions.to_vec(),
        });
        Ok(())
    }

    fn process_events(&mut self, events: &mut Vec<ProviderEvent>) -> Duration {
        events.append(&mut self.pending);
        self.timeouts.pop_front().unwrap_or(Duration::from_secs(1))
    }
}

/// Write a 16-bit PCM WAV file with a quiet ramp signal.
pub fn write_wav(path: &std::path::Path, sample_rate: u32, channels: u16, frames: usize) {
    let data_len = (frames * channels as usize * 2) as u32;
    let byte_rate = sample_rate * channels as u32 * 2;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&(channels * 2).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for frame in 0..frames {
        let sample = ((frame % 200) as i16 - 100) * 50;
        for _ in 0..channels {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    std::fs::write(path, bytes).unwrap();
}
