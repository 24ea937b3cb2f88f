//! Streaming provider capability.
//!
//! The jukebox core never depends on a concrete streaming service. It talks
//! to a [`StreamingProvider`] through opaque handles and commands, and the
//! provider talks back in two ways:
//!
//! - [`ProviderCallbacks`]: invoked from threads the provider owns (PCM
//!   delivery, end of track, "please run my event loop").
//! - [`ProviderEvent`]: returned from [`StreamingProvider::process_events`]
//!   on the control loop thread (login, playlist and container changes).
//!
//! [`local::LocalProvider`] implements the capability over a TOML library
//! manifest and local audio files.

mod events;
pub mod local;

pub use events::ProviderEvent;

use std::time::Duration;

use crate::audio::AudioFormat;

/// Opaque identity of a track. Only compared, never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle(u64);

impl TrackHandle {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Opaque identity of a playlist. Only compared, never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaylistHandle(u64);

impl PlaylistHandle {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Why a track cannot be played.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    #[error("track is not available: {0}")]
    Unavailable(String),

    #[error("track could not be decoded: {0}")]
    Unplayable(String),
}

/// Login failure reasons.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("bad username or password")]
    BadCredentials,

    #[error("login failed: {0}")]
    Other(String),
}

/// Provider errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Unable to create session: {0}")]
    Session(String),

    #[error("Unknown track")]
    UnknownTrack,

    #[error("Unknown playlist")]
    UnknownPlaylist,

    #[error("Failed to load track: {0}")]
    Load(#[from] TrackError),

    #[error("Failed to update library: {0}")]
    Library(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Calls a provider makes from its own threads.
///
/// Implementations must be cheap and must never block indefinitely.
pub trait ProviderCallbacks: Send + Sync {
    /// The provider has work for [`StreamingProvider::process_events`].
    fn notify_main_thread(&self);

    /// Offer `frame_count` interleaved frames. Returns the number of frames
    /// consumed; 0 means "not now, offer the same data again later".
    fn music_delivery(&self, format: &AudioFormat, samples: &[i16], frame_count: usize) -> usize;

    /// The loaded track has delivered all of its audio.
    fn end_of_track(&self);
}

/// Commands and queries the jukebox issues to a streaming provider.
///
/// All methods are called from the control loop thread.
pub trait StreamingProvider {
    /// Start logging in. The outcome arrives as [`ProviderEvent::LoggedIn`].
    fn login(&mut self, username: &str, password: &str) -> Result<(), ProviderError>;

    /// Playlists in the account's container, in container order.
    fn playlists(&self) -> Vec<PlaylistHandle>;

    fn playlist_name(&self, playlist: PlaylistHandle) -> Option<String>;

    /// Number of tracks in `playlist` (0 for unknown playlists).
    fn playlist_len(&self, playlist: PlaylistHandle) -> usize;

    /// Track at `index`, if there is one.
    fn playlist_track(&self, playlist: PlaylistHandle, index: usize) -> Option<TrackHandle>;

    fn track_name(&self, track: TrackHandle) -> Option<String>;

    /// `None` when the track is playable.
    fn track_error(&self, track: TrackHandle) -> Option<TrackError>;

    /// Receive playlist-scoped events for `playlist`.
    fn subscribe(&mut self, playlist: PlaylistHandle);

    fn unsubscribe(&mut self, playlist: PlaylistHandle);

    /// Make `track` the player's track, replacing any loaded one.
    fn load(&mut self, track: TrackHandle) -> Result<(), ProviderError>;

    /// Start or pause delivery of the loaded track.
    fn play(&mut self, playing: bool);

    /// Stop and forget the loaded track.
    fn unload(&mut self);

    /// Remove the tracks at `positions` from `playlist`.
    fn remove_tracks(
        &mut self,
        playlist: PlaylistHandle,
        positions: &[usize],
    ) -> Result<(), ProviderError>;

    /// Run pending internal work, appending resulting events to `events`.
    ///
    /// Returns how long until this should be called again; zero means more
    /// work is already waiting.
    fn process_events(&mut self, events: &mut Vec<ProviderEvent>) -> Duration;
}
