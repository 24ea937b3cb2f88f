//! Jukebox state as seen from outside the state machine.

use std::fmt;

/// Coarse playback state derived from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JukeboxState {
    /// No playlist matches the target name
    #[default]
    Unbound,
    /// Playlist bound, but empty or the index is past the last track
    Idle,
    /// A track is loaded and playing
    Playing,
}

impl fmt::Display for JukeboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unbound => "unbound",
            Self::Idle => "idle",
            Self::Playing => "playing",
        };
        f.write_str(s)
    }
}

/// Playlist names match case-insensitively.
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
