//! Events a provider reports on the control loop thread.

use super::{LoginError, PlaylistHandle, TrackHandle};

/// Every provider notification the jukebox reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Outcome of [`super::StreamingProvider::login`]
    LoggedIn(Result<(), LoginError>),
    /// Track metadata became available
    MetadataUpdated,
    /// Another client took over playback on this account
    PlayTokenLost,
    /// The loaded track finished (raised through the notify gate)
    EndOfTrack,
    /// Tracks were inserted at `position`
    TracksAdded {
        playlist: PlaylistHandle,
        tracks: Vec<TrackHandle>,
        position: usize,
    },
    /// Tracks at `positions` (indices before the removal) were removed
    TracksRemoved {
        playlist: PlaylistHandle,
        positions: Vec<usize>,
    },
    /// Tracks at `positions` were moved to `new_position`
    TracksMoved {
        playlist: PlaylistHandle,
        positions: Vec<usize>,
        new_position: usize,
    },
    /// The playlist's name changed
    PlaylistRenamed { playlist: PlaylistHandle },
    /// A playlist appeared in the container
    PlaylistAdded {
        playlist: PlaylistHandle,
        position: usize,
    },
    /// A playlist left the container
    PlaylistRemoved {
        playlist: PlaylistHandle,
        position: usize,
    },
    /// The container is fully synchronized
    ContainerLoaded { playlists: usize },
}

impl ProviderEvent {
    /// Playlist this event is scoped to, if any.
    pub fn playlist(&self) -> Option<PlaylistHandle> {
        match self {
            Self::TracksAdded { playlist, .. }
            | Self::TracksRemoved { playlist, .. }
            | Self::TracksMoved { playlist, .. }
            | Self::PlaylistRenamed { playlist } => Some(*playlist),
            _ => None,
        }
    }
}
