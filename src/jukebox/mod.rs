//! Jukebox core: keeps one named playlist playing.
//!
//! # Architecture
//!
//! ```text
//! provider threads ──notify / end_of_track──▶ NotifyGate
//!                                                 │ wait(timeout)
//!                                                 ▼
//!                                          ControlLoop (one thread)
//!                                                 │ ProviderEvent
//!                                                 ▼
//!                                   Jukebox::handle ──load/play/unload/remove──▶ provider
//! ```
//!
//! All playlist and session state lives in [`Jukebox`] and is only touched
//! by the control loop. Provider threads reach it exclusively through the
//! [`NotifyGate`] and events returned from `process_events`.

mod bridge;
mod control;
mod notify;
mod session;
mod state;

pub use bridge::Bridge;
pub use control::{ControlLoop, Flow};
pub use notify::{Halt, NotifyGate, Wakeup};
pub use session::PlaybackSession;
pub use state::{JukeboxState, names_match};

use std::sync::Arc;

use crate::audio::StagingQueue;
use crate::error::Result;
use crate::provider::{PlaylistHandle, ProviderEvent, StreamingProvider};

/// Playback state machine.
pub struct Jukebox {
    /// Playlist name to play (case-insensitive)
    target: String,
    /// Remove tracks from the playlist once they finish
    delete_played: bool,
    session: PlaybackSession,
    queue: Arc<StagingQueue>,
}

impl Jukebox {
    pub fn new(target: impl Into<String>, delete_played: bool, queue: Arc<StagingQueue>) -> Self {
        Self {
            target: target.into(),
            delete_played,
            session: PlaybackSession::new(),
            queue,
        }
    }

    /// Current coarse state.
    pub fn state(&self) -> JukeboxState {
        match (self.session.playlist(), self.session.current_track()) {
            (None, _) => JukeboxState::Unbound,
            (Some(_), Some(_)) => JukeboxState::Playing,
            (Some(_), None) => JukeboxState::Idle,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Single entry point for every provider event.
    ///
    /// Only a failed login is an error; everything else becomes a state change.
    pub fn handle<P>(&mut self, provider: &mut P, event: ProviderEvent) -> Result<()>
    where
        P: StreamingProvider + ?Sized,
    {
        match event {
            ProviderEvent::LoggedIn(Err(e)) => {
                tracing::error!("Login failed: {}", e);
                return Err(e.into());
            }
            ProviderEvent::LoggedIn(Ok(())) => self.logged_in(provider),
            ProviderEvent::MetadataUpdated => self.try_start(provider),
            ProviderEvent::PlayTokenLost => self.play_token_lost(provider),
            ProviderEvent::EndOfTrack => self.track_ended(provider),
            ProviderEvent::TracksAdded {
                playlist, tracks, ..
            } => {
                if self.session.is_bound_to(playlist) {
                    tracing::info!("{} tracks were added", tracks.len());
                    self.try_start(provider);
                }
            }
            ProviderEvent::TracksRemoved {
                playlist,
                positions,
            } => {
                if self.session.is_bound_to(playlist) {
                    self.session.shift_for_removed(&positions);
                    tracing::info!("{} tracks were removed", positions.len());
                    self.try_start(provider);
                }
            }
            ProviderEvent::TracksMoved {
                playlist,
                positions,
                ..
            } => {
                if self.session.is_bound_to(playlist) {
                    tracing::info!("{} tracks were moved around", positions.len());
                    self.try_start(provider);
                }
            }
            ProviderEvent::PlaylistRenamed { playlist } => self.playlist_renamed(provider, playlist),
            ProviderEvent::PlaylistAdded { playlist, .. } => self.playlist_added(provider, playlist),
            ProviderEvent::PlaylistRemoved { playlist, .. } => {
                self.playlist_removed(provider, playlist)
            }
            ProviderEvent::ContainerLoaded { playlists } => {
                tracing::info!("Rootlist synchronized ({} playlists)", playlists);
            }
        }
        Ok(())
    }

    /// Load-attempt: make the track at the current index the playing one.
    fn try_start<P>(&mut self, provider: &mut P)
    where
        P: StreamingProvider + ?Sized,
    {
        let Some(playlist) = self.session.playlist() else {
            return;
        };

        let len = provider.playlist_len(playlist);
        let candidate = if len == 0 {
            tracing::info!("No tracks in playlist. Waiting");
            None
        } else if self.session.index() >= len {
            tracing::info!("No more tracks in playlist. Waiting");
            None
        } else {
            provider.playlist_track(playlist, self.session.index())
        };

        if let Some(current) = self.session.current_track()
            && candidate != Some(current)
        {
            tracing::debug!("Track at index {} changed under us", self.session.index());
            self.stop_current(provider);
        }

        let Some(track) = candidate else {
            return;
        };

        if let Some(err) = provider.track_error(track) {
            tracing::debug!("Skipping load of track {:?}: {}", track, err);
            return;
        }

        if self.session.current_track() == Some(track) {
            return;
        }

        if let Err(e) = provider.load(track) {
            tracing::warn!("Could not load track {:?}: {}", track, e);
            return;
        }

        self.session.set_current(track);
        let name = provider.track_name(track).unwrap_or_default();
        tracing::info!("Now playing \"{}\"...", name);
        provider.play(true);
    }

    /// Handle end-of-track for the loaded track.
    fn track_ended<P>(&mut self, provider: &mut P)
    where
        P: StreamingProvider + ?Sized,
    {
        if self.session.take_current().is_none() {
            return;
        }
        provider.unload();

        if !self.delete_played {
            self.session.advance();
            self.try_start(provider);
            return;
        }

        // Always position 0, not the finished track's position. The index is
        // left alone; the provider's TracksRemoved drives the next load.
        if let Some(playlist) = self.session.playlist()
            && let Err(e) = provider.remove_tracks(playlist, &[0])
        {
            tracing::warn!("Failed to remove played track: {}", e);
        }
    }

    fn logged_in<P>(&mut self, provider: &mut P)
    where
        P: StreamingProvider + ?Sized,
    {
        let playlists = provider.playlists();
        tracing::info!("Looking at {} playlists", playlists.len());

        for playlist in playlists {
            provider.subscribe(playlist);
            if self.session.playlist().is_none() && self.matches_target(provider, playlist) {
                self.session.bind(playlist);
                tracing::info!("Found playlist \"{}\"", self.target);
                self.try_start(provider);
            }
        }

        if self.session.playlist().is_none() {
            tracing::info!("No such playlist. Waiting for one to pop up...");
        }
    }

    fn playlist_added<P>(&mut self, provider: &mut P, playlist: PlaylistHandle)
    where
        P: StreamingProvider + ?Sized,
    {
        provider.subscribe(playlist);
        if self.session.playlist().is_none() && self.matches_target(provider, playlist) {
            tracing::info!("Playlist \"{}\" appeared", self.target);
            self.session.bind(playlist);
            self.try_start(provider);
        }
    }

    fn playlist_removed<P>(&mut self, provider: &mut P, playlist: PlaylistHandle)
    where
        P: StreamingProvider + ?Sized,
    {
        provider.unsubscribe(playlist);
        if self.session.is_bound_to(playlist) {
            tracing::info!("Current playlist was removed");
            self.unbind(provider);
        }
    }

    fn playlist_renamed<P>(&mut self, provider: &mut P, playlist: PlaylistHandle)
    where
        P: StreamingProvider + ?Sized,
    {
        let name = provider.playlist_name(playlist).unwrap_or_default();

        if names_match(&name, &self.target) {
            self.session.bind(playlist);
            self.try_start(provider);
        } else if self.session.is_bound_to(playlist) {
            tracing::info!("Current playlist renamed to \"{}\".", name);
            self.unbind(provider);
        }
    }

    fn play_token_lost<P>(&mut self, provider: &mut P)
    where
        P: StreamingProvider + ?Sized,
    {
        tracing::warn!("Playback stopped: the account is playing somewhere else");
        self.queue.flush();
        if self.session.take_current().is_some() {
            provider.unload();
        }
    }

    fn stop_current<P>(&mut self, provider: &mut P)
    where
        P: StreamingProvider + ?Sized,
    {
        self.queue.flush();
        provider.unload();
        self.session.take_current();
    }

    fn unbind<P>(&mut self, provider: &mut P)
    where
        P: StreamingProvider + ?Sized,
    {
        if self.session.unbind().is_some() {
            self.queue.flush();
        }
        provider.unload();
    }

    fn matches_target<P>(&self, provider: &P, playlist: PlaylistHandle) -> bool
    where
        P: StreamingProvider + ?Sized,
    {
        provider
            .playlist_name(playlist)
            .is_some_and(|name| names_match(&name, &self.target))
    }
}
