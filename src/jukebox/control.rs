//! The control loop: the only thread that touches the provider and the session.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::provider::{ProviderEvent, StreamingProvider};

use super::{Halt, Jukebox, NotifyGate};

/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Waits on the gate, then drives the provider's event processing.
pub struct ControlLoop<P> {
    gate: Arc<NotifyGate>,
    provider: P,
    jukebox: Jukebox,
    events: Vec<ProviderEvent>,
    /// `None` until the provider has named a timeout: wait for a notify
    next_timeout: Option<Duration>,
}

impl<P: StreamingProvider> ControlLoop<P> {
    pub fn new(provider: P, jukebox: Jukebox, gate: Arc<NotifyGate>) -> Self {
        Self {
            gate,
            provider,
            jukebox,
            events: Vec::new(),
            next_timeout: None,
        }
    }

    /// Run until shutdown is requested or a fatal error occurs.
    pub fn run(&mut self) -> Result<()> {
        tracing::debug!("Control loop started");
        while self.step()? == Flow::Continue {}
        tracing::debug!("Control loop stopped");
        Ok(())
    }

    /// Wait for a wakeup and handle everything it carries.
    pub fn step(&mut self) -> Result<Flow> {
        let wake = self.gate.wait(self.next_timeout);

        match wake.halt {
            Some(Halt::Shutdown) => {
                tracing::info!("Shutting down");
                self.provider.unload();
                return Ok(Flow::Stop);
            }
            Some(Halt::Fatal(message)) => {
                self.provider.unload();
                return Err(Error::playback(message));
            }
            None => {}
        }

        if wake.track_ended {
            self.jukebox
                .handle(&mut self.provider, ProviderEvent::EndOfTrack)?;
            self.gate.clear_playback_done();
        }

        self.pump()?;
        Ok(Flow::Continue)
    }

    /// Process provider events until it asks for a non-zero pause.
    fn pump(&mut self) -> Result<()> {
        loop {
            let timeout = self.provider.process_events(&mut self.events);
            for event in self.events.drain(..) {
                tracing::trace!(?event, "Provider event");
                self.jukebox.handle(&mut self.provider, event)?;
            }
            if !timeout.is_zero() {
                self.next_timeout = Some(timeout);
                return Ok(());
            }
        }
    }

    pub fn jukebox(&self) -> &Jukebox {
        &self.jukebox
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Timeout for the next wait, as last reported by the provider.
    pub fn next_timeout(&self) -> Option<Duration> {
        self.next_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::StagingQueue;
    use crate::jukebox::JukeboxState;
    use crate::provider::LoginError;
    use crate::test_utils::{Command, FakeProvider};
    use std::thread;

    fn control_loop(provider: FakeProvider, delete_played: bool) -> ControlLoop<FakeProvider> {
        let queue = Arc::new(StagingQueue::new(4));
        let jukebox = Jukebox::new("Party", delete_played, queue);
        ControlLoop::new(provider, jukebox, Arc::new(NotifyGate::new()))
    }

    fn logged_in(tracks: &[&str], delete_played: bool) -> ControlLoop<FakeProvider> {
        let mut provider = FakeProvider::new();
        provider.add_playlist("Party", tracks);
        provider.push_event(ProviderEvent::LoggedIn(Ok(())));
        let mut cl = control_loop(provider, delete_played);
        cl.gate.notify();
        assert_eq!(cl.step().unwrap(), Flow::Continue);
        cl.provider_mut().take_commands();
        cl
    }

    #[test]
    fn test_notify_runs_event_processing() {
        let cl = logged_in(&["a", "b"], false);
        assert_eq!(cl.jukebox().state(), JukeboxState::Playing);
        assert_eq!(cl.next_timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_timeout_processes_again() {
        let mut provider = FakeProvider::new();
        provider.script_timeouts(&[Duration::ZERO, Duration::ZERO, Duration::from_millis(250)]);
        let mut cl = control_loop(provider, false);

        cl.gate.notify();
        cl.step().unwrap();
        assert_eq!(cl.next_timeout(), Some(Duration::from_millis(250)));

        // Scripted timeouts are used up; the default applies again
        cl.gate.notify();
        cl.step().unwrap();
        assert_eq!(cl.next_timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_end_of_track_advances_and_clears_done_flag() {
        let mut cl = logged_in(&["a", "b"], false);
        let b = cl.provider_mut().track("b");

        cl.gate.signal_end_of_track();
        cl.step().unwrap();

        assert_eq!(cl.jukebox().session().index(), 1);
        assert_eq!(cl.jukebox().session().current_track(), Some(b));
        assert!(!cl.gate.playback_done());
    }

    #[test]
    fn test_deletion_completes_within_one_step() {
        let mut cl = logged_in(&["a", "b", "c"], true);
        let b = cl.provider_mut().track("b");

        cl.gate.signal_end_of_track();
        cl.step().unwrap();

        assert_eq!(cl.provider().playlist_len(cl.jukebox().session().playlist().unwrap()), 2);
        assert_eq!(cl.jukebox().session().index(), 0);
        assert_eq!(cl.jukebox().session().current_track(), Some(b));
    }

    #[test]
    fn test_shutdown_stops_loop() {
        let mut cl = logged_in(&["a"], false);
        cl.gate.request_shutdown();
        assert_eq!(cl.step().unwrap(), Flow::Stop);
        assert_eq!(cl.provider_mut().take_commands(), vec![Command::Unload]);
    }

    #[test]
    fn test_fatal_halt_is_an_error() {
        let mut cl = logged_in(&["a"], false);
        cl.gate.halt(Halt::Fatal("unsupported audio format".into()));
        let err = cl.step().unwrap_err();
        assert!(err.to_string().contains("unsupported audio format"));
    }

    #[test]
    fn test_login_failure_ends_run() {
        let mut provider = FakeProvider::new();
        provider.push_event(ProviderEvent::LoggedIn(Err(LoginError::BadCredentials)));
        let mut cl = control_loop(provider, false);
        cl.gate.notify();

        let err = cl.run().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_LOGIN_FAILED);
    }

    #[test]
    fn test_run_returns_after_shutdown_from_other_thread() {
        let mut cl = logged_in(&["a"], false);
        let gate = Arc::clone(&cl.gate);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            gate.request_shutdown();
        });

        cl.run().unwrap();
        handle.join().unwrap();
    }
}
