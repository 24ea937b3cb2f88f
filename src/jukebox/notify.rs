//! Cross-thread wakeup for the control loop.
//!
//! Provider callbacks run on threads the provider owns. They never touch the
//! playback session directly; they raise a flag here and the control loop
//! picks it up. Flags are read and cleared together under the lock, so a
//! signal is never lost and never handled twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Reason the control loop must stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Orderly shutdown (Ctrl-C)
    Shutdown,
    /// Unrecoverable error raised from a callback thread
    Fatal(String),
}

/// What the control loop observed when it woke.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wakeup {
    /// The provider asked for its event loop to run
    pub work_pending: bool,
    /// The loaded track finished
    pub track_ended: bool,
    /// Stop request, if any
    pub halt: Option<Halt>,
}

#[derive(Debug, Default)]
struct Flags {
    work_pending: bool,
    track_ended: bool,
    halt: Option<Halt>,
}

impl Flags {
    fn raised(&self) -> bool {
        self.work_pending || self.track_ended || self.halt.is_some()
    }
}

/// Flag + condition pair shared by provider threads and the control loop.
#[derive(Debug, Default)]
pub struct NotifyGate {
    flags: Mutex<Flags>,
    cond: Condvar,
    /// Lock-free mirror of "track ended, not yet handled" for the mixer
    playback_done: AtomicBool,
}

impl NotifyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the control loop to run the provider's event processing.
    pub fn notify(&self) {
        let mut flags = self.flags.lock();
        flags.work_pending = true;
        self.cond.notify_one();
    }

    /// Report that the loaded track has played to the end.
    pub fn signal_end_of_track(&self) {
        let mut flags = self.flags.lock();
        flags.track_ended = true;
        self.playback_done.store(true, Ordering::Release);
        self.cond.notify_one();
    }

    /// Ask the control loop to stop. The first halt reason wins.
    pub fn halt(&self, reason: Halt) {
        let mut flags = self.flags.lock();
        if flags.halt.is_none() {
            flags.halt = Some(reason);
        }
        self.cond.notify_one();
    }

    /// Orderly shutdown request.
    pub fn request_shutdown(&self) {
        self.halt(Halt::Shutdown);
    }

    /// Block until a flag is raised or `timeout` elapses.
    ///
    /// `None` or a zero timeout waits indefinitely. Raised flags are returned
    /// and cleared; a halt stays set.
    pub fn wait(&self, timeout: Option<Duration>) -> Wakeup {
        let mut flags = self.flags.lock();

        match timeout.filter(|t| !t.is_zero()) {
            None => {
                while !flags.raised() {
                    self.cond.wait(&mut flags);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !flags.raised() {
                    if self.cond.wait_until(&mut flags, deadline).timed_out() {
                        break;
                    }
                }
            }
        }

        Wakeup {
            work_pending: std::mem::take(&mut flags.work_pending),
            track_ended: std::mem::take(&mut flags.track_ended),
            halt: flags.halt.clone(),
        }
    }

    /// True between end-of-track and the control loop handling it.
    pub fn playback_done(&self) -> bool {
        self.playback_done.load(Ordering::Acquire)
    }

    /// Called by the control loop once end-of-track has been handled.
    pub fn clear_playback_done(&self) {
        self.playback_done.store(false, Ordering::Release);
    }
}
