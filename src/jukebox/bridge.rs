//! Provider callbacks wired to the staging queue and the notify gate.

use std::sync::Arc;

use crate::audio::{AudioFormat, StagingQueue};
use crate::provider::ProviderCallbacks;

use super::{Halt, NotifyGate};

/// Receives provider callbacks on provider-owned threads.
#[derive(Debug, Clone)]
pub struct Bridge {
    queue: Arc<StagingQueue>,
    gate: Arc<NotifyGate>,
}

impl Bridge {
    pub fn new(queue: Arc<StagingQueue>, gate: Arc<NotifyGate>) -> Self {
        Self { queue, gate }
    }
}

impl ProviderCallbacks for Bridge {
    fn notify_main_thread(&self) {
        self.gate.notify();
    }

    fn music_delivery(&self, format: &AudioFormat, samples: &[i16], frame_count: usize) -> usize {
        match self.queue.deliver(format, samples, frame_count) {
            Ok(consumed) => consumed,
            Err(e) => {
                tracing::error!("Refusing audio delivery: {}", e);
                self.gate.halt(Halt::Fatal(e.to_string()));
                0
            }
        }
    }

    fn end_of_track(&self) {
        self.gate.signal_end_of_track();
    }
}
