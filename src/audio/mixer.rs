//! Fade-in mixer run from the audio device's pull callback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::format::BLOCK_SAMPLES;
use super::staging::StagingQueue;
use crate::jukebox::NotifyGate;

/// Fade-in applied from process start.
pub const DEFAULT_FADE_IN: Duration = Duration::from_secs(10);

/// Gain at `elapsed` for a linear fade-in of length `fade`.
///
/// 0.0 at the start, 1.0 from `fade` onwards.
pub fn fade_gain(elapsed: Duration, fade: Duration) -> f32 {
    if fade.is_zero() || elapsed >= fade {
        1.0
    } else {
        (elapsed.as_secs_f64() / fade.as_secs_f64()) as f32
    }
}

/// Pulls one staged block per call and writes it at the fade-in gain.
///
/// Never blocks on anything but the queue's short critical section and
/// never allocates when it outputs silence.
pub struct FadeMixer {
    queue: Arc<StagingQueue>,
    gate: Arc<NotifyGate>,
    started: Instant,
    fade_in: Duration,
}

impl FadeMixer {
    pub fn new(queue: Arc<StagingQueue>, gate: Arc<NotifyGate>, fade_in: Duration) -> Self {
        Self {
            queue,
            gate,
            started: Instant::now(),
            fade_in,
        }
    }

    /// Fill one block-sized output buffer.
    pub fn mix(&self, out: &mut [i16]) {
        self.mix_at(out, self.started.elapsed());
    }

    fn mix_at(&self, out: &mut [i16], elapsed: Duration) {
        debug_assert_eq!(out.len(), BLOCK_SAMPLES);
        out.fill(0);

        if self.gate.playback_done() {
            return;
        }

        let Some(block) = self.queue.pop_or_silence() else {
            tracing::trace!("Staging queue empty, emitting silence");
            return;
        };

        let gain = fade_gain(elapsed, self.fade_in);
        for (dst, &src) in out.iter_mut().zip(block.samples()) {
            let mixed = *dst as f32 + src as f32 * gain;
            *dst = mixed.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        }
    }
}
