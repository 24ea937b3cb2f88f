//! Sample rate conversion to 44.1 kHz with rubato.

use rubato::{FftFixedIn, Resampler as RubatoResampler};

use crate::provider::TrackError;

/// Input frames per rubato call. Larger is cheaper but adds latency.
const CHUNK_FRAMES: usize = 1024;

/// Interleaved stereo resampler. Passes samples through when rates match.
pub struct Resampler {
    resampler: Option<FftFixedIn<f32>>,
    input_rate: u32,
    output_rate: u32,
    /// Per-channel input waiting for a full chunk
    pending: [Vec<f32>; 2],
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self, TrackError> {
        let resampler = if input_rate == output_rate {
            None
        } else {
            let fft = FftFixedIn::<f32>::new(
                input_rate as usize,
                output_rate as usize,
                CHUNK_FRAMES,
                2,
                2,
            )
            .map_err(|e| TrackError::Unplayable(format!("cannot resample: {}", e)))?;

            tracing::debug!(
                target: "provider::local",
                "Resampler: {}Hz → {}Hz",
                input_rate,
                output_rate
            );
            Some(fft)
        };

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            pending: [Vec::new(), Vec::new()],
        })
    }

    fn ratio(&self) -> f64 {
        self.output_rate as f64 / self.input_rate as f64
    }

    /// Resample interleaved stereo. May return fewer frames than it was given;
    /// the rest stays buffered until the next call or [`Resampler::flush`].
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return input.to_vec();
        };

        for frame in input.chunks_exact(2) {
            self.pending[0].push(frame[0]);
            self.pending[1].push(frame[1]);
        }

        let mut output = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..CHUNK_FRAMES).collect())
                .collect();

            match resampler.process(&chunk, None) {
                Ok(resampled) => interleave_into(&resampled, usize::MAX, &mut output),
                Err(e) => tracing::warn!(target: "provider::local", "Resampling error: {}", e),
            }
        }
        output
    }

    /// Push out whatever is still buffered. Call once at end of stream.
    pub fn flush(&mut self) -> Vec<f32> {
        let ratio = self.ratio();
        let Some(resampler) = self.resampler.as_mut() else {
            return Vec::new();
        };

        let remaining = self.pending[0].len();
        if remaining == 0 {
            return Vec::new();
        }

        let chunk: Vec<Vec<f32>> = self
            .pending
            .iter_mut()
            .map(|ch| {
                let mut padded = std::mem::take(ch);
                padded.resize(CHUNK_FRAMES, 0.0);
                padded
            })
            .collect();

        let mut output = Vec::new();
        match resampler.process(&chunk, None) {
            Ok(resampled) => {
                // Only the non-padded portion
                let expected = (remaining as f64 * ratio).ceil() as usize;
                interleave_into(&resampled, expected, &mut output);
            }
            Err(e) => tracing::warn!(target: "provider::local", "Resampling flush error: {}", e),
        }
        output
    }
}

fn interleave_into(channels: &[Vec<f32>], max_frames: usize, output: &mut Vec<f32>) {
    let [left, right] = channels else {
        return;
    };
    let frames = left.len().min(right.len()).min(max_frames);
    output.reserve(frames * 2);
    for i in 0..frames {
        output.push(left[i]);
        output.push(right[i]);
    }
}
