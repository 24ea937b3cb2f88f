//! Streamer thread: decodes the loaded track and delivers PCM through the
//! provider callbacks, one block at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::{AudioFormat, BLOCK_FRAMES, CHANNELS, SAMPLE_RATE};
use crate::provider::{ProviderCallbacks, TrackError};

use super::decoder::{TrackDecoder, to_i16};
use super::resampler::Resampler;

/// Sleep between attempts when delivery is refused or playback is paused.
const BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Default)]
struct Control {
    playing: AtomicBool,
    stop: AtomicBool,
}

/// Handle to a running streamer. Dropping it stops and joins the thread.
pub struct Streamer {
    control: Arc<Control>,
    thread: Option<JoinHandle<()>>,
}

impl Streamer {
    /// Start a paused streamer for `decoder`.
    pub fn spawn(
        decoder: TrackDecoder,
        callbacks: Arc<dyn ProviderCallbacks>,
    ) -> Result<Self, TrackError> {
        let resampler = Resampler::new(decoder.sample_rate(), SAMPLE_RATE)?;
        let control = Arc::new(Control::default());

        let thread = thread::Builder::new()
            .name("streamer".to_string())
            .spawn({
                let control = Arc::clone(&control);
                move || stream(decoder, resampler, callbacks, control)
            })
            .map_err(|e| TrackError::Unplayable(format!("cannot start streamer: {}", e)))?;

        Ok(Self {
            control,
            thread: Some(thread),
        })
    }

    pub fn set_playing(&self, playing: bool) {
        self.control.playing.store(playing, Ordering::Release);
    }

    /// Stop delivering and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.control.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!(target: "provider::local::streamer", "Streamer thread panicked");
        }
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stream(
    mut decoder: TrackDecoder,
    mut resampler: Resampler,
    callbacks: Arc<dyn ProviderCallbacks>,
    control: Arc<Control>,
) {
    let channels = CHANNELS as usize;
    let mut pending: Vec<i16> = Vec::new();
    let mut offset = 0;
    let mut drained = false;

    while !control.stop.load(Ordering::Acquire) {
        if !control.playing.load(Ordering::Acquire) {
            thread::sleep(BACKOFF);
            continue;
        }

        // Whole blocks only, except for the tail of the track
        let available = (pending.len() - offset) / channels;
        if available >= BLOCK_FRAMES || (drained && available > 0) {
            let frames = available.min(BLOCK_FRAMES);
            let end = offset + frames * channels;
            let consumed =
                callbacks.music_delivery(&AudioFormat::JUKEBOX, &pending[offset..end], frames);
            if consumed == 0 {
                tracing::trace!(target: "provider::local::streamer", "Delivery refused, backing off");
                thread::sleep(BACKOFF);
            } else {
                offset += consumed.min(frames) * channels;
            }
            continue;
        }

        if drained {
            tracing::debug!(target: "provider::local::streamer", "End of track");
            callbacks.end_of_track();
            return;
        }

        pending.drain(..offset);
        offset = 0;

        match decoder.next_stereo() {
            Ok(Some(samples)) => pending.extend(to_i16(&resampler.process(&samples))),
            Ok(None) => {
                drained = true;
                pending.extend(to_i16(&resampler.flush()));
            }
            Err(e) => {
                tracing::warn!(target: "provider::local::streamer", "Decoding stopped: {}", e);
                drained = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::StagingQueue;
    use crate::jukebox::{Bridge, NotifyGate};
    use crate::test_utils::write_wav;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<usize>,
        refusals: AtomicUsize,
        ended: AtomicBool,
    }

    impl ProviderCallbacks for Recorder {
        fn notify_main_thread(&self) {}

        fn music_delivery(&self, format: &AudioFormat, samples: &[i16], frame_count: usize) -> usize {
            assert_eq!(*format, AudioFormat::JUKEBOX);
            assert!(frame_count <= BLOCK_FRAMES);
            assert_eq!(samples.len(), frame_count * 2);
            // Refuse every other offer to exercise the retry path
            if self.refusals.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                return 0;
            }
            *self.frames.lock() += frame_count;
            frame_count
        }

        fn end_of_track(&self) {
            self.ended.store(true, Ordering::SeqCst);
        }
    }

    fn wait_for_end(recorder: &Recorder) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !recorder.ended.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline, "track never ended");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_streams_whole_track_then_ends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 44_100, 2, 5_000);

        let recorder = Arc::new(Recorder::default());
        let decoder = TrackDecoder::open(&path).unwrap();
        let streamer = Streamer::spawn(decoder, recorder.clone()).unwrap();
        streamer.set_playing(true);

        wait_for_end(&recorder);
        streamer.stop();
        assert_eq!(*recorder.frames.lock(), 5_000);
    }

    #[test]
    fn test_mono_48k_is_converted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 48_000, 1, 9_600);

        let recorder = Arc::new(Recorder::default());
        let streamer =
            Streamer::spawn(TrackDecoder::open(&path).unwrap(), recorder.clone()).unwrap();
        streamer.set_playing(true);

        wait_for_end(&recorder);
        drop(streamer);
        // 200ms at 44.1kHz, give or take filter delay
        let frames = *recorder.frames.lock();
        assert!(frames > 7_000 && frames <= 9_000, "got {frames} frames");
    }

    /// Stream `path` into a real staging queue and return it once the track ends.
    fn stage_track(path: &std::path::Path) -> Arc<StagingQueue> {
        let queue = Arc::new(StagingQueue::new(10_000));
        let gate = Arc::new(NotifyGate::new());
        let bridge = Arc::new(Bridge::new(Arc::clone(&queue), Arc::clone(&gate)));

        let streamer = Streamer::spawn(TrackDecoder::open(path).unwrap(), bridge).unwrap();
        streamer.set_playing(true);

        let deadline = Instant::now() + Duration::from_secs(10);
        while !gate.playback_done() {
            assert!(Instant::now() < deadline, "track never ended");
            thread::sleep(Duration::from_millis(5));
        }
        streamer.stop();
        queue
    }

    fn silent_tail(queue: &StagingQueue) -> Vec<usize> {
        let mut tails = Vec::new();
        while let Some(block) = queue.pop_or_silence() {
            let frames = block.samples().chunks_exact(2);
            tails.push(frames.rev().take_while(|f| f.iter().all(|&s| s == 0)).count());
        }
        tails
    }

    #[test]
    fn test_only_last_block_is_padded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("second.wav");
        write_wav(&path, 44_100, 2, 44_100);

        let tails = silent_tail(&stage_track(&path));

        assert_eq!(tails.len(), 44_100usize.div_ceil(BLOCK_FRAMES));
        let (last, full) = tails.split_last().unwrap();
        assert!(full.iter().all(|&t| t == 0), "padding inside track: {full:?}");
        assert_eq!(*last, 22 * BLOCK_FRAMES - 44_100);
    }

    #[test]
    fn test_resampled_track_fills_whole_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("second48.wav");
        write_wav(&path, 48_000, 2, 48_000);

        let queue = stage_track(&path);
        let blocks = queue.len();
        assert!((20..=22).contains(&blocks), "got {blocks} blocks");
    }

    #[test]
    fn test_paused_streamer_delivers_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 44_100, 2, 1_000);

        let recorder = Arc::new(Recorder::default());
        let streamer =
            Streamer::spawn(TrackDecoder::open(&path).unwrap(), recorder.clone()).unwrap();

        thread::sleep(Duration::from_millis(60));
        streamer.stop();
        assert_eq!(recorder.refusals.load(Ordering::SeqCst), 0);
        assert!(!recorder.ended.load(Ordering::SeqCst));
    }
}
