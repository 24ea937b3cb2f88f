//! Local audio side of the jukebox.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Provider delivery thread    │  music_delivery(format, samples, frames)
//! └──────────────┬───────────────┘
//!                │ StagingQueue::deliver (whole blocks, backpressure at capacity)
//!                ▼
//! ┌──────────────────────────────┐
//! │  StagingQueue (~1s of audio) │
//! └──────────────┬───────────────┘
//!                │ FadeMixer::mix (one block per pull, never waits)
//!                ▼
//! ┌──────────────────────────────┐
//! │  cpal output callback        │
//! └──────────────────────────────┘
//! ```

mod format;
mod mixer;
mod output;
mod staging;

pub use format::{
    AudioFormat, BLOCK_FRAMES, BLOCK_SAMPLES, CHANNELS, DEFAULT_QUEUE_BLOCKS, FormatMismatch,
    SAMPLE_RATE, SampleType,
};
pub use mixer::{DEFAULT_FADE_IN, FadeMixer, fade_gain};
pub use output::{AudioError, AudioOutput, list_audio_devices};
pub use staging::{AudioBlock, StagingQueue};
