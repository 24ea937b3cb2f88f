//! The single PCM format the jukebox accepts and plays.

use std::fmt;

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Interleaved channel count (stereo).
pub const CHANNELS: u16 = 2;

/// Frames per channel in one audio block (one hardware pull period).
pub const BLOCK_FRAMES: usize = 2048;

/// Interleaved samples in one audio block.
pub const BLOCK_SAMPLES: usize = BLOCK_FRAMES * CHANNELS as usize;

/// Default staging queue capacity: one second of audio, in whole blocks.
pub const DEFAULT_QUEUE_BLOCKS: usize = SAMPLE_RATE as usize / BLOCK_FRAMES;

/// Sample encoding declared by a provider when it delivers PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// Signed 16-bit, native endianness
    Int16NativeEndian,
    /// 32-bit float
    Float32,
}

/// Format of a PCM delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_type: SampleType,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// The only format the staging queue accepts.
    pub const JUKEBOX: Self = Self {
        sample_type: SampleType::Int16NativeEndian,
        sample_rate: SAMPLE_RATE,
        channels: CHANNELS,
    };

    /// Check this format against [`AudioFormat::JUKEBOX`].
    pub fn ensure_supported(&self) -> Result<(), FormatMismatch> {
        if *self == Self::JUKEBOX {
            Ok(())
        } else {
            Err(FormatMismatch {
                expected: Self::JUKEBOX,
                actual: *self,
            })
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sample_type {
            SampleType::Int16NativeEndian => "s16ne",
            SampleType::Float32 => "f32",
        };
        write!(f, "{}Hz / {}ch / {}", self.sample_rate, self.channels, kind)
    }
}

/// A provider delivered audio in a format other than [`AudioFormat::JUKEBOX`].
///
/// This is a configuration contract violation, never a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported audio format {actual} (expected {expected})")]
pub struct FormatMismatch {
    pub expected: AudioFormat,
    pub actual: AudioFormat,
}
