//! Track decoding with symphonia.
//!
//! Supported formats:
//! - MP3
//! - FLAC
//! - OGG Vorbis
//! - WAV/PCM
//! - AAC (in MP4 container)

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use symphonia::core::sample::i24;

use crate::provider::TrackError;

/// Decoder for one track file, yielding interleaved stereo f32.
pub struct TrackDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    /// Name from tags found while probing (ID3 and friends)
    probed_name: Option<String>,
}

impl TrackDecoder {
    pub fn open(path: &Path) -> Result<Self, TrackError> {
        let file = File::open(path)
            .map_err(|e| TrackError::Unavailable(format!("{}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension() {
            hint.with_extension(&ext.to_string_lossy());
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let mut probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| TrackError::Unplayable(e.to_string()))?;

        let probed_name = probed
            .metadata
            .get()
            .and_then(|m| m.current().and_then(|rev| name_from_tags(rev.tags())));
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| TrackError::Unplayable("no audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| TrackError::Unplayable("unknown sample rate".to_string()))?;
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| TrackError::Unplayable(e.to_string()))?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            probed_name,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Display name from the file's tags: "Artist - Title" or just the title.
    pub fn tagged_name(&mut self) -> Option<String> {
        let from_container = self
            .reader
            .metadata()
            .current()
            .and_then(|rev| name_from_tags(rev.tags()));
        from_container.or_else(|| self.probed_name.clone())
    }

    /// Decode the next packet as interleaved stereo samples.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn next_stereo(&mut self) -> Result<Option<Vec<f32>>, TrackError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(TrackError::Unplayable(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                // Skip bad frame
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(TrackError::Unplayable(e.to_string())),
            };

            let interleaved = interleave(&decoded);
            return Ok(Some(to_stereo(&interleaved, self.channels)));
        }
    }
}

fn name_from_tags(tags: &[Tag]) -> Option<String> {
    let mut title = None;
    let mut artist = None;
    for tag in tags {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) => title = Some(tag.value.to_string()),
            Some(StandardTagKey::Artist) => artist = Some(tag.value.to_string()),
            _ => {}
        }
    }

    match (artist, title) {
        (Some(artist), Some(title)) => Some(format!("{} - {}", artist, title)),
        (None, Some(title)) => Some(title),
        _ => None,
    }
}

/// Interleave a decoded buffer as f32 in [-1, 1].
fn interleave(buffer: &AudioBufferRef) -> Vec<f32> {
    fn collect<S: Copy>(planes: &[&[S]], frames: usize, conv: impl Fn(S) -> f32) -> Vec<f32> {
        let mut output = Vec::with_capacity(frames * planes.len());
        for frame in 0..frames {
            for plane in planes {
                output.push(conv(plane[frame]));
            }
        }
        output
    }

    match buffer {
        AudioBufferRef::F32(buf) => collect(buf.planes().planes(), buf.frames(), |s: f32| s),
        AudioBufferRef::S16(buf) => {
            collect(buf.planes().planes(), buf.frames(), |s: i16| s as f32 / 32768.0)
        }
        AudioBufferRef::S24(buf) => collect(buf.planes().planes(), buf.frames(), |s: i24| {
            s.0 as f32 / 8_388_608.0
        }),
        AudioBufferRef::S32(buf) => collect(buf.planes().planes(), buf.frames(), |s: i32| {
            s as f32 / 2_147_483_648.0
        }),
        AudioBufferRef::U8(buf) => collect(buf.planes().planes(), buf.frames(), |s: u8| {
            (s as f32 - 128.0) / 128.0
        }),
        _ => Vec::new(),
    }
}

/// Mono is duplicated, channels past the second are dropped.
pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Convert f32 in [-1, 1] to i16, clamping overs.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}
