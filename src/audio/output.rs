//! Audio output using cpal.
//!
//! The device is opened at the jukebox format (44.1kHz stereo). Its callback
//! pulls whole blocks through the [`FadeMixer`]; when the device asks for a
//! buffer size other than one block, the remainder of the current block is
//! carried over to the next callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedBufferSize};

use super::format::{BLOCK_FRAMES, BLOCK_SAMPLES, CHANNELS, SAMPLE_RATE};
use super::mixer::FadeMixer;

/// Audio output errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioError {
    #[error("Audio output initialization failed: {0}")]
    Init(String),

    #[error("Output device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device {device} cannot play {rate}Hz stereo")]
    UnsupportedDevice { device: String, rate: u32 },
}

/// Open audio device, pulling from a [`FadeMixer`] until closed.
pub struct AudioOutput {
    stream: Stream,
    device_name: String,
}

impl AudioOutput {
    /// Open `device_name` (empty = system default) and start pulling.
    pub fn open(device_name: &str, mixer: FadeMixer) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = Self::select_device(&host, device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!("Using audio device: {}", name);

        let supported = device
            .supported_output_configs()
            .map_err(|e| AudioError::Init(e.to_string()))?
            .filter(|range| {
                range.channels() == CHANNELS
                    && range.min_sample_rate().0 <= SAMPLE_RATE
                    && range.max_sample_rate().0 >= SAMPLE_RATE
            })
            .max_by_key(|range| format_preference(range.sample_format()))
            .ok_or_else(|| AudioError::UnsupportedDevice {
                device: name.clone(),
                rate: SAMPLE_RATE,
            })?
            .with_sample_rate(cpal::SampleRate(SAMPLE_RATE));

        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min..=*max).contains(&(BLOCK_FRAMES as u32)) =>
            {
                BufferSize::Fixed(BLOCK_FRAMES as u32)
            }
            _ => BufferSize::Default,
        };

        let config = StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size,
        };

        tracing::info!(
            "Audio format: {}Hz, {} channels, {:?}, buffer {:?}",
            SAMPLE_RATE,
            CHANNELS,
            supported.sample_format(),
            buffer_size
        );

        let pump = BlockPump::new(mixer);
        let stream = match supported.sample_format() {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, pump),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, pump),
            SampleFormat::F32 => build_stream::<f32>(&device, &config, pump),
            format => {
                return Err(AudioError::Init(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        }
        .map_err(|e| AudioError::Init(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Init(e.to_string()))?;

        Ok(Self {
            stream,
            device_name: name,
        })
    }

    /// Stop pulling and release the device.
    pub fn close(self) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("Failed to pause audio stream: {}", e);
        }
        tracing::debug!(device = %self.device_name, "Audio output closed");
    }

    fn select_device(host: &cpal::Host, wanted: &str) -> Result<Device, AudioError> {
        if wanted.is_empty() {
            return host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()));
        }

        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Init(e.to_string()))?;

        for device in devices {
            if let Ok(name) = device.name()
                && name.eq_ignore_ascii_case(wanted)
            {
                return Ok(device);
            }
        }

        Err(AudioError::DeviceNotFound(wanted.to_string()))
    }
}

/// List available audio output devices.
pub fn list_audio_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Prefer native i16, then float, then anything else.
fn format_preference(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::I16 => 3,
        SampleFormat::F32 => 2,
        SampleFormat::U16 => 1,
        _ => 0,
    }
}

/// Adapts block-sized mixer output to whatever slice size the device asks for.
struct BlockPump {
    mixer: FadeMixer,
    block: Box<[i16]>,
    pos: usize,
}

impl BlockPump {
    fn new(mixer: FadeMixer) -> Self {
        Self {
            mixer,
            block: vec![0i16; BLOCK_SAMPLES].into_boxed_slice(),
            // Start exhausted so the first callback pulls a fresh block
            pos: BLOCK_SAMPLES,
        }
    }

    fn fill<T>(&mut self, data: &mut [T])
    where
        T: cpal::Sample + cpal::FromSample<i16>,
    {
        let mut written = 0;
        while written < data.len() {
            if self.pos == self.block.len() {
                self.mixer.mix(&mut self.block);
                self.pos = 0;
            }

            let n = (self.block.len() - self.pos).min(data.len() - written);
            for (dst, &src) in data[written..written + n]
                .iter_mut()
                .zip(&self.block[self.pos..self.pos + n])
            {
                *dst = T::from_sample(src);
            }
            self.pos += n;
            written += n;
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut pump: BlockPump,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| pump.fill(data),
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )
}
