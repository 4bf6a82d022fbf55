use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::error::BufferError;

/// Decoded, interleaved audio normalized to `[-1.0, 1.0]`. Read-only once built;
/// clones share the same sample storage.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self, BufferError> {
        if channels == 0 {
            return Err(BufferError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(BufferError::NoSampleRate);
        }
        if samples.len() % usize::from(channels) != 0 {
            return Err(BufferError::PartialFrame {
                samples: samples.len(),
                channels,
            });
        }
        if samples.is_empty() {
            return Err(BufferError::NoFrames);
        }
        Ok(SampleBuffer {
            samples: samples.into(),
            channels,
            sample_rate,
        })
    }

    pub fn from_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open audio file: '{}'", path.display()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .context("Failed to decode audio samples")?,
            (hound::SampleFormat::Int, bits @ 1..=32) => {
                let scale = (1u64 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / scale))
                    .collect::<Result<_, _>>()
                    .context("Failed to decode audio samples")?
            }
            (format, bits) => {
                let format = match format {
                    hound::SampleFormat::Float => "float",
                    hound::SampleFormat::Int => "integer",
                };
                return Err(BufferError::UnsupportedFormat { bits, format })
                    .with_context(|| format!("Cannot read '{}'", path.display()));
            }
        };

        let buffer = SampleBuffer::new(samples, spec.channels, spec.sample_rate)
            .with_context(|| format!("Cannot use audio from '{}'", path.display()))?;
        info!(
            path = %path.display(),
            frames = buffer.frames(),
            sample_rate = buffer.sample_rate(),
            channels = buffer.channels(),
            "loaded audio"
        );
        Ok(buffer)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Interleaved samples of frame `index`.
    pub fn frame(&self, index: usize) -> &[f32] {
        let width = usize::from(self.channels);
        &self.samples[index * width..(index + 1) * width]
    }
}
