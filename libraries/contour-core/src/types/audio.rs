/// Audio-related types
use serde::{Deserialize, Serialize};

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// Common sample rates
    pub const CD_QUALITY: Self = Self(44_100);
    pub const DVD_QUALITY: Self = Self(48_000);
    pub const HIGH_RES_96: Self = Self(96_000);

    /// Create a new sample rate
    #[must_use]
    pub fn new(hz: u32) -> Self {
        Self(hz)
    }

    /// Get the sample rate as Hz
    pub fn as_hz(&self) -> u32 {
        self.0
    }
}

/// Audio format information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate
    pub sample_rate: SampleRate,

    /// Number of channels (1 = mono, 2 = stereo, etc.)
    pub channels: u16,

    /// Bits per sample
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Create a new audio format
    pub fn new(sample_rate: SampleRate, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// 32-bit float stereo at the given rate (the decoder's output format)
    pub fn float_stereo(sample_rate: u32) -> Self {
        Self::new(SampleRate::new(sample_rate), 2, 32)
    }

    /// Calculate the byte rate (bytes per second)
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.as_hz() * u32::from(self.channels) * u32::from(self.bits_per_sample) / 8
    }
}

/// Audio buffer containing decoded samples
///
/// Samples are stored as f32 in the range [-1.0, 1.0]
/// Interleaved format: [L, R, L, R, ...] for stereo
///
/// Buffers are treated as immutable once handed to the next stage. Every DSP
/// stage produces a new buffer (see `with_samples`) instead of editing its input.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Audio samples (f32, interleaved)
    pub samples: Vec<f32>,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioBuffer {
    /// Create a new audio buffer
    pub fn new(samples: Vec<f32>, format: AudioFormat) -> Self {
        Self { samples, format }
    }

    /// Create a silent buffer with `frames` frames
    pub fn silence(frames: usize, format: AudioFormat) -> Self {
        Self {
            samples: vec![0.0; frames * format.channels as usize],
            format,
        }
    }

    /// Create a buffer with the same format but different samples
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self {
            samples,
            format: self.format,
        }
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> usize {
        self.format.channels as usize
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate.as_hz()
    }

    /// Get the number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.format.channels == 0 {
            return 0;
        }
        self.samples.len() / self.format.channels as usize
    }

    /// Get the duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.format.sample_rate.as_hz() as f64
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the length in samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Copy out the frames in `[start, end)`
    ///
    /// Out-of-range bounds are clamped to the buffer.
    pub fn slice_frames(&self, start: usize, end: usize) -> Self {
        let channels = self.channels();
        let frames = self.frames();
        let end = end.min(frames);
        let start = start.min(end);
        self.with_samples(self.samples[start * channels..end * channels].to_vec())
    }

    /// Peak absolute sample value (linear)
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .filter(|s| s.is_finite())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square level across all channels (linear)
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .samples
            .iter()
            .filter(|s| s.is_finite())
            .map(|&s| f64::from(s) * f64::from(s))
            .sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }
}

/// Convert a linear amplitude to dBFS, flooring silence at -120 dB
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 1e-6 {
        20.0 * linear.log10()
    } else {
        -120.0
    }
}

/// Convert dB to linear gain
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
