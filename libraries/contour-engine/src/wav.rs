//! 16-bit PCM WAV framing for the output stream
//!
//! The stream is a canonical 44-byte RIFF header followed by interleaved
//! little-endian `i16` samples. Sizes are known up front because the output
//! has exactly as many frames as the source.

use bytes::{BufMut, Bytes, BytesMut};
use contour_core::AudioBuffer;

/// Size of the canonical header
pub const WAV_HEADER_LEN: u64 = 44;

/// Bytes per output sample
pub const BYTES_PER_SAMPLE: u64 = 2;

/// Output layout of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavLayout {
    pub sample_rate: u32,
    pub channels: u16,
    pub total_frames: u64,
}

impl WavLayout {
    pub fn new(sample_rate: u32, channels: u16, total_frames: u64) -> Self {
        Self {
            sample_rate,
            channels,
            total_frames,
        }
    }

    pub fn bytes_per_frame(&self) -> u64 {
        u64::from(self.channels) * BYTES_PER_SAMPLE
    }

    /// Size of the sample data
    pub fn data_len(&self) -> u64 {
        self.total_frames * self.bytes_per_frame()
    }

    /// Size of the whole file
    pub fn total_len(&self) -> u64 {
        WAV_HEADER_LEN + self.data_len()
    }

    /// Byte offset of output frame `frame`
    pub fn frame_offset(&self, frame: u64) -> u64 {
        WAV_HEADER_LEN + frame * self.bytes_per_frame()
    }

    /// Output frame containing byte `offset` (header bytes map to frame 0)
    pub fn frame_at(&self, offset: u64) -> u64 {
        offset.saturating_sub(WAV_HEADER_LEN) / self.bytes_per_frame().max(1)
    }

    /// The 44-byte header
    pub fn header(&self) -> Bytes {
        let data_len = u32::try_from(self.data_len()).unwrap_or(u32::MAX);
        let byte_rate = self.sample_rate * u32::from(self.channels) * BYTES_PER_SAMPLE as u32;
        let block_align = self.channels * BYTES_PER_SAMPLE as u16;

        let mut out = BytesMut::with_capacity(WAV_HEADER_LEN as usize);
        out.put_slice(b"RIFF");
        out.put_u32_le(data_len.saturating_add(36));
        out.put_slice(b"WAVE");
        out.put_slice(b"fmt ");
        out.put_u32_le(16);
        out.put_u16_le(1); // PCM
        out.put_u16_le(self.channels);
        out.put_u32_le(self.sample_rate);
        out.put_u32_le(byte_rate);
        out.put_u16_le(block_align);
        out.put_u16_le(16);
        out.put_slice(b"data");
        out.put_u32_le(data_len);
        out.freeze()
    }
}

/// Encode samples as interleaved little-endian `i16`
pub fn encode_pcm16(buffer: &AudioBuffer) -> Bytes {
    let mut out = BytesMut::with_capacity(buffer.len() * BYTES_PER_SAMPLE as usize);
    for &sample in &buffer.samples {
        out.put_i16_le(to_i16(sample));
    }
    out.freeze()
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}
