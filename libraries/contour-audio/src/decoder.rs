/// Audio decoder implementation using Symphonia
use crate::error::{AudioError, Result};
use contour_core::{AudioBuffer, AudioFormat, AudioLoader, ContourError};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// ITU-R BS.775 coefficient for centre and surround channels (-3 dB)
const CENTER_MIX: f32 = 0.707;

/// Whole-file decoder using Symphonia
///
/// Supports: MP3, FLAC, OGG/Vorbis, WAV, AAC/M4A
///
/// The decoder is stateless; every call opens the file afresh. Output is always
/// interleaved 32-bit float stereo at the file's native sample rate. Mono is
/// duplicated, surround layouts are folded down with ITU-R BS.775 coefficients.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

struct OpenedTrack {
    format: Box<dyn FormatReader>,
    track_id: u32,
    codec_params: CodecParameters,
}

impl SymphoniaDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self
    }

    /// Check whether the file extension is one we can decode
    pub fn supports_format(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "mp3" | "flac" | "ogg" | "wav" | "m4a" | "aac"
                )
            })
    }

    /// Duration of the file in seconds
    ///
    /// Uses the container's frame count when it is known, otherwise decodes the
    /// file and counts frames.
    pub fn probe_duration(&self, path: &Path) -> contour_core::Result<f64> {
        let opened = Self::open(path)?;
        if let (Some(frames), Some(rate)) = (
            opened.codec_params.n_frames,
            opened.codec_params.sample_rate,
        ) {
            if rate > 0 {
                return Ok(frames as f64 / f64::from(rate));
            }
        }

        let buffer = self.load(path)?;
        Ok(buffer.duration_secs())
    }

    fn open(path: &Path) -> Result<OpenedTrack> {
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| AudioError::UnsupportedFormat("no default track".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        Ok(OpenedTrack {
            format,
            track_id,
            codec_params,
        })
    }

    fn decode_all(path: &Path) -> Result<AudioBuffer> {
        let OpenedTrack {
            mut format,
            track_id,
            codec_params,
        } = Self::open(path)?;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::UnsupportedFormat("unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::DecodeError(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::DecodeError(format!(
                        "Error reading packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => append_stereo(decoded, &mut samples),
                // A corrupt packet is dropped; the rest of the file is still usable
                Err(SymphoniaError::DecodeError(_)) => skipped_packets += 1,
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            }
        }

        if skipped_packets > 0 {
            tracing::warn!(
                path = %path.display(),
                skipped_packets,
                "Skipped undecodable packets"
            );
        }

        Ok(AudioBuffer::new(
            samples,
            AudioFormat::float_stereo(sample_rate),
        ))
    }
}

impl AudioLoader for SymphoniaDecoder {
    fn load(&self, path: &Path) -> contour_core::Result<AudioBuffer> {
        Self::decode_all(path).map_err(|e| match e {
            AudioError::FileNotFound(_) | AudioError::Io(_) => {
                ContourError::source_unavailable(path, e.to_string())
            }
            other => other.into(),
        })
    }
}

fn append_stereo(decoded: AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => downmix(&buf, out),
        AudioBufferRef::F64(buf) => downmix(&buf, out),
        AudioBufferRef::S32(buf) => downmix(&buf, out),
        AudioBufferRef::S24(buf) => downmix(&buf, out),
        AudioBufferRef::S16(buf) => downmix(&buf, out),
        AudioBufferRef::S8(buf) => downmix(&buf, out),
        AudioBufferRef::U32(buf) => downmix(&buf, out),
        AudioBufferRef::U24(buf) => downmix(&buf, out),
        AudioBufferRef::U16(buf) => downmix(&buf, out),
        AudioBufferRef::U8(buf) => downmix(&buf, out),
    }
}

/// Fold any channel layout down to interleaved stereo
///
/// Layout assumptions follow the usual WAV/FLAC ordering:
/// L R, L R C, L R SL SR, L R C SL SR, L R C LFE SL SR.
fn downmix<T>(buf: &symphonia::core::audio::AudioBuffer<T>, out: &mut Vec<f32>)
where
    T: Sample + IntoSample<f32>,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    out.reserve(frames * 2);

    let chan = |c: usize, i: usize| -> f32 {
        let s: f32 = buf.chan(c)[i].into_sample();
        s.clamp(-1.0, 1.0)
    };

    for i in 0..frames {
        let (l, r) = match channels {
            0 => (0.0, 0.0),
            1 => {
                let m = chan(0, i);
                (m, m)
            }
            2 => (chan(0, i), chan(1, i)),
            3 => {
                let c = chan(2, i) * CENTER_MIX;
                (chan(0, i) + c, chan(1, i) + c)
            }
            4 => (
                chan(0, i) + chan(2, i) * CENTER_MIX,
                chan(1, i) + chan(3, i) * CENTER_MIX,
            ),
            5 => {
                let c = chan(2, i) * CENTER_MIX;
                (
                    chan(0, i) + c + chan(3, i) * CENTER_MIX,
                    chan(1, i) + c + chan(4, i) * CENTER_MIX,
                )
            }
            _ => {
                let c = (chan(2, i) + chan(3, i)) * CENTER_MIX;
                (
                    chan(0, i) + c + chan(4, i) * CENTER_MIX,
                    chan(1, i) + c + chan(5, i) * CENTER_MIX,
                )
            }
        };
        out.push(l.clamp(-1.0, 1.0));
        out.push(r.clamp(-1.0, 1.0));
    }
}
