//! # Audio Normalization
//!
//! Converts an arbitrary uploaded audio buffer into the canonical PCM stream:
//! mono, 16-bit little-endian samples, tagged with a sample rate.
//!
//! ## Detection:
//! The media type is detected from the bytes themselves, never from a filename.
//! RIFF/WAVE content takes the hound fast path; everything else goes through
//! symphonia's format probe, which identifies MP3, OGG, FLAC, AAC and friends
//! by content.
//!
//! ## Rate policy:
//! A parseable WAV keeps its existing sample rate — the recognizer accepts any
//! consistent rate as long as it is reported with the data, so an already-valid
//! WAV is never silently resampled. Non-WAV inputs are fully transcoded to
//! 16kHz mono, the rate the companion recognizer deployments expect.

use crate::error::{AppError, AppResult};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Sample rate non-WAV uploads are transcoded to (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Canonical decoded audio: interleaved 16-bit mono little-endian samples.
///
/// ## Invariants:
/// - `sample_rate > 0`
/// - byte length is a multiple of 2 (one sample = two bytes)
/// - channel count is fixed to 1
#[derive(Debug, Clone, PartialEq)]
pub struct PcmStream {
    bytes: Vec<u8>,
    sample_rate: u32,
}

impl PcmStream {
    /// Channel count of the canonical stream. Always mono.
    pub const CHANNELS: u16 = 1;

    /// Build a stream from decoded samples, serializing them little-endian.
    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Self { bytes, sample_rate }
    }

    /// The raw PCM bytes (16-bit LE mono).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The stream's sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration of the stream in seconds.
    pub fn duration_seconds(&self) -> f64 {
        (self.bytes.len() / 2) as f64 / self.sample_rate as f64
    }

    /// Check if the stream holds no samples.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Convert an uploaded audio buffer into the canonical PCM stream.
///
/// ## Decoding paths:
/// 1. RIFF/WAVE content → hound. Already mono/16-bit streams pass through
///    untouched at their existing rate; other WAV layouts are downmixed and
///    requantized, also keeping their rate.
/// 2. Anything else → symphonia probe + decode, downmix to mono, resample to
///    16kHz, requantize to i16.
///
/// ## Errors:
/// `AppError::UnsupportedFormat` when the bytes cannot be identified or
/// decoded as audio — including empty input.
pub fn normalize(bytes: &[u8]) -> AppResult<PcmStream> {
    if bytes.is_empty() {
        return Err(AppError::UnsupportedFormat("empty audio buffer".to_string()));
    }

    if is_wav(bytes) {
        normalize_wav(bytes)
    } else {
        normalize_with_symphonia(bytes)
    }
}

/// Content check for the RIFF/WAVE container magic.
fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode a WAV buffer, keeping its sample rate.
fn normalize_wav(bytes: &[u8]) -> AppResult<PcmStream> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AppError::UnsupportedFormat(format!("invalid WAV: {}", e)))?;
    let spec = reader.spec();

    if spec.sample_rate == 0 {
        return Err(AppError::UnsupportedFormat("WAV reports zero sample rate".to_string()));
    }

    // Fast path: already the canonical layout, pass samples through untouched
    if spec.channels == 1
        && spec.bits_per_sample == 16
        && spec.sample_format == hound::SampleFormat::Int
    {
        let samples: Result<Vec<i16>, _> = reader.into_samples::<i16>().collect();
        let samples = samples
            .map_err(|e| AppError::UnsupportedFormat(format!("truncated WAV data: {}", e)))?;
        debug!(
            sample_rate = spec.sample_rate,
            samples = samples.len(),
            "WAV input already canonical, passing through"
        );
        return Ok(PcmStream::from_samples(&samples, spec.sample_rate));
    }

    // Other WAV layouts: lift to f32, downmix, requantize — rate stays
    let channels = spec.channels as usize;
    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples: Result<Vec<f32>, _> = reader.into_samples::<f32>().collect();
            samples.map_err(|e| AppError::UnsupportedFormat(format!("truncated WAV data: {}", e)))?
        }
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            let samples: Result<Vec<i32>, _> = reader.into_samples::<i32>().collect();
            samples
                .map_err(|e| AppError::UnsupportedFormat(format!("truncated WAV data: {}", e)))?
                .into_iter()
                .map(|s| s as f32 / scale)
                .collect()
        }
    };

    let mono = downmix_to_mono(&raw, channels);
    debug!(
        sample_rate = spec.sample_rate,
        channels,
        bits = spec.bits_per_sample,
        "re-encoded WAV to mono 16-bit at its existing rate"
    );
    Ok(PcmStream::from_samples(&f32_to_i16(&mono), spec.sample_rate))
}

/// Probe and decode any other container/codec, then transcode to 16kHz mono.
fn normalize_with_symphonia(bytes: &[u8]) -> AppResult<PcmStream> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AppError::UnsupportedFormat(format!("unrecognized audio container: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AppError::UnsupportedFormat("no decodable audio track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::UnsupportedFormat(format!("unsupported codec: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channels = 0usize;
    let mut source_rate = 0u32;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream surfaces as an I/O error in symphonia
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AppError::UnsupportedFormat(format!("demux failed: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                source_rate = spec.rate;

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
            // Isolated corrupt packets are skipped; the rest of the file may decode
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => {
                return Err(AppError::UnsupportedFormat(format!("decode failed: {}", e)));
            }
        }
    }

    if interleaved.is_empty() || channels == 0 || source_rate == 0 {
        return Err(AppError::UnsupportedFormat(
            "no audio samples could be decoded".to_string(),
        ));
    }

    let mono = downmix_to_mono(&interleaved, channels);
    let resampled = if source_rate != TARGET_SAMPLE_RATE {
        resample(&mono, source_rate, TARGET_SAMPLE_RATE)?
    } else {
        mono
    };

    debug!(
        source_rate,
        channels,
        samples = resampled.len(),
        "transcoded input to 16kHz mono"
    );
    Ok(PcmStream::from_samples(&f32_to_i16(&resampled), TARGET_SAMPLE_RATE))
}

/// Average interleaved channels down to one.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio between rates with a windowed-sinc resampler.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> AppResult<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        samples.len(),
        1, // mono
    )
    .map_err(|e| AppError::Internal(format!("resampler setup failed: {}", e)))?;

    let output = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| AppError::Internal(format!("resampling failed: {}", e)))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Quantize normalized float samples to 16-bit PCM.
fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let clamped = s.clamp(-1.0, 1.0);
            (clamped * i16::MAX as f32) as i16
        })
        .collect()
}
