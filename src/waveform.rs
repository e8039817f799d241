//! Component A — Waveform Normalizer.
//!
//! Downmixes to mono and resamples to the canonical [`SAMPLE_RATE`] with a
//! band-limited sinc interpolator so that no aliasing is introduced above
//! the new Nyquist frequency (spec §4.A).

use std::fs::File;
use std::path::Path;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::SAMPLE_RATE;
use crate::error::MusicaError;

/// Decodes any container symphonia supports into mono `f32` samples at the
/// file's native sample rate. Does not resample — callers run
/// [`resample_to_canonical_rate`] afterwards.
pub fn decode_to_mono(path: &Path) -> Result<(Vec<f32>, u32), MusicaError> {
    let file = File::open(path)?;
    decode_reader_to_mono(file, path.extension().and_then(|e| e.to_str()))
}

pub fn decode_bytes_to_mono(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<(Vec<f32>, u32), MusicaError> {
    let cursor = std::io::Cursor::new(bytes);
    decode_reader_to_mono(cursor, extension_hint)
}

fn decode_reader_to_mono<R>(reader: R, extension_hint: Option<&str>) -> Result<(Vec<f32>, u32), MusicaError>
where
    R: symphonia::core::io::MediaSource + 'static,
{
    let mss = MediaSourceStream::new(Box::new(reader), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| MusicaError::Decode {
            path: extension_hint.unwrap_or("<stream>").to_string(),
            source: anyhow::anyhow!(e),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| MusicaError::Decode {
            path: extension_hint.unwrap_or("<stream>").to_string(),
            source: anyhow::anyhow!("no decodable audio track found"),
        })?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MusicaError::Decode {
            path: extension_hint.unwrap_or("<stream>").to_string(),
            source: anyhow::anyhow!(e),
        })?;

    let mut mono_samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => {
                return Err(MusicaError::Decode {
                    path: extension_hint.unwrap_or("<stream>").to_string(),
                    source: anyhow::anyhow!(e),
                });
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => {
                return Err(MusicaError::Decode {
                    path: extension_hint.unwrap_or("<stream>").to_string(),
                    source: anyhow::anyhow!(e),
                });
            }
        };

        let channels = decoded.spec().channels.count().max(1);
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);

        for frame in sample_buf.samples().chunks_exact(channels) {
            let mono = frame.iter().sum::<f32>() / channels as f32;
            mono_samples.push(mono);
        }
    }

    Ok((mono_samples, sample_rate))
}

/// Resamples mono `samples` from `sr_in` to [`SAMPLE_RATE`] using a
/// band-limited sinc interpolator. A no-op when the rates already match.
pub fn resample_to_canonical_rate(samples: &[f32], sr_in: u32) -> Result<Vec<f32>, MusicaError> {
    resample(samples, sr_in, SAMPLE_RATE)
}

pub fn resample(samples: &[f32], sr_in: u32, sr_out: u32) -> Result<Vec<f32>, MusicaError> {
    if sr_in == sr_out || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = sr_out as f64 / sr_in as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| MusicaError::Decode {
            path: "<resample>".to_string(),
            source: anyhow::anyhow!(e),
        })?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| MusicaError::Decode {
            path: "<resample>".to_string(),
            source: anyhow::anyhow!(e),
        })?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Interprets a raw little-endian float32 PCM byte buffer (the wire format
/// used by `/ws/recognize`, spec §6) as mono samples.
pub fn pcm_f32le_to_samples(bytes: &[u8]) -> Result<Vec<f32>, MusicaError> {
    if bytes.len() % 4 != 0 {
        return Err(MusicaError::ProtocolViolation(format!(
            "binary frame length {} is not a multiple of 4 bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_is_noop_when_rates_match() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        let out = resample(&samples, 22_050, 22_050).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn resample_changes_length_proportionally() {
        let samples: Vec<f32> = (0..4410).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample(&samples, 44_100, 22_050).unwrap();
        // allow for sinc resampler edge effects
        assert!((out.len() as i64 - 2205).abs() < 50);
    }

    #[test]
    fn pcm_f32le_round_trips_known_values() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.5f32).to_le_bytes());
        let samples = pcm_f32le_to_samples(&bytes).unwrap();
        assert_eq!(samples, vec![1.0, -0.5]);
    }

    #[test]
    fn pcm_f32le_rejects_truncated_frame() {
        let bytes = vec![0u8, 1, 2];
        assert!(pcm_f32le_to_samples(&bytes).is_err());
    }

    #[test]
    fn decode_to_mono_reads_a_real_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..8_000u32 {
            let sample = (i16::MAX as f32 * (i as f32 * 0.01).sin()) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let (mono, sample_rate) = decode_to_mono(&path).unwrap();
        assert_eq!(sample_rate, 8_000);
        assert_eq!(mono.len(), 8_000);
    }
}
