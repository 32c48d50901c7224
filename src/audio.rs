//! Conversions between float sample buffers and the 16-bit PCM wire format,
//! plus a minimal uncompressed WAV container writer.
//!
//! Decoding arbitrary audio files into float samples is left to an external
//! decoder; these routines consume its one-channel float output.

use crate::error::Result;
use base64::Engine as _;
use base64::engine::general_purpose;
use std::path::Path;

const WAV_HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

// Multiple of 3 so chunk boundaries never split a base64 quantum.
const ENCODE_CHUNK_BYTES: usize = 48 * 1024;

/// Convert float samples to little-endian PCM16 bytes.
///
/// Samples are clamped to `[-1.0, 1.0]`; negative values scale by 32768,
/// non-negative by 32767, truncated toward the scaled value.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn float_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let scaled = if clamped < 0.0 {
            clamped * 32768.0
        } else {
            clamped * 32767.0
        };
        buf.extend_from_slice(&(scaled as i16).to_le_bytes());
    }
    buf
}

/// Decode little-endian PCM16 bytes back into float samples.
///
/// A trailing odd byte is ignored.
#[must_use]
pub fn pcm16_to_float(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            if value < 0 {
                f32::from(value) / 32768.0
            } else {
                f32::from(value) / 32767.0
            }
        })
        .collect()
}

/// Base64-encode PCM16 bytes into one contiguous string with no line breaks.
///
/// Large buffers are encoded in fixed-size chunks to bound peak memory.
#[must_use]
pub fn pcm16_to_base64(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(ENCODE_CHUNK_BYTES) {
        general_purpose::STANDARD.encode_string(chunk, &mut encoded);
    }
    encoded
}

/// Decode a base64 audio payload into raw PCM16 bytes.
///
/// # Errors
/// Returns an error if the payload is not valid base64.
pub fn base64_to_pcm16(payload: &str) -> Result<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(payload)?)
}

/// Encode float samples straight to a base64 PCM16 payload.
#[must_use]
pub fn encode_float_samples(samples: &[f32]) -> String {
    pcm16_to_base64(&float_to_pcm16(samples))
}

fn wav_header(data_len: u32, sample_rate: u32, channels: u16) -> [u8; WAV_HEADER_LEN] {
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * u32::from(block_align);

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&data_len.saturating_add(36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// Build a complete WAV file image: 44-byte RIFF header followed by the raw
/// PCM16 data.
#[must_use]
pub fn wav_container(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    // RIFF sizes are u32 fields; larger payloads are not representable.
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let mut container = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    container.extend_from_slice(&wav_header(data_len, sample_rate, channels));
    container.extend_from_slice(pcm);
    container
}

/// Write PCM16 data to `path` as a WAV file, blocking the caller.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_wav_file(path: &Path, pcm: &[u8], sample_rate: u32, channels: u16) -> Result<()> {
    std::fs::write(path, wav_container(pcm, sample_rate, channels))?;
    tracing::debug!(path = %path.display(), bytes = pcm.len(), "WAV file written");
    Ok(())
}

/// Async variant of [`write_wav_file`]; produces identical bytes.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub async fn write_wav_file_async(
    path: &Path,
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    tokio::fs::write(path, wav_container(pcm, sample_rate, channels)).await?;
    tracing::debug!(path = %path.display(), bytes = pcm.len(), "WAV file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_empty_output() {
        assert!(float_to_pcm16(&[]).is_empty());
        assert!(pcm16_to_base64(&[]).is_empty());
    }

    #[test]
    fn scaling_hits_the_asymmetric_extremes() {
        let pcm = float_to_pcm16(&[-1.0, 0.0, 1.0]);
        assert_eq!(pcm, {
            let mut expect = Vec::new();
            expect.extend_from_slice(&(-32768i16).to_le_bytes());
            expect.extend_from_slice(&0i16.to_le_bytes());
            expect.extend_from_slice(&32767i16.to_le_bytes());
            expect
        });
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let pcm = float_to_pcm16(&[-4.5, 3.2]);
        assert_eq!(pcm, float_to_pcm16(&[-1.0, 1.0]));
    }

    #[test]
    fn quantization_round_trip_is_within_one_step() {
        let samples: Vec<f32> = (-100..=100).map(|i| i as f32 / 100.0).collect();
        let recovered = pcm16_to_float(&float_to_pcm16(&samples));
        assert_eq!(recovered.len(), samples.len());
        for (&original, &round_tripped) in samples.iter().zip(&recovered) {
            assert!(
                (original - round_tripped).abs() <= 1.0 / 32767.0,
                "sample {original} recovered as {round_tripped}"
            );
        }
    }

    #[test]
    fn chunked_base64_matches_single_shot_encoding() {
        // Longer than one chunk and not a multiple of the chunk size.
        let bytes: Vec<u8> = (0..ENCODE_CHUNK_BYTES + 1_000)
            .map(|i| (i % 251) as u8)
            .collect();
        let chunked = pcm16_to_base64(&bytes);
        assert_eq!(chunked, general_purpose::STANDARD.encode(&bytes));
        assert!(!chunked.contains('\n'));
    }

    #[test]
    fn base64_round_trips_to_the_same_bytes() {
        let pcm = float_to_pcm16(&[0.25, -0.5, 0.9]);
        let decoded = base64_to_pcm16(&pcm16_to_base64(&pcm)).unwrap();
        assert_eq!(decoded, pcm);
    }

    #[test]
    fn base64_decode_rejects_garbage() {
        assert!(base64_to_pcm16("@@not-base64@@").is_err());
    }

    #[test]
    fn wav_container_length_law() {
        for count in [0usize, 1, 7, 4_410] {
            let pcm = vec![0u8; count * 2];
            let wav = wav_container(&pcm, 24_000, 1);
            assert_eq!(wav.len(), 44 + 2 * count);
        }
    }

    #[test]
    fn wav_header_fields_are_canonical() {
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0).sin()).collect();
        let pcm = float_to_pcm16(&samples);
        let wav = wav_container(&pcm, 24_000, 1);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let chunk_size = u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]);
        assert_eq!(chunk_size, 36 + 2 * 480);

        // Subchunk1Size 16, PCM format 1, mono.
        assert_eq!(u32::from_le_bytes([wav[16], wav[17], wav[18], wav[19]]), 16);
        assert_eq!(u16::from_le_bytes([wav[20], wav[21]]), 1);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(
            u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]),
            24_000
        );
        // Byte rate = rate * channels * 2, block align = channels * 2.
        assert_eq!(
            u32::from_le_bytes([wav[28], wav[29], wav[30], wav[31]]),
            48_000
        );
        assert_eq!(u16::from_le_bytes([wav[32], wav[33]]), 2);
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);

        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size as usize, pcm.len());
        assert_eq!(&wav[44..], pcm.as_slice());
    }

    #[test]
    fn stereo_header_adjusts_rates() {
        let wav = wav_container(&[0u8; 8], 44_100, 2);
        assert_eq!(
            u32::from_le_bytes([wav[28], wav[29], wav[30], wav[31]]),
            44_100 * 4
        );
        assert_eq!(u16::from_le_bytes([wav[32], wav[33]]), 4);
    }

    #[tokio::test]
    async fn sync_and_async_writers_produce_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let blocking = dir.path().join("blocking.wav");
        let asynchronous = dir.path().join("async.wav");

        let pcm = float_to_pcm16(&[0.1, -0.2, 0.3, -0.4]);
        write_wav_file(&blocking, &pcm, 24_000, 1).unwrap();
        write_wav_file_async(&asynchronous, &pcm, 24_000, 1)
            .await
            .unwrap();

        let a = std::fs::read(&blocking).unwrap();
        let b = std::fs::read(&asynchronous).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, wav_container(&pcm, 24_000, 1));
    }
}
