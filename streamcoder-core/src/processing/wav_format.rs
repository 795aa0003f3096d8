//! WAV framing for the uncompressed PCM stream.
//!
//! A live stream has no known length, so the streaming header carries
//! `0xFFFFFFFF` in both size fields, which players treat as "read until EOF".

use crate::models::error::StreamError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Size field value for a stream of unknown length.
pub const UNKNOWN_LENGTH: u32 = u32::MAX;

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
///
/// Fails when the byte rate or block alignment of the format does not fit
/// its header field.
pub fn generate_wav_header(
    sample_rate: u32,
    bit_depth: u16,
    channels: u16,
    data_size: u32,
) -> Result<[u8; WAV_HEADER_SIZE], StreamError> {
    let chunk_size = data_size.saturating_add(36);
    build_header(sample_rate, bit_depth, channels, chunk_size, data_size)
}

/// Header for a live stream whose length is not known up front.
pub fn streaming_wav_header(
    sample_rate: u32,
    bit_depth: u16,
    channels: u16,
) -> Result<[u8; WAV_HEADER_SIZE], StreamError> {
    build_header(sample_rate, bit_depth, channels, UNKNOWN_LENGTH, UNKNOWN_LENGTH)
}

fn build_header(
    sample_rate: u32,
    bit_depth: u16,
    channels: u16,
    chunk_size: u32,
    data_size: u32,
) -> Result<[u8; WAV_HEADER_SIZE], StreamError> {
    let out_of_range = || {
        StreamError::ConfigurationFailed(format!(
            "no WAV framing for {} Hz, {} channels, {} bit",
            sample_rate, channels, bit_depth
        ))
    };
    let byte_rate = u32::try_from(sample_rate as u64 * channels as u64 * bit_depth as u64 / 8)
        .map_err(|_| out_of_range())?;
    let block_align = u16::try_from(channels as u32 * bit_depth as u32 / 8).map_err(|_| out_of_range())?;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(header: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([header[offset], header[offset + 1], header[offset + 2], header[offset + 3]])
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(48000, 16, 2, 0).unwrap();
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_48khz_stereo_16bit() {
        let header = generate_wav_header(48000, 16, 2, 9600).unwrap();

        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 2);
        assert_eq!(u32_at(&header, 24), 48000);
        assert_eq!(u32_at(&header, 28), 192000); // 48000 * 2 * 16/8
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 4);
        assert_eq!(u16::from_le_bytes([header[34], header[35]]), 16);
        assert_eq!(u32_at(&header, 40), 9600);
        assert_eq!(u32_at(&header, 4), 36 + 9600);
    }

    #[test]
    fn streaming_header_has_open_length() {
        let header = streaming_wav_header(44100, 16, 1).unwrap();

        assert_eq!(u32_at(&header, 4), UNKNOWN_LENGTH);
        assert_eq!(u32_at(&header, 40), UNKNOWN_LENGTH);
        assert_eq!(u32_at(&header, 24), 44100);
        assert_eq!(u32_at(&header, 28), 88200);
    }

    #[test]
    fn byte_rate_overflow_is_an_error() {
        assert!(matches!(
            streaming_wav_header(200_000_000, 16, 2),
            Err(StreamError::ConfigurationFailed(_))
        ));
        // the largest rate that still fits a 32-bit byte rate
        assert!(streaming_wav_header(u32::MAX / 4, 16, 2).is_ok());
    }
}
