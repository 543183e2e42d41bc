// Streaming WAVE header sent ahead of the raw PCM audio.
//
// The service reads the stream format from this preamble. Length fields are
// zero because the total size is unknown when streaming starts.

use anyhow::{bail, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Sample rates accepted by the translation service
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [8000, 16000];

/// Outbound audio is always mono
pub const CHANNELS: u16 = 1;

/// Outbound audio is always 16-bit signed little-endian PCM
pub const BITS_PER_SAMPLE: u16 = 16;

/// Size of the `fmt ` sub-chunk, including the extra-params size field
const FMT_CHUNK_SIZE: u32 = 18;

/// Format tag for uncompressed PCM
const WAVE_FORMAT_PCM: u16 = 0x0001;

/// Total size of the generated header in bytes
pub const HEADER_LEN: usize = 46;

pub fn is_sample_rate_supported(sample_rate: u32) -> bool {
    SUPPORTED_SAMPLE_RATES.contains(&sample_rate)
}

/// Build the header describing a mono 16-bit PCM stream at `sample_rate`.
///
/// Fails for any rate other than 8000 or 16000 Hz, before anything is written.
pub fn wave_header(sample_rate: u32) -> Result<Vec<u8>> {
    if !is_sample_rate_supported(sample_rate) {
        bail!(
            "Unsupported sample rate {} Hz (expected one of {:?})",
            sample_rate,
            SUPPORTED_SAMPLE_RATES
        );
    }

    let bytes_per_sample = BITS_PER_SAMPLE / 8;
    let block_align = CHANNELS * bytes_per_sample;
    let byte_rate = sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(HEADER_LEN);
    out.write_all(b"RIFF")?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_u32::<LittleEndian>(FMT_CHUNK_SIZE)?;
    out.write_u16::<LittleEndian>(WAVE_FORMAT_PCM)?;
    out.write_u16::<LittleEndian>(CHANNELS)?;
    out.write_u32::<LittleEndian>(sample_rate)?;
    out.write_u32::<LittleEndian>(byte_rate)?;
    out.write_u16::<LittleEndian>(block_align)?;
    out.write_u16::<LittleEndian>(BITS_PER_SAMPLE)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_all(b"data")?;
    out.write_u32::<LittleEndian>(0)?;

    debug_assert_eq!(out.len(), HEADER_LEN);

    Ok(out)
}
