// src/audio/wav.rs
//! Mono 16-bit PCM WAV output for exported clips.

use std::io::{Seek, Write};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::Result;

/// Size of the canonical RIFF header written ahead of the samples.
pub const HEADER_LEN: usize = 44;

pub fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write a complete WAV file: header, then little-endian samples.
pub fn write_wav<W: Write + Seek>(writer: W, sample_rate: u32, samples: &[i16]) -> Result<()> {
    let mut writer = WavWriter::new(writer, wav_spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
