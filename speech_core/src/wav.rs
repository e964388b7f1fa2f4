//! WAV encoding of synthesized audio.

use std::io::{Seek, Write};
use std::path::Path;

/// Output sample rate shared by every voice.
pub const SAMPLE_RATE: u32 = 24_000;

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode PCM f32 samples as mono 16-bit PCM WAV into any seekable writer.
pub fn write_wav<W: Write + Seek>(
    out: W,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    const I16_MAX_F32: f32 = i16::MAX as f32;

    let mut writer = hound::WavWriter::new(out, spec(sample_rate))?;
    for &s in samples {
        // Clamp and convert f32 [-1.0, 1.0] -> i16
        writer.write_sample((s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16)?;
    }
    writer.finalize()
}

/// Create (or truncate) `path` and write the samples to it.
pub fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_wav(file, samples, sample_rate)
}
