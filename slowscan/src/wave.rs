//! WAV emission and parsing.
//!
//! The toolchain speaks mono 16-bit PCM. `hound` walks the RIFF chunk list
//! when reading, so files with LIST/INFO or `fact` chunks ahead of `data`
//! parse the same as a bare 44-byte header.

use std::{
    io::Cursor,
    path::Path,
};

#[derive(Debug, thiserror::Error)]
pub enum WaveError {
    #[error(transparent)]
    Hound(#[from] hound::Error),
    #[error("expected {expected} audio channel(s), got {channels}")]
    UnexpectedChannelCount { channels: u16, expected: u16 },
    #[error("expected {expected} bits per sample, got {bits_per_sample}")]
    UnexpectedBitsPerSample { bits_per_sample: u16, expected: u16 },
    #[error("expected {expected:?} samples, got {sample_format:?}")]
    UnexpectedSampleFormat {
        sample_format: hound::SampleFormat,
        expected: hound::SampleFormat,
    },
}

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_into<W>(writer: &mut hound::WavWriter<W>, samples: &[f32]) -> Result<(), WaveError>
where
    W: std::io::Write + std::io::Seek,
{
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * 0x7fff as f32) as i16)?;
    }
    Ok(())
}

/// Serializes samples as a canonical mono 16-bit PCM WAV.
pub fn write_samples(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, WaveError> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec(sample_rate))?;
    write_into(&mut writer, samples)?;
    writer.finalize()?;
    Ok(cursor.into_inner())
}

pub fn write_samples_to(
    path: impl AsRef<Path>,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), WaveError> {
    let mut writer = hound::WavWriter::create(path, spec(sample_rate))?;
    write_into(&mut writer, samples)?;
    writer.finalize()?;
    Ok(())
}

fn read_from<R>(mut reader: hound::WavReader<R>) -> Result<(Vec<f32>, u32), WaveError>
where
    R: std::io::Read,
{
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(WaveError::UnexpectedChannelCount {
            channels: spec.channels,
            expected: 1,
        });
    }
    if spec.bits_per_sample != 16 {
        return Err(WaveError::UnexpectedBitsPerSample {
            bits_per_sample: spec.bits_per_sample,
            expected: 16,
        });
    }
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(WaveError::UnexpectedSampleFormat {
            sample_format: spec.sample_format,
            expected: hound::SampleFormat::Int,
        });
    }

    let samples = reader
        .samples::<i16>()
        .map(|sample| sample.map(|sample| sample as f32 / 32768.0))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((samples, spec.sample_rate))
}

/// Parses a mono 16-bit PCM WAV into float samples in [-1, 1].
pub fn read_samples(bytes: &[u8]) -> Result<(Vec<f32>, u32), WaveError> {
    read_from(hound::WavReader::new(Cursor::new(bytes))?)
}

pub fn read_samples_from(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32), WaveError> {
    read_from(hound::WavReader::open(path)?)
}
